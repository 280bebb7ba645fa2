use std::io::Write;

use chrono::NaiveDateTime;

use crate::{error::Result, packet::Packet};

/// Appends packets to a packet log, one per line.
///
/// The format is `ISO8601-timestamp<SP>packet-text`; warning and error
/// annotations (`*`, `#`) are preserved verbatim, so a log is suitable for
/// exact round-trip replay with [`LogReader`](crate::LogReader).
#[derive(Debug)]
pub struct LogWriter<W: Write> {
    writer: W,
}

impl<W: Write> LogWriter<W> {
    /// Constructs a `LogWriter`.
    pub fn new(writer: W) -> LogWriter<W> {
        LogWriter { writer }
    }

    /// Appends one raw received line, exactly as it came off the wire.
    pub fn write_raw_line(&mut self, dtm: NaiveDateTime, line: &str) -> Result<()> {
        writeln!(
            self.writer,
            "{} {}",
            dtm.format("%Y-%m-%dT%H:%M:%S%.6f"),
            line
        )?;
        self.writer.flush()?;
        Ok(())
    }

    /// Appends one validated packet.
    pub fn write_packet(&mut self, pkt: &Packet) -> Result<()> {
        self.write_raw_line(pkt.dtm, &pkt.to_line())
    }
}

impl<W: Write> AsRef<W> for LogWriter<W> {
    fn as_ref(&self) -> &W {
        &self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_utils::{pkt_from_line, test_timestamp};

    #[test]
    fn test_write_packet() {
        let mut buf = Vec::new();

        {
            let mut writer = LogWriter::new(&mut buf);
            let pkt =
                pkt_from_line("045  I --- 01:145038 --:------ 01:145038 1F09 003 FF073F");
            writer.write_packet(&pkt).unwrap();
            writer
                .write_raw_line(test_timestamp(), "# evofw3 v0.7.0")
                .unwrap();
        }

        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            "2020-11-30T13:15:00.000000 045  I --- 01:145038 --:------ 01:145038 1F09 003 FF073F\n\
             2020-11-30T13:15:00.000000 # evofw3 v0.7.0\n",
            text
        );
    }
}
