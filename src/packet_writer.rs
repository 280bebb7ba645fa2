use std::io::Write;

use crate::{command::Command, error::Result};

/// Allows writing the line representation of `Command`s to a `Write` trait
/// object.
///
/// Outbound lines are CRLF-terminated and carry no RSSI field.
#[derive(Debug)]
pub struct PacketWriter<W: Write> {
    writer: W,
}

impl<W: Write> PacketWriter<W> {
    /// Construct a new `PacketWriter`.
    pub fn new(writer: W) -> PacketWriter<W> {
        PacketWriter { writer }
    }

    /// Write the line representation of the `Command`.
    pub fn write_command(&mut self, cmd: &Command) -> Result<()> {
        self.write_line(&cmd.to_line())
    }

    /// Write a raw line, appending the CRLF terminator.
    pub fn write_line(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\r\n")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Write an out-of-band gateway escape (e.g. `!V`), bypassing the QoS
    /// engine.
    pub fn write_escape(&mut self, escape: &str) -> Result<()> {
        debug_assert!(escape.starts_with('!'));
        self.write_line(escape)
    }
}

impl<W: Write> AsRef<W> for PacketWriter<W> {
    fn as_ref(&self) -> &W {
        &self.writer
    }
}

impl<W: Write> AsMut<W> for PacketWriter<W> {
    fn as_mut(&mut self) -> &mut W {
        &mut self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{address::Address, packet::Verb};

    #[test]
    fn test_write_command() {
        let mut buf = Vec::new();

        {
            let mut writer = PacketWriter::new(&mut buf);
            let ctl: Address = "01:145038".parse().unwrap();
            let cmd = Command::new(Verb::Rq, ctl, 0x1F09, vec![0x00]);
            writer.write_command(&cmd).unwrap();
        }

        assert_eq!(
            b"RQ --- 18:000730 01:145038 --:------ 1F09 001 00\r\n".as_slice(),
            buf.as_slice()
        );
    }

    #[test]
    fn test_write_escape() {
        let mut buf = Vec::new();

        {
            let mut writer = PacketWriter::new(&mut buf);
            writer.write_escape("!V").unwrap();
        }

        assert_eq!(b"!V\r\n".as_slice(), buf.as_slice());
    }
}
