use std::io::Read;

use chrono::Local;
use log::warn;

use crate::{error::Result, line_buffer::LineBuffer, packet::Packet};

/// Allows reading validated `Packet`s from a raw serial byte stream.
///
/// Each line is timestamped at reception; lines failing validation are logged
/// at warning level and skipped.
///
/// # Examples
///
/// ```rust,no_run
/// use std::net::TcpStream;
///
/// use ramses_rf::PacketReader;
///
/// let stream = TcpStream::connect("192.168.1.100:5000").expect("Unable to connect");
/// let mut reader = PacketReader::new(stream);
///
/// while let Some(pkt) = reader.read_packet().unwrap() {
///     println!("{}", pkt);
/// }
/// ```
#[derive(Debug)]
pub struct PacketReader<R: Read> {
    buf: LineBuffer,
    reader: R,
}

impl<R: Read> PacketReader<R> {
    /// Constructs a `PacketReader`.
    pub fn new(reader: R) -> PacketReader<R> {
        PacketReader {
            buf: LineBuffer::new(),
            reader,
        }
    }

    fn read_to_buf(&mut self) -> Result<usize> {
        let mut buf = [0u8; 4096];

        let size = self.reader.read(&mut buf)?;
        self.buf.extend_from_slice(&buf[0..size]);

        Ok(size)
    }

    /// Read from the stream until a valid `Packet` is found, or EOF.
    pub fn read_packet(&mut self) -> Result<Option<Packet>> {
        loop {
            while let Some(line) = self.buf.read_line() {
                match Packet::from_raw_line(Local::now().naive_local(), &line) {
                    Ok(pkt) => return Ok(Some(pkt)),
                    Err(err) => warn!("{line} < {err}"),
                }
            }

            if self.read_to_buf()? == 0 {
                return Ok(None);
            }
        }
    }
}

impl<R: Read> AsRef<R> for PacketReader<R> {
    fn as_ref(&self) -> &R {
        &self.reader
    }
}

impl<R: Read> AsMut<R> for PacketReader<R> {
    fn as_mut(&mut self) -> &mut R {
        &mut self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIVE_LINES: &[u8] = b"045  I --- 01:145038 --:------ 01:145038 1F09 003 FF073F\r\n\
        # evofw3 v0.7.0\r\n\
        045  I --- 04:056057 --:------ 04:056057 30C9 003 000838\r\n\
        064  I --- 01:078710 --:------ 01:144246 1F09 003 FF04B5\r\n\
        045  I --- 13:237335 --:------ 13:237335 3B00 002 00C8\r\n";

    #[test]
    fn test_read_packet() {
        let mut reader = PacketReader::new(LIVE_LINES);

        // the comment line and the invalid address triple are skipped
        let pkt = reader.read_packet().unwrap().unwrap();
        assert_eq!(0x1F09, pkt.code);

        let pkt = reader.read_packet().unwrap().unwrap();
        assert_eq!(0x30C9, pkt.code);

        let pkt = reader.read_packet().unwrap().unwrap();
        assert_eq!(0x3B00, pkt.code);

        assert!(reader.read_packet().unwrap().is_none());
    }

    #[test]
    fn test_partial_reads() {
        // a reader that yields one byte at a time still frames correctly
        struct OneByte<'a>(&'a [u8]);

        impl<'a> Read for OneByte<'a> {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                if self.0.is_empty() {
                    return Ok(0);
                }
                buf[0] = self.0[0];
                self.0 = &self.0[1..];
                Ok(1)
            }
        }

        let mut reader = PacketReader::new(OneByte(LIVE_LINES));

        let mut codes = Vec::new();
        while let Some(pkt) = reader.read_packet().unwrap() {
            codes.push(pkt.code);
        }
        assert_eq!(vec![0x1F09, 0x30C9, 0x3B00], codes);
    }
}
