use std::io::{Read, Result};
use std::net::TcpStream;
use std::time::Duration;

/// A trait to support reading using a timeout.
///
/// The gateway's event loop needs bounded reads so that QoS deadlines and
/// cooperative shutdown stay responsive while no packets arrive. A read that
/// hits its timeout fails with `WouldBlock` or `TimedOut`; a read returning
/// `Ok(0)` means the transport was lost.
pub trait ReadWithTimeout {
    /// Reads data using an optional timeout.
    fn read_with_timeout(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize>;
}

impl ReadWithTimeout for TcpStream {
    fn read_with_timeout(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize> {
        self.set_read_timeout(timeout)?;
        self.read(buf)
    }
}
