#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{Error, ErrorKind, Read, Result};
use std::rc::Rc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};

use crate::{
    message::Message,
    packet::Packet,
    read_with_timeout::ReadWithTimeout,
};

struct Inner {
    bytes: Vec<u8>,
    read_index: usize,
    read_call_count: usize,
    is_eof: bool,
}

/// A shared in-memory byte source standing in for the serial line.
///
/// Cloning yields a handle onto the same buffer, so a test can keep feeding
/// bytes after handing the reader to a stream. An empty buffer reads as a
/// timeout (`WouldBlock`) until [`set_eof`](Buffer::set_eof) is called.
#[derive(Clone)]
pub struct Buffer {
    inner: Rc<RefCell<Inner>>,
}

impl Buffer {
    pub fn new() -> Buffer {
        Buffer {
            inner: Rc::new(RefCell::new(Inner {
                bytes: Vec::new(),
                read_index: 0,
                read_call_count: 0,
                is_eof: false,
            })),
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.inner.borrow_mut().bytes.extend_from_slice(bytes);
    }

    pub fn set_eof(&mut self) {
        self.inner.borrow_mut().is_eof = true;
    }

    pub fn unread_len(&self) -> usize {
        let inner = self.inner.borrow();
        inner.bytes.len() - inner.read_index
    }

    pub fn read_call_count(&self) -> usize {
        self.inner.borrow().read_call_count
    }
}

impl Read for Buffer {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut inner = self.inner.borrow_mut();
        inner.read_call_count += 1;

        let pending = inner.bytes.len() - inner.read_index;
        if pending == 0 {
            if inner.is_eof {
                return Ok(0);
            }
            return Err(Error::new(ErrorKind::WouldBlock, "no data"));
        }

        let len = pending.min(buf.len());
        let start = inner.read_index;
        buf[0..len].copy_from_slice(&inner.bytes[start..start + len]);
        inner.read_index += len;
        Ok(len)
    }
}

impl ReadWithTimeout for Buffer {
    fn read_with_timeout(&mut self, buf: &mut [u8], _timeout: Option<Duration>) -> Result<usize> {
        self.read(buf)
    }
}

/// A fixed reception timestamp for deterministic assertions.
pub fn test_timestamp() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 11, 30)
        .unwrap()
        .and_hms_opt(13, 15, 0)
        .unwrap()
}

/// Parses a packet line at the fixed test timestamp.
pub fn pkt_from_line(line: &str) -> Packet {
    Packet::from_line(test_timestamp(), line).expect("valid packet line")
}

/// Parses a packet line at an offset from the fixed test timestamp.
pub fn pkt_from_line_at(line: &str, secs: i64) -> Packet {
    let dtm = test_timestamp() + chrono::Duration::seconds(secs);
    Packet::from_line(dtm, line).expect("valid packet line")
}

/// Parses a packet line into a message, with the default zone limit.
pub fn msg_from_line(line: &str) -> Message {
    Message::new(pkt_from_line(line), 12).expect("valid message")
}

#[test]
fn test_buffer() {
    let mut feeder = Buffer::new();
    let mut reader = feeder.clone();

    let mut bytes = [0u8; 16];
    assert!(reader.read(&mut bytes).is_err());

    feeder.feed(&[0x01, 0x23, 0x45, 0x67]);
    assert_eq!(4, reader.read(&mut bytes).unwrap());
    assert_eq!(&[0x01, 0x23, 0x45, 0x67], &bytes[0..4]);
    assert_eq!(0, feeder.unread_len());

    feeder.set_eof();
    assert_eq!(0, reader.read(&mut bytes).unwrap());
    assert_eq!(3, feeder.read_call_count());
}
