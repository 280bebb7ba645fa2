/// A size-adapting buffer that chunks a raw serial byte stream into lines.
///
/// The buffer grows as data is stored into it; complete CRLF-terminated lines
/// are consumed from the front, dropping the consumed bytes before new data
/// are appended. Each line is decoded as ASCII, retaining only printable
/// characters.
#[derive(Clone, Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
    start: usize,
    offset: usize,
}

impl LineBuffer {
    /// Constructs a `LineBuffer`.
    pub fn new() -> LineBuffer {
        LineBuffer::default()
    }

    /// Provide additional data to the internal buffer.
    pub fn extend_from_slice(&mut self, data: &[u8]) {
        if self.start > 0 {
            drop(self.buf.drain(0..self.start));
            self.start = 0;
        }

        self.buf.extend_from_slice(data);
    }

    /// Try to read one complete line from the internal buffer.
    ///
    /// Returns `None` until a CRLF terminator has been received. The
    /// terminator is consumed together with the line.
    pub fn read_line(&mut self) -> Option<String> {
        let pending = &self.buf[self.start..];
        let at = pending.windows(2).position(|pair| pair == b"\r\n")?;

        let line = pending[0..at]
            .iter()
            .copied()
            .filter(|b| (0x20..0x7F).contains(b))
            .map(char::from)
            .collect();

        self.start += at + 2;
        self.offset += at + 2;

        Some(line)
    }

    /// Returns the unconsumed byte length of the internal buffer.
    pub fn len(&self) -> usize {
        self.buf.len() - self.start
    }

    /// Returns whether the internal buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buf.len() == self.start
    }

    /// Get amount of already consumed bytes.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_line() {
        let mut lb = LineBuffer::new();
        assert_eq!(None, lb.read_line());
        assert_eq!(true, lb.is_empty());

        lb.extend_from_slice(b"045  I --- 01:145038 --:--");
        assert_eq!(None, lb.read_line());
        assert_eq!(false, lb.is_empty());

        lb.extend_from_slice(b"---- 01:145038 1F09 003 FF073F\r\n069 RQ");
        assert_eq!(
            Some("045  I --- 01:145038 --:------ 01:145038 1F09 003 FF073F".to_string()),
            lb.read_line()
        );
        assert_eq!(None, lb.read_line());
        assert_eq!(6, lb.len());

        lb.extend_from_slice(b" rest\r\n");
        assert_eq!(Some("069 RQ rest".to_string()), lb.read_line());
        assert_eq!(None, lb.read_line());
        assert_eq!(true, lb.is_empty());
    }

    #[test]
    fn test_strips_unprintable() {
        let mut lb = LineBuffer::new();
        lb.extend_from_slice(b"\x00abc\x07def\x80\r\n");
        assert_eq!(Some("abcdef".to_string()), lb.read_line());
    }

    #[test]
    fn test_offset() {
        let mut lb = LineBuffer::new();
        lb.extend_from_slice(b"one\r\ntwo\r\n");

        assert_eq!(0, lb.offset());
        lb.read_line();
        assert_eq!(5, lb.offset());
        lb.read_line();
        assert_eq!(10, lb.offset());
    }

    #[test]
    fn test_empty_lines() {
        let mut lb = LineBuffer::new();
        lb.extend_from_slice(b"\r\n\r\nx\r\n");

        assert_eq!(Some("".to_string()), lb.read_line());
        assert_eq!(Some("".to_string()), lb.read_line());
        assert_eq!(Some("x".to_string()), lb.read_line());
        assert_eq!(None, lb.read_line());
    }
}
