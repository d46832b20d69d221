use std::collections::VecDeque;
use std::str::Utf8Error;

/// Longest line kept by default; anything longer is dropped
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Why a complete line could not be returned as text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    InvalidUtf8(Utf8Error),
    /// The line exceeded the length limit and was discarded; holds its length in bytes
    TooLong(usize),
}

/// Byte buffer that hands out complete `\n`-terminated lines.
///
/// Whatever follows the last newline stays buffered until more bytes arrive,
/// so a line (or a multi-byte UTF-8 sequence) split across transport chunks
/// is only decoded once it is whole. Bytes already searched for a newline
/// are not searched again.
#[derive(Debug)]
pub struct LineBuffer {
    buffer: VecDeque<u8>,
    /// Prefix of `buffer` known to contain no newline
    scanned: usize,
    max_line_length: usize,
    /// Bytes dropped from the current over-long line
    discarded: Option<usize>,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl LineBuffer {
    /// Create a new buffer with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            scanned: 0,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            discarded: None,
        }
    }

    pub fn with_max_line_length(mut self, max: usize) -> Self {
        self.max_line_length = max;
        self
    }

    /// Add bytes to the buffer
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend(bytes);
    }

    /// Extract the next complete line without its `\n` / `\r\n` terminator.
    /// Returns None if no complete line is available
    pub fn next_line(&mut self) -> Option<Result<String, LineError>> {
        let Some(offset) = self.buffer.range(self.scanned..).position(|&b| b == b'\n') else {
            self.scanned = self.buffer.len();
            if self.discarded.is_some() || self.buffer.len() > self.max_line_length {
                *self.discarded.get_or_insert(0) += self.buffer.len();
                self.buffer.clear();
                self.scanned = 0;
            }
            return None;
        };

        let newline_pos = self.scanned + offset;
        let mut line_bytes: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
        self.scanned = 0;
        line_bytes.pop();
        if line_bytes.last() == Some(&b'\r') {
            line_bytes.pop();
        }

        if let Some(dropped) = self.discarded.take() {
            return Some(Err(LineError::TooLong(dropped + line_bytes.len())));
        }
        if line_bytes.len() > self.max_line_length {
            return Some(Err(LineError::TooLong(line_bytes.len())));
        }

        Some(String::from_utf8(line_bytes).map_err(|e| LineError::InvalidUtf8(e.utf8_error())))
    }

    /// Drop any buffered partial line
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
        self.discarded = None;
    }

    /// Number of bytes waiting for a newline
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_buffer_basic() {
        let mut buffer = LineBuffer::with_capacity(64);

        buffer.extend(b"line1\nline2\r\n");

        assert_eq!(buffer.next_line().unwrap().unwrap(), "line1");
        assert_eq!(buffer.next_line().unwrap().unwrap(), "line2");
        assert!(buffer.next_line().is_none());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_partial_line() {
        let mut buffer = LineBuffer::with_capacity(64);

        buffer.extend(b"partial");
        assert!(buffer.next_line().is_none());
        assert_eq!(buffer.len(), 7);

        buffer.extend(b" line\n");
        assert_eq!(buffer.next_line().unwrap().unwrap(), "partial line");
    }

    #[test]
    fn test_line_built_from_many_small_chunks() {
        let mut buffer = LineBuffer::default();

        for _ in 0..1000 {
            buffer.extend(b"ab");
            assert!(buffer.next_line().is_none());
        }
        assert_eq!(buffer.scanned, 2000);

        buffer.extend(b"\nnext");
        assert_eq!(buffer.next_line().unwrap().unwrap().len(), 2000);
        assert!(buffer.next_line().is_none());
        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn test_blank_line_is_returned_empty() {
        let mut buffer = LineBuffer::default();

        buffer.extend(b"\n");
        assert_eq!(buffer.next_line().unwrap().unwrap(), "");
    }

    #[test]
    fn test_split_multibyte_character() {
        let mut buffer = LineBuffer::default();
        let bytes = "olá\n".as_bytes();

        buffer.extend(&bytes[..3]);
        assert!(buffer.next_line().is_none());

        buffer.extend(&bytes[3..]);
        assert_eq!(buffer.next_line().unwrap().unwrap(), "olá");
    }

    #[test]
    fn test_invalid_utf8_line() {
        let mut buffer = LineBuffer::default();

        buffer.extend(&[0xff, 0xfe, b'\n', b'o', b'k', b'\n']);
        assert!(matches!(
            buffer.next_line(),
            Some(Err(LineError::InvalidUtf8(_)))
        ));
        assert_eq!(buffer.next_line().unwrap().unwrap(), "ok");
    }

    #[test]
    fn test_over_long_line_is_dropped_while_arriving() {
        let mut buffer = LineBuffer::default().with_max_line_length(8);

        buffer.extend(b"0123456789");
        assert!(buffer.next_line().is_none());
        assert!(buffer.is_empty());

        buffer.extend(b"abc");
        assert!(buffer.next_line().is_none());
        assert!(buffer.is_empty());

        buffer.extend(b"de\nok\n");
        assert_eq!(buffer.next_line(), Some(Err(LineError::TooLong(15))));
        assert_eq!(buffer.next_line().unwrap().unwrap(), "ok");
    }

    #[test]
    fn test_over_long_line_in_one_chunk() {
        let mut buffer = LineBuffer::default().with_max_line_length(4);

        buffer.extend(b"too long\nfine\n");
        assert_eq!(buffer.next_line(), Some(Err(LineError::TooLong(8))));
        assert_eq!(buffer.next_line().unwrap().unwrap(), "fine");
    }

    #[test]
    fn test_clear() {
        let mut buffer = LineBuffer::default();

        buffer.extend(b"data: [DO");
        buffer.clear();
        assert!(buffer.is_empty());
    }
}
