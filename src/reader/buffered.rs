//! Buffered XML Reader
//!
//! Reads XML from any source implementing Read trait, using an internal
//! buffer that retains the unconsumed tail (an incomplete token) across
//! refills. The buffer grows only when a single token is larger than it.

use std::io::{ErrorKind, Read};

/// Buffer size for reading chunks
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Buffered XML reader for streaming input
pub struct BufferedReader<R: Read> {
    reader: R,
    buffer: Vec<u8>,
    pos: usize,
    end: usize,
    eof: bool,
    /// Total bytes consumed before `pos`
    consumed: u64,
}

impl<R: Read> BufferedReader<R> {
    /// Create a new buffered reader
    pub fn new(reader: R) -> Self {
        Self::with_capacity(reader, DEFAULT_BUFFER_SIZE)
    }

    /// Create a new buffered reader with specified buffer capacity
    pub fn with_capacity(reader: R, capacity: usize) -> Self {
        BufferedReader {
            reader,
            buffer: vec![0u8; capacity.max(1)],
            pos: 0,
            end: 0,
            eof: false,
            consumed: 0,
        }
    }

    /// Fill the buffer from the reader
    ///
    /// Returns `Ok(false)` once the source is exhausted. Interrupted reads are
    /// retried; any other read error is returned to the caller.
    pub fn fill_buffer(&mut self) -> std::io::Result<bool> {
        if self.eof {
            return Ok(false);
        }

        // Compact: move remaining data to start
        if self.pos > 0 {
            let remaining = self.end - self.pos;
            if remaining > 0 {
                self.buffer.copy_within(self.pos..self.end, 0);
            }
            self.end = remaining;
            self.pos = 0;
        }

        // A token that fills the whole buffer forces growth
        if self.end == self.buffer.len() {
            let grown = self.buffer.len() * 2;
            self.buffer.resize(grown, 0);
        }

        loop {
            match self.reader.read(&mut self.buffer[self.end..]) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(false);
                }
                Ok(read) => {
                    self.end += read;
                    return Ok(true);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Get current buffered data as a slice
    #[inline]
    pub fn buffered(&self) -> &[u8] {
        &self.buffer[self.pos..self.end]
    }

    /// True once the source has reported end of input (buffered bytes may remain)
    #[inline]
    pub fn source_exhausted(&self) -> bool {
        self.eof
    }

    /// Check if we've reached end of input
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.eof && self.pos >= self.end
    }

    /// Consume n bytes from the buffer
    #[inline]
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.end - self.pos);
        self.pos += n;
        self.consumed += n as u64;
    }

    /// Total bytes consumed since construction
    #[inline]
    pub fn total_consumed(&self) -> u64 {
        self.consumed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_buffered_reader() {
        let data = b"<mame>content</mame>";
        let cursor = Cursor::new(data.to_vec());
        let mut reader = BufferedReader::new(cursor);

        assert!(reader.fill_buffer().unwrap());
        assert_eq!(reader.buffered(), data);
        assert!(!reader.fill_buffer().unwrap());
        assert!(reader.source_exhausted());
        assert!(!reader.is_eof());

        reader.consume(data.len());
        assert!(reader.is_eof());
        assert_eq!(reader.total_consumed(), data.len() as u64);
    }

    #[test]
    fn test_retains_tail_and_grows() {
        let data = b"<machine name=\"pacman\"/>";
        let mut reader = BufferedReader::with_capacity(Cursor::new(data.to_vec()), 4);

        // never consume: the buffer must grow until the whole input is held
        while reader.fill_buffer().unwrap() {}
        assert_eq!(reader.buffered(), data);
    }

    #[test]
    fn test_compacts_after_consume() {
        let mut reader = BufferedReader::with_capacity(Cursor::new(b"abcdefgh".to_vec()), 4);
        reader.fill_buffer().unwrap();
        assert_eq!(reader.buffered(), b"abcd");
        reader.consume(3);
        reader.fill_buffer().unwrap();
        assert_eq!(reader.buffered(), b"defg");
    }

    struct Interrupting {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for Interrupting {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }

    #[test]
    fn test_interrupted_read_is_retried() {
        let source = Interrupting {
            interrupted: false,
            inner: Cursor::new(b"<mame/>".to_vec()),
        };
        let mut reader = BufferedReader::new(source);
        assert!(reader.fill_buffer().unwrap());
        assert_eq!(reader.buffered(), b"<mame/>");
    }
}
