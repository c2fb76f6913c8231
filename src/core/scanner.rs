//! SIMD-accelerated XML scanning using memchr
//!
//! The scanner walks one window of the streaming buffer. It never assumes the
//! window holds a complete document: every search returns `None` when the
//! delimiter has not arrived yet, and the tokenizer decides whether that means
//! "read more" or "truncated input".

use memchr::{memchr, memmem};

/// Scanner for XML delimiter detection over a buffer window
pub struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    /// Create a new scanner for the given window
    #[inline]
    pub fn new(input: &'a [u8]) -> Self {
        Scanner { input, pos: 0 }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    #[inline]
    pub fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    #[inline]
    pub fn remaining(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }

    #[inline]
    pub fn slice(&self, start: usize, end: usize) -> &'a [u8] {
        &self.input[start..end]
    }

    #[inline]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    #[inline]
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    #[inline]
    pub fn advance(&mut self, n: usize) {
        self.pos += n;
    }

    /// Skip whitespace characters (space, tab, newline, carriage return)
    #[inline]
    pub fn skip_whitespace(&mut self) {
        while self.pos < self.input.len() {
            match self.input[self.pos] {
                b' ' | b'\t' | b'\n' | b'\r' => self.pos += 1,
                _ => break,
            }
        }
    }

    /// Find next occurrence of a specific byte
    #[inline]
    pub fn find_byte(&self, byte: u8) -> Option<usize> {
        memchr(byte, &self.input[self.pos..]).map(|i| self.pos + i)
    }

    /// Find next occurrence of a byte sequence (comment, CDATA and PI terminators)
    #[inline]
    pub fn find_seq(&self, needle: &[u8]) -> Option<usize> {
        memmem::find(&self.input[self.pos..], needle).map(|i| self.pos + i)
    }

    /// Find tag end while handling quotes properly
    ///
    /// Returns the position of the first '>' that is not inside an attribute
    /// value, or `None` if the tag is not complete within this window.
    pub fn find_tag_end_quoted(&self) -> Option<usize> {
        let mut pos = self.pos;
        let mut quote: Option<u8> = None;

        loop {
            // jump straight to the next byte that can change state
            let rest = &self.input[pos..];
            let offset = match quote {
                Some(q) => memchr(q, rest)?,
                None => memchr::memchr3(b'>', b'"', b'\'', rest)?,
            };
            pos += offset;
            match (quote, self.input[pos]) {
                (None, b'>') => return Some(pos),
                (None, q) => quote = Some(q),
                (Some(_), _) => quote = None,
            }
            pos += 1;
        }
    }

    /// Find the '>' closing a DOCTYPE, skipping any internal subset
    pub fn find_doctype_end(&self) -> Option<usize> {
        let mut depth = 0usize;
        let mut quote: Option<u8> = None;
        for (i, &b) in self.input[self.pos..].iter().enumerate() {
            match (quote, b) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, b'"' | b'\'') => quote = Some(b),
                (None, b'[') => depth += 1,
                (None, b']') => depth = depth.saturating_sub(1),
                (None, b'>') if depth == 0 => return Some(self.pos + i),
                _ => {}
            }
        }
        None
    }

    /// Check if input starts with a byte sequence at current position
    #[inline]
    pub fn starts_with(&self, needle: &[u8]) -> bool {
        self.input[self.pos..].starts_with(needle)
    }

    /// Check whether the remaining window could still grow into `needle`
    #[inline]
    pub fn is_prefix_of(&self, needle: &[u8]) -> bool {
        let rest = self.remaining();
        rest.len() < needle.len() && needle.starts_with(rest)
    }

    /// Read an XML name (starts with letter/underscore/colon, continues with name chars)
    pub fn read_name(&mut self) -> Option<&'a [u8]> {
        let start = self.pos;
        let first = *self.input.get(start)?;
        if !is_name_start_char(first) {
            return None;
        }

        self.pos += 1;
        while self.pos < self.input.len() && is_name_char(self.input[self.pos]) {
            self.pos += 1;
        }

        Some(&self.input[start..self.pos])
    }
}

/// Check if byte is valid XML name start character
/// Allows ASCII letters, underscore, colon, and non-ASCII (UTF-8 Unicode)
#[inline]
pub fn is_name_start_char(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'_' | b':') || b >= 0x80
}

/// Check if byte is valid XML name character
/// Allows ASCII alphanumeric, punctuation, and non-ASCII (UTF-8 Unicode)
#[inline]
pub fn is_name_char(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' | b'.' | b':') || b >= 0x80
}

/// Check if byte is XML whitespace
#[inline]
pub fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_tag_end_quoted() {
        let scanner = Scanner::new(b"<rom name=\"a>b\" crc='1>2'>rest");
        assert_eq!(scanner.find_tag_end_quoted(), Some(25));
    }

    #[test]
    fn test_find_tag_end_incomplete() {
        let scanner = Scanner::new(b"<rom name=\"a>b");
        assert_eq!(scanner.find_tag_end_quoted(), None);
    }

    #[test]
    fn test_find_doctype_end_skips_subset() {
        let scanner = Scanner::new(b"<!DOCTYPE mame [<!ELEMENT mame (machine+)>]>");
        assert_eq!(scanner.find_doctype_end(), Some(43));
    }

    #[test]
    fn test_read_name() {
        let mut scanner = Scanner::new(b"softwarelist name");
        assert_eq!(scanner.read_name(), Some(b"softwarelist" as &[u8]));
        assert_eq!(scanner.position(), 12);
    }

    #[test]
    fn test_is_prefix_of() {
        let scanner = Scanner::new(b"<![CD");
        assert!(scanner.is_prefix_of(b"<![CDATA["));
        assert!(!scanner.is_prefix_of(b"<!--"));
    }

    #[test]
    fn test_skip_whitespace() {
        let mut scanner = Scanner::new(b"  \t\n machine");
        scanner.skip_whitespace();
        assert_eq!(scanner.position(), 5);
    }
}
