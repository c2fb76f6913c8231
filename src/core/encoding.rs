//! XML Encoding Detection
//!
//! The catalog is always emitted as UTF-8. Detection exists so that a UTF-16
//! document fails with a clear message instead of a cascade of token errors,
//! and so a leading UTF-8 byte order mark can be stepped over.

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Detect the encoding of XML input based on BOM or byte patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl XmlEncoding {
    /// Detect encoding from byte order mark or initial bytes
    pub fn detect(input: &[u8]) -> Self {
        if input.len() < 2 {
            return XmlEncoding::Utf8;
        }

        match (input[0], input[1]) {
            // UTF-16 LE BOM: 0xFF 0xFE
            (0xFF, 0xFE) => XmlEncoding::Utf16Le,
            // UTF-16 BE BOM: 0xFE 0xFF
            (0xFE, 0xFF) => XmlEncoding::Utf16Be,
            // No BOM - check for UTF-16 pattern (< followed by null or null followed by <)
            (0x00, b'<') => XmlEncoding::Utf16Be,
            (b'<', 0x00) => XmlEncoding::Utf16Le,
            _ => XmlEncoding::Utf8,
        }
    }
}

/// Length of a UTF-8 byte order mark at the start of `input`, if any
#[inline]
pub fn utf8_bom_len(input: &[u8]) -> usize {
    if input.starts_with(UTF8_BOM) {
        UTF8_BOM.len()
    } else {
        0
    }
}

/// Whether `input` is too short to rule out a byte order mark
#[inline]
pub fn needs_more_for_detection(input: &[u8]) -> bool {
    input.len() < UTF8_BOM.len() && UTF8_BOM.starts_with(input) && !input.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect() {
        assert_eq!(XmlEncoding::detect(b"<mame>"), XmlEncoding::Utf8);
        assert_eq!(XmlEncoding::detect(&[0xFF, 0xFE, b'<', 0]), XmlEncoding::Utf16Le);
        assert_eq!(XmlEncoding::detect(&[0, b'<', 0, b'm']), XmlEncoding::Utf16Be);
        assert_eq!(XmlEncoding::detect(b"<"), XmlEncoding::Utf8);
    }

    #[test]
    fn test_bom_len() {
        assert_eq!(utf8_bom_len(&[0xEF, 0xBB, 0xBF, b'<']), 3);
        assert_eq!(utf8_bom_len(b"<mame>"), 0);
    }

    #[test]
    fn test_needs_more_for_detection() {
        assert!(needs_more_for_detection(&[0xEF, 0xBB]));
        assert!(!needs_more_for_detection(b"<m"));
        assert!(!needs_more_for_detection(b""));
    }
}
