//! Attribute access for schema handlers
//!
//! Wraps the spans produced by [`crate::core::attributes::parse_attributes`]
//! for one start tag. Typed lookups that fail to decode record a diagnostic
//! against the tag's position and return `None`; parsing carries on and the
//! parse as a whole fails once the document has been consumed.

use super::TextPosition;
use crate::core::attributes::RawAttribute;
use crate::decode::AttributeValue;
use crate::error::Diagnostic;

/// Attributes of the element being begun
pub struct Attributes<'a> {
    tag: &'a [u8],
    entries: &'a [RawAttribute],
    values: &'a [u8],
    position: TextPosition,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl<'a> Attributes<'a> {
    pub(crate) fn new(
        tag: &'a [u8],
        entries: &'a [RawAttribute],
        values: &'a [u8],
        position: TextPosition,
        diagnostics: &'a mut Vec<Diagnostic>,
    ) -> Self {
        Attributes {
            tag,
            entries,
            values,
            position,
            diagnostics,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw decoded bytes of an attribute
    #[inline]
    pub fn bytes(&self, name: &str) -> Option<&'a [u8]> {
        let name = name.as_bytes();
        self.entries
            .iter()
            .find(|a| a.name.slice(self.tag) == name)
            .map(|a| a.value.slice(self.values))
    }

    /// Attribute as UTF-8 text; invalid UTF-8 reads as absent
    #[inline]
    pub fn str(&self, name: &str) -> Option<&'a str> {
        self.bytes(name).and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Typed attribute; malformed text is reported and reads as absent
    pub fn get<T: AttributeValue>(&mut self, name: &str) -> Option<T> {
        let text = self.bytes(name)?;
        let value = T::parse_attribute(text);
        if value.is_none() {
            self.report(name, text);
        }
        value
    }

    fn report(&mut self, name: &str, text: &[u8]) {
        self.diagnostics.push(Diagnostic {
            line: self.position.line,
            column: self.position.column,
            message: format!(
                "Error parsing attribute \"{}\" (text=\"{}\")",
                name,
                String::from_utf8_lossy(text)
            ),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::attributes::parse_attributes;
    use crate::decode::{DumpStatus, HexBytes};

    #[test]
    fn test_lookup_and_typed_get() {
        let tag = b" name=\"pacman.6e\" size=\"4096\" crc=\"c1e6ab10\" status=\"good\"";
        let mut entries = Vec::new();
        let mut values = Vec::new();
        parse_attributes(tag, &mut entries, &mut values).unwrap();

        let mut diagnostics = Vec::new();
        let position = TextPosition { line: 12, column: 4 };
        let mut attrs = Attributes::new(tag, &entries, &values, position, &mut diagnostics);

        assert_eq!(attrs.len(), 4);
        assert_eq!(attrs.str("name"), Some("pacman.6e"));
        assert_eq!(attrs.get::<u32>("size"), Some(4096));
        assert_eq!(attrs.get::<HexBytes<4>>("crc"), Some(HexBytes([0xc1, 0xe6, 0xab, 0x10])));
        assert_eq!(attrs.get::<DumpStatus>("status"), Some(DumpStatus::Good));
        assert_eq!(attrs.get::<u32>("offset"), None);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_malformed_value_is_reported() {
        let tag = b" size=\"big\"";
        let mut entries = Vec::new();
        let mut values = Vec::new();
        parse_attributes(tag, &mut entries, &mut values).unwrap();

        let mut diagnostics = Vec::new();
        let position = TextPosition { line: 3, column: 2 };
        let mut attrs = Attributes::new(tag, &entries, &values, position, &mut diagnostics);
        assert_eq!(attrs.get::<u32>("size"), None);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].to_string(),
            "3:2: Error parsing attribute \"size\" (text=\"big\")"
        );
    }
}
