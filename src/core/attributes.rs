//! XML Attribute Parsing
//!
//! Parses the attribute region of a start tag into spans. Names are spans into
//! the tag bytes; values are decoded (entities expanded, whitespace
//! normalized) into a reusable scratch buffer so that no per-attribute
//! allocation happens in the hot loop.

use super::entities::decode_reference;
use super::scanner::{is_name_char, is_name_start_char, is_whitespace};
use super::tokenizer::{SyntaxError, MSG_INVALID_TOKEN};
use memchr::memchr2;

pub const MSG_DUPLICATE_ATTRIBUTE: &str = "duplicate attribute";

/// A byte range into either the tag region or the value buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub offset: u32,
    pub len: u32,
}

impl Span {
    #[inline]
    pub const fn new(offset: usize, len: usize) -> Self {
        Span {
            offset: offset as u32,
            len: len as u32,
        }
    }

    /// Extract the byte slice
    #[inline]
    pub fn slice<'a>(&self, input: &'a [u8]) -> &'a [u8] {
        let start = self.offset as usize;
        &input[start..start + self.len as usize]
    }
}

/// A parsed attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawAttribute {
    /// Name span into the tag's attribute region
    pub name: Span,
    /// Decoded value span into the value buffer
    pub value: Span,
}

/// Parse attributes from raw tag content (after the element name)
///
/// `attrs` and `values` are cleared and refilled. Error offsets are relative
/// to `input`.
pub fn parse_attributes(
    input: &[u8],
    attrs: &mut Vec<RawAttribute>,
    values: &mut Vec<u8>,
) -> Result<(), SyntaxError> {
    attrs.clear();
    values.clear();
    let mut pos = 0;

    loop {
        // Attributes are separated by mandatory whitespace
        let ws_start = pos;
        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }
        if pos >= input.len() {
            return Ok(());
        }
        if pos == ws_start || !is_name_start_char(input[pos]) {
            return Err(SyntaxError::new(pos, MSG_INVALID_TOKEN));
        }

        let name_start = pos;
        while pos < input.len() && is_name_char(input[pos]) {
            pos += 1;
        }
        let name = Span::new(name_start, pos - name_start);

        // Skip whitespace around '='
        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }
        if input.get(pos) != Some(&b'=') {
            return Err(SyntaxError::new(pos, MSG_INVALID_TOKEN));
        }
        pos += 1;
        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }

        let quote = match input.get(pos) {
            Some(&(q @ (b'"' | b'\''))) => q,
            _ => return Err(SyntaxError::new(pos, MSG_INVALID_TOKEN)),
        };
        pos += 1;
        let value_start = pos;
        let value_end = match memchr::memchr(quote, &input[pos..]) {
            Some(offset) => pos + offset,
            None => return Err(SyntaxError::new(value_start, MSG_INVALID_TOKEN)),
        };

        let decoded_start = values.len();
        decode_value(&input[value_start..value_end], values)
            .map_err(|(offset, message)| SyntaxError::new(value_start + offset, message))?;
        let value = Span::new(decoded_start, values.len() - decoded_start);

        let name_bytes = name.slice(input);
        if attrs.iter().any(|a| a.name.slice(input) == name_bytes) {
            return Err(SyntaxError::new(name_start, MSG_DUPLICATE_ATTRIBUTE));
        }
        attrs.push(RawAttribute { name, value });

        pos = value_end + 1;
    }
}

/// Decode an attribute value: expand references, map literal whitespace to spaces
fn decode_value(raw: &[u8], out: &mut Vec<u8>) -> Result<(), (usize, &'static str)> {
    let mut pos = 0;

    while let Some(offset) = memchr2(b'&', b'<', &raw[pos..]) {
        push_normalized(&raw[pos..pos + offset], out);
        pos += offset;
        if raw[pos] == b'<' {
            return Err((pos, MSG_INVALID_TOKEN));
        }

        let semi = memchr::memchr(b';', &raw[pos..]).ok_or((pos, MSG_INVALID_TOKEN))?;
        decode_reference(&raw[pos + 1..pos + semi], out).map_err(|message| (pos, message))?;
        pos += semi + 1;
    }

    push_normalized(&raw[pos..], out);
    Ok(())
}

#[inline]
fn push_normalized(bytes: &[u8], out: &mut Vec<u8>) {
    out.extend(bytes.iter().map(|&b| if matches!(b, b'\t' | b'\n' | b'\r') { b' ' } else { b }));
}
