//! XML Entity Decoding
//!
//! Handles decoding of XML entities:
//! - Built-in entities: &lt; &gt; &amp; &quot; &apos;
//! - Numeric character references: &#123; &#x7B;
//!
//! Decoding is strict: the catalog documents are machine-generated, so an
//! unknown entity or a bare '&' is a structural error rather than literal text.
//! Uses Cow for zero-copy when no entities are present.

use memchr::memchr;
use std::borrow::Cow;

pub const UNDEFINED_ENTITY: &str = "undefined entity";
pub const INVALID_TOKEN: &str = "not well-formed (invalid token)";
pub const INVALID_CHARACTER: &str = "reference to invalid character number";

/// Decode text content, handling entity references
///
/// Returns Borrowed if no entities present (zero-copy),
/// returns Owned if entities were decoded.
#[inline]
pub fn decode_text(input: &[u8]) -> Result<Cow<'_, [u8]>, &'static str> {
    // Fast path: check if there are any entities using SIMD
    if memchr(b'&', input).is_none() {
        return Ok(Cow::Borrowed(input));
    }
    let mut result = Vec::with_capacity(input.len());
    decode_into(input, &mut result)?;
    Ok(Cow::Owned(result))
}

/// Decode all entity references in `input`, appending the result to `out`
pub fn decode_into(input: &[u8], out: &mut Vec<u8>) -> Result<(), &'static str> {
    let mut pos = 0;

    while let Some(amp_offset) = memchr(b'&', &input[pos..]) {
        // Copy everything before the entity
        out.extend_from_slice(&input[pos..pos + amp_offset]);
        pos += amp_offset + 1;

        let semi_offset = memchr(b';', &input[pos..]).ok_or(INVALID_TOKEN)?;
        let entity = &input[pos..pos + semi_offset];
        decode_reference(entity, out)?;
        pos += semi_offset + 1;
    }

    // No more entities, copy the rest
    out.extend_from_slice(&input[pos..]);
    Ok(())
}

/// Decode a single entity reference (without & and ;), appending to `out`
pub fn decode_reference(entity: &[u8], out: &mut Vec<u8>) -> Result<(), &'static str> {
    let decoded: u8 = match entity {
        b"lt" => b'<',
        b"gt" => b'>',
        b"amp" => b'&',
        b"quot" => b'"',
        b"apos" => b'\'',
        [b'#', reference @ ..] => return decode_numeric_entity(reference, out),
        [] => return Err(INVALID_TOKEN),
        _ => return Err(UNDEFINED_ENTITY),
    };
    out.push(decoded);
    Ok(())
}

/// Decode a numeric character reference, validating against XML 1.0 Char
fn decode_numeric_entity(entity: &[u8], out: &mut Vec<u8>) -> Result<(), &'static str> {
    let codepoint = match entity {
        [b'x', hex @ ..] if !hex.is_empty() => parse_radix(hex, 16),
        _ if !entity.is_empty() => parse_radix(entity, 10),
        _ => None,
    }
    .ok_or(INVALID_TOKEN)?;

    if !is_valid_xml_char(codepoint) {
        return Err(INVALID_CHARACTER);
    }

    let c = char::from_u32(codepoint).ok_or(INVALID_CHARACTER)?;
    let mut buf = [0u8; 4];
    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
    Ok(())
}

#[inline]
fn parse_radix(digits: &[u8], radix: u32) -> Option<u32> {
    let mut value: u32 = 0;
    for &b in digits {
        let digit = (b as char).to_digit(radix)?;
        value = value.checked_mul(radix)?.checked_add(digit)?;
    }
    Some(value)
}

/// Check if a code point is a valid XML 1.0 Char
/// Char ::= #x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]
#[inline]
pub fn is_valid_xml_char(codepoint: u32) -> bool {
    matches!(codepoint,
        0x9 | 0xA | 0xD |
        0x20..=0xD7FF |
        0xE000..=0xFFFD |
        0x10000..=0x10FFFF
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_entities() {
        let input = b"Pac-Man (Midway)";
        let result = decode_text(input).unwrap();
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result.as_ref(), b"Pac-Man (Midway)");
    }

    #[test]
    fn test_basic_entities() {
        let input = b"&lt;hello&gt; &amp; &quot;world&quot; &apos;";
        let result = decode_text(input).unwrap();
        assert_eq!(result.as_ref(), b"<hello> & \"world\" '");
    }

    #[test]
    fn test_numeric_decimal() {
        let result = decode_text(b"&#65;&#66;&#67;").unwrap();
        assert_eq!(result.as_ref(), b"ABC");
    }

    #[test]
    fn test_numeric_hex() {
        let result = decode_text(b"Cr&#xE9;dit").unwrap();
        assert_eq!(std::str::from_utf8(result.as_ref()).unwrap(), "Crédit");
    }

    #[test]
    fn test_unknown_entity() {
        assert_eq!(decode_text(b"&nbsp;"), Err(UNDEFINED_ENTITY));
    }

    #[test]
    fn test_bare_ampersand() {
        assert_eq!(decode_text(b"Konami & Sega"), Err(INVALID_TOKEN));
    }

    #[test]
    fn test_invalid_character_reference() {
        assert_eq!(decode_text(b"&#0;"), Err(INVALID_CHARACTER));
        assert_eq!(decode_text(b"&#xD800;"), Err(INVALID_CHARACTER));
        assert_eq!(decode_text(b"&#xZZ;"), Err(INVALID_TOKEN));
    }

    #[test]
    fn test_decode_into_appends() {
        let mut out = b"bin,".to_vec();
        decode_into(b"r&amp;m", &mut out).unwrap();
        assert_eq!(out, b"bin,r&m");
    }
}
