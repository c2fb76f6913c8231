//! Typed Attribute Decoders
//!
//! Pure conversions from attribute text to the values stored in records:
//! integers, floats, booleans, hex digests and the enumerated tokens of the
//! catalog schema. Enumerations never fail: a token this crate does not know
//! decodes to the zero variant and is logged at debug level, since the
//! emulator's vocabulary grows between releases.

use tracing::debug;

/// Boolean tri-state: false
pub const TRI_FALSE: u8 = 0;
/// Boolean tri-state: true
pub const TRI_TRUE: u8 = 1;
/// Tri-state and small-count sentinel for "attribute absent"
pub const UNSPECIFIED: u8 = 0xFF;

/// A value that can be decoded from attribute text
pub trait AttributeValue: Sized {
    /// `None` when the text is malformed for this type
    fn parse_attribute(text: &[u8]) -> Option<Self>;
}

// ============================================================================
// Scalars
// ============================================================================

/// Parse an unsigned decimal or hexadecimal integer
///
/// An empty string decodes as zero, matching the `strtoull` contract the
/// catalog format was designed against.
#[inline]
fn parse_unsigned(text: &[u8], radix: u32) -> Option<u64> {
    let mut value: u64 = 0;
    for &b in text {
        let digit = (b as char).to_digit(radix)?;
        value = value.checked_mul(radix as u64)?.checked_add(digit as u64)?;
    }
    Some(value)
}

impl AttributeValue for u8 {
    fn parse_attribute(text: &[u8]) -> Option<Self> {
        u8::try_from(parse_unsigned(text, 10)?).ok()
    }
}

impl AttributeValue for u32 {
    fn parse_attribute(text: &[u8]) -> Option<Self> {
        u32::try_from(parse_unsigned(text, 10)?).ok()
    }
}

impl AttributeValue for u64 {
    fn parse_attribute(text: &[u8]) -> Option<Self> {
        parse_unsigned(text, 10)
    }
}

impl AttributeValue for f32 {
    fn parse_attribute(text: &[u8]) -> Option<Self> {
        std::str::from_utf8(text).ok()?.trim().parse().ok()
    }
}

/// Boolean token table
const BOOL_TOKENS: &[(&[u8], bool)] = &[
    (b"0", false),
    (b"off", false),
    (b"false", false),
    (b"no", false),
    (b"1", true),
    (b"on", true),
    (b"true", true),
    (b"yes", true),
];

impl AttributeValue for bool {
    fn parse_attribute(text: &[u8]) -> Option<Self> {
        lookup(BOOL_TOKENS, text)
    }
}

/// Map an optional boolean to the stored tri-state byte
#[inline]
pub fn tri_state(value: Option<bool>) -> u8 {
    match value {
        Some(false) => TRI_FALSE,
        Some(true) => TRI_TRUE,
        None => UNSPECIFIED,
    }
}

/// Map an optional boolean to a plain flag byte (absent is false)
#[inline]
pub fn flag(value: Option<bool>) -> u8 {
    u8::from(value.unwrap_or(false))
}

/// Hexadecimal integer attribute (ROM offsets)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hex(pub u32);

impl AttributeValue for Hex {
    fn parse_attribute(text: &[u8]) -> Option<Self> {
        Some(Hex(u32::try_from(parse_unsigned(text, 16)?).ok()?))
    }
}

/// Fixed-width hex digest (CRC-32 as 4 bytes, SHA-1 as 20 bytes), big-endian
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexBytes<const N: usize>(pub [u8; N]);

impl<const N: usize> AttributeValue for HexBytes<N> {
    fn parse_attribute(text: &[u8]) -> Option<Self> {
        if text.len() != N * 2 {
            return None;
        }
        let mut bytes = [0u8; N];
        for (byte, pair) in bytes.iter_mut().zip(text.chunks_exact(2)) {
            let hi = (pair[0] as char).to_digit(16)?;
            let lo = (pair[1] as char).to_digit(16)?;
            *byte = (hi << 4 | lo) as u8;
        }
        Some(HexBytes(bytes))
    }
}

// ============================================================================
// Enumerated tokens
// ============================================================================

#[inline]
fn lookup<T: Copy>(table: &[(&[u8], T)], text: &[u8]) -> Option<T> {
    table.iter().find(|(token, _)| *token == text).map(|&(_, value)| value)
}

/// Declares a `#[repr(u8)]` token enumeration whose zero variant absorbs
/// unknown tokens.
macro_rules! token_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal, $fallback:ident = 0
        $(, $variant:ident = $value:literal => $token:literal)* $(,)?
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        #[repr(u8)]
        pub enum $name {
            #[default]
            $fallback = 0,
            $($variant = $value,)*
        }

        impl $name {
            const TOKENS: &'static [(&'static [u8], $name)] = &[$(($token, $name::$variant),)*];

            /// Decode a stored byte; out-of-range bytes map to the zero variant
            pub fn from_u8(value: u8) -> Self {
                match value {
                    $($value => $name::$variant,)*
                    _ => $name::$fallback,
                }
            }

            /// Token as written in the catalog, if any
            pub fn token(self) -> Option<&'static str> {
                $name::TOKENS
                    .iter()
                    .find(|(_, v)| *v == self)
                    .and_then(|(t, _)| std::str::from_utf8(t).ok())
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                value as u8
            }
        }

        impl AttributeValue for $name {
            fn parse_attribute(text: &[u8]) -> Option<Self> {
                Some(lookup($name::TOKENS, text).unwrap_or_else(|| {
                    debug!(kind = $kind, token = %String::from_utf8_lossy(text), "unknown token");
                    $name::$fallback
                }))
            }
        }
    };
}

token_enum!(
    /// ROM/disk dump status
    DumpStatus, "dump status", Unknown = 0,
    BadDump = 1 => b"baddump",
    NoDump = 2 => b"nodump",
    Good = 3 => b"good",
);

token_enum!(
    /// Feature type (`<feature type=...>`)
    FeatureType, "feature type", Unknown = 0,
    Protection = 1 => b"protection",
    Timing = 2 => b"timing",
    Graphics = 3 => b"graphics",
    Palette = 4 => b"palette",
    Sound = 5 => b"sound",
    Capture = 6 => b"capture",
    Camera = 7 => b"camera",
    Microphone = 8 => b"microphone",
    Controls = 9 => b"controls",
    Keyboard = 10 => b"keyboard",
    Mouse = 11 => b"mouse",
    Media = 12 => b"media",
    Disk = 13 => b"disk",
    Printer = 14 => b"printer",
    Tape = 15 => b"tape",
    Punch = 16 => b"punch",
    Drum = 17 => b"drum",
    Rom = 18 => b"rom",
    Comms = 19 => b"comms",
    Lan = 20 => b"lan",
    Wan = 21 => b"wan",
);

token_enum!(
    /// Feature emulation quality (`status` and `overall`)
    FeatureQuality, "feature quality", Unknown = 0,
    Unemulated = 1 => b"unemulated",
    Imperfect = 2 => b"imperfect",
);

token_enum!(
    /// Chip type
    ChipType, "chip type", Unknown = 0,
    Cpu = 1 => b"cpu",
    Audio = 2 => b"audio",
);

token_enum!(
    /// Display type
    DisplayType, "display type", Unknown = 0,
    Raster = 1 => b"raster",
    Vector = 2 => b"vector",
    Lcd = 3 => b"lcd",
    Svg = 4 => b"svg",
);

token_enum!(
    /// Display rotation in degrees
    Rotation, "rotation", Unknown = 0,
    Rot0 = 1 => b"0",
    Rot90 = 2 => b"90",
    Rot180 = 3 => b"180",
    Rot270 = 4 => b"270",
);

token_enum!(
    /// Driver quality (`status`, `emulation`, `cocktail`)
    DriverQuality, "driver quality", Unknown = 0,
    Good = 1 => b"good",
    Imperfect = 2 => b"imperfect",
    Preliminary = 3 => b"preliminary",
);

token_enum!(
    /// Configuration condition relation
    ConditionRelation, "condition relation", Unknown = 0,
    Eq = 1 => b"eq",
    Ne = 2 => b"ne",
    Gt = 3 => b"gt",
    Le = 4 => b"le",
    Lt = 5 => b"lt",
    Ge = 6 => b"ge",
);

token_enum!(
    /// Software list status; has no unknown state, so unknown tokens read as original
    SoftwareListStatus, "software list status", Original = 0,
    Compatible = 1 => b"compatible",
);

/// Save state support (`supported` / `unsupported`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveState(pub Option<bool>);

const SAVESTATE_TOKENS: &[(&[u8], bool)] = &[(b"supported", true), (b"unsupported", false)];

impl AttributeValue for SaveState {
    fn parse_attribute(text: &[u8]) -> Option<Self> {
        let supported = lookup(SAVESTATE_TOKENS, text);
        if supported.is_none() {
            debug!(kind = "save state", token = %String::from_utf8_lossy(text), "unknown token");
        }
        Some(SaveState(supported))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers() {
        assert_eq!(u32::parse_attribute(b"4096"), Some(4096));
        assert_eq!(u32::parse_attribute(b"4294967296"), None);
        assert_eq!(u32::parse_attribute(b"-1"), None);
        assert_eq!(u32::parse_attribute(b"12ab"), None);
        assert_eq!(u8::parse_attribute(b"256"), None);
        assert_eq!(u64::parse_attribute(b"18432000"), Some(18_432_000));
        // empty text decodes as zero
        assert_eq!(u32::parse_attribute(b""), Some(0));
    }

    #[test]
    fn test_float() {
        assert_eq!(f32::parse_attribute(b"60.606061"), Some(60.606061));
        assert_eq!(f32::parse_attribute(b"fast"), None);
        assert_eq!(f32::parse_attribute(b""), None);
    }

    #[test]
    fn test_bool_tokens() {
        for token in [&b"1"[..], b"on", b"true", b"yes"] {
            assert_eq!(bool::parse_attribute(token), Some(true));
        }
        for token in [&b"0"[..], b"off", b"false", b"no"] {
            assert_eq!(bool::parse_attribute(token), Some(false));
        }
        assert_eq!(bool::parse_attribute(b"maybe"), None);
    }

    #[test]
    fn test_tri_state() {
        assert_eq!(tri_state(Some(true)), TRI_TRUE);
        assert_eq!(tri_state(Some(false)), TRI_FALSE);
        assert_eq!(tri_state(None), UNSPECIFIED);
        assert_eq!(flag(None), 0);
        assert_eq!(flag(Some(true)), 1);
    }

    #[test]
    fn test_hex() {
        assert_eq!(Hex::parse_attribute(b"1fff"), Some(Hex(0x1fff)));
        assert_eq!(Hex::parse_attribute(b"xyz"), None);
        assert_eq!(
            HexBytes::<4>::parse_attribute(b"c1e6ab10"),
            Some(HexBytes([0xc1, 0xe6, 0xab, 0x10]))
        );
        assert_eq!(HexBytes::<4>::parse_attribute(b"c1e6ab1"), None);
        assert_eq!(HexBytes::<4>::parse_attribute(b"c1e6ab1g"), None);

        let sha1 =
            HexBytes::<20>::parse_attribute(b"e87e059c5be45753f7e9f33dff851f16d6751181").unwrap();
        assert_eq!(sha1.0[0], 0xe8);
        assert_eq!(sha1.0[19], 0x81);
    }

    #[test]
    fn test_enum_tokens() {
        assert_eq!(DumpStatus::parse_attribute(b"nodump"), Some(DumpStatus::NoDump));
        assert_eq!(FeatureType::parse_attribute(b"wan"), Some(FeatureType::Wan));
        assert_eq!(FeatureType::Wan as u8, 21);
        assert_eq!(Rotation::parse_attribute(b"270"), Some(Rotation::Rot270));
        assert_eq!(ConditionRelation::parse_attribute(b"ge"), Some(ConditionRelation::Ge));
        assert_eq!(
            DriverQuality::parse_attribute(b"preliminary"),
            Some(DriverQuality::Preliminary)
        );
    }

    #[test]
    fn test_unknown_tokens_fall_back() {
        assert_eq!(ChipType::parse_attribute(b"fpga"), Some(ChipType::Unknown));
        assert_eq!(DisplayType::parse_attribute(b""), Some(DisplayType::Unknown));
        assert_eq!(
            SoftwareListStatus::parse_attribute(b"other"),
            Some(SoftwareListStatus::Original)
        );
        assert_eq!(SaveState::parse_attribute(b"partial"), Some(SaveState(None)));
        assert_eq!(SaveState::parse_attribute(b"supported"), Some(SaveState(Some(true))));
    }

    #[test]
    fn test_from_u8_and_token() {
        assert_eq!(DumpStatus::from_u8(3), DumpStatus::Good);
        assert_eq!(DumpStatus::from_u8(200), DumpStatus::Unknown);
        assert_eq!(DumpStatus::Good.token(), Some("good"));
        assert_eq!(DumpStatus::Unknown.token(), None);
    }
}
