//! String Table
//!
//! Interns every string value of a build into one growable blob and hands out
//! stable 32-bit handles. Two handle forms:
//! - Blob offset: position of a NUL-terminated sequence (offset 0 is `""`)
//! - Small string: 1..=3 bytes without NUL packed into the handle itself
//!
//! Small-string layout: bit 31 set, bits 24..=25 hold the length, bits
//! 0..=23 hold the bytes little-endian, bits 26..=30 are zero. `0xFFFF_FFFF`
//! never decodes as a small string.
//!
//! Deduplication uses a fixed array of primary bucket cells. A cell is empty
//! (0), a single blob offset, or (top two bits set) the index of a secondary
//! bucket listing every offset that hashed to the slot.

use memchr::memchr;
use tracing::debug;

use crate::binaries::{MAGIC_STRINGTABLE_BEGIN, MAGIC_STRINGTABLE_END};
use crate::error::{BuildError, BuildResult};

/// Number of primary bucket cells
pub const BUCKET_COUNT: usize = 1 << 17;

const SSO_FLAG: u32 = 0x8000_0000;
const SSO_LEN_SHIFT: u32 = 24;
const SSO_LEN_MASK: u32 = 0x0300_0000;
const SSO_RESERVED_MASK: u32 = 0x7C00_0000;
const SSO_MAX_LEN: usize = 3;

const SECONDARY_TAG: u32 = 0xC000_0000;

/// Largest blob offset a handle can carry
const MAX_OFFSET: usize = SSO_FLAG as usize - 1;

/// Seeded djb2 over the string bytes
#[inline]
pub fn hash(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(31337u32, |h, &b| h.wrapping_mul(33).wrapping_add(b as u32))
}

/// Pack a short string into a handle
///
/// Returns `None` for strings that must live in the blob: empty, longer than
/// three bytes, or containing a NUL.
#[inline]
pub fn sso_encode(bytes: &[u8]) -> Option<u32> {
    if bytes.is_empty() || bytes.len() > SSO_MAX_LEN || bytes.contains(&0) {
        return None;
    }
    let mut handle = SSO_FLAG | ((bytes.len() as u32) << SSO_LEN_SHIFT);
    for (i, &b) in bytes.iter().enumerate() {
        handle |= (b as u32) << (8 * i);
    }
    Some(handle)
}

/// Unpack a small-string handle into its bytes and length
#[inline]
pub fn sso_decode(handle: u32) -> Option<([u8; 3], usize)> {
    if handle & SSO_FLAG == 0 || handle & SSO_RESERVED_MASK != 0 {
        return None;
    }
    let len = ((handle & SSO_LEN_MASK) >> SSO_LEN_SHIFT) as usize;
    if len == 0 {
        return None;
    }
    let bytes = [handle as u8, (handle >> 8) as u8, (handle >> 16) as u8];
    Some((bytes, len))
}

/// Bytes behind a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved<'a> {
    Inline { bytes: [u8; 3], len: u8 },
    Blob(&'a [u8]),
}

impl<'a> Resolved<'a> {
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Resolved::Inline { bytes, len } => &bytes[..*len as usize],
            Resolved::Blob(bytes) => bytes,
        }
    }
}

/// Interning table for one build
#[derive(Debug)]
pub struct StringTable {
    data: Vec<u8>,
    buckets: Vec<u32>,
    secondary: Vec<Vec<u32>>,
    interned: u32,
    collisions: u32,
    max_offset: usize,
}

impl Default for StringTable {
    fn default() -> Self {
        Self::new()
    }
}

impl StringTable {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a table with room for `bytes` bytes of string data
    pub fn with_capacity(bytes: usize) -> Self {
        let mut data = Vec::with_capacity(bytes.max(3));
        data.push(0);
        data.extend_from_slice(&MAGIC_STRINGTABLE_BEGIN.to_le_bytes());
        StringTable {
            data,
            buckets: vec![0; BUCKET_COUNT],
            secondary: Vec::new(),
            interned: 0,
            collisions: 0,
            max_offset: MAX_OFFSET,
        }
    }

    /// Table whose blob may not grow past `max_offset`
    #[cfg(test)]
    fn with_offset_limit(max_offset: usize) -> Self {
        StringTable {
            max_offset,
            ..Self::new()
        }
    }

    /// Intern `bytes`, returning its handle
    ///
    /// Equal content always yields the same handle.
    pub fn intern(&mut self, bytes: &[u8]) -> BuildResult<u32> {
        if bytes.is_empty() {
            return Ok(0);
        }
        if let Some(handle) = sso_encode(bytes) {
            return Ok(handle);
        }

        let slot = hash(bytes) as usize % BUCKET_COUNT;
        let cell = self.buckets[slot];

        if cell == 0 {
            let offset = self.append(bytes)?;
            self.buckets[slot] = offset;
            return Ok(offset);
        }

        if cell & SECONDARY_TAG == SECONDARY_TAG {
            let index = (cell & !SECONDARY_TAG) as usize;
            if let Some(&found) = self.secondary[index]
                .iter()
                .find(|&&offset| self.matches(offset, bytes))
            {
                return Ok(found);
            }
            let offset = self.append(bytes)?;
            self.secondary[index].push(offset);
            return Ok(offset);
        }

        if self.matches(cell, bytes) {
            return Ok(cell);
        }

        // A different string already owns the slot: promote to a secondary bucket
        let index = self.secondary.len();
        if index as u32 & SECONDARY_TAG != 0 {
            return Err(BuildError::Overflow { what: "string bucket index" });
        }
        let offset = self.append(bytes)?;
        self.secondary.push(vec![cell, offset]);
        self.buckets[slot] = SECONDARY_TAG | index as u32;
        self.collisions += 1;
        Ok(offset)
    }

    /// Resolve a handle produced by this table
    pub fn resolve(&self, handle: u32) -> Option<Resolved<'_>> {
        resolve_in(&self.data, handle)
    }

    /// Current blob size in bytes (including the leading NUL and begin magic)
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.interned == 0
    }

    /// Number of distinct strings stored in the blob
    #[inline]
    pub fn interned(&self) -> u32 {
        self.interned
    }

    /// Terminate the blob with the end magic and hand it over
    pub fn finish(mut self) -> Vec<u8> {
        debug!(
            bytes = self.data.len(),
            strings = self.interned,
            collisions = self.collisions,
            secondary_buckets = self.secondary.len(),
            "string table finished"
        );
        self.data.extend_from_slice(&MAGIC_STRINGTABLE_END.to_le_bytes());
        self.data
    }

    fn append(&mut self, bytes: &[u8]) -> BuildResult<u32> {
        let offset = self.data.len();
        if offset > self.max_offset || self.max_offset - offset < bytes.len() {
            return Err(BuildError::Overflow { what: "string table" });
        }
        self.data.extend_from_slice(bytes);
        self.data.push(0);
        self.interned += 1;
        Ok(offset as u32)
    }

    #[inline]
    fn matches(&self, offset: u32, bytes: &[u8]) -> bool {
        let start = offset as usize;
        let end = start + bytes.len();
        self.data.get(start..end) == Some(bytes) && self.data.get(end) == Some(&0)
    }
}

/// Resolve `handle` against a string blob
///
/// Blob offsets are bounds-checked and must land on a NUL-terminated run.
pub fn resolve_in(data: &[u8], handle: u32) -> Option<Resolved<'_>> {
    if handle & SSO_FLAG != 0 {
        let (bytes, len) = sso_decode(handle)?;
        return Some(Resolved::Inline { bytes, len: len as u8 });
    }
    let rest = data.get(handle as usize..)?;
    let end = memchr(0, rest)?;
    Some(Resolved::Blob(&rest[..end]))
}
