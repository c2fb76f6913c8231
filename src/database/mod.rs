//! Info Database Reader
//!
//! Opens an emitted database and exposes its record arrays without copying:
//!
//! - The header is unsalted and checked (magic, then layout hash) before any
//!   other byte is trusted
//! - Header counts must fit the file; the string table must carry both magics
//! - Record access is bounds-checked ([`Table`]); strings resolve lazily
//!   through a small LRU cache
//! - Machines are sorted by name, so lookup is a binary search

mod machine;
mod table;

pub use machine::MachineView;
pub use table::Table;

use std::borrow::Cow;
use std::cmp::Ordering;
use std::num::NonZeroUsize;
use std::ops::Range;
use std::path::Path;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use tracing::debug;

use crate::binaries::{
    BiosSet, Chip, Configuration, ConfigurationCondition, ConfigurationSetting, Device, Disk,
    Display, Feature, Header, Machine, RamOption, Record, Rom, Sample, Slot, SlotOption,
    SoftwareList, HEADER_SIZE, MAGIC_HDR, MAGIC_STRINGTABLE_BEGIN, MAGIC_STRINGTABLE_END,
    SIZES_HASH,
};
use crate::error::{LoadError, RangeError};
use crate::strings::{resolve_in, Resolved};

/// Decoded strings kept per database
const STRING_CACHE_CAPACITY: usize = 4096;

/// Smallest string table: NUL, begin magic, end magic
const MIN_STRING_TABLE: usize = 5;

/// A loaded, validated info database
pub struct InfoDatabase<'a> {
    data: Cow<'a, [u8]>,
    header: Header,
    /// Byte range of each record array, in emission order
    tables: [Range<usize>; 16],
    strings: Range<usize>,
    cache: Mutex<LruCache<u32, Arc<str>>>,
}

impl std::fmt::Debug for InfoDatabase<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfoDatabase")
            .field("header", &self.header)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl<'a> InfoDatabase<'a> {
    /// Validate and open a database held in memory
    pub fn load(data: impl Into<Cow<'a, [u8]>>) -> Result<Self, LoadError> {
        let data = data.into();
        if data.len() < HEADER_SIZE {
            return Err(LoadError::TooShort { len: data.len() });
        }
        let header =
            Header::from_salted_bytes(&data).ok_or(LoadError::TooShort { len: data.len() })?;
        let (magic, sizes_hash) = (header.magic, header.sizes_hash);
        if magic != MAGIC_HDR {
            return Err(LoadError::BadMagic);
        }
        if sizes_hash != SIZES_HASH {
            return Err(LoadError::IncompatibleLayout {
                found: sizes_hash,
                expected: SIZES_HASH,
            });
        }

        let mut tables: [Range<usize>; 16] = Default::default();
        let mut offset = HEADER_SIZE as u64;
        for (slot, (count, size)) in header.table_sizes().into_iter().enumerate() {
            let end = offset + count as u64 * size as u64;
            tables[slot] = offset as usize..end.min(data.len() as u64) as usize;
            offset = end;
        }
        let needed = offset + MIN_STRING_TABLE as u64;
        if needed > data.len() as u64 {
            return Err(LoadError::Truncated {
                needed,
                available: data.len() as u64,
            });
        }

        let strings = offset as usize..data.len();
        check_string_table(&data[strings.clone()])?;

        debug!(
            bytes = data.len(),
            machines = { header.machines_count },
            string_bytes = strings.len(),
            "info database loaded"
        );
        Ok(InfoDatabase {
            data,
            header,
            tables,
            strings,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(STRING_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            )),
        })
    }

    /// Unsalted header
    #[inline]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Raw database bytes
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Fail unless the database was built by emulator version `expected`
    pub fn verify_build(&self, expected: &str) -> Result<(), LoadError> {
        let found = self.string(self.header.build).unwrap_or_default();
        if &*found != expected {
            return Err(LoadError::VersionMismatch {
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
        Ok(())
    }

    /// Emulator build string from `<mame build="...">`
    pub fn build(&self) -> Result<Arc<str>, RangeError> {
        self.string(self.header.build)
    }

    /// Resolve a string handle
    ///
    /// Small strings decode from the handle itself; blob strings are read
    /// once and cached. Invalid UTF-8 is replaced.
    pub fn string(&self, handle: u32) -> Result<Arc<str>, RangeError> {
        if handle == 0 {
            return Ok(Arc::from(""));
        }
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(text) = cache.get(&handle) {
            return Ok(Arc::clone(text));
        }
        let resolved = self.resolved(handle).ok_or(RangeError {
            table: "strings",
            index: handle as u64,
            len: self.strings.len() as u64,
        })?;
        let text: Arc<str> = Arc::from(String::from_utf8_lossy(resolved.as_bytes()));
        cache.put(handle, Arc::clone(&text));
        Ok(text)
    }

    /// Raw bytes behind a string handle
    fn resolved(&self, handle: u32) -> Option<Resolved<'_>> {
        resolve_in(&self.data[self.strings.clone()], handle)
    }

    fn table<T: Record>(&self, slot: usize) -> Table<'_, T> {
        Table::new(&self.data[self.tables[slot].clone()])
    }

    pub fn machines(&self) -> Table<'_, Machine> {
        self.table(0)
    }

    pub fn biossets(&self) -> Table<'_, BiosSet> {
        self.table(1)
    }

    pub fn roms(&self) -> Table<'_, Rom> {
        self.table(2)
    }

    pub fn disks(&self) -> Table<'_, Disk> {
        self.table(3)
    }

    pub fn devices(&self) -> Table<'_, Device> {
        self.table(4)
    }

    pub fn slots(&self) -> Table<'_, Slot> {
        self.table(5)
    }

    pub fn slot_options(&self) -> Table<'_, SlotOption> {
        self.table(6)
    }

    pub fn features(&self) -> Table<'_, Feature> {
        self.table(7)
    }

    pub fn chips(&self) -> Table<'_, Chip> {
        self.table(8)
    }

    pub fn displays(&self) -> Table<'_, Display> {
        self.table(9)
    }

    pub fn samples(&self) -> Table<'_, Sample> {
        self.table(10)
    }

    pub fn configurations(&self) -> Table<'_, Configuration> {
        self.table(11)
    }

    pub fn configuration_settings(&self) -> Table<'_, ConfigurationSetting> {
        self.table(12)
    }

    pub fn configuration_conditions(&self) -> Table<'_, ConfigurationCondition> {
        self.table(13)
    }

    pub fn software_lists(&self) -> Table<'_, SoftwareList> {
        self.table(14)
    }

    pub fn ram_options(&self) -> Table<'_, RamOption> {
        self.table(15)
    }

    /// Machine at `index` in name order
    pub fn machine(&self, index: usize) -> Result<MachineView<'_>, RangeError> {
        let record = self.machines().get(index)?;
        Ok(MachineView::new(self, index, record))
    }

    /// Binary search for a machine by name
    pub fn find_machine(&self, name: &str) -> Option<MachineView<'_>> {
        let machines = self.machines();
        let target = name.as_bytes();
        let (mut lo, mut hi) = (0usize, machines.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let record = machines.get(mid).ok()?;
            match self.compare_name(record.name, target) {
                Ordering::Less => lo = mid + 1,
                _ => hi = mid,
            }
        }
        let record = machines.get(lo).ok()?;
        (self.compare_name(record.name, target) == Ordering::Equal)
            .then(|| MachineView::new(self, lo, record))
    }

    /// Order of the string at `handle` against `target`; unresolvable reads as empty
    fn compare_name(&self, handle: u32, target: &[u8]) -> Ordering {
        match self.resolved(handle) {
            Some(resolved) => resolved.as_bytes().cmp(target),
            None => b"".as_slice().cmp(target),
        }
    }
}

impl InfoDatabase<'static> {
    /// Read and open a database file
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let data = std::fs::read(path)?;
        InfoDatabase::load(data)
    }
}

/// `NUL, BEGIN, strings..., END` where the last string is NUL-terminated
fn check_string_table(table: &[u8]) -> Result<(), LoadError> {
    let begin = MAGIC_STRINGTABLE_BEGIN.to_le_bytes();
    let end = MAGIC_STRINGTABLE_END.to_le_bytes();
    if table.first() != Some(&0) || table.get(1..3) != Some(&begin[..]) {
        return Err(LoadError::BadStringTable("missing begin marker"));
    }
    let tail = table.len() - 2;
    if table[tail..] != end {
        return Err(LoadError::BadStringTable("missing end marker"));
    }
    if table.len() > MIN_STRING_TABLE && table[tail - 1] != 0 {
        return Err(LoadError::BadStringTable("unterminated string"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binaries::salt;

    fn empty_database() -> Vec<u8> {
        crate::DatabaseBuilder::with_options(crate::BuildOptions {
            capacity: crate::CapacityHints::none(),
            ..Default::default()
        })
        .build(&b"<mame build=\"0.262 (mame0262)\"></mame>"[..])
        .unwrap()
        .into_bytes()
    }

    #[test]
    fn test_load_empty_database() {
        let bytes = empty_database();
        let db = InfoDatabase::load(&bytes[..]).unwrap();
        assert!(db.machines().is_empty());
        assert_eq!(&*db.build().unwrap(), "0.262 (mame0262)");
        db.verify_build("0.262 (mame0262)").unwrap();
        assert!(matches!(
            db.verify_build("0.263"),
            Err(LoadError::VersionMismatch { .. })
        ));
        assert!(db.find_machine("pacman").is_none());
    }

    #[test]
    fn test_too_short() {
        assert!(matches!(
            InfoDatabase::load(&[0u8; 10][..]),
            Err(LoadError::TooShort { len: 10 })
        ));
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = empty_database();
        bytes[0] ^= 0xFF;
        assert!(matches!(InfoDatabase::load(&bytes[..]), Err(LoadError::BadMagic)));
    }

    #[test]
    fn test_incompatible_layout() {
        let mut bytes = empty_database();
        // unsalt, bump the layout hash, resalt
        salt(&mut bytes[..HEADER_SIZE]);
        bytes[8] = bytes[8].wrapping_add(1);
        salt(&mut bytes[..HEADER_SIZE]);
        assert!(matches!(
            InfoDatabase::load(&bytes[..]),
            Err(LoadError::IncompatibleLayout { expected: SIZES_HASH, .. })
        ));
    }

    #[test]
    fn test_truncated() {
        let mut bytes = empty_database();
        salt(&mut bytes[..HEADER_SIZE]);
        // machines_count
        bytes[20] = 3;
        salt(&mut bytes[..HEADER_SIZE]);
        assert!(matches!(
            InfoDatabase::load(&bytes[..]),
            Err(LoadError::Truncated { .. })
        ));
    }

    #[test]
    fn test_bad_string_table() {
        let mut bytes = empty_database();
        let last = bytes.len() - 1;
        bytes[last] = 0;
        assert!(matches!(
            InfoDatabase::load(&bytes[..]),
            Err(LoadError::BadStringTable(_))
        ));
    }

    #[test]
    fn test_find_machine_inline_and_blob_names() {
        let xml = b"<mame><machine name=\"puckman\"/><machine name=\"z80\"/>\
            <machine name=\"a\"/><machine name=\"pacman\"/><machine name=\"ab\"/></mame>";
        let bytes = crate::build(&xml[..]).unwrap().into_bytes();
        let db = InfoDatabase::load(&bytes[..]).unwrap();
        for (index, name) in ["a", "ab", "pacman", "puckman", "z80"].into_iter().enumerate() {
            let machine = db.find_machine(name).unwrap();
            assert_eq!(machine.index(), index);
            assert_eq!(&*machine.name().unwrap(), name);
        }
        for missing in ["", "aa", "abc", "pac", "pacmanx", "zz"] {
            assert!(db.find_machine(missing).is_none(), "{missing}");
        }
    }

    #[test]
    fn test_string_out_of_range() {
        let bytes = empty_database();
        let db = InfoDatabase::load(bytes).unwrap();
        assert!(db.string(1_000_000).is_err());
        assert_eq!(&*db.string(0).unwrap(), "");
    }
}
