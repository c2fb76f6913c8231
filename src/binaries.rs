//! Binary layout of an info database
//!
//! Every record is a `#[repr(C, packed)]` struct emitted as its raw
//! little-endian byte image. A database is:
//!
//! ```text
//! salted Header
//! [Machine; machines_count]
//! [BiosSet] [Rom] [Disk] [Device] [Slot] [SlotOption] [Feature] [Chip]
//! [Display] [Sample] [Configuration] [ConfigurationSetting]
//! [ConfigurationCondition] [SoftwareList] [RamOption]
//! string table: NUL, MAGIC_STRINGTABLE_BEGIN, strings..., MAGIC_STRINGTABLE_END
//! ```
//!
//! String fields hold string handles (see [`crate::strings`]). Index fields
//! hold positions in the sibling arrays; [`ABSENT`] marks "no machine".

use std::mem::size_of;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// "MAMEINFO"
pub const MAGIC_HDR: u64 = 0x4D41_4D45_494E_464F;
pub const MAGIC_STRINGTABLE_BEGIN: u16 = 0x9D9B;
pub const MAGIC_STRINGTABLE_END: u16 = 0x9F99;

/// Sentinel for an unresolved machine index or an absent 32-bit number
pub const ABSENT: u32 = 0xFFFF_FFFF;

/// A record type stored as a flat array in the database
pub trait Record: FromBytes + IntoBytes + Immutable + KnownLayout + Copy + 'static {
    /// Table name used in diagnostics
    const TABLE: &'static str;
    const SIZE: usize = size_of::<Self>();
}

macro_rules! record {
    ($ty:ident, $table:literal) => {
        impl Record for $ty {
            const TABLE: &'static str = $table;
        }
    };
}

// ============================================================================
// Header
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Header {
    pub magic: u64,
    pub sizes_hash: u64,
    pub build: u32,
    pub machines_count: u32,
    pub biossets_count: u32,
    pub roms_count: u32,
    pub disks_count: u32,
    pub devices_count: u32,
    pub slots_count: u32,
    pub slot_options_count: u32,
    pub features_count: u32,
    pub chips_count: u32,
    pub displays_count: u32,
    pub samples_count: u32,
    pub configurations_count: u32,
    pub configuration_settings_count: u32,
    pub configuration_conditions_count: u32,
    pub software_lists_count: u32,
    pub ram_options_count: u32,
}

pub const HEADER_SIZE: usize = size_of::<Header>();

impl Header {
    /// Header bytes as written to disk
    pub fn to_salted_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes.copy_from_slice(self.as_bytes());
        salt(&mut bytes);
        bytes
    }

    /// Read and unsalt a header from the start of `data`
    pub fn from_salted_bytes(data: &[u8]) -> Option<Header> {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes.copy_from_slice(data.get(..HEADER_SIZE)?);
        salt(&mut bytes);
        Header::read_from_bytes(&bytes).ok()
    }

    /// Record counts in emission order, paired with each record's size
    pub fn table_sizes(&self) -> [(u32, usize); 16] {
        [
            (self.machines_count, Machine::SIZE),
            (self.biossets_count, BiosSet::SIZE),
            (self.roms_count, Rom::SIZE),
            (self.disks_count, Disk::SIZE),
            (self.devices_count, Device::SIZE),
            (self.slots_count, Slot::SIZE),
            (self.slot_options_count, SlotOption::SIZE),
            (self.features_count, Feature::SIZE),
            (self.chips_count, Chip::SIZE),
            (self.displays_count, Display::SIZE),
            (self.samples_count, Sample::SIZE),
            (self.configurations_count, Configuration::SIZE),
            (self.configuration_settings_count, ConfigurationSetting::SIZE),
            (self.configuration_conditions_count, ConfigurationCondition::SIZE),
            (self.software_lists_count, SoftwareList::SIZE),
            (self.ram_options_count, RamOption::SIZE),
        ]
    }
}

/// Salt XORed cyclically over the header
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
struct Salt {
    magic1: u32,
    magic2: u16,
    version: u16,
}

static SALT: Salt = Salt {
    magic1: 3_133_731_337,
    magic2: 0xF00D,
    version: 1,
};

/// Apply (or remove) the header salt in place
pub fn salt(bytes: &mut [u8]) {
    let salt = SALT.as_bytes();
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte ^= salt[i % salt.len()];
    }
}

/// Hash over every record size; guards against reading a database written
/// with a different layout
pub const fn sizes_hash() -> u64 {
    let sizes = [
        size_of::<Header>(),
        size_of::<Machine>(),
        size_of::<BiosSet>(),
        size_of::<Rom>(),
        size_of::<Disk>(),
        size_of::<Device>(),
        size_of::<Slot>(),
        size_of::<SlotOption>(),
        size_of::<Feature>(),
        size_of::<Chip>(),
        size_of::<Display>(),
        size_of::<Sample>(),
        size_of::<Configuration>(),
        size_of::<ConfigurationSetting>(),
        size_of::<ConfigurationCondition>(),
        size_of::<SoftwareList>(),
        size_of::<RamOption>(),
    ];
    let mut hash: u64 = 31337;
    let mut i = 0;
    while i < sizes.len() {
        hash = hash.wrapping_mul(33).wrapping_add(sizes[i] as u64);
        i += 1;
    }
    hash
}

pub const SIZES_HASH: u64 = sizes_hash();

// ============================================================================
// Records
// ============================================================================

/// `(start, count)` range into a child array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct IndexRange {
    pub start: u32,
    pub count: u32,
}

impl IndexRange {
    #[inline]
    pub const fn empty_at(start: u32) -> Self {
        IndexRange { start, count: 0 }
    }

    /// Half-open `usize` range, widened so it cannot overflow
    #[inline]
    pub fn as_range(&self) -> std::ops::Range<usize> {
        let start = self.start as usize;
        start..start + self.count as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Machine {
    pub name: u32,
    pub sourcefile: u32,
    /// Name handle while building, machine index (or `ABSENT`) once emitted
    pub clone_of: u32,
    /// Name handle while building, machine index (or `ABSENT`) once emitted
    pub rom_of: u32,
    pub description: u32,
    pub year: u32,
    pub manufacturer: u32,
    pub biossets: IndexRange,
    pub roms: IndexRange,
    pub disks: IndexRange,
    pub features: IndexRange,
    pub chips: IndexRange,
    pub displays: IndexRange,
    pub samples: IndexRange,
    pub configurations: IndexRange,
    pub software_lists: IndexRange,
    pub ram_options: IndexRange,
    pub devices: IndexRange,
    pub slots: IndexRange,
    pub runnable: u8,
    pub is_bios: u8,
    pub is_device: u8,
    pub is_mechanical: u8,
    pub quality_status: u8,
    pub quality_emulation: u8,
    pub quality_cocktail: u8,
    pub save_state_supported: u8,
    pub unofficial: u8,
    pub incomplete: u8,
    pub sound_channels: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct BiosSet {
    pub name: u32,
    pub description: u32,
    pub default: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Rom {
    pub name: u32,
    pub bios: u32,
    pub size: u32,
    /// Big-endian CRC-32
    pub crc32: [u8; 4],
    pub sha1: [u8; 20],
    pub merge: u32,
    pub region: u32,
    pub offset: u32,
    pub status: u8,
    pub optional: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Disk {
    pub name: u32,
    pub sha1: [u8; 20],
    pub merge: u32,
    pub region: u32,
    pub index: u32,
    pub writable: u8,
    pub status: u8,
    pub optional: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Feature {
    pub kind: u8,
    pub status: u8,
    pub overall: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Chip {
    pub clock: u64,
    pub tag: u32,
    pub name: u32,
    pub kind: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Display {
    pub tag: u32,
    pub width: u32,
    pub height: u32,
    pub refresh: f32,
    pub pixclock: u64,
    pub htotal: u32,
    pub hbend: u32,
    pub hbstart: u32,
    pub vtotal: u32,
    pub vbend: u32,
    pub vbstart: u32,
    pub kind: u8,
    pub rotate: u8,
    pub flipx: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Sample {
    pub name: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Configuration {
    pub name: u32,
    pub tag: u32,
    pub mask: u32,
    pub settings: IndexRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct ConfigurationSetting {
    pub name: u32,
    pub value: u32,
    pub conditions: IndexRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct ConfigurationCondition {
    pub tag: u32,
    pub mask: u32,
    pub value: u32,
    pub relation: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Device {
    pub kind: u32,
    pub tag: u32,
    pub interface: u32,
    pub instance_name: u32,
    /// Comma-terminated list, e.g. `"bin,rom,"`
    pub extensions: u32,
    pub mandatory: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Slot {
    pub name: u32,
    pub options: IndexRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct SlotOption {
    pub name: u32,
    pub devname: u32,
    pub is_default: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct SoftwareList {
    pub name: u32,
    pub filter: u32,
    pub status: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct RamOption {
    pub name: u32,
    pub value: u32,
    pub is_default: u8,
}

record!(Machine, "machines");
record!(BiosSet, "bios sets");
record!(Rom, "roms");
record!(Disk, "disks");
record!(Feature, "features");
record!(Chip, "chips");
record!(Display, "displays");
record!(Sample, "samples");
record!(Configuration, "configurations");
record!(ConfigurationSetting, "configuration settings");
record!(ConfigurationCondition, "configuration conditions");
record!(Device, "devices");
record!(Slot, "slots");
record!(SlotOption, "slot options");
record!(SoftwareList, "software lists");
record!(RamOption, "ram options");
