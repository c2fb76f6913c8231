//! Record arrays of a build in progress

use zerocopy::IntoBytes;

use super::CapacityHints;
use crate::binaries::{
    BiosSet, Chip, Configuration, ConfigurationCondition, ConfigurationSetting, Device, Disk,
    Display, Feature, IndexRange, Machine, RamOption, Record, Rom, Sample, Slot, SlotOption,
    SoftwareList,
};
use crate::error::{BuildError, BuildResult};

/// Length of a record array as a 32-bit index
#[inline]
pub(crate) fn to_u32<T: Record>(items: &[T]) -> BuildResult<u32> {
    u32::try_from(items.len()).map_err(|_| BuildError::Overflow { what: T::TABLE })
}

/// Empty range starting at the next free slot of `items`
#[inline]
pub(crate) fn next_range<T: Record>(items: &[T]) -> BuildResult<IndexRange> {
    Ok(IndexRange::empty_at(to_u32(items)?))
}

/// One flat array per record kind; parents refer to children by range
#[derive(Debug, Default)]
pub(crate) struct Tables {
    pub machines: Vec<Machine>,
    pub biossets: Vec<BiosSet>,
    pub roms: Vec<Rom>,
    pub disks: Vec<Disk>,
    pub devices: Vec<Device>,
    pub slots: Vec<Slot>,
    pub slot_options: Vec<SlotOption>,
    pub features: Vec<Feature>,
    pub chips: Vec<Chip>,
    pub displays: Vec<Display>,
    pub samples: Vec<Sample>,
    pub configurations: Vec<Configuration>,
    pub configuration_settings: Vec<ConfigurationSetting>,
    pub configuration_conditions: Vec<ConfigurationCondition>,
    pub software_lists: Vec<SoftwareList>,
    pub ram_options: Vec<RamOption>,
}

impl Tables {
    pub fn with_capacity(hints: &CapacityHints) -> Self {
        Tables {
            machines: Vec::with_capacity(hints.machines),
            devices: Vec::with_capacity(hints.devices),
            configurations: Vec::with_capacity(hints.configurations),
            configuration_settings: Vec::with_capacity(hints.configuration_settings),
            configuration_conditions: Vec::with_capacity(hints.configuration_conditions),
            ..Tables::default()
        }
    }

    /// Raw record bytes in emission order
    pub fn record_bytes(&self) -> [&[u8]; 16] {
        [
            self.machines.as_bytes(),
            self.biossets.as_bytes(),
            self.roms.as_bytes(),
            self.disks.as_bytes(),
            self.devices.as_bytes(),
            self.slots.as_bytes(),
            self.slot_options.as_bytes(),
            self.features.as_bytes(),
            self.chips.as_bytes(),
            self.displays.as_bytes(),
            self.samples.as_bytes(),
            self.configurations.as_bytes(),
            self.configuration_settings.as_bytes(),
            self.configuration_conditions.as_bytes(),
            self.software_lists.as_bytes(),
            self.ram_options.as_bytes(),
        ]
    }

    /// Total size of every record array in bytes
    pub fn record_len(&self) -> usize {
        self.record_bytes().iter().map(|bytes| bytes.len()).sum()
    }
}
