//! Machine view with resolved strings and child tables

use std::sync::Arc;

use super::{InfoDatabase, Table};
use crate::binaries::{
    BiosSet, Chip, Configuration, Device, Disk, Display, Feature, Machine, RamOption, Rom,
    Sample, Slot, SoftwareList, ABSENT,
};
use crate::decode::{DriverQuality, TRI_FALSE, TRI_TRUE, UNSPECIFIED};
use crate::error::RangeError;

/// One machine of a loaded database
#[derive(Debug, Clone, Copy)]
pub struct MachineView<'db> {
    db: &'db InfoDatabase<'db>,
    index: usize,
    record: Machine,
}

#[inline]
fn optional_bool(value: u8) -> Option<bool> {
    match value {
        TRI_FALSE => Some(false),
        TRI_TRUE => Some(true),
        _ => None,
    }
}

impl<'db> MachineView<'db> {
    pub(crate) fn new(db: &'db InfoDatabase<'db>, index: usize, record: Machine) -> Self {
        MachineView { db, index, record }
    }

    /// Position in the name-sorted machine table
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn record(&self) -> &Machine {
        &self.record
    }

    pub fn name(&self) -> Result<Arc<str>, RangeError> {
        self.db.string(self.record.name)
    }

    pub fn sourcefile(&self) -> Result<Arc<str>, RangeError> {
        self.db.string(self.record.sourcefile)
    }

    pub fn description(&self) -> Result<Arc<str>, RangeError> {
        self.db.string(self.record.description)
    }

    pub fn year(&self) -> Result<Arc<str>, RangeError> {
        self.db.string(self.record.year)
    }

    pub fn manufacturer(&self) -> Result<Arc<str>, RangeError> {
        self.db.string(self.record.manufacturer)
    }

    /// Parent machine, if this is a clone
    pub fn clone_of(&self) -> Result<Option<MachineView<'db>>, RangeError> {
        self.related(self.record.clone_of)
    }

    /// Machine whose ROMs this one shares
    pub fn rom_of(&self) -> Result<Option<MachineView<'db>>, RangeError> {
        self.related(self.record.rom_of)
    }

    fn related(&self, index: u32) -> Result<Option<MachineView<'db>>, RangeError> {
        if index == ABSENT {
            return Ok(None);
        }
        self.db.machine(index as usize).map(Some)
    }

    /// Runnable unless the catalog says otherwise
    pub fn runnable(&self) -> bool {
        optional_bool(self.record.runnable).unwrap_or(true)
    }

    pub fn is_bios(&self) -> Option<bool> {
        optional_bool(self.record.is_bios)
    }

    pub fn is_device(&self) -> Option<bool> {
        optional_bool(self.record.is_device)
    }

    pub fn is_mechanical(&self) -> Option<bool> {
        optional_bool(self.record.is_mechanical)
    }

    pub fn save_state_supported(&self) -> Option<bool> {
        optional_bool(self.record.save_state_supported)
    }

    pub fn unofficial(&self) -> Option<bool> {
        optional_bool(self.record.unofficial)
    }

    pub fn incomplete(&self) -> Option<bool> {
        optional_bool(self.record.incomplete)
    }

    pub fn sound_channels(&self) -> Option<u8> {
        let channels = self.record.sound_channels;
        (channels != UNSPECIFIED).then_some(channels)
    }

    pub fn quality_status(&self) -> DriverQuality {
        DriverQuality::from_u8(self.record.quality_status)
    }

    pub fn quality_emulation(&self) -> DriverQuality {
        DriverQuality::from_u8(self.record.quality_emulation)
    }

    pub fn quality_cocktail(&self) -> DriverQuality {
        DriverQuality::from_u8(self.record.quality_cocktail)
    }

    pub fn biossets(&self) -> Result<Table<'db, BiosSet>, RangeError> {
        self.db.biossets().subview(self.record.biossets)
    }

    pub fn roms(&self) -> Result<Table<'db, Rom>, RangeError> {
        self.db.roms().subview(self.record.roms)
    }

    pub fn disks(&self) -> Result<Table<'db, Disk>, RangeError> {
        self.db.disks().subview(self.record.disks)
    }

    pub fn features(&self) -> Result<Table<'db, Feature>, RangeError> {
        self.db.features().subview(self.record.features)
    }

    pub fn chips(&self) -> Result<Table<'db, Chip>, RangeError> {
        self.db.chips().subview(self.record.chips)
    }

    pub fn displays(&self) -> Result<Table<'db, Display>, RangeError> {
        self.db.displays().subview(self.record.displays)
    }

    pub fn samples(&self) -> Result<Table<'db, Sample>, RangeError> {
        self.db.samples().subview(self.record.samples)
    }

    pub fn configurations(&self) -> Result<Table<'db, Configuration>, RangeError> {
        self.db.configurations().subview(self.record.configurations)
    }

    pub fn software_lists(&self) -> Result<Table<'db, SoftwareList>, RangeError> {
        self.db.software_lists().subview(self.record.software_lists)
    }

    pub fn ram_options(&self) -> Result<Table<'db, RamOption>, RangeError> {
        self.db.ram_options().subview(self.record.ram_options)
    }

    pub fn devices(&self) -> Result<Table<'db, Device>, RangeError> {
        self.db.devices().subview(self.record.devices)
    }

    pub fn slots(&self) -> Result<Table<'db, Slot>, RangeError> {
        self.db.slots().subview(self.record.slots)
    }
}
