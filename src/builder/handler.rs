//! Element dispatch for `-listxml` documents
//!
//! The schema is static, so element paths resolve through one `match` over
//! `(parent, name)`. Begin callbacks append records and open child ranges on
//! their owner; end callbacks pick up trailing text.

use tracing::{trace, warn};

use super::tables::{next_range, Tables};
use super::throttle::Throttle;
use super::{BuildOptions, Progress, ProgressFn};
use crate::binaries::{
    BiosSet, Chip, Configuration, ConfigurationCondition, ConfigurationSetting, Device, Disk,
    Display, Feature, Machine, RamOption, Rom, Sample, Slot, SlotOption, SoftwareList, ABSENT,
};
use crate::decode::{
    flag, tri_state, AttributeValue, ChipType, ConditionRelation, DisplayType, DriverQuality,
    DumpStatus, FeatureQuality, FeatureType, Hex, HexBytes, Rotation, SaveState,
    SoftwareListStatus, UNSPECIFIED,
};
use crate::error::{BuildError, BuildResult};
use crate::schema::{Attributes, ElementResult, SchemaHandler};
use crate::strings::StringTable;

/// Every element of the catalog schema the builder reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Element {
    Mame,
    Machine,
    Description,
    Year,
    Manufacturer,
    BiosSet,
    Rom,
    Disk,
    Feature,
    Chip,
    Display,
    Sample,
    Configuration,
    Setting,
    Condition,
    Device,
    Instance,
    Extension,
    Driver,
    Slot,
    SlotOption,
    SoftwareList,
    RamOption,
    Sound,
}

impl Element {
    /// Child of `parent` named `name`
    pub fn child(parent: Option<Element>, name: &[u8]) -> Option<Element> {
        use Element as E;
        let element = match (parent, name) {
            (None, b"mame") => E::Mame,
            (Some(E::Mame), b"machine") => E::Machine,
            (Some(E::Machine), b"description") => E::Description,
            (Some(E::Machine), b"year") => E::Year,
            (Some(E::Machine), b"manufacturer") => E::Manufacturer,
            (Some(E::Machine), b"biosset") => E::BiosSet,
            (Some(E::Machine), b"rom") => E::Rom,
            (Some(E::Machine), b"disk") => E::Disk,
            (Some(E::Machine), b"feature") => E::Feature,
            (Some(E::Machine), b"chip") => E::Chip,
            (Some(E::Machine), b"display") => E::Display,
            (Some(E::Machine), b"sample") => E::Sample,
            (Some(E::Machine), b"configuration" | b"dipswitch") => E::Configuration,
            (Some(E::Configuration), b"confsetting" | b"dipvalue") => E::Setting,
            (Some(E::Setting), b"condition") => E::Condition,
            (Some(E::Machine), b"device") => E::Device,
            (Some(E::Device), b"instance") => E::Instance,
            (Some(E::Device), b"extension") => E::Extension,
            (Some(E::Machine), b"driver") => E::Driver,
            (Some(E::Machine), b"slot") => E::Slot,
            (Some(E::Slot), b"slotoption") => E::SlotOption,
            (Some(E::Machine), b"softwarelist") => E::SoftwareList,
            (Some(E::Machine), b"ramoption") => E::RamOption,
            (Some(E::Machine), b"sound") => E::Sound,
            _ => return None,
        };
        Some(element)
    }
}

/// Builder state threaded through the schema parser
pub(crate) struct CatalogHandler<'a> {
    tables: Tables,
    strings: StringTable,
    build: u32,
    /// Extension list of the open `<device>`
    extensions: Vec<u8>,
    progress: Option<ProgressFn<'a>>,
    throttle: Throttle,
}

impl<'a> CatalogHandler<'a> {
    pub fn new(options: &BuildOptions, progress: Option<ProgressFn<'a>>) -> Self {
        CatalogHandler {
            tables: Tables::with_capacity(&options.capacity),
            strings: StringTable::with_capacity(options.capacity.string_bytes),
            build: 0,
            extensions: Vec::with_capacity(64),
            progress,
            throttle: Throttle::new(options.progress_interval),
        }
    }

    pub fn into_parts(self) -> (Tables, StringTable, u32) {
        (self.tables, self.strings, self.build)
    }

    /// Intern a string attribute; absent reads as the empty string
    #[inline]
    fn string(&mut self, attributes: &Attributes<'_>, name: &str) -> BuildResult<u32> {
        match attributes.bytes(name) {
            Some(bytes) => self.strings.intern(bytes),
            None => Ok(0),
        }
    }

    #[inline]
    fn machine(&mut self) -> Option<&mut Machine> {
        self.tables.machines.last_mut()
    }

    fn begin_machine(&mut self, attributes: &mut Attributes<'_>) -> BuildResult<()> {
        let machine = Machine {
            name: self.string(attributes, "name")?,
            sourcefile: self.string(attributes, "sourcefile")?,
            clone_of: self.string(attributes, "cloneof")?,
            rom_of: self.string(attributes, "romof")?,
            description: 0,
            year: 0,
            manufacturer: 0,
            biossets: next_range(&self.tables.biossets)?,
            roms: next_range(&self.tables.roms)?,
            disks: next_range(&self.tables.disks)?,
            features: next_range(&self.tables.features)?,
            chips: next_range(&self.tables.chips)?,
            displays: next_range(&self.tables.displays)?,
            samples: next_range(&self.tables.samples)?,
            configurations: next_range(&self.tables.configurations)?,
            software_lists: next_range(&self.tables.software_lists)?,
            ram_options: next_range(&self.tables.ram_options)?,
            devices: next_range(&self.tables.devices)?,
            slots: next_range(&self.tables.slots)?,
            runnable: tri_state(attributes.get("runnable")),
            is_bios: tri_state(attributes.get("isbios")),
            is_device: tri_state(attributes.get("isdevice")),
            is_mechanical: tri_state(attributes.get("ismechanical")),
            // filled in by <driver> and <sound>
            quality_status: DriverQuality::Unknown as u8,
            quality_emulation: DriverQuality::Unknown as u8,
            quality_cocktail: DriverQuality::Unknown as u8,
            save_state_supported: UNSPECIFIED,
            unofficial: UNSPECIFIED,
            incomplete: UNSPECIFIED,
            sound_channels: UNSPECIFIED,
        };
        self.tables.machines.push(machine);
        Ok(())
    }

    fn begin_rom(&mut self, attributes: &mut Attributes<'_>) -> BuildResult<()> {
        let rom = Rom {
            name: self.string(attributes, "name")?,
            bios: self.string(attributes, "bios")?,
            size: attributes.get("size").unwrap_or(ABSENT),
            crc32: attributes.get::<HexBytes<4>>("crc").map_or([0; 4], |h| h.0),
            sha1: attributes.get::<HexBytes<20>>("sha1").map_or([0; 20], |h| h.0),
            merge: self.string(attributes, "merge")?,
            region: self.string(attributes, "region")?,
            offset: attributes.get::<Hex>("offset").map_or(ABSENT, |h| h.0),
            status: dump_status(attributes),
            optional: flag(attributes.get("optional")),
        };
        self.tables.roms.push(rom);
        if let Some(machine) = self.machine() {
            machine.roms.count += 1;
        }
        Ok(())
    }

    fn begin_disk(&mut self, attributes: &mut Attributes<'_>) -> BuildResult<()> {
        let disk = Disk {
            name: self.string(attributes, "name")?,
            sha1: attributes.get::<HexBytes<20>>("sha1").map_or([0; 20], |h| h.0),
            merge: self.string(attributes, "merge")?,
            region: self.string(attributes, "region")?,
            index: attributes.get("index").unwrap_or(ABSENT),
            writable: flag(attributes.get("writable")),
            status: dump_status(attributes),
            optional: flag(attributes.get("optional")),
        };
        self.tables.disks.push(disk);
        if let Some(machine) = self.machine() {
            machine.disks.count += 1;
        }
        Ok(())
    }

    fn begin_display(&mut self, attributes: &mut Attributes<'_>) -> BuildResult<()> {
        let display = Display {
            tag: self.string(attributes, "tag")?,
            width: attributes.get("width").unwrap_or(ABSENT),
            height: attributes.get("height").unwrap_or(ABSENT),
            refresh: attributes.get("refresh").unwrap_or(f32::from_bits(ABSENT)),
            pixclock: attributes.get("pixclock").unwrap_or(u64::MAX),
            htotal: attributes.get("htotal").unwrap_or(ABSENT),
            hbend: attributes.get("hbend").unwrap_or(ABSENT),
            hbstart: attributes.get("hbstart").unwrap_or(ABSENT),
            vtotal: attributes.get("vtotal").unwrap_or(ABSENT),
            vbend: attributes.get("vbend").unwrap_or(ABSENT),
            vbstart: attributes.get("vbstart").unwrap_or(ABSENT),
            kind: enum_byte::<DisplayType>(attributes, "type"),
            rotate: enum_byte::<Rotation>(attributes, "rotate"),
            flipx: flag(attributes.get("flipx")),
        };
        self.tables.displays.push(display);
        if let Some(machine) = self.machine() {
            machine.displays.count += 1;
        }
        Ok(())
    }

    fn begin_device(&mut self, attributes: &mut Attributes<'_>) -> BuildResult<()> {
        let device = Device {
            kind: self.string(attributes, "type")?,
            tag: self.string(attributes, "tag")?,
            interface: self.string(attributes, "interface")?,
            instance_name: 0,
            extensions: 0,
            mandatory: flag(attributes.get("mandatory")),
        };
        self.tables.devices.push(device);
        self.extensions.clear();
        if let Some(machine) = self.machine() {
            machine.devices.count += 1;
        }
        Ok(())
    }

    fn begin_driver(&mut self, attributes: &mut Attributes<'_>) {
        let status = enum_byte::<DriverQuality>(attributes, "status");
        let emulation = enum_byte::<DriverQuality>(attributes, "emulation");
        let cocktail = enum_byte::<DriverQuality>(attributes, "cocktail");
        let save_state = tri_state(attributes.get::<SaveState>("savestate").and_then(|s| s.0));
        let unofficial = tri_state(attributes.get("unofficial"));
        let incomplete = tri_state(attributes.get("incomplete"));
        if let Some(machine) = self.machine() {
            machine.quality_status = status;
            machine.quality_emulation = emulation;
            machine.quality_cocktail = cocktail;
            machine.save_state_supported = save_state;
            machine.unofficial = unofficial;
            machine.incomplete = incomplete;
        }
    }

    /// Report the machine just completed, if the throttle allows
    fn report_progress(&mut self) {
        let Some(callback) = self.progress.as_mut() else {
            return;
        };
        if !self.throttle.check() {
            return;
        }
        let Some(machine) = self.tables.machines.last() else {
            return;
        };
        let text = |handle: u32| {
            self.strings
                .resolve(handle)
                .map(|r| String::from_utf8_lossy(r.as_bytes()).into_owned())
                .unwrap_or_default()
        };
        let name = text(machine.name);
        let description = text(machine.description);
        callback(&Progress {
            machines: self.tables.machines.len(),
            name: &name,
            description: &description,
        });
    }
}

/// Stored byte of an enumerated attribute; absent reads as the zero variant
#[inline]
fn enum_byte<T>(attributes: &mut Attributes<'_>, name: &str) -> u8
where
    T: AttributeValue + Default + Into<u8>,
{
    attributes.get::<T>(name).unwrap_or_default().into()
}

/// Dump status; the catalog omits `status` for good dumps
#[inline]
fn dump_status(attributes: &mut Attributes<'_>) -> u8 {
    attributes.get("status").unwrap_or(DumpStatus::Good) as u8
}

impl SchemaHandler for CatalogHandler<'_> {
    type Element = Element;
    type Error = BuildError;

    #[inline]
    fn resolve(parent: Option<Element>, name: &[u8]) -> Option<Element> {
        Element::child(parent, name)
    }

    #[inline]
    fn collects_text(element: Element) -> bool {
        matches!(
            element,
            Element::Description | Element::Year | Element::Manufacturer | Element::RamOption
        )
    }

    fn begin(
        &mut self,
        element: Element,
        attributes: &mut Attributes<'_>,
    ) -> BuildResult<ElementResult> {
        match element {
            Element::Mame => {
                self.build = self.string(attributes, "build")?;
            }
            Element::Machine => self.begin_machine(attributes)?,
            Element::Description | Element::Year | Element::Manufacturer => {}
            Element::BiosSet => {
                let biosset = BiosSet {
                    name: self.string(attributes, "name")?,
                    description: self.string(attributes, "description")?,
                    default: flag(attributes.get("default")),
                };
                self.tables.biossets.push(biosset);
                if let Some(machine) = self.machine() {
                    machine.biossets.count += 1;
                }
            }
            Element::Rom => self.begin_rom(attributes)?,
            Element::Disk => self.begin_disk(attributes)?,
            Element::Feature => {
                let feature = Feature {
                    kind: enum_byte::<FeatureType>(attributes, "type"),
                    status: enum_byte::<FeatureQuality>(attributes, "status"),
                    overall: enum_byte::<FeatureQuality>(attributes, "overall"),
                };
                self.tables.features.push(feature);
                if let Some(machine) = self.machine() {
                    machine.features.count += 1;
                }
            }
            Element::Chip => {
                let chip = Chip {
                    clock: attributes.get("clock").unwrap_or(u64::MAX),
                    tag: self.string(attributes, "tag")?,
                    name: self.string(attributes, "name")?,
                    kind: enum_byte::<ChipType>(attributes, "type"),
                };
                self.tables.chips.push(chip);
                if let Some(machine) = self.machine() {
                    machine.chips.count += 1;
                }
            }
            Element::Display => self.begin_display(attributes)?,
            Element::Sample => {
                let sample = Sample {
                    name: self.string(attributes, "name")?,
                };
                self.tables.samples.push(sample);
                if let Some(machine) = self.machine() {
                    machine.samples.count += 1;
                }
            }
            Element::Configuration => {
                let configuration = Configuration {
                    name: self.string(attributes, "name")?,
                    tag: self.string(attributes, "tag")?,
                    mask: attributes.get("mask").unwrap_or(ABSENT),
                    settings: next_range(&self.tables.configuration_settings)?,
                };
                self.tables.configurations.push(configuration);
                if let Some(machine) = self.machine() {
                    machine.configurations.count += 1;
                }
            }
            Element::Setting => {
                let setting = ConfigurationSetting {
                    name: self.string(attributes, "name")?,
                    value: attributes.get("value").unwrap_or(ABSENT),
                    conditions: next_range(&self.tables.configuration_conditions)?,
                };
                self.tables.configuration_settings.push(setting);
                if let Some(configuration) = self.tables.configurations.last_mut() {
                    configuration.settings.count += 1;
                }
            }
            Element::Condition => {
                let condition = ConfigurationCondition {
                    tag: self.string(attributes, "tag")?,
                    mask: attributes.get("mask").unwrap_or(ABSENT),
                    value: attributes.get("value").unwrap_or(ABSENT),
                    relation: enum_byte::<ConditionRelation>(attributes, "relation"),
                };
                self.tables.configuration_conditions.push(condition);
                if let Some(setting) = self.tables.configuration_settings.last_mut() {
                    setting.conditions.count += 1;
                }
            }
            Element::Device => self.begin_device(attributes)?,
            Element::Instance => {
                if attributes.bytes("name").is_some() {
                    let name = self.string(attributes, "name")?;
                    if let Some(device) = self.tables.devices.last_mut() {
                        device.instance_name = name;
                    }
                }
            }
            Element::Extension => {
                if let Some(name) = attributes.bytes("name") {
                    self.extensions.extend_from_slice(name);
                    self.extensions.push(b',');
                }
            }
            Element::Driver => self.begin_driver(attributes),
            Element::Slot => {
                let slot = Slot {
                    name: self.string(attributes, "name")?,
                    options: next_range(&self.tables.slot_options)?,
                };
                self.tables.slots.push(slot);
                if let Some(machine) = self.machine() {
                    machine.slots.count += 1;
                }
            }
            Element::SlotOption => {
                let option = SlotOption {
                    name: self.string(attributes, "name")?,
                    devname: self.string(attributes, "devname")?,
                    is_default: flag(attributes.get("default")),
                };
                self.tables.slot_options.push(option);
                if let Some(slot) = self.tables.slots.last_mut() {
                    slot.options.count += 1;
                }
            }
            Element::SoftwareList => {
                let list = SoftwareList {
                    name: self.string(attributes, "name")?,
                    filter: self.string(attributes, "filter")?,
                    status: enum_byte::<SoftwareListStatus>(attributes, "status"),
                };
                self.tables.software_lists.push(list);
                if let Some(machine) = self.machine() {
                    machine.software_lists.count += 1;
                }
            }
            Element::RamOption => {
                let option = RamOption {
                    name: self.string(attributes, "name")?,
                    value: 0,
                    is_default: flag(attributes.get("default")),
                };
                self.tables.ram_options.push(option);
                if let Some(machine) = self.machine() {
                    machine.ram_options.count += 1;
                }
            }
            Element::Sound => {
                if let Some(channels) = attributes.get::<u8>("channels") {
                    if let Some(machine) = self.machine() {
                        machine.sound_channels = channels;
                    }
                }
            }
        }
        Ok(ElementResult::Ok)
    }

    fn end(&mut self, element: Element, text: &[u8]) -> BuildResult<()> {
        match element {
            Element::Machine => self.report_progress(),
            Element::Description | Element::Year | Element::Manufacturer => {
                let handle = self.strings.intern(text)?;
                if let Some(machine) = self.machine() {
                    match element {
                        Element::Description => machine.description = handle,
                        Element::Year => machine.year = handle,
                        _ => machine.manufacturer = handle,
                    }
                }
            }
            Element::Device => {
                if !self.extensions.is_empty() {
                    let handle = self.strings.intern(&self.extensions)?;
                    if let Some(device) = self.tables.devices.last_mut() {
                        device.extensions = handle;
                    }
                }
            }
            Element::RamOption => {
                let value = u32::parse_attribute(text.trim_ascii()).unwrap_or_else(|| {
                    warn!(text = %String::from_utf8_lossy(text), "unparsable ramoption value");
                    ABSENT
                });
                if let Some(option) = self.tables.ram_options.last_mut() {
                    option.value = value;
                }
            }
            _ => trace!(?element, "closed"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_dispatch() {
        assert_eq!(Element::child(None, b"mame"), Some(Element::Mame));
        assert_eq!(Element::child(None, b"machine"), None);
        assert_eq!(Element::child(Some(Element::Mame), b"machine"), Some(Element::Machine));
        assert_eq!(
            Element::child(Some(Element::Machine), b"dipswitch"),
            Some(Element::Configuration)
        );
        assert_eq!(
            Element::child(Some(Element::Configuration), b"dipvalue"),
            Some(Element::Setting)
        );
        assert_eq!(
            Element::child(Some(Element::Setting), b"condition"),
            Some(Element::Condition)
        );
        assert_eq!(Element::child(Some(Element::Machine), b"condition"), None);
        assert_eq!(Element::child(Some(Element::Device), b"extension"), Some(Element::Extension));
        assert_eq!(Element::child(Some(Element::Machine), b"input"), None);
    }

    #[test]
    fn test_text_elements() {
        assert!(CatalogHandler::collects_text(Element::Description));
        assert!(CatalogHandler::collects_text(Element::RamOption));
        assert!(!CatalogHandler::collects_text(Element::Machine));
        assert!(!CatalogHandler::collects_text(Element::Rom));
    }
}
