//! Database Builder
//!
//! Compiles `-listxml` output into an info database in one streaming pass:
//!
//! 1. Parse: schema callbacks append fixed-size records to flat arrays and
//!    intern every string (see [`handler`])
//! 2. Fix up: sort machines by name, then turn `cloneof`/`romof` name handles
//!    into machine indices
//! 3. Emit: salted header, record arrays in a fixed order, string table
//!
//! A builder is consumed by [`DatabaseBuilder::build`]; on failure nothing is
//! emitted.

mod handler;
mod tables;
mod throttle;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::binaries::{Header, Machine, ABSENT, HEADER_SIZE, MAGIC_HDR, SIZES_HASH};
use crate::database::InfoDatabase;
use crate::error::{BuildResult, LoadError};
use crate::schema;
use crate::strings::StringTable;
use handler::CatalogHandler;
use tables::{to_u32, Tables};

/// Default minimum time between progress callbacks
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Progress report for the machine just completed
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    /// Machines parsed so far
    pub machines: usize,
    pub name: &'a str,
    pub description: &'a str,
}

/// Progress callback
pub type ProgressFn<'a> = Box<dyn FnMut(&Progress<'_>) + 'a>;

/// Pre-reserved capacities for the record arrays and the string blob
///
/// The defaults fit the largest catalogs seen in practice (about 40k
/// machines and 1.5M configuration settings), so a full build does not
/// reallocate its big arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityHints {
    pub machines: usize,
    pub devices: usize,
    pub configurations: usize,
    pub configuration_settings: usize,
    pub configuration_conditions: usize,
    pub string_bytes: usize,
}

impl Default for CapacityHints {
    fn default() -> Self {
        CapacityHints {
            machines: 40_000,
            devices: 9_000,
            configurations: 500_000,
            configuration_settings: 1_500_000,
            configuration_conditions: 6_000,
            string_bytes: 2_400_000,
        }
    }
}

impl CapacityHints {
    /// No pre-reservation; suited to small documents
    pub const fn none() -> Self {
        CapacityHints {
            machines: 0,
            devices: 0,
            configurations: 0,
            configuration_settings: 0,
            configuration_conditions: 0,
            string_bytes: 0,
        }
    }
}

/// Build configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Minimum time between progress callbacks
    pub progress_interval: Duration,
    pub capacity: CapacityHints,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            capacity: CapacityHints::default(),
        }
    }
}

/// One-shot compiler from `-listxml` to an info database
pub struct DatabaseBuilder<'a> {
    options: BuildOptions,
    progress: Option<ProgressFn<'a>>,
}

impl Default for DatabaseBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> DatabaseBuilder<'a> {
    pub fn new() -> Self {
        Self::with_options(BuildOptions::default())
    }

    pub fn with_options(options: BuildOptions) -> Self {
        DatabaseBuilder {
            options,
            progress: None,
        }
    }

    /// Register a progress callback, invoked at most once per
    /// `progress_interval` after a machine has been parsed
    pub fn on_progress(mut self, callback: impl FnMut(&Progress<'_>) + 'a) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Parse `input` to completion and emit the database
    ///
    /// `input` may be a file, an in-memory buffer or a pipe from a running
    /// emulator; it is read in short sequential chunks. Making the stream
    /// fail cancels the build.
    pub fn build<R: Read>(self, input: R) -> BuildResult<InfoBlob> {
        let started = Instant::now();
        info!("building info database");

        let mut handler = CatalogHandler::new(&self.options, self.progress);
        schema::parse(&mut handler, input)?;
        let (mut tables, strings, build) = handler.into_parts();

        resolve_references(&mut tables.machines, &strings)?;
        let interned = strings.interned();
        let blob = emit(&tables, strings, build)?;

        info!(
            machines = tables.machines.len(),
            strings = interned,
            bytes = blob.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "info database built"
        );
        Ok(blob)
    }
}

/// Build a database with default options
pub fn build<R: Read>(input: R) -> BuildResult<InfoBlob> {
    DatabaseBuilder::new().build(input)
}

/// Compare two machine names by their bytes
fn compare_names(strings: &StringTable, a: u32, b: u32) -> Ordering {
    let a = strings.resolve(a);
    let b = strings.resolve(b);
    let a = a.as_ref().map_or(&[][..], |r| r.as_bytes());
    let b = b.as_ref().map_or(&[][..], |r| r.as_bytes());
    a.cmp(b)
}

/// Sort machines by name and rewrite `clone_of`/`rom_of` from name handles to
/// machine indices, or [`ABSENT`] when the name is empty or unknown
fn resolve_references(machines: &mut [Machine], strings: &StringTable) -> BuildResult<()> {
    to_u32(machines)?;
    machines.sort_by(|a, b| compare_names(strings, a.name, b.name));

    let mut index: HashMap<u32, u32> = HashMap::with_capacity(machines.len() + 1);
    index.insert(0, ABSENT);
    for (i, machine) in machines.iter().enumerate() {
        // duplicate names resolve to the first machine in sorted order
        index.entry(machine.name).or_insert(i as u32);
    }

    let mut unresolved = 0usize;
    for machine in machines.iter_mut() {
        let clone_of = machine.clone_of;
        let rom_of = machine.rom_of;
        machine.clone_of = lookup(&index, clone_of, &mut unresolved);
        machine.rom_of = lookup(&index, rom_of, &mut unresolved);
    }
    if unresolved > 0 {
        debug!(unresolved, "machine references without a matching machine");
    }
    Ok(())
}

#[inline]
fn lookup(index: &HashMap<u32, u32>, handle: u32, unresolved: &mut usize) -> u32 {
    match index.get(&handle) {
        Some(&machine) => machine,
        None => {
            *unresolved += 1;
            ABSENT
        }
    }
}

/// Serialize the fixed-up tables followed by the string table
fn emit(tables: &Tables, strings: StringTable, build: u32) -> BuildResult<InfoBlob> {
    let header = Header {
        magic: MAGIC_HDR,
        sizes_hash: SIZES_HASH,
        build,
        machines_count: to_u32(&tables.machines)?,
        biossets_count: to_u32(&tables.biossets)?,
        roms_count: to_u32(&tables.roms)?,
        disks_count: to_u32(&tables.disks)?,
        devices_count: to_u32(&tables.devices)?,
        slots_count: to_u32(&tables.slots)?,
        slot_options_count: to_u32(&tables.slot_options)?,
        features_count: to_u32(&tables.features)?,
        chips_count: to_u32(&tables.chips)?,
        displays_count: to_u32(&tables.displays)?,
        samples_count: to_u32(&tables.samples)?,
        configurations_count: to_u32(&tables.configurations)?,
        configuration_settings_count: to_u32(&tables.configuration_settings)?,
        configuration_conditions_count: to_u32(&tables.configuration_conditions)?,
        software_lists_count: to_u32(&tables.software_lists)?,
        ram_options_count: to_u32(&tables.ram_options)?,
    };
    debug!(
        machines = { header.machines_count },
        roms = { header.roms_count },
        devices = { header.devices_count },
        configurations = { header.configurations_count },
        settings = { header.configuration_settings_count },
        conditions = { header.configuration_conditions_count },
        "record counts"
    );

    let mut bytes = Vec::with_capacity(HEADER_SIZE + tables.record_len() + strings.len() + 2);
    bytes.extend_from_slice(&header.to_salted_bytes());
    for records in tables.record_bytes() {
        bytes.extend_from_slice(records);
    }
    bytes.extend_from_slice(&strings.finish());
    Ok(InfoBlob { header, bytes })
}

/// A complete, emitted info database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoBlob {
    header: Header,
    bytes: Vec<u8>,
}

impl InfoBlob {
    /// Unsalted header
    pub fn header(&self) -> &Header {
        &self.header
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn write_to<W: Write>(&self, mut output: W) -> io::Result<()> {
        output.write_all(&self.bytes)?;
        output.flush()
    }

    /// Open the blob for reading
    pub fn open(&self) -> Result<InfoDatabase<'_>, LoadError> {
        InfoDatabase::load(&self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::DumpStatus;
    use crate::error::BuildError;
    use std::cell::RefCell;
    use zerocopy::FromZeros;

    fn small() -> DatabaseBuilder<'static> {
        DatabaseBuilder::with_options(BuildOptions {
            progress_interval: Duration::ZERO,
            capacity: CapacityHints::none(),
        })
    }

    fn build_str(xml: &str) -> BuildResult<InfoBlob> {
        small().build(xml.as_bytes())
    }

    #[test]
    fn test_single_machine() {
        let blob = build_str(
            "<mame><machine name=\"foo\"><description>Foo</description></machine></mame>",
        )
        .unwrap();
        assert_eq!({ blob.header().machines_count }, 1);

        let db = blob.open().unwrap();
        let foo = db.machine(0).unwrap();
        assert_eq!(&*foo.name().unwrap(), "foo");
        assert_eq!(&*foo.description().unwrap(), "Foo");
        assert_eq!({ foo.record().clone_of }, ABSENT);
        assert_eq!({ foo.record().rom_of }, ABSENT);
        assert!(foo.clone_of().unwrap().is_none());
    }

    #[test]
    fn test_clone_resolves_to_sorted_index() {
        let blob = build_str(
            "<mame>\
               <machine name=\"second\" cloneof=\"first\"/>\
               <machine name=\"first\"/>\
             </mame>",
        )
        .unwrap();
        let db = blob.open().unwrap();
        let first = db.find_machine("first").unwrap();
        let second = db.find_machine("second").unwrap();
        assert_eq!(first.index(), 0);
        assert_eq!(second.index(), 1);
        assert_eq!({ second.record().clone_of }, 0);
        assert_eq!(&*second.clone_of().unwrap().unwrap().name().unwrap(), "first");
    }

    #[test]
    fn test_empty_and_absent_attributes() {
        let blob = build_str(
            "<mame><machine name=\"abcd\" cloneof=\"\">\
               <rom name=\"a.bin\"/>\
             </machine></mame>",
        )
        .unwrap();
        let db = blob.open().unwrap();
        let machine = db.machine(0).unwrap();
        assert_eq!({ machine.record().clone_of }, ABSENT);
        assert_eq!({ machine.record().description }, 0);
        assert_eq!({ machine.record().sourcefile }, 0);
        assert_eq!(machine.sound_channels(), None);
        assert_eq!(machine.is_bios(), None);
        assert!(machine.runnable());

        let rom = machine.roms().unwrap().get(0).unwrap();
        assert_eq!({ rom.size }, ABSENT);
        assert_eq!({ rom.offset }, ABSENT);
        assert_eq!(rom.crc32, [0; 4]);
        assert_eq!({ rom.merge }, 0);
        assert_eq!(rom.status, DumpStatus::Good as u8);
        assert_eq!(rom.optional, 0);
    }

    #[test]
    fn test_child_ranges() {
        let blob = build_str(
            "<mame build=\"0.1\">\
               <machine name=\"one\">\
                 <dipswitch name=\"d\" mask=\"3\">\
                   <dipvalue name=\"a\" value=\"1\">\
                     <condition tag=\"t\" mask=\"1\" relation=\"eq\" value=\"1\"/>\
                   </dipvalue>\
                   <dipvalue name=\"b\" value=\"2\"/>\
                 </dipswitch>\
                 <device type=\"cartridge\" tag=\"cart\" mandatory=\"1\">\
                   <instance name=\"cartridge\"/><extension name=\"bin\"/><extension name=\"rom\"/>\
                 </device>\
                 <ramoption name=\"16K\" default=\"yes\"> 16384 </ramoption>\
               </machine>\
               <machine name=\"two\"><device type=\"printer\" tag=\"prn\"/></machine>\
             </mame>",
        )
        .unwrap();
        let db = blob.open().unwrap();
        assert_eq!(&*db.build().unwrap(), "0.1");

        let one = db.find_machine("one").unwrap();
        let configurations = one.configurations().unwrap();
        assert_eq!(configurations.len(), 1);
        let dipswitch = configurations.get(0).unwrap();
        assert_eq!({ dipswitch.mask }, 3);

        let settings = db.configuration_settings().subview(dipswitch.settings).unwrap();
        assert_eq!(settings.len(), 2);
        let a = settings.get(0).unwrap();
        let b = settings.get(1).unwrap();
        assert_eq!({ a.conditions.count }, 1);
        assert_eq!({ b.conditions.count }, 0);
        assert_eq!({ b.conditions.start }, 1);
        let condition = db.configuration_conditions().get(0).unwrap();
        assert_eq!(condition.relation, crate::decode::ConditionRelation::Eq as u8);

        let devices = one.devices().unwrap();
        assert_eq!(devices.len(), 1);
        let cart = devices.get(0).unwrap();
        assert_eq!(&*db.string(cart.extensions).unwrap(), "bin,rom,");
        assert_eq!(&*db.string(cart.instance_name).unwrap(), "cartridge");
        assert_eq!(cart.mandatory, 1);

        let ram = one.ram_options().unwrap().get(0).unwrap();
        assert_eq!({ ram.value }, 16384);
        assert_eq!(ram.is_default, 1);

        let two = db.find_machine("two").unwrap();
        let printer = two.devices().unwrap().get(0).unwrap();
        assert_eq!({ printer.extensions }, 0);
        assert_eq!({ two.record().devices.start }, 1);
    }

    #[test]
    fn test_malformed_attribute_fails_build() {
        let err = build_str(
            "<mame><machine name=\"x\">\n\
             <rom name=\"r\" size=\"big\"/>\n\
             <rom name=\"s\" crc=\"12\"/></machine></mame>",
        )
        .unwrap_err();
        let BuildError::Parse(xml) = err else {
            panic!("expected parse error");
        };
        let lines: Vec<String> = xml.diagnostics.iter().map(ToString::to_string).collect();
        assert_eq!(
            lines,
            vec![
                "2:0: Error parsing attribute \"size\" (text=\"big\")",
                "3:0: Error parsing attribute \"crc\" (text=\"12\")",
            ]
        );
    }

    #[test]
    fn test_unknown_tokens_decode_to_zero() {
        let blob = build_str(
            "<mame><machine name=\"x\">\
               <feature type=\"hologram\" status=\"unemulated\"/>\
             </machine></mame>",
        )
        .unwrap();
        let db = blob.open().unwrap();
        let feature = db.features().get(0).unwrap();
        assert_eq!(feature.kind, 0);
        assert_eq!(feature.status, crate::decode::FeatureQuality::Unemulated as u8);
    }

    #[test]
    fn test_progress_reports_completed_machines() {
        let seen = RefCell::new(Vec::new());
        let blob = DatabaseBuilder::with_options(BuildOptions {
            progress_interval: Duration::ZERO,
            capacity: CapacityHints::none(),
        })
        .on_progress(|p| {
            seen.borrow_mut()
                .push((p.machines, p.name.to_string(), p.description.to_string()))
        })
        .build(
            &b"<mame><machine name=\"b\"><description>Bee</description></machine>\
               <machine name=\"a\"/></mame>"[..],
        )
        .unwrap();
        assert_eq!({ blob.header().machines_count }, 2);
        assert_eq!(
            seen.into_inner(),
            vec![(1, "b".to_string(), "Bee".to_string()), (2, "a".to_string(), String::new())]
        );
    }

    #[test]
    fn test_duplicate_names_resolve_to_first() {
        let mut strings = StringTable::new();
        let dup = strings.intern(b"dup").unwrap();
        let other = strings.intern(b"zzz").unwrap();
        let machine = |name, clone_of| Machine {
            name,
            clone_of,
            ..Machine::new_zeroed()
        };
        let mut machines = vec![machine(other, dup), machine(dup, 0), machine(dup, 0)];
        resolve_references(&mut machines, &strings).unwrap();
        assert_eq!({ machines[2].name }, other);
        assert_eq!({ machines[2].clone_of }, 0);
        assert_eq!({ machines[0].clone_of }, ABSENT);
    }

    #[test]
    fn test_invalid_utf8_fails_build() {
        let input = b"<mame>\n<machine name=\"ab\xff\xfecd\"/></mame>";
        let err = small().build(&input[..]).unwrap_err();
        assert_eq!(err.to_string(), "2:17: not well-formed (invalid token)");
    }

    #[test]
    fn test_garbage_input_fails() {
        let err = build_str("not xml").unwrap_err();
        assert!(!err.to_string().is_empty());
    }
}
