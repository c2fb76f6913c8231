//! `infodb` - build and inspect info databases
//!
//! ```bash
//! mame -listxml | infodb build --output mame.infodb
//! infodb build --input listxml.xml --output mame.infodb
//! infodb inspect mame.infodb --machine pacman
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::info;

use infodb::{BuildOptions, DatabaseBuilder, InfoDatabase, MachineView};

// ============================================================================
// Allocator Configuration
// ============================================================================

#[cfg(feature = "memory_tracking")]
mod tracking {
    use std::alloc::{GlobalAlloc, Layout};
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub static ALLOCATED: AtomicUsize = AtomicUsize::new(0);
    pub static PEAK_ALLOCATED: AtomicUsize = AtomicUsize::new(0);

    pub struct TrackingAllocator;

    #[cfg(feature = "mimalloc")]
    static UNDERLYING: mimalloc::MiMalloc = mimalloc::MiMalloc;

    #[cfg(not(feature = "mimalloc"))]
    static UNDERLYING: std::alloc::System = std::alloc::System;

    unsafe impl GlobalAlloc for TrackingAllocator {
        unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
            let ptr = UNDERLYING.alloc(layout);
            if !ptr.is_null() {
                let current = ALLOCATED.fetch_add(layout.size(), Ordering::Relaxed) + layout.size();
                PEAK_ALLOCATED.fetch_max(current, Ordering::Relaxed);
            }
            ptr
        }

        unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
            ALLOCATED.fetch_sub(layout.size(), Ordering::Relaxed);
            UNDERLYING.dealloc(ptr, layout)
        }
    }

    pub fn peak() -> usize {
        PEAK_ALLOCATED.load(Ordering::SeqCst)
    }
}

#[cfg(feature = "memory_tracking")]
#[global_allocator]
static GLOBAL: tracking::TrackingAllocator = tracking::TrackingAllocator;

#[cfg(all(feature = "mimalloc", not(feature = "memory_tracking")))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

// ============================================================================
// Command line
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "infodb", version, about = "Compile and inspect emulator info databases")]
struct Cli {
    /// Log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile -listxml output into an info database
    Build(BuildArgs),
    /// Validate a database and print its contents summary
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// -listxml document; `-` reads standard input
    #[arg(short, long, value_name = "FILE", default_value = "-")]
    input: PathBuf,

    /// Database to write
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Minimum milliseconds between progress lines
    #[arg(long, value_name = "MS", default_value_t = 100)]
    progress_ms: u64,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Database to open
    #[arg(value_name = "FILE")]
    database: PathBuf,

    /// Print one machine
    #[arg(short, long, value_name = "NAME")]
    machine: Option<String>,

    /// Fail unless the database was built by this emulator version
    #[arg(long, value_name = "VERSION")]
    expect_build: Option<String>,
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn main() -> ExitCode {
    let cli = Cli::parse();
    infodb::logging::init_with_level(&cli.log_level);

    let result = match &cli.command {
        Command::Build(args) => run_build(args),
        Command::Inspect(args) => run_inspect(args),
    };

    #[cfg(feature = "memory_tracking")]
    eprintln!("peak heap: {:.2} MB", tracking::peak() as f64 / 1_000_000.0);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("infodb: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_build(args: &BuildArgs) -> CliResult {
    let input: Box<dyn Read> = if args.input.as_os_str() == "-" {
        Box::new(io::stdin().lock())
    } else {
        Box::new(File::open(&args.input)?)
    };

    let options = BuildOptions {
        progress_interval: Duration::from_millis(args.progress_ms),
        ..Default::default()
    };
    let blob = DatabaseBuilder::with_options(options)
        .on_progress(|progress| {
            info!(
                machines = progress.machines,
                name = progress.name,
                description = progress.description,
                "progress"
            );
        })
        .build(input)?;

    blob.write_to(BufWriter::new(File::create(&args.output)?))?;
    info!(path = %args.output.display(), bytes = blob.len(), "database written");
    Ok(())
}

fn run_inspect(args: &InspectArgs) -> CliResult {
    let db = InfoDatabase::load_file(&args.database)?;
    if let Some(expected) = &args.expect_build {
        db.verify_build(expected)?;
    }

    let header = *db.header();
    println!("build:                    {}", db.build()?);
    println!("machines:                 {}", { header.machines_count });
    println!("bios sets:                {}", { header.biossets_count });
    println!("roms:                     {}", { header.roms_count });
    println!("disks:                    {}", { header.disks_count });
    println!("devices:                  {}", { header.devices_count });
    println!("slots:                    {}", { header.slots_count });
    println!("slot options:             {}", { header.slot_options_count });
    println!("features:                 {}", { header.features_count });
    println!("chips:                    {}", { header.chips_count });
    println!("displays:                 {}", { header.displays_count });
    println!("samples:                  {}", { header.samples_count });
    println!("configurations:           {}", { header.configurations_count });
    println!("configuration settings:   {}", { header.configuration_settings_count });
    println!("configuration conditions: {}", { header.configuration_conditions_count });
    println!("software lists:           {}", { header.software_lists_count });
    println!("ram options:              {}", { header.ram_options_count });

    if let Some(name) = &args.machine {
        let machine = db
            .find_machine(name)
            .ok_or_else(|| format!("no machine named \"{name}\""))?;
        print_machine(&machine)?;
    }
    Ok(())
}

fn print_machine(machine: &MachineView<'_>) -> CliResult {
    println!();
    println!("{} ({})", machine.name()?, machine.description()?);
    println!("  year:         {}", machine.year()?);
    println!("  manufacturer: {}", machine.manufacturer()?);
    println!("  source:       {}", machine.sourcefile()?);
    if let Some(parent) = machine.clone_of()? {
        println!("  clone of:     {}", parent.name()?);
    }
    if let Some(parent) = machine.rom_of()? {
        println!("  rom of:       {}", parent.name()?);
    }
    println!("  runnable:     {}", machine.runnable());
    println!("  status:       {:?}", machine.quality_status());
    println!("  roms:         {}", machine.roms()?.len());
    println!("  devices:      {}", machine.devices()?.len());
    println!("  dipswitches:  {}", machine.configurations()?.len());
    Ok(())
}
