//! infodb - compiles emulator `-listxml` catalogs into info databases
//!
//! Pipeline:
//! - `reader` + `core`: chunked input and a memchr-driven XML tokenizer
//! - `schema`: depth-scoped element dispatch, no document tree
//! - `builder`: records, string interning, clone/rom reference fix-up, emission
//! - `database`: validating reader for emitted databases
//!
//! ```no_run
//! let input = std::fs::File::open("listxml.xml")?;
//! let blob = infodb::build(std::io::BufReader::new(input))?;
//! let db = blob.open()?;
//! if let Some(machine) = db.find_machine("pacman") {
//!     println!("{}", machine.description()?);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod binaries;
pub mod builder;
pub mod core;
pub mod database;
pub mod decode;
pub mod error;
pub mod logging;
pub mod reader;
pub mod schema;
pub mod strings;

pub use binaries::{Header, ABSENT};
pub use builder::{
    build, BuildOptions, CapacityHints, DatabaseBuilder, InfoBlob, Progress, ProgressFn,
};
pub use database::{InfoDatabase, MachineView, Table};
pub use error::{BuildError, BuildResult, Diagnostic, LoadError, RangeError, XmlError};
pub use strings::StringTable;
