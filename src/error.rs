//! Error types for building and loading info databases.
//!
//! All public APIs return `Result` with one of these types; library code does
//! not panic on bad input.

use std::fmt;
use thiserror::Error;

/// Result alias for build operations
pub type BuildResult<T> = std::result::Result<T, BuildError>;

/// One parser diagnostic, reported as `line:column: message`
///
/// Lines are 1-based; columns are 0-based byte offsets within the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: u64,
    pub column: u64,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

/// Aggregated parse failure: every collected diagnostic, one per line
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlError {
    pub diagnostics: Vec<Diagnostic>,
}

impl XmlError {
    /// The first diagnostic, which for structural errors is the fatal one
    pub fn first(&self) -> Option<&Diagnostic> {
        self.diagnostics.first()
    }
}

impl fmt::Display for XmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, diagnostic) in self.diagnostics.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}

impl std::error::Error for XmlError {}

/// Failure of [`crate::DatabaseBuilder::build`]
#[derive(Debug, Error)]
pub enum BuildError {
    /// Malformed or truncated XML, a failed read, or invalid attribute values
    #[error("{0}")]
    Parse(#[from] XmlError),

    /// A count or offset does not fit the 32-bit index space of the format
    #[error("{what} cannot fit in 32 bits")]
    Overflow { what: &'static str },
}

/// Failure to open an info database
#[derive(Debug, Error)]
pub enum LoadError {
    /// Standard I/O error
    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Not enough bytes for a header
    #[error("file is too short to be an info database ({len} bytes)")]
    TooShort { len: usize },

    /// Header magic does not match after unsalting
    #[error("not an info database (bad header magic)")]
    BadMagic,

    /// Record layout differs from the one this reader was compiled with
    #[error("incompatible build: layout hash {found:#018x}, expected {expected:#018x}")]
    IncompatibleLayout { found: u64, expected: u64 },

    /// Header counts describe more record bytes than the file holds
    #[error("truncated database: records need {needed} bytes, {available} available")]
    Truncated { needed: u64, available: u64 },

    /// String table markers are missing or misplaced
    #[error("corrupt string table: {0}")]
    BadStringTable(&'static str),

    /// The database was built by a different emulator version
    #[error("build version mismatch: expected \"{expected}\", found \"{found}\"")]
    VersionMismatch { expected: String, found: String },
}

/// Out-of-range access into a record table or the string table
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("index {index} out of range for {table} (length {len})")]
pub struct RangeError {
    pub table: &'static str,
    pub index: u64,
    pub len: u64,
}
