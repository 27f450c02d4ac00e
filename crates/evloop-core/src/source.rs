//! Data sources: where the ordered record sequence comes from.
//!
//! A [`DataSource`] is opened once per run into a [`RecordCursor`]. The
//! cursor reports a fixed total record count and loads records on demand:
//! [`advance`](RecordCursor::advance) positions it, and
//! [`refresh`](RecordCursor::refresh) decodes the record at that position.
//!
//! Two sources ship with the crate:
//!
//! - [`MemorySource`]: records held in memory.
//! - [`JsonLinesSource`]: one or more JSON-lines files concatenated into a
//!   single logical sequence. Inputs that cannot be opened are skipped; the
//!   source only fails to open when no input is usable at all.

mod jsonl;
mod memory;

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::record::{Record, RecordError};

pub use jsonl::{JsonLinesCursor, JsonLinesSource};
pub use memory::{MemoryCursor, MemorySource};

/// Errors from opening a source or loading a record.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("no usable input among {requested} requested")]
    NoUsableInput { requested: usize },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("schema path '{schema}' in {} is {found}, not an object", path.display())]
    SchemaNotObject {
        path: PathBuf,
        schema: String,
        found: &'static str,
    },

    #[error("record at byte {offset} of {} has no '{schema}'", path.display())]
    MissingSchema {
        path: PathBuf,
        offset: u64,
        schema: String,
    },

    #[error("record at byte {offset} of {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        offset: u64,
        #[source]
        source: RecordError,
    },

    #[error("record {index} is out of range (total {total})")]
    OutOfRange { index: u64, total: u64 },

    #[error("cursor has not been positioned")]
    NotPositioned,
}

/// Something that can be opened into a record cursor.
pub trait DataSource {
    /// Short human-readable description for logs.
    fn describe(&self) -> String;

    /// Open the source. Fails only if no usable cursor can be produced.
    fn open(&self) -> Result<Box<dyn RecordCursor>, SourceError>;
}

/// A positioned view over an ordered record sequence.
pub trait RecordCursor: fmt::Debug {
    /// Total number of records. Fixed for the lifetime of the cursor.
    fn total_records(&self) -> u64;

    /// Move to `index`.
    fn advance(&mut self, index: u64) -> Result<(), SourceError>;

    /// Load the record at the current position.
    fn refresh(&mut self) -> Result<Record, SourceError>;
}

/// Expand a list of input specs into concrete file paths.
///
/// Each entry may be a comma-separated list. Directories expand to the
/// regular files they contain, sorted by name; unreadable directories are
/// skipped with a warning. Blank items are ignored.
pub fn expand_inputs<S: AsRef<str>>(entries: &[S]) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for item in entries
        .iter()
        .flat_map(|entry| entry.as_ref().split(','))
        .map(str::trim)
        .filter(|item| !item.is_empty())
    {
        let path = Path::new(item);
        if path.is_dir() {
            match list_dir(path) {
                Ok(files) => paths.extend(files),
                Err(e) => warn!(path = %path.display(), error = %e, "Couldn't read input directory"),
            }
        } else {
            paths.push(path.to_path_buf());
        }
    }
    paths
}

fn list_dir(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
