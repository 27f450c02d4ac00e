//! Per-record event context shared by every tool in the chain.

use std::collections::HashMap;

use serde_json::Value;

use crate::record::Record;
use crate::source::{RecordCursor, SourceError};

/// The record cursor plus everything derived from the current record.
///
/// The engine positions the context with [`set_entry`](Self::set_entry) and
/// loads the record with [`refresh`](Self::refresh) before running the
/// chain, so during `process(entry)` the context always reflects `entry`.
/// Derived values published by earlier tools are cleared on every move.
pub struct Context {
    cursor: Box<dyn RecordCursor>,
    total: u64,
    entry: u64,
    loaded: bool,
    record: Record,
    derived: HashMap<String, Value>,
}

impl Context {
    /// Bind a context to an opened cursor.
    pub fn new(cursor: Box<dyn RecordCursor>) -> Self {
        let total = cursor.total_records();
        Self {
            cursor,
            total,
            entry: 0,
            loaded: false,
            record: Record::default(),
            derived: HashMap::new(),
        }
    }

    /// Index of the current record.
    pub fn entry(&self) -> u64 {
        self.entry
    }

    /// Total number of records behind the cursor, fixed when it was opened.
    pub fn total_records(&self) -> u64 {
        self.total
    }

    /// Whether the current record has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// The current record. Empty until the first successful refresh.
    pub fn record(&self) -> &Record {
        &self.record
    }

    /// A value published by an earlier tool for the current record.
    pub fn derived(&self, key: &str) -> Option<&Value> {
        self.derived.get(key)
    }

    /// Publish a value for later tools in the chain. Cleared on the next
    /// record.
    pub fn set_derived(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.derived.insert(key.into(), value.into());
    }

    /// Move the cursor to `entry`. The previous record is discarded.
    pub(crate) fn set_entry(&mut self, entry: u64) -> Result<(), SourceError> {
        self.loaded = false;
        self.record = Record::default();
        self.derived.clear();
        self.entry = entry;
        self.cursor.advance(entry)
    }

    /// Load the record at the current position.
    pub(crate) fn refresh(&mut self) -> Result<(), SourceError> {
        self.record = self.cursor.refresh()?;
        self.loaded = true;
        Ok(())
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("entry", &self.entry)
            .field("total", &self.total)
            .field("loaded", &self.loaded)
            .field("derived", &self.derived.len())
            .finish_non_exhaustive()
    }
}
