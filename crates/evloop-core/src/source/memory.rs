//! In-memory record source.

use serde_json::Value;

use super::{DataSource, RecordCursor, SourceError};
use crate::record::{Record, RecordError};

/// Records held in memory. Each [`open`](DataSource::open) gets its own copy.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: Vec<Record>,
}

impl MemorySource {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Build a source from JSON values. Every value must be an object.
    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Result<Self, RecordError> {
        let records = values
            .into_iter()
            .map(Record::try_from)
            .collect::<Result<_, _>>()?;
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl DataSource for MemorySource {
    fn describe(&self) -> String {
        format!("memory ({} records)", self.records.len())
    }

    fn open(&self) -> Result<Box<dyn RecordCursor>, SourceError> {
        Ok(Box::new(MemoryCursor {
            records: self.records.clone(),
            position: None,
        }))
    }
}

/// Cursor over an in-memory record list.
#[derive(Debug)]
pub struct MemoryCursor {
    records: Vec<Record>,
    position: Option<usize>,
}

impl RecordCursor for MemoryCursor {
    fn total_records(&self) -> u64 {
        self.records.len() as u64
    }

    fn advance(&mut self, index: u64) -> Result<(), SourceError> {
        let total = self.total_records();
        if index >= total {
            return Err(SourceError::OutOfRange { index, total });
        }
        self.position = Some(index as usize);
        Ok(())
    }

    fn refresh(&mut self) -> Result<Record, SourceError> {
        let index = self.position.ok_or(SourceError::NotPositioned)?;
        Ok(self.records[index].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_cursor() {
        let source = MemorySource::from_values([json!({"i": 0}), json!({"i": 1})]).unwrap();
        assert_eq!(source.len(), 2);
        assert_eq!(source.describe(), "memory (2 records)");

        let mut cursor = source.open().unwrap();
        assert_eq!(cursor.total_records(), 2);
        assert!(matches!(cursor.refresh(), Err(SourceError::NotPositioned)));

        cursor.advance(1).unwrap();
        assert_eq!(cursor.refresh().unwrap().number("i"), Some(1.0));
        assert!(cursor.advance(2).is_err());
    }

    #[test]
    fn test_from_values_rejects_scalars() {
        assert!(MemorySource::from_values([json!({}), json!(3)]).is_err());
    }

    #[test]
    fn test_empty_source_opens() {
        let source = MemorySource::default();
        assert!(source.is_empty());
        assert_eq!(source.open().unwrap().total_records(), 0);
    }
}
