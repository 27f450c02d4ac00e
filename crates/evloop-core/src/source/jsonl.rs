//! JSON-lines source: several files read as one logical record sequence.
//!
//! Files are indexed when the source is opened (byte offset of every
//! non-blank line) and decoded lazily as the cursor moves, so only one line
//! is held in memory at a time.

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use super::{DataSource, RecordCursor, SourceError, expand_inputs};
use crate::record::{Record, RecordError, json_kind};

/// One or more JSON-lines files, concatenated in order.
///
/// An optional schema path selects the record object inside each line:
/// with `schema_path = "*/events"`, the line
/// `{"run42": {"events": {"pt": 20.1}}}` yields the record `{"pt": 20.1}`.
/// A `*` component stands for the first key (in key order) of the object
/// at that level in the file's first line; the resolved path is then used
/// for every line of that file.
#[derive(Debug, Clone)]
pub struct JsonLinesSource {
    inputs: Vec<PathBuf>,
    schema_path: Option<String>,
}

impl JsonLinesSource {
    /// Create a source over explicit file paths.
    pub fn new<P: Into<PathBuf>>(inputs: impl IntoIterator<Item = P>) -> Self {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            schema_path: None,
        }
    }

    /// Create a source from input specs, expanding comma-separated lists and
    /// directories (see [`expand_inputs`]).
    pub fn from_specs<S: AsRef<str>>(specs: &[S]) -> Self {
        Self::new(expand_inputs(specs))
    }

    /// Select the record object inside each line.
    pub fn with_schema_path(mut self, schema_path: impl Into<String>) -> Self {
        self.schema_path = Some(schema_path.into());
        self
    }

    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    pub fn schema_path(&self) -> Option<&str> {
        self.schema_path.as_deref()
    }

    /// Index one input. `Ok(None)` means the input is skipped.
    fn index_file(&self, path: &Path) -> Result<Option<IndexedFile>, SourceError> {
        let handle = match File::open(path) {
            Ok(handle) => handle,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Couldn't open input file");
                return Ok(None);
            }
        };

        let mut reader = BufReader::new(handle);
        let mut offsets = Vec::new();
        let mut first_line: Option<Vec<u8>> = None;
        let mut line = Vec::new();
        let mut offset = 0u64;
        loop {
            line.clear();
            let read = match reader.read_until(b'\n', &mut line) {
                Ok(read) => read,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Couldn't read input file");
                    return Ok(None);
                }
            };
            if read == 0 {
                break;
            }
            if !is_blank(&line) {
                offsets.push(offset);
                if first_line.is_none() {
                    first_line = Some(line.clone());
                }
            }
            offset += read as u64;
        }

        let keys = match (&self.schema_path, first_line) {
            (Some(schema), Some(first)) => {
                let value: Value = match serde_json::from_slice(&first) {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Couldn't decode first line, skipping input");
                        return Ok(None);
                    }
                };
                match resolve_schema(&value, schema) {
                    Ok(Some(keys)) => keys,
                    Ok(None) => {
                        warn!(path = %path.display(), schema = %schema, "Couldn't find schema path, skipping input");
                        return Ok(None);
                    }
                    Err(found) => {
                        return Err(SourceError::SchemaNotObject {
                            path: path.to_path_buf(),
                            schema: schema.clone(),
                            found,
                        });
                    }
                }
            }
            _ => Vec::new(),
        };

        debug!(path = %path.display(), records = offsets.len(), "Adding input file");
        Ok(Some(IndexedFile {
            path: path.to_path_buf(),
            offsets,
            keys,
            start: 0,
        }))
    }
}

impl DataSource for JsonLinesSource {
    fn describe(&self) -> String {
        format!("{} JSON-lines input(s)", self.inputs.len())
    }

    fn open(&self) -> Result<Box<dyn RecordCursor>, SourceError> {
        let mut files = Vec::new();
        let mut usable = 0usize;
        let mut total = 0u64;
        for path in &self.inputs {
            let Some(mut file) = self.index_file(path)? else {
                continue;
            };
            usable += 1;
            if file.offsets.is_empty() {
                continue;
            }
            file.start = total;
            total += file.offsets.len() as u64;
            files.push(file);
        }

        if usable == 0 {
            return Err(SourceError::NoUsableInput {
                requested: self.inputs.len(),
            });
        }

        info!(
            inputs = usable,
            skipped = self.inputs.len() - usable,
            records = total,
            "Opened JSON-lines source"
        );
        Ok(Box::new(JsonLinesCursor {
            files,
            total,
            position: None,
            reader: None,
            line: Vec::new(),
        }))
    }
}

/// Lines holding only whitespace carry no record. Checked on bytes so that
/// a line with invalid UTF-8 is still indexed and fails on its own.
fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

/// Walk `schema` through `value`, expanding `*` components.
///
/// `Ok(None)` if a component is missing, `Err(kind)` if the path ends on
/// something other than an object.
fn resolve_schema(value: &Value, schema: &str) -> Result<Option<Vec<String>>, &'static str> {
    let mut current = value;
    let mut keys = Vec::new();
    for component in schema.split('/').filter(|c| !c.is_empty()) {
        let Some(object) = current.as_object() else {
            return Ok(None);
        };
        let key = if component == "*" {
            match object.keys().next() {
                Some(key) => key.clone(),
                None => return Ok(None),
            }
        } else {
            component.to_string()
        };
        let Some(next) = object.get(&key) else {
            return Ok(None);
        };
        current = next;
        keys.push(key);
    }
    if current.is_object() {
        Ok(Some(keys))
    } else {
        Err(json_kind(current))
    }
}

#[derive(Debug)]
struct IndexedFile {
    path: PathBuf,
    offsets: Vec<u64>,
    /// Resolved schema path.
    keys: Vec<String>,
    /// Global index of this file's first record.
    start: u64,
}

/// Cursor over indexed JSON-lines files.
#[derive(Debug)]
pub struct JsonLinesCursor {
    files: Vec<IndexedFile>,
    total: u64,
    position: Option<(usize, usize)>,
    /// Open reader: file index, reader, byte position.
    reader: Option<(usize, BufReader<File>, u64)>,
    line: Vec<u8>,
}

impl RecordCursor for JsonLinesCursor {
    fn total_records(&self) -> u64 {
        self.total
    }

    fn advance(&mut self, index: u64) -> Result<(), SourceError> {
        if index >= self.total {
            return Err(SourceError::OutOfRange {
                index,
                total: self.total,
            });
        }
        let file = self.files.partition_point(|f| f.start <= index) - 1;
        let local = (index - self.files[file].start) as usize;
        self.position = Some((file, local));
        Ok(())
    }

    fn refresh(&mut self) -> Result<Record, SourceError> {
        let (file_idx, local) = self.position.ok_or(SourceError::NotPositioned)?;
        let file = &self.files[file_idx];
        let offset = file.offsets[local];
        let io_error = |source| SourceError::Io {
            path: file.path.clone(),
            source,
        };

        if !matches!(self.reader, Some((idx, _, _)) if idx == file_idx) {
            let handle = File::open(&file.path).map_err(io_error)?;
            self.reader = Some((file_idx, BufReader::new(handle), 0));
        }
        let Some((_, reader, pos)) = self.reader.as_mut() else {
            return Err(SourceError::NotPositioned);
        };
        if *pos != offset {
            reader.seek(SeekFrom::Start(offset)).map_err(io_error)?;
        }
        self.line.clear();
        let read = reader.read_until(b'\n', &mut self.line).map_err(io_error)?;
        *pos = offset + read as u64;

        let decode_error = |source| SourceError::Decode {
            path: file.path.clone(),
            offset,
            source,
        };
        let mut value: Value = serde_json::from_slice(&self.line)
            .map_err(|e| decode_error(RecordError::Json(e)))?;
        for key in &file.keys {
            value = match value {
                Value::Object(mut object) => object.remove(key),
                _ => None,
            }
            .ok_or_else(|| SourceError::MissingSchema {
                path: file.path.clone(),
                offset,
                schema: file.keys.join("/"),
            })?;
        }
        Record::try_from(value).map_err(decode_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn numbers(cursor: &mut Box<dyn RecordCursor>, field: &str) -> Vec<f64> {
        (0..cursor.total_records())
            .map(|i| {
                cursor.advance(i).unwrap();
                cursor.refresh().unwrap().number(field).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_concatenates_inputs_in_order() {
        let tmp = TempDir::new().unwrap();
        let a = write(&tmp, "a.jsonl", "{\"x\": 1}\n\n{\"x\": 2}\n");
        let b = write(&tmp, "b.jsonl", "{\"x\": 3}");

        let mut cursor = JsonLinesSource::new([a, b]).open().unwrap();
        assert_eq!(cursor.total_records(), 3);
        assert_eq!(numbers(&mut cursor, "x"), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_random_access() {
        let tmp = TempDir::new().unwrap();
        let a = write(&tmp, "a.jsonl", "{\"x\": 1}\n{\"x\": 2}\n");
        let b = write(&tmp, "b.jsonl", "{\"x\": 3}\n{\"x\": 4}\n");
        let mut cursor = JsonLinesSource::new([a, b]).open().unwrap();

        for (index, expected) in [(3, 4.0), (0, 1.0), (2, 3.0), (1, 2.0), (1, 2.0)] {
            cursor.advance(index).unwrap();
            assert_eq!(cursor.refresh().unwrap().number("x"), Some(expected));
        }
    }

    #[test]
    fn test_missing_inputs_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let a = write(&tmp, "a.jsonl", "{\"x\": 1}\n");
        let source = JsonLinesSource::new([tmp.path().join("missing.jsonl"), a]);
        assert_eq!(source.describe(), "2 JSON-lines input(s)");
        assert_eq!(source.open().unwrap().total_records(), 1);
    }

    #[test]
    fn test_no_usable_input_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let Err(err) = JsonLinesSource::new([tmp.path().join("missing.jsonl")]).open() else {
            panic!("expected an error");
        };
        assert!(matches!(err, SourceError::NoUsableInput { requested: 1 }));

        let none: [PathBuf; 0] = [];
        assert!(JsonLinesSource::new(none).open().is_err());
    }

    #[test]
    fn test_empty_file_is_usable() {
        let tmp = TempDir::new().unwrap();
        let empty = write(&tmp, "empty.jsonl", "");
        let cursor = JsonLinesSource::new([empty]).open().unwrap();
        assert_eq!(cursor.total_records(), 0);
    }

    #[test]
    fn test_schema_path_with_wildcard() {
        let tmp = TempDir::new().unwrap();
        let a = write(
            &tmp,
            "a.jsonl",
            "{\"run7\": {\"events\": {\"pt\": 10}}}\n{\"run7\": {\"events\": {\"pt\": 20}}}\n",
        );
        let b = write(&tmp, "b.jsonl", "{\"run8\": {\"events\": {\"pt\": 30}}}\n");

        let mut cursor = JsonLinesSource::new([a, b])
            .with_schema_path("*/events")
            .open()
            .unwrap();
        assert_eq!(numbers(&mut cursor, "pt"), vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_schema_path_missing_skips_input() {
        let tmp = TempDir::new().unwrap();
        let a = write(&tmp, "a.jsonl", "{\"other\": {}}\n");
        let b = write(&tmp, "b.jsonl", "{\"events\": {\"pt\": 5}}\n");

        let mut cursor = JsonLinesSource::new([a, b])
            .with_schema_path("events")
            .open()
            .unwrap();
        assert_eq!(numbers(&mut cursor, "pt"), vec![5.0]);
    }

    #[test]
    fn test_schema_path_to_scalar_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let a = write(&tmp, "a.jsonl", "{\"events\": 3}\n");
        let Err(err) = JsonLinesSource::new([a]).with_schema_path("events").open() else {
            panic!("expected an error");
        };
        assert!(matches!(err, SourceError::SchemaNotObject { found: "a number", .. }));
    }

    #[test]
    fn test_bad_line_fails_only_that_record() {
        let tmp = TempDir::new().unwrap();
        let a = write(&tmp, "a.jsonl", "{\"x\": 1}\nnot json\n{\"x\": 3}\n");
        let mut cursor = JsonLinesSource::new([a]).open().unwrap();

        cursor.advance(1).unwrap();
        assert!(matches!(cursor.refresh(), Err(SourceError::Decode { .. })));
        cursor.advance(2).unwrap();
        assert_eq!(cursor.refresh().unwrap().number("x"), Some(3.0));
    }

    #[test]
    fn test_invalid_utf8_fails_only_that_record() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a.jsonl");
        std::fs::write(&a, b"{\"x\":1}\n{\"x\":2}\n{\"s\":\"\xff\"}\n{\"x\":4}\n").unwrap();
        let b = write(&tmp, "b.jsonl", "{\"x\":9}\n");

        let mut cursor = JsonLinesSource::new([a, b]).open().unwrap();
        assert_eq!(cursor.total_records(), 5);

        cursor.advance(2).unwrap();
        assert!(matches!(cursor.refresh(), Err(SourceError::Decode { .. })));
        for (index, expected) in [(0, 1.0), (1, 2.0), (3, 4.0), (4, 9.0)] {
            cursor.advance(index).unwrap();
            assert_eq!(cursor.refresh().unwrap().number("x"), Some(expected));
        }
    }

    #[test]
    fn test_blank_lines_are_not_records() {
        assert!(is_blank(b" \t\r\n"));
        assert!(is_blank(b""));
        assert!(!is_blank(b"{}\n"));
        assert!(!is_blank(b"\xff\n"));
    }

    #[test]
    fn test_resolve_schema() {
        let value = json!({"b": {"inner": {}}, "a": {"inner": 1}});
        assert_eq!(resolve_schema(&value, "b/inner"), Ok(Some(vec!["b".to_string(), "inner".to_string()])));
        assert_eq!(resolve_schema(&value, "*/inner"), Err("a number"));
        assert_eq!(resolve_schema(&value, "c"), Ok(None));
        assert_eq!(resolve_schema(&value, ""), Ok(Some(vec![])));
    }
}
