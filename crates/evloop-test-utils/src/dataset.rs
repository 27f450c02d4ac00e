//! JSON-lines dataset fixtures.
//!
//! A [`TestDataset`] owns a temporary directory; every file written through
//! it is deleted when the dataset is dropped, even on panic.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::TempDir;

pub struct TestDataset {
    dir: TempDir,
}

impl TestDataset {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `records` as one JSON object per line.
    pub fn jsonl(&self, name: &str, records: &[Value]) -> PathBuf {
        let content: String = records.iter().map(|r| format!("{r}\n")).collect();
        self.raw(name, &content)
    }

    /// Write `content` verbatim.
    pub fn raw(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create dataset dir");
        }
        std::fs::write(&path, content).expect("failed to write dataset file");
        path
    }

    /// A path inside the dataset directory for output files.
    pub fn output(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

impl Default for TestDataset {
    fn default() -> Self {
        Self::new()
    }
}
