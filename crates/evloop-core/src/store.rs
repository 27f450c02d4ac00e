//! Output store: where tools accumulate results during a run.
//!
//! The engine owns exactly one store per run. It is created during
//! initialization (or supplied by the caller), lent to tools, and written
//! once at finalization. [`HistogramStore`] is the default implementation:
//! an in-memory map of `/`-separated paths to [`Histogram`]s, written as
//! pretty-printed JSON.

mod histogram;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

pub use histogram::Histogram;

/// Errors from the output store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("histogram already booked: {0}")]
    AlreadyBooked(String),

    #[error("no histogram booked at {0}")]
    NotBooked(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Accumulation sink shared by all tools of a run.
pub trait OutputStore {
    /// Where [`write`](Self::write) persists the content.
    fn destination(&self) -> &str;

    /// Register a histogram under `path`. Fails if the path is taken.
    fn book(&mut self, path: &str, histogram: Histogram) -> Result<(), StoreError>;

    fn histogram(&self, path: &str) -> Option<&Histogram>;

    fn histogram_mut(&mut self, path: &str) -> Option<&mut Histogram>;

    /// All booked paths, sorted.
    fn paths(&self) -> Vec<String>;

    /// Persist the accumulated content.
    fn write(&mut self) -> Result<(), StoreError>;

    /// Fill the histogram at `path` with weight one.
    fn fill(&mut self, path: &str, x: f64) -> Result<(), StoreError> {
        self.histogram_mut(path)
            .ok_or_else(|| StoreError::NotBooked(path.to_string()))?
            .fill(x);
        Ok(())
    }
}

/// Default output store: histograms in memory, JSON on disk.
#[derive(Debug, Clone)]
pub struct HistogramStore {
    destination: String,
    histograms: BTreeMap<String, Histogram>,
}

impl HistogramStore {
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            histograms: BTreeMap::new(),
        }
    }

    pub fn histograms(&self) -> &BTreeMap<String, Histogram> {
        &self.histograms
    }

    /// Read back a file produced by [`write`](OutputStore::write).
    pub fn read(path: impl AsRef<Path>) -> Result<BTreeMap<String, Histogram>, StoreError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

impl OutputStore for HistogramStore {
    fn destination(&self) -> &str {
        &self.destination
    }

    fn book(&mut self, path: &str, histogram: Histogram) -> Result<(), StoreError> {
        if self.histograms.contains_key(path) {
            return Err(StoreError::AlreadyBooked(path.to_string()));
        }
        debug!(path = %path, bins = histogram.bins(), "Booked histogram");
        self.histograms.insert(path.to_string(), histogram);
        Ok(())
    }

    fn histogram(&self, path: &str) -> Option<&Histogram> {
        self.histograms.get(path)
    }

    fn histogram_mut(&mut self, path: &str) -> Option<&mut Histogram> {
        self.histograms.get_mut(path)
    }

    fn paths(&self) -> Vec<String> {
        self.histograms.keys().cloned().collect()
    }

    fn write(&mut self) -> Result<(), StoreError> {
        let path = Path::new(&self.destination);
        let io_error = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let mut writer = BufWriter::new(File::create(path).map_err(io_error)?);
        serde_json::to_writer_pretty(&mut writer, &self.histograms)?;
        writer.flush().map_err(io_error)?;
        debug!(destination = %self.destination, histograms = self.histograms.len(), "Wrote output store");
        Ok(())
    }
}
