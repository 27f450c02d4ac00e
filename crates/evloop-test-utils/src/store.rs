//! An output store whose lifecycle can be observed after the engine took it.
//!
//! [`SharedStore`] behaves like a [`HistogramStore`] but never touches the
//! disk: `write()` snapshots the histograms into a [`StoreProbe`] that the
//! test keeps. The probe also tells whether the store has been dropped.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;

use evloop_core::{Histogram, HistogramStore, OutputStore, StoreError};

/// Test-side view of a [`SharedStore`].
#[derive(Debug, Clone, Default)]
pub struct StoreProbe {
    writes: Rc<Cell<usize>>,
    dropped: Rc<Cell<bool>>,
    written: Rc<RefCell<BTreeMap<String, Histogram>>>,
}

impl StoreProbe {
    /// Number of `write()` calls.
    pub fn writes(&self) -> usize {
        self.writes.get()
    }

    /// Whether the store has been released.
    pub fn is_dropped(&self) -> bool {
        self.dropped.get()
    }

    /// Histograms as of the last `write()`.
    pub fn written(&self) -> BTreeMap<String, Histogram> {
        self.written.borrow().clone()
    }
}

/// In-memory store reporting to a [`StoreProbe`].
#[derive(Debug)]
pub struct SharedStore {
    inner: HistogramStore,
    probe: StoreProbe,
    fail_write: bool,
}

impl SharedStore {
    /// Create a store and the probe observing it.
    pub fn new(destination: &str) -> (Self, StoreProbe) {
        let probe = StoreProbe::default();
        let store = Self {
            inner: HistogramStore::new(destination),
            probe: probe.clone(),
            fail_write: false,
        };
        (store, probe)
    }

    /// Make every `write()` fail with an I/O error.
    pub fn failing_write(mut self) -> Self {
        self.fail_write = true;
        self
    }
}

impl OutputStore for SharedStore {
    fn destination(&self) -> &str {
        self.inner.destination()
    }

    fn book(&mut self, path: &str, histogram: Histogram) -> Result<(), StoreError> {
        self.inner.book(path, histogram)
    }

    fn histogram(&self, path: &str) -> Option<&Histogram> {
        self.inner.histogram(path)
    }

    fn histogram_mut(&mut self, path: &str) -> Option<&mut Histogram> {
        self.inner.histogram_mut(path)
    }

    fn paths(&self) -> Vec<String> {
        self.inner.paths()
    }

    fn write(&mut self) -> Result<(), StoreError> {
        self.probe.writes.set(self.probe.writes.get() + 1);
        if self.fail_write {
            return Err(StoreError::Io {
                path: PathBuf::from(self.inner.destination()),
                source: std::io::Error::other("write refused"),
            });
        }
        *self.probe.written.borrow_mut() = self.inner.histograms().clone();
        Ok(())
    }
}

impl Drop for SharedStore {
    fn drop(&mut self) {
        self.probe.dropped.set(true);
    }
}
