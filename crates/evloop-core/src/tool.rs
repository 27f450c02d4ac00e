//! Tool contract: the per-record processing units driven by the event loop.
//!
//! A [`Tool`] implements the computation; the [`ToolSlot`] that wraps it
//! when it is registered carries the engine-facing state (status, watchdog,
//! lifecycle flags). Tools never hold on to the [`Context`] or the output
//! store: both are lent to each lifecycle call for its duration only.
//! `initialize` sees the context read-only, before any record is loaded.

use crate::context::Context;
use crate::record::Record;
use crate::store::{OutputStore, StoreError};

/// Whether a registered tool takes part in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolStatus {
    #[default]
    Enable,
    Disable,
}

/// Per-record short-circuit flag.
///
/// A tool trips the watchdog during `execute` to skip every later tool for
/// the current record. The engine resets it as soon as it has been honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Watchdog {
    Enable,
    #[default]
    Disable,
}

/// Errors reported by tools. Only initialize failures are fatal to a run.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{0}")]
    Failed(String),

    #[error("record has no numeric field '{0}'")]
    MissingField(String),

    #[error("output store error: {0}")]
    Store(#[from] StoreError),
}

impl ToolError {
    /// Shorthand for [`ToolError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// A pluggable per-record processing unit.
pub trait Tool {
    /// The unique name of this tool within a chain.
    fn name(&self) -> &str;

    /// Prepare the tool, e.g. book histograms in the output store.
    ///
    /// The context is already open on the data source, so the total record
    /// count is known, but no record has been loaded yet.
    fn initialize(
        &mut self,
        _context: &Context,
        _store: &mut dyn OutputStore,
    ) -> Result<(), ToolError> {
        Ok(())
    }

    /// Process the record currently loaded in the scope's context.
    fn execute(&mut self, scope: &mut ToolScope<'_>) -> Result<(), ToolError>;

    /// Wrap up after the last record.
    fn finalize(&mut self, _store: &mut dyn OutputStore) -> Result<(), ToolError> {
        Ok(())
    }
}

/// Everything a tool may touch while executing one record.
///
/// The borrows end when `execute` returns, so a tool cannot keep the
/// context or the store past the call.
pub struct ToolScope<'a> {
    context: &'a mut Context,
    store: &'a mut dyn OutputStore,
    watchdog: &'a mut Watchdog,
}

impl<'a> ToolScope<'a> {
    pub(crate) fn new(
        context: &'a mut Context,
        store: &'a mut dyn OutputStore,
        watchdog: &'a mut Watchdog,
    ) -> Self {
        Self {
            context,
            store,
            watchdog,
        }
    }

    /// Index of the record being processed.
    pub fn entry(&self) -> u64 {
        self.context.entry()
    }

    /// The record being processed.
    pub fn record(&self) -> &Record {
        self.context.record()
    }

    pub fn context(&self) -> &Context {
        &*self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut *self.context
    }

    pub fn store(&self) -> &dyn OutputStore {
        &*self.store
    }

    pub fn store_mut(&mut self) -> &mut dyn OutputStore {
        &mut *self.store
    }

    /// Skip the remaining tools for this record.
    pub fn trip_watchdog(&mut self) {
        *self.watchdog = Watchdog::Enable;
    }

    pub fn watchdog(&self) -> Watchdog {
        *self.watchdog
    }
}

/// A registered tool plus the state the engine tracks for it.
pub struct ToolSlot {
    name: String,
    tool: Box<dyn Tool>,
    status: ToolStatus,
    watchdog: Watchdog,
    initialized: bool,
    finalized: bool,
}

impl ToolSlot {
    /// Wrap a tool. New slots are enabled and not yet initialized.
    pub fn new(tool: Box<dyn Tool>) -> Self {
        Self {
            name: tool.name().to_string(),
            tool,
            status: ToolStatus::Enable,
            watchdog: Watchdog::Disable,
            initialized: false,
            finalized: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> ToolStatus {
        self.status
    }

    pub fn set_status(&mut self, status: ToolStatus) -> &mut Self {
        self.status = status;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.status == ToolStatus::Enable
    }

    pub fn watchdog(&self) -> Watchdog {
        self.watchdog
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Initialize the tool once. Later calls succeed without touching it.
    pub fn initialize(
        &mut self,
        context: &Context,
        store: &mut dyn OutputStore,
    ) -> Result<(), ToolError> {
        if self.initialized {
            return Ok(());
        }
        self.tool.initialize(context, store)?;
        self.initialized = true;
        Ok(())
    }

    pub(crate) fn execute(
        &mut self,
        context: &mut Context,
        store: &mut dyn OutputStore,
    ) -> Result<(), ToolError> {
        let mut scope = ToolScope::new(context, store, &mut self.watchdog);
        self.tool.execute(&mut scope)
    }

    /// Reset the watchdog, returning whether it had been tripped.
    pub(crate) fn take_watchdog(&mut self) -> bool {
        std::mem::take(&mut self.watchdog) == Watchdog::Enable
    }

    /// Finalize the tool once. The flag is only set when finalize succeeds.
    pub fn finalize(&mut self, store: &mut dyn OutputStore) -> Result<(), ToolError> {
        if self.finalized {
            return Ok(());
        }
        self.tool.finalize(store)?;
        self.finalized = true;
        Ok(())
    }
}

impl std::fmt::Debug for ToolSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSlot")
            .field("name", &self.name)
            .field("status", &self.status)
            .field("watchdog", &self.watchdog)
            .field("initialized", &self.initialized)
            .field("finalized", &self.finalized)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{DataSource, MemorySource};
    use crate::store::HistogramStore;

    struct Flaky {
        fail_init: bool,
        trip_on: Option<u64>,
    }

    impl Tool for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        fn initialize(
            &mut self,
            _context: &Context,
            _store: &mut dyn OutputStore,
        ) -> Result<(), ToolError> {
            if self.fail_init {
                return Err(ToolError::failed("no calibration"));
            }
            Ok(())
        }

        fn execute(&mut self, scope: &mut ToolScope<'_>) -> Result<(), ToolError> {
            if Some(scope.entry()) == self.trip_on {
                scope.trip_watchdog();
            }
            Ok(())
        }
    }

    fn context(records: usize) -> Context {
        Context::new(MemorySource::new(vec![Record::new(); records]).open().unwrap())
    }

    fn flaky(fail_init: bool, trip_on: Option<u64>) -> ToolSlot {
        ToolSlot::new(Box::new(Flaky {
            fail_init,
            trip_on,
        }))
    }

    #[test]
    fn test_new_slot_defaults() {
        let slot = flaky(false, None);
        assert_eq!(slot.name(), "flaky");
        assert_eq!(slot.status(), ToolStatus::Enable);
        assert_eq!(slot.watchdog(), Watchdog::Disable);
        assert!(!slot.is_initialized());
        assert!(!slot.is_finalized());
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let context = context(0);
        let mut store = HistogramStore::new("unused.json");
        let mut slot = flaky(false, None);
        slot.initialize(&context, &mut store).unwrap();
        slot.initialize(&context, &mut store).unwrap();
        assert!(slot.is_initialized());
        assert!(slot.finalize(&mut store).is_ok());
        assert!(slot.is_finalized());
    }

    #[test]
    fn test_failed_initialize_leaves_flag_unset() {
        let mut store = HistogramStore::new("unused.json");
        let mut slot = flaky(true, None);
        let err = slot.initialize(&context(0), &mut store).unwrap_err();
        assert_eq!(err.to_string(), "no calibration");
        assert!(!slot.is_initialized());
    }

    #[test]
    fn test_watchdog_is_taken_once() {
        let mut context = context(2);
        let mut store = HistogramStore::new("unused.json");
        let mut slot = flaky(false, Some(1));

        context.set_entry(0).unwrap();
        slot.execute(&mut context, &mut store).unwrap();
        assert!(!slot.take_watchdog());

        context.set_entry(1).unwrap();
        slot.execute(&mut context, &mut store).unwrap();
        assert_eq!(slot.watchdog(), Watchdog::Enable);
        assert!(slot.take_watchdog());
        assert_eq!(slot.watchdog(), Watchdog::Disable);
        assert!(!slot.take_watchdog());
    }

    #[test]
    fn test_set_status_chains() {
        let mut slot = flaky(false, None);
        assert!(!slot.set_status(ToolStatus::Disable).is_enabled());
    }
}
