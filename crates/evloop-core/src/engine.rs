//! Event loop engine: drives the tool chain over every record.
//!
//! The lifecycle `Uninitialized → Initialized → Finalized` is enforced at
//! compile time: each phase consumes the engine and returns it in the next
//! state, so records cannot be processed before initialization and nothing
//! can run after finalization.
//!
//! ```text
//! EventLoop<Uninitialized>
//!     → .initialize()   // open source, build context + store, init tools
//!         → EventLoop<Initialized>
//!             → .execute()    // process(entry) for every retained record
//!             → .finalize()   // finalize tools, write store, release
//!                 → EventLoop<Finalized>
//! ```
//!
//! Failure policy: a source that cannot be opened or a tool that fails to
//! initialize aborts the run. Tool failures while executing or finalizing
//! are logged, counted in the [`RunReport`], and the run carries on.

use std::fmt;

use tracing::{debug, error, info};

use evloop_config::AppConfig;

use crate::builtin;
use crate::chain::{ChainError, ToolChain};
use crate::context::Context;
use crate::progress::{LogProgress, NoProgress, ProgressSink};
use crate::source::{DataSource, JsonLinesSource, SourceError};
use crate::store::{HistogramStore, OutputStore, StoreError};
use crate::tool::ToolError;

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to open data source: {0}")]
    Source(#[from] SourceError),

    #[error("failed to initialize tool '{tool}': {source}")]
    ToolInitialize {
        tool: String,
        #[source]
        source: ToolError,
    },

    #[error("failed to write output store: {0}")]
    Store(#[from] StoreError),

    #[error("invalid tool chain: {0}")]
    Chain(#[from] ChainError),
}

/// Upper bound on the number of records processed by [`execute`](EventLoop::execute).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordLimit {
    /// Process every record.
    #[default]
    Unlimited,
    /// Process at most this many records.
    AtMost(u64),
}

impl RecordLimit {
    /// Whether another record may be processed after `processed` records.
    pub fn allows(self, processed: u64) -> bool {
        match self {
            RecordLimit::Unlimited => true,
            RecordLimit::AtMost(max) => processed < max,
        }
    }

    /// How many of `total` records will be processed.
    pub fn planned(self, total: u64) -> u64 {
        match self {
            RecordLimit::Unlimited => total,
            RecordLimit::AtMost(max) => max.min(total),
        }
    }
}

/// `nov`-style limits: negative means no limit.
impl From<i64> for RecordLimit {
    fn from(nov: i64) -> Self {
        u64::try_from(nov).map_or(RecordLimit::Unlimited, RecordLimit::AtMost)
    }
}

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Label used in logs and reports.
    pub name: String,
    /// Record limit applied by `execute`.
    pub limit: RecordLimit,
    /// Suppress progress reports.
    pub mute_progress: bool,
    /// Destination of the default output store.
    pub output: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            name: "evloop".to_string(),
            limit: RecordLimit::Unlimited,
            mute_progress: false,
            output: "histos.json".to_string(),
        }
    }
}

impl EngineOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            name: config.engine.name.clone(),
            limit: config.engine.nov.into(),
            mute_progress: config.engine.mute_progress,
            output: config.output.file.clone(),
        }
    }
}

/// Counters describing a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub engine: String,
    pub total_records: u64,
    pub processed: u64,
    pub watchdog_trips: u64,
    pub execute_failures: u64,
    pub load_failures: u64,
    pub finalize_failures: u64,
    pub destination: String,
}

impl RunReport {
    /// Whether any recoverable failure was absorbed during the run.
    pub fn has_failures(&self) -> bool {
        self.execute_failures + self.load_failures + self.finalize_failures > 0
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: processed {}/{} records, {} watchdog trips, {} execute failures, \
             {} unreadable records, {} finalize failures, output {}",
            self.engine,
            self.processed,
            self.total_records,
            self.watchdog_trips,
            self.execute_failures,
            self.load_failures,
            self.finalize_failures,
            self.destination
        )
    }
}

/// Engine built but not yet initialized. The tool chain may still change.
pub struct Uninitialized {
    source: Box<dyn DataSource>,
    store: Option<Box<dyn OutputStore>>,
    progress: Option<Box<dyn ProgressSink>>,
}

/// Engine with an open source, a context, a store, and initialized tools.
pub struct Initialized {
    session: Session,
    progress: Box<dyn ProgressSink>,
    report: RunReport,
}

/// Engine after finalization. Only the report and the chain remain.
pub struct Finalized {
    report: RunReport,
}

/// Resources acquired by `initialize` and released when dropped, whichever
/// way the run ends.
struct Session {
    context: Context,
    store: Box<dyn OutputStore>,
}

impl Drop for Session {
    fn drop(&mut self) {
        debug!(
            destination = %self.store.destination(),
            entry = self.context.entry(),
            "Released event loop resources"
        );
    }
}

/// The event loop, parameterized by its lifecycle state.
pub struct EventLoop<S> {
    options: EngineOptions,
    chain: ToolChain,
    state: S,
}

impl<S> EventLoop<S> {
    pub fn name(&self) -> &str {
        &self.options.name
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn chain(&self) -> &ToolChain {
        &self.chain
    }
}

impl EventLoop<Uninitialized> {
    /// Create an engine over `source` running `chain`, with default options.
    pub fn new(source: impl DataSource + 'static, chain: ToolChain) -> Self {
        Self {
            options: EngineOptions::default(),
            chain,
            state: Uninitialized {
                source: Box::new(source),
                store: None,
                progress: None,
            },
        }
    }

    /// Build an engine from configuration: JSON-lines inputs and the
    /// built-in tools declared under `[[tools]]`.
    pub fn from_config(config: &AppConfig) -> Result<Self, EngineError> {
        let mut source = JsonLinesSource::from_specs(&config.input.files);
        if let Some(schema) = &config.input.schema_path {
            source = source.with_schema_path(schema.clone());
        }
        let chain = builtin::chain_from_config(&config.tools)?;
        Ok(Self::new(source, chain).with_options(EngineOptions::from_config(config)))
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.options.name = name.into();
        self
    }

    pub fn with_limit(mut self, limit: impl Into<RecordLimit>) -> Self {
        self.options.limit = limit.into();
        self
    }

    /// Destination of the default store. Ignored when a store is supplied.
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.options.output = output.into();
        self
    }

    pub fn mute_progress(mut self, mute: bool) -> Self {
        self.options.mute_progress = mute;
        self
    }

    /// Use an externally created store instead of the default one.
    pub fn with_store(mut self, store: impl OutputStore + 'static) -> Self {
        self.state.store = Some(Box::new(store));
        self
    }

    /// Report progress to `progress` (unless progress is muted).
    pub fn with_progress(mut self, progress: impl ProgressSink + 'static) -> Self {
        self.state.progress = Some(Box::new(progress));
        self
    }

    /// The chain can still be modified before initialization.
    pub fn chain_mut(&mut self) -> &mut ToolChain {
        &mut self.chain
    }

    /// Open the source, build the context and store, and initialize every
    /// enabled tool in order.
    ///
    /// Stops at the first tool that fails to initialize; later tools are
    /// left untouched and every acquired resource is released.
    pub fn initialize(self) -> Result<EventLoop<Initialized>, EngineError> {
        let EventLoop {
            options,
            mut chain,
            state,
        } = self;
        info!(engine = %options.name, source = %state.source.describe(), "Initializing event loop");

        let cursor = state.source.open()?;
        let context = Context::new(cursor);
        let total_records = context.total_records();

        let store = match state.store {
            Some(store) => {
                info!(
                    destination = %store.destination(),
                    "Output store was supplied by the caller, reusing it"
                );
                store
            }
            None => {
                info!(destination = %options.output, "Creating output store");
                Box::new(HistogramStore::new(options.output.clone())) as Box<dyn OutputStore>
            }
        };
        let mut session = Session { context, store };

        info!(tools = chain.enabled(), "Initializing all tools");
        for slot in chain.iter_mut() {
            if !slot.is_enabled() {
                debug!(tool = %slot.name(), "Tool is disabled, skipping");
                continue;
            }
            if slot.is_initialized() {
                debug!(tool = %slot.name(), "Tool already initialized");
                continue;
            }
            if let Err(source) = slot.initialize(&session.context, session.store.as_mut()) {
                error!(tool = %slot.name(), error = %source, "Impossible to initialize tool");
                return Err(EngineError::ToolInitialize {
                    tool: slot.name().to_string(),
                    source,
                });
            }
        }

        let progress: Box<dyn ProgressSink> = match state.progress {
            _ if options.mute_progress => Box::new(NoProgress),
            Some(progress) => progress,
            None => Box::new(LogProgress::new(options.name.clone())),
        };
        let report = RunReport {
            engine: options.name.clone(),
            total_records,
            destination: session.store.destination().to_string(),
            ..RunReport::default()
        };

        Ok(EventLoop {
            options,
            chain,
            state: Initialized {
                session,
                progress,
                report,
            },
        })
    }

    /// Set the record limit, then initialize, execute, and finalize.
    ///
    /// A fatal initialization error is returned straight away: nothing is
    /// executed and the store is not written.
    pub fn run(self, limit: impl Into<RecordLimit>) -> Result<RunReport, EngineError> {
        let mut engine = self.with_limit(limit).initialize()?;
        engine.execute();
        Ok(engine.finalize()?.into_report())
    }
}

impl EventLoop<Initialized> {
    /// Total records behind the source, fixed at initialization.
    pub fn total_records(&self) -> u64 {
        self.state.report.total_records
    }

    pub fn context(&self) -> &Context {
        &self.state.session.context
    }

    pub fn store(&self) -> &dyn OutputStore {
        self.state.session.store.as_ref()
    }

    /// Counters so far.
    pub fn report(&self) -> &RunReport {
        &self.state.report
    }

    /// Process records in order until the limit or the end of the source.
    /// Returns the number of records processed by this call.
    pub fn execute(&mut self) -> u64 {
        let total = self.total_records();
        let limit = self.options.limit;
        self.state.progress.start(limit.planned(total));

        let mut processed = 0;
        for entry in 0..total {
            if !limit.allows(processed) {
                debug!(?limit, "Record limit reached");
                break;
            }
            self.process(entry);
            processed += 1;
            self.state.progress.advance(processed);
        }

        self.state.progress.finish(processed);
        processed
    }

    /// Load record `entry` into the context and run the chain over it.
    ///
    /// A failing tool does not stop the chain. A tool that trips its
    /// watchdog stops the chain for this record only.
    pub fn process(&mut self, entry: u64) {
        let EventLoop { chain, state, .. } = self;
        let Initialized {
            session, report, ..
        } = state;
        report.processed += 1;

        let loaded = session
            .context
            .set_entry(entry)
            .and_then(|()| session.context.refresh());
        if let Err(e) = loaded {
            error!(entry, error = %e, "Couldn't load record, skipping it");
            report.load_failures += 1;
            return;
        }

        for slot in chain.iter_mut() {
            if !slot.is_enabled() {
                continue;
            }
            if let Err(e) = slot.execute(&mut session.context, session.store.as_mut()) {
                error!(tool = %slot.name(), entry, error = %e, "Tool execution failed");
                report.execute_failures += 1;
            }
            if slot.take_watchdog() {
                debug!(tool = %slot.name(), entry, "Watchdog tripped, skipping remaining tools");
                report.watchdog_trips += 1;
                break;
            }
        }
    }

    /// Finalize every enabled tool, write the store once, and release all
    /// resources.
    ///
    /// Tool finalize failures are logged and counted; the store is written
    /// regardless. A failed store write is returned after the release.
    pub fn finalize(self) -> Result<EventLoop<Finalized>, EngineError> {
        let EventLoop {
            options,
            mut chain,
            state,
        } = self;
        let Initialized {
            mut session,
            mut report,
            ..
        } = state;

        info!(engine = %options.name, "Finalizing all tools");
        for slot in chain.iter_mut() {
            if !slot.is_enabled() || slot.is_finalized() {
                continue;
            }
            if let Err(e) = slot.finalize(session.store.as_mut()) {
                error!(tool = %slot.name(), error = %e, "Tool finalization failed");
                report.finalize_failures += 1;
            }
        }

        info!(destination = %session.store.destination(), "Writing output store");
        let written = session.store.write();
        drop(session);
        written?;

        info!(engine = %options.name, report = %report, "Event loop finished");
        Ok(EventLoop {
            options,
            chain,
            state: Finalized { report },
        })
    }
}

impl EventLoop<Finalized> {
    pub fn report(&self) -> &RunReport {
        &self.state.report
    }

    pub fn into_report(self) -> RunReport {
        self.state.report
    }

    /// Recover the finalized tools.
    pub fn into_chain(self) -> ToolChain {
        self.chain
    }
}
