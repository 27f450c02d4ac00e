#![deny(unsafe_code)]

//! evloop core: a batch record-processing event loop.
//!
//! An [`EventLoop`] drives an ordered [`ToolChain`] over every record of a
//! [`DataSource`], one record at a time. Each tool is initialized once,
//! executed once per record, and finalized once; results accumulate in a
//! single [`OutputStore`] that is written at the end of the run. A tool can
//! trip its [`Watchdog`] to skip the remaining tools for the current record.
//!
//! ```no_run
//! use evloop_core::{Counter, EventLoop, MemorySource, Record, ToolChain};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let chain = ToolChain::new().with(Counter::new("all"))?;
//! let source = MemorySource::new(vec![Record::new(); 10]);
//! let report = EventLoop::new(source, chain).with_output("histos.json").run(-1)?;
//! assert_eq!(report.processed, 10);
//! # Ok(())
//! # }
//! ```

/// Compile-time build metadata.
pub mod build_info;
/// Built-in tools constructible from configuration.
pub mod builtin;
/// Ordered tool registry.
pub mod chain;
/// Per-record context shared by the tool chain.
pub mod context;
/// Type-state event loop (`Uninitialized → Initialized → Finalized`).
pub mod engine;
/// In-memory log capture for run summaries.
pub mod logging;
/// Progress reporting sinks.
pub mod progress;
/// JSON records.
pub mod record;
/// Record sources and cursors.
pub mod source;
/// Output store and histograms.
pub mod store;
/// Tool trait, slots, status and watchdog.
pub mod tool;

pub use build_info::BuildInfo;
pub use builtin::{Counter, HistogramFill, Select};
pub use chain::{ChainError, ToolChain};
pub use context::Context;
pub use engine::{
    EngineError, EngineOptions, EventLoop, Finalized, Initialized, RecordLimit, RunReport,
    Uninitialized,
};
pub use logging::{LogCollector, LogEntry, LogReader};
pub use progress::{LogProgress, NoProgress, ProgressSink};
pub use record::{Record, RecordError};
pub use source::{DataSource, JsonLinesSource, MemorySource, RecordCursor, SourceError};
pub use store::{Histogram, HistogramStore, OutputStore, StoreError};
pub use tool::{Tool, ToolError, ToolScope, ToolSlot, ToolStatus, Watchdog};
