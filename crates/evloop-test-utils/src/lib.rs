#![deny(unsafe_code)]

//! Shared test utilities for the evloop workspace.
//!
//! Provides recording tools, inspectable stores, dataset fixtures, config
//! builders, and tracing helpers so that individual crate tests stay concise
//! and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! evloop-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod dataset;
pub mod recording;
pub mod store;
pub mod tracing_setup;

pub use config::TestConfigBuilder;
pub use dataset::TestDataset;
pub use recording::{Call, RecordingTool, Trace};
pub use store::{SharedStore, StoreProbe};
pub use tracing_setup::{capture_logs, init_test_tracing};
