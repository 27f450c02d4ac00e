//! Built-in tools constructible from `[[tools]]` declarations.
//!
//! - [`Select`]: numeric cut on one field; rejected records trip the
//!   watchdog so the rest of the chain skips them.
//! - [`HistogramFill`]: fills a fixed-width histogram with one field.
//! - [`Counter`]: counts the records that reach it.

use tracing::debug;

use evloop_config::{CompareOp, ToolConfig, ToolKind};

use crate::chain::{ChainError, ToolChain};
use crate::context::Context;
use crate::store::{Histogram, OutputStore};
use crate::tool::{Tool, ToolError, ToolScope, ToolStatus};

/// Cutflow bin for rejected records.
pub const REJECTED: f64 = 0.0;
/// Cutflow bin for accepted records.
pub const ACCEPTED: f64 = 1.0;

/// Keeps records where `field <op> value`.
///
/// Books `<name>/cutflow` (bin 0 rejected, bin 1 accepted) and publishes
/// the decision as the derived value `<name>`. A record without the field
/// is rejected.
#[derive(Debug, Clone)]
pub struct Select {
    name: String,
    cutflow: String,
    field: String,
    op: CompareOp,
    value: f64,
}

impl Select {
    pub fn new(name: impl Into<String>, field: impl Into<String>, op: CompareOp, value: f64) -> Self {
        let name = name.into();
        Self {
            cutflow: format!("{name}/cutflow"),
            name,
            field: field.into(),
            op,
            value,
        }
    }

    /// Store path of the cutflow histogram.
    pub fn cutflow_path(&self) -> &str {
        &self.cutflow
    }

    /// The cut as written, e.g. `pt > 20`.
    pub fn cut(&self) -> String {
        format!("{} {} {}", self.field, self.op.symbol(), self.value)
    }
}

impl Tool for Select {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self, context: &Context, store: &mut dyn OutputStore) -> Result<(), ToolError> {
        store.book(&self.cutflow, Histogram::new(2, 0.0, 2.0))?;
        debug!(tool = %self.name, cut = %self.cut(), records = context.total_records(), "Booked cutflow");
        Ok(())
    }

    fn execute(&mut self, scope: &mut ToolScope<'_>) -> Result<(), ToolError> {
        let accepted = match scope.record().number(&self.field) {
            Some(x) => self.op.apply(x, self.value),
            None => {
                debug!(tool = %self.name, field = %self.field, entry = scope.entry(), "Field missing, rejecting record");
                false
            }
        };
        scope.context_mut().set_derived(self.name.clone(), accepted);
        scope
            .store_mut()
            .fill(&self.cutflow, if accepted { ACCEPTED } else { REJECTED })?;
        if !accepted {
            scope.trip_watchdog();
        }
        Ok(())
    }
}

/// Fills `<name>` with the value of `field`.
#[derive(Debug, Clone)]
pub struct HistogramFill {
    name: String,
    field: String,
    bins: usize,
    low: f64,
    high: f64,
}

impl HistogramFill {
    pub fn new(name: impl Into<String>, field: impl Into<String>, bins: usize, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
            bins,
            low,
            high,
        }
    }
}

impl Tool for HistogramFill {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self, _context: &Context, store: &mut dyn OutputStore) -> Result<(), ToolError> {
        store.book(&self.name, Histogram::new(self.bins, self.low, self.high))?;
        Ok(())
    }

    fn execute(&mut self, scope: &mut ToolScope<'_>) -> Result<(), ToolError> {
        let x = scope
            .record()
            .number(&self.field)
            .ok_or_else(|| ToolError::MissingField(self.field.clone()))?;
        scope.store_mut().fill(&self.name, x)?;
        Ok(())
    }
}

/// Counts records into a one-bin histogram `<name>`.
#[derive(Debug, Clone)]
pub struct Counter {
    name: String,
}

impl Counter {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Tool for Counter {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self, _context: &Context, store: &mut dyn OutputStore) -> Result<(), ToolError> {
        store.book(&self.name, Histogram::new(1, 0.0, 1.0))?;
        Ok(())
    }

    fn execute(&mut self, scope: &mut ToolScope<'_>) -> Result<(), ToolError> {
        scope.store_mut().fill(&self.name, 0.5)?;
        Ok(())
    }

    fn finalize(&mut self, store: &mut dyn OutputStore) -> Result<(), ToolError> {
        if let Some(histogram) = store.histogram(&self.name) {
            debug!(tool = %self.name, records = histogram.entries(), "Counter finalized");
        }
        Ok(())
    }
}

/// Build the tool a declaration describes.
pub fn from_config(config: &ToolConfig) -> Box<dyn Tool> {
    match &config.kind {
        ToolKind::Select { field, op, value } => {
            Box::new(Select::new(config.name.clone(), field.clone(), *op, *value))
        }
        ToolKind::Histogram {
            field,
            bins,
            low,
            high,
        } => Box::new(HistogramFill::new(
            config.name.clone(),
            field.clone(),
            *bins,
            *low,
            *high,
        )),
        ToolKind::Counter => Box::new(Counter::new(config.name.clone())),
    }
}

/// Build a chain from declarations, in order. Declarations with
/// `enabled = false` are registered disabled.
pub fn chain_from_config(configs: &[ToolConfig]) -> Result<ToolChain, ChainError> {
    let mut chain = ToolChain::new();
    for config in configs {
        let status = if config.enabled {
            ToolStatus::Enable
        } else {
            ToolStatus::Disable
        };
        chain.register_boxed(from_config(config))?.set_status(status);
        debug!(tool = %config.name, kind = config.kind_name(), ?status, "Registered tool");
    }
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EventLoop;
    use crate::record::Record;
    use crate::source::{DataSource, MemorySource};
    use crate::store::HistogramStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn records(values: &[Option<f64>]) -> MemorySource {
        MemorySource::new(
            values
                .iter()
                .map(|v| {
                    let mut record = Record::new();
                    if let Some(v) = v {
                        record.insert("pt", *v);
                    }
                    record
                })
                .collect(),
        )
    }

    fn declare(name: &str, kind: ToolKind) -> ToolConfig {
        ToolConfig {
            name: name.to_string(),
            enabled: true,
            kind,
        }
    }

    #[test]
    fn test_select_cutflow_and_short_circuit() {
        let tmp = TempDir::new().unwrap();
        let output = tmp.path().join("h.json");
        let chain = ToolChain::new()
            .with(Select::new("cut", "pt", CompareOp::Gt, 20.0))
            .and_then(|c| c.with(Counter::new("passed")))
            .unwrap();
        let report = EventLoop::new(records(&[Some(10.0), Some(30.0), None, Some(25.0)]), chain)
            .with_output(output.to_string_lossy())
            .mute_progress(true)
            .run(-1)
            .unwrap();

        assert_eq!(report.watchdog_trips, 2);
        assert_eq!(report.execute_failures, 0);
        let histos = HistogramStore::read(&output).unwrap();
        assert_eq!(histos["cut/cutflow"].counts(), &[2.0, 2.0]);
        assert_eq!(histos["passed"].entries(), 2);
    }

    #[test]
    fn test_histogram_missing_field_is_execute_failure() {
        let tmp = TempDir::new().unwrap();
        let output = tmp.path().join("h.json");
        let chain = ToolChain::new()
            .with(HistogramFill::new("pt", "pt", 10, 0.0, 100.0))
            .unwrap();
        let report = EventLoop::new(records(&[Some(5.0), None, Some(55.0)]), chain)
            .with_output(output.to_string_lossy())
            .mute_progress(true)
            .run(-1)
            .unwrap();

        assert_eq!(report.execute_failures, 1);
        assert_eq!(report.processed, 3);
        let histos = HistogramStore::read(&output).unwrap();
        assert_eq!(histos["pt"].entries(), 2);
        assert_eq!(histos["pt"].count(0), 1.0);
        assert_eq!(histos["pt"].count(5), 1.0);
    }

    #[test]
    fn test_select_publishes_decision() {
        let mut chain = ToolChain::new();
        chain.register(Select::new("cut", "pt", CompareOp::Ge, 1.0)).unwrap();
        let mut engine = EventLoop::new(records(&[Some(1.0)]), chain)
            .mute_progress(true)
            .with_store(HistogramStore::new("unused.json"))
            .initialize()
            .unwrap();
        engine.process(0);
        assert_eq!(engine.context().derived("cut"), Some(&json!(true)));
    }

    #[test]
    fn test_chain_from_config_keeps_order_and_status() {
        let mut disabled = declare("n", ToolKind::Counter);
        disabled.enabled = false;
        let configs = vec![
            declare(
                "cut",
                ToolKind::Select {
                    field: "pt".to_string(),
                    op: CompareOp::Lt,
                    value: 3.0,
                },
            ),
            disabled,
            declare(
                "h",
                ToolKind::Histogram {
                    field: "pt".to_string(),
                    bins: 3,
                    low: 0.0,
                    high: 3.0,
                },
            ),
        ];
        let chain = chain_from_config(&configs).unwrap();
        assert_eq!(chain.names(), vec!["cut", "n", "h"]);
        assert_eq!(chain.enabled(), 2);
        assert!(!chain.get("n").unwrap().is_enabled());
    }

    #[test]
    fn test_chain_from_config_rejects_duplicates() {
        let configs = vec![declare("a", ToolKind::Counter), declare("a", ToolKind::Counter)];
        assert!(matches!(
            chain_from_config(&configs),
            Err(ChainError::Duplicate(name)) if name == "a"
        ));
    }

    #[test]
    fn test_select_describes_cut() {
        assert_eq!(Select::new("cut", "pt", CompareOp::Gt, 20.0).cut(), "pt > 20");
        assert_eq!(Select::new("eta", "eta", CompareOp::Le, 2.5).cut(), "eta <= 2.5");
    }

    #[test]
    fn test_select_books_cutflow() {
        let mut select = Select::new("cut", "pt", CompareOp::Gt, 0.0);
        let context = Context::new(records(&[]).open().unwrap());
        let mut store = HistogramStore::new("unused.json");
        select.initialize(&context, &mut store).unwrap();
        assert_eq!(select.cutflow_path(), "cut/cutflow");
        assert_eq!(store.histogram("cut/cutflow").unwrap().bins(), 2);
    }
}
