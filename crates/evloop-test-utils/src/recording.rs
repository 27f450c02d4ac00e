//! Tools that record every lifecycle call they receive.
//!
//! All [`RecordingTool`]s sharing a [`Trace`] append to the same call log,
//! so a test can assert the exact interleaving of calls across a chain.
//!
//! ```ignore
//! let trace = Trace::new();
//! let chain = ToolChain::new()
//!     .with(RecordingTool::new("A", &trace))?
//!     .with(RecordingTool::new("B", &trace).watchdog_on([1]))?;
//! EventLoop::new(source, chain).run(-1)?;
//! assert_eq!(trace.executions(), ["A0", "B0", "A1", "B1"]);
//! ```

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use evloop_core::{Context, OutputStore, Tool, ToolError, ToolScope};

/// One lifecycle call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Initialize(String),
    Execute(String, u64),
    Finalize(String),
}

impl Call {
    /// Compact label: `init:A`, `A3`, `fin:A`.
    pub fn label(&self) -> String {
        match self {
            Call::Initialize(name) => format!("init:{name}"),
            Call::Execute(name, entry) => format!("{name}{entry}"),
            Call::Finalize(name) => format!("fin:{name}"),
        }
    }
}

/// Shared, ordered call log.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    calls: Rc<RefCell<Vec<Call>>>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Labels of every call, in order.
    pub fn labels(&self) -> Vec<String> {
        self.calls.borrow().iter().map(Call::label).collect()
    }

    /// Labels of execute calls only, in order.
    pub fn executions(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| matches!(c, Call::Execute(..)))
            .map(Call::label)
            .collect()
    }

    /// Number of calls made to `tool`, whatever the phase.
    pub fn calls_to(&self, tool: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| match c {
                Call::Initialize(n) | Call::Finalize(n) | Call::Execute(n, _) => n == tool,
            })
            .count()
    }

    pub fn initializations(&self, tool: &str) -> usize {
        self.count(|c| matches!(c, Call::Initialize(n) if n == tool))
    }

    pub fn finalizations(&self, tool: &str) -> usize {
        self.count(|c| matches!(c, Call::Finalize(n) if n == tool))
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| pred(c)).count()
    }
}

/// A tool that logs its calls to a [`Trace`] and fails or trips its
/// watchdog on demand.
///
/// Every call is recorded before the configured failure is returned, so a
/// failed attempt is still visible in the trace.
#[derive(Debug)]
pub struct RecordingTool {
    name: String,
    trace: Trace,
    fail_init: bool,
    fail_execute_on: HashSet<u64>,
    watchdog_on: HashSet<u64>,
    fail_finalize: bool,
}

impl RecordingTool {
    pub fn new(name: impl Into<String>, trace: &Trace) -> Self {
        Self {
            name: name.into(),
            trace: trace.clone(),
            fail_init: false,
            fail_execute_on: HashSet::new(),
            watchdog_on: HashSet::new(),
            fail_finalize: false,
        }
    }

    pub fn fail_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// Return an error from `execute` for these entries.
    pub fn fail_execute_on(mut self, entries: impl IntoIterator<Item = u64>) -> Self {
        self.fail_execute_on.extend(entries);
        self
    }

    /// Trip the watchdog for these entries.
    pub fn watchdog_on(mut self, entries: impl IntoIterator<Item = u64>) -> Self {
        self.watchdog_on.extend(entries);
        self
    }

    pub fn fail_finalize(mut self) -> Self {
        self.fail_finalize = true;
        self
    }
}

impl Tool for RecordingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(
        &mut self,
        _context: &Context,
        _store: &mut dyn OutputStore,
    ) -> Result<(), ToolError> {
        self.trace.push(Call::Initialize(self.name.clone()));
        if self.fail_init {
            return Err(ToolError::failed(format!("{} refused to initialize", self.name)));
        }
        Ok(())
    }

    fn execute(&mut self, scope: &mut ToolScope<'_>) -> Result<(), ToolError> {
        let entry = scope.entry();
        self.trace.push(Call::Execute(self.name.clone(), entry));
        if self.watchdog_on.contains(&entry) {
            scope.trip_watchdog();
        }
        if self.fail_execute_on.contains(&entry) {
            return Err(ToolError::failed(format!("{} failed on entry {entry}", self.name)));
        }
        Ok(())
    }

    fn finalize(&mut self, _store: &mut dyn OutputStore) -> Result<(), ToolError> {
        self.trace.push(Call::Finalize(self.name.clone()));
        if self.fail_finalize {
            return Err(ToolError::failed(format!("{} refused to finalize", self.name)));
        }
        Ok(())
    }
}
