//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries.

use std::path::Path;

use evloop_config::{AppConfig, CompareOp, ToolConfig, ToolKind};

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .input(&data)
///     .select("cut", "pt", CompareOp::Gt, 20.0)
///     .histogram("pt", "pt", 10, 0.0, 100.0)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        let mut config = AppConfig::default();
        config.engine.mute_progress = true;
        Self { config }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.config.engine.name = name.to_string();
        self
    }

    pub fn nov(mut self, nov: i64) -> Self {
        self.config.engine.nov = nov;
        self
    }

    pub fn input(mut self, path: impl AsRef<Path>) -> Self {
        self.config
            .input
            .files
            .push(path.as_ref().to_string_lossy().into_owned());
        self
    }

    pub fn schema_path(mut self, schema: &str) -> Self {
        self.config.input.schema_path = Some(schema.to_string());
        self
    }

    pub fn output(mut self, path: impl AsRef<Path>) -> Self {
        self.config.output.file = path.as_ref().to_string_lossy().into_owned();
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn tool(mut self, tool: ToolConfig) -> Self {
        self.config.tools.push(tool);
        self
    }

    pub fn select(self, name: &str, field: &str, op: CompareOp, value: f64) -> Self {
        self.tool(ToolConfig {
            name: name.to_string(),
            enabled: true,
            kind: ToolKind::Select {
                field: field.to_string(),
                op,
                value,
            },
        })
    }

    pub fn histogram(self, name: &str, field: &str, bins: usize, low: f64, high: f64) -> Self {
        self.tool(ToolConfig {
            name: name.to_string(),
            enabled: true,
            kind: ToolKind::Histogram {
                field: field.to_string(),
                bins,
                low,
                high,
            },
        })
    }

    pub fn counter(self, name: &str) -> Self {
        self.tool(ToolConfig {
            name: name.to_string(),
            enabled: true,
            kind: ToolKind::Counter,
        })
    }

    /// Disable the most recently added tool.
    pub fn disabled(mut self) -> Self {
        if let Some(tool) = self.config.tools.last_mut() {
            tool.enabled = false;
        }
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
