#![deny(unsafe_code)]

//! Configuration loading and validation for evloop.
//!
//! Loads TOML configuration files and validates them before an engine is
//! built from them. [`AppConfig`] is the central configuration structure;
//! the [`tools`] module describes the built-in tools a configuration can
//! register.

/// Tool declarations (`[[tools]]` tables).
pub mod tools;

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use tools::{CompareOp, ToolConfig, ToolKind};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Event loop settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Input data sources.
    #[serde(default)]
    pub input: InputConfig,

    /// Output store destination.
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Tools, in execution order.
    #[serde(default)]
    pub tools: Vec<ToolConfig>,
}

/// Event loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Name used to label the engine in logs and reports.
    #[serde(default = "default_engine_name")]
    pub name: String,

    /// Maximum number of records to process. Negative means no limit.
    #[serde(default = "default_nov")]
    pub nov: i64,

    /// Suppress periodic progress reports.
    #[serde(default)]
    pub mute_progress: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: default_engine_name(),
            nov: default_nov(),
            mute_progress: false,
        }
    }
}

fn default_engine_name() -> String {
    "evloop".to_string()
}

fn default_nov() -> i64 {
    -1
}

/// Input data sources.
///
/// ## TOML Example
///
/// ```toml
/// [input]
/// files = ["data/run1.jsonl", "data/more"]
/// schema_path = "*/events"
/// ```
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Input files or directories. Entries may also be comma-separated lists.
    #[serde(default)]
    pub files: Vec<String>,

    /// `/`-separated path to the record object inside each line. A `*`
    /// component matches the first key of the file's first line.
    #[serde(default)]
    pub schema_path: Option<String>,
}

/// Output store destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// File the output store is written to at the end of a run.
    #[serde(default = "default_output_file")]
    pub file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file: default_output_file(),
        }
    }
}

fn default_output_file() -> String {
    "histos.json".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), tools = config.tools.len(), "Configuration loaded");
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.name.is_empty() {
            return Err(ConfigError::Validation(
                "engine.name must not be empty".to_string(),
            ));
        }
        if self.output.file.is_empty() {
            return Err(ConfigError::Validation(
                "output.file must not be empty".to_string(),
            ));
        }
        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }
        if let Some(schema) = &self.input.schema_path
            && schema.split('/').all(str::is_empty)
        {
            return Err(ConfigError::Validation(
                "input.schema_path must name at least one key".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for (i, tool) in self.tools.iter().enumerate() {
            if tool.name.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "tools[{i}].name must not be empty"
                )));
            }
            if !seen.insert(tool.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "tools[{i}].name {:?} is already used by another tool",
                    tool.name
                )));
            }
            tool.validate()
                .map_err(|msg| ConfigError::Validation(format!("tools[{i}].{msg}")))?;
        }

        Ok(())
    }

    /// Names of the configured tools, in execution order.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }
}
