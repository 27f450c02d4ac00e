//! Built-in tool declarations.
//!
//! Each `[[tools]]` table declares one tool. Tables are registered in the
//! order they appear, which is also their execution order.
//!
//! ## TOML Example
//!
//! ```toml
//! [[tools]]
//! kind = "select"
//! name = "pt_cut"
//! field = "pt"
//! op = "gt"
//! value = 20.0
//!
//! [[tools]]
//! kind = "histogram"
//! name = "pt"
//! field = "pt"
//! bins = 50
//! low = 0.0
//! high = 100.0
//! ```

use serde::{Deserialize, Serialize};

/// A single tool declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Unique tool name. Also the store path the tool books under.
    pub name: String,

    /// Disabled tools are registered but never initialized, executed, or
    /// finalized.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// What the tool does.
    #[serde(flatten)]
    pub kind: ToolKind,
}

fn default_enabled() -> bool {
    true
}

/// The built-in tool kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolKind {
    /// Keep records where `field <op> value`; reject the rest for the
    /// remainder of the chain.
    Select {
        field: String,
        op: CompareOp,
        value: f64,
    },
    /// Fill a fixed-width histogram with `field`.
    Histogram {
        field: String,
        bins: usize,
        low: f64,
        high: f64,
    },
    /// Count records that reach this tool.
    Counter,
}

/// Comparison used by selection tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl CompareOp {
    /// Apply the comparison `lhs <op> rhs`.
    pub fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Eq => lhs == rhs,
            CompareOp::Ne => lhs != rhs,
        }
    }

    /// The operator as it is usually written.
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
        }
    }
}

impl ToolConfig {
    /// Short label for the tool kind ("select", "histogram", "counter").
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            ToolKind::Select { .. } => "select",
            ToolKind::Histogram { .. } => "histogram",
            ToolKind::Counter => "counter",
        }
    }

    /// Check kind-specific constraints. The error names the offending field.
    pub(crate) fn validate(&self) -> Result<(), String> {
        match &self.kind {
            ToolKind::Select { field, value, .. } => {
                if field.is_empty() {
                    return Err("field must not be empty".to_string());
                }
                if value.is_nan() {
                    return Err("value must be a number".to_string());
                }
            }
            ToolKind::Histogram {
                field,
                bins,
                low,
                high,
            } => {
                if field.is_empty() {
                    return Err("field must not be empty".to_string());
                }
                if *bins == 0 {
                    return Err("bins must be at least 1".to_string());
                }
                if !low.is_finite() || !high.is_finite() {
                    return Err(format!("low/high must be finite, got [{low}, {high})"));
                }
                if low >= high {
                    return Err(format!("low must be below high, got [{low}, {high})"));
                }
            }
            ToolKind::Counter => {}
        }
        Ok(())
    }
}
