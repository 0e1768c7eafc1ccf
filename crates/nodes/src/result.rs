//! Outcome of a single node invocation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of one node execution, produced once per invocation and immutable
/// after creation.
///
/// By convention the output is an object with a `data` key, e.g.
/// `{"data": {"name": "John"}}`, but the engine treats it as opaque.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: Value,
    pub error: Option<String>,
}

impl ExecutionResult {
    /// A successful result carrying the node's output.
    pub fn ok(output: Value) -> Self {
        Self {
            success: true,
            output,
            error: None,
        }
    }

    /// A failed result carrying a human-readable error message.
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: Value::Null,
            error: Some(message.into()),
        }
    }
}
