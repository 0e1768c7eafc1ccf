//! Node-level error type.

use thiserror::Error;

/// Errors returned by a node's `execute` method.
///
/// Both variants are node-local: the engine records them on the node's
/// execution record and moves on to the next scheduled node.
#[derive(Debug, Error, Clone)]
pub enum NodeError {
    /// The node's own logic failed while executing.
    #[error("node execution failed: {0}")]
    Execution(String),

    /// The node's (resolved) configuration is unusable.
    #[error("invalid node configuration: {0}")]
    InvalidConfig(String),
}
