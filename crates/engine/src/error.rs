//! Engine-level error types.

use thiserror::Error;
use uuid::Uuid;

use crate::expression::ExpressionError;

/// Errors produced by the workflow engine (graph validation, lookup, and
/// expression resolution).
///
/// Graph errors at sort time are fatal to the whole run; expression errors
/// are node-local and are recorded on the failing node's record instead of
/// being propagated (the `Expression` variant exists for callers driving the
/// expression engine directly).
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Graph errors ------

    /// Two or more nodes share the same ID.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    /// A connection references a node ID that doesn't exist in the workflow.
    #[error("connection references unknown node '{node_id}' ({side} side)")]
    UnknownConnectionEndpoint {
        node_id: String,
        side: &'static str,
    },

    /// A connection from a node to itself.
    #[error("connection from '{0}' to itself is not allowed")]
    SelfLoop(String),

    /// The identical edge already exists.
    #[error("duplicate connection from '{from}' to '{to}'")]
    DuplicateConnection { from: String, to: String },

    /// Topological sort detected a cycle; `node_id` is on it.
    #[error("workflow graph contains a cycle through node '{node_id}'")]
    CycleDetected { node_id: String },

    // ------ Lookup errors ------

    /// A trigger or lookup referenced a node absent from the workflow.
    #[error("node '{0}' not found in workflow")]
    NodeNotFound(String),

    /// A session operation referenced an unknown session ID.
    #[error("execution session '{0}' not found")]
    SessionNotFound(Uuid),

    // ------ Resolution errors ------

    /// Expression resolution failed.
    #[error(transparent)]
    Expression(#[from] ExpressionError),
}
