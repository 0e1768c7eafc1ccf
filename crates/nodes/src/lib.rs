//! `nodes` crate — the `ExecutableNode` trait and supporting types.
//!
//! Every node — built-in and plugin alike — must implement [`ExecutableNode`].
//! The engine crate dispatches execution through this trait object and never
//! inspects a node's internals beyond its declared state mapping.

pub mod context;
pub mod error;
pub mod mock;
pub mod result;
pub mod traits;

pub use context::ExecutionContext;
pub use error::NodeError;
pub use result::ExecutionResult;
pub use traits::{ExecutableNode, NodeState};
