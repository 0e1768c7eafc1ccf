//! The `ExecutableNode` trait — the contract every node must fulfil.

use async_trait::async_trait;
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::NodeError;

/// A node's configuration state: string keys to arbitrary JSON values.
///
/// String values may contain `{{ ... }}` expressions; the engine resolves
/// them against the execution context before `execute` is called.
pub type NodeState = serde_json::Map<String, Value>;

/// The core node trait.
///
/// The engine treats every node type uniformly through this contract and
/// never inspects node-type-specific state beyond passing it through
/// expression resolution.
#[async_trait]
pub trait ExecutableNode: Send + Sync {
    /// Stable identifier, unique within a workflow.
    fn id(&self) -> &str;

    /// Human-readable name — the addressing key for expression references.
    fn name(&self) -> &str;

    /// Type tag mapping to a registered node implementation.
    fn node_type(&self) -> &str;

    /// Current configuration state.
    fn state(&self) -> NodeState;

    /// Replace the configuration state (called by the engine with the
    /// expression-resolved state just before execution).
    fn set_state(&self, state: NodeState);

    /// Execute the node against the outputs of its upstream dependencies.
    ///
    /// The `Ok` value is this node's output, conventionally an object with
    /// a `data` key.
    async fn execute(&self, ctx: &ExecutionContext) -> Result<Value, NodeError>;
}
