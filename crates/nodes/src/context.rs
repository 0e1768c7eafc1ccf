//! Read-only execution context handed to every node.

use std::collections::BTreeMap;

use serde_json::Value;
use uuid::Uuid;

/// Snapshot of all node outputs completed so far in one session.
///
/// Outputs are keyed by node *name* (not id) because names are the
/// addressing key used by `$node["Name"]` expression references.
///
/// Defined here (in the nodes crate) so both the engine and individual node
/// implementations can import it without a circular dependency. The context
/// is immutable for the duration of the node execution it is handed to.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    session_id: Uuid,
    workflow_id: Uuid,
    outputs: BTreeMap<String, Value>,
}

impl ExecutionContext {
    pub fn new(session_id: Uuid, workflow_id: Uuid, outputs: BTreeMap<String, Value>) -> Self {
        Self {
            session_id,
            workflow_id,
            outputs,
        }
    }

    /// An empty context, useful for root nodes and tests.
    pub fn empty(session_id: Uuid, workflow_id: Uuid) -> Self {
        Self::new(session_id, workflow_id, BTreeMap::new())
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn workflow_id(&self) -> Uuid {
        self.workflow_id
    }

    /// Output of a previously completed node, looked up by name.
    pub fn output(&self, node_name: &str) -> Option<&Value> {
        self.outputs.get(node_name)
    }

    pub fn contains(&self, node_name: &str) -> bool {
        self.outputs.contains_key(node_name)
    }

    pub fn outputs(&self) -> &BTreeMap<String, Value> {
        &self.outputs
    }
}
