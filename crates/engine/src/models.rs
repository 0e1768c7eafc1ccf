//! Core domain models for the workflow engine.
//!
//! A [`Workflow`] owns its nodes (as trait objects) and the directed
//! connections between them. Node insertion order is preserved — it is the
//! deterministic tie-break rule for topological ordering.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use nodes::ExecutableNode;

use crate::EngineError;

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// Directed dependency edge from one node to another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub from: String,
    pub to: String,
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// A complete workflow: a set of nodes plus the connections between them.
///
/// Invariants enforced on insert:
/// - node IDs are unique;
/// - every connection's endpoints reference nodes present in the workflow;
/// - no self-loops, no duplicate identical edges.
pub struct Workflow {
    pub id: Uuid,
    pub name: String,
    nodes: Vec<Arc<dyn ExecutableNode>>,
    connections: Vec<Connection>,
    pub created_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            nodes: Vec::new(),
            connections: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Add a node to the workflow.
    ///
    /// # Errors
    /// [`EngineError::DuplicateNodeId`] if a node with the same ID exists.
    pub fn add_node(&mut self, node: Arc<dyn ExecutableNode>) -> Result<(), EngineError> {
        if self.contains(node.id()) {
            return Err(EngineError::DuplicateNodeId(node.id().to_owned()));
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Add a directed connection between two existing nodes.
    ///
    /// # Errors
    /// - [`EngineError::UnknownConnectionEndpoint`] if either endpoint is
    ///   absent from the workflow.
    /// - [`EngineError::SelfLoop`] if `from == to`.
    /// - [`EngineError::DuplicateConnection`] if the identical edge exists.
    pub fn add_connection(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Result<(), EngineError> {
        let (from, to) = (from.into(), to.into());

        if !self.contains(&from) {
            return Err(EngineError::UnknownConnectionEndpoint {
                node_id: from,
                side: "from",
            });
        }
        if !self.contains(&to) {
            return Err(EngineError::UnknownConnectionEndpoint {
                node_id: to,
                side: "to",
            });
        }
        if from == to {
            return Err(EngineError::SelfLoop(from));
        }
        if self.connections.iter().any(|c| c.from == from && c.to == to) {
            return Err(EngineError::DuplicateConnection { from, to });
        }

        self.connections.push(Connection { from, to });
        Ok(())
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> &[Arc<dyn ExecutableNode>] {
        &self.nodes
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Look up a node by ID.
    pub fn node(&self, node_id: &str) -> Option<&Arc<dyn ExecutableNode>> {
        self.nodes.iter().find(|n| n.id() == node_id)
    }

    /// Look up a node by its display name (the expression addressing key).
    pub fn node_by_name(&self, name: &str) -> Option<&Arc<dyn ExecutableNode>> {
        self.nodes.iter().find(|n| n.name() == name)
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.node(node_id).is_some()
    }
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("nodes", &self.nodes.iter().map(|n| n.id()).collect::<Vec<_>>())
            .field("connections", &self.connections)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodes::mock::MockNode;
    use serde_json::json;

    fn mock(id: &str) -> Arc<dyn ExecutableNode> {
        Arc::new(MockNode::returning(id, id, json!({})))
    }

    fn two_node_workflow() -> Workflow {
        let mut wf = Workflow::new("test");
        wf.add_node(mock("a")).unwrap();
        wf.add_node(mock("b")).unwrap();
        wf
    }

    #[test]
    fn duplicate_node_id_is_rejected() {
        let mut wf = two_node_workflow();
        assert!(matches!(
            wf.add_node(mock("a")),
            Err(EngineError::DuplicateNodeId(id)) if id == "a"
        ));
    }

    #[test]
    fn connection_endpoints_must_exist() {
        let mut wf = two_node_workflow();
        assert!(matches!(
            wf.add_connection("a", "ghost"),
            Err(EngineError::UnknownConnectionEndpoint { node_id, side: "to" }) if node_id == "ghost"
        ));
        assert!(matches!(
            wf.add_connection("ghost", "b"),
            Err(EngineError::UnknownConnectionEndpoint { node_id, side: "from" }) if node_id == "ghost"
        ));
    }

    #[test]
    fn self_loops_and_duplicate_edges_are_rejected() {
        let mut wf = two_node_workflow();
        assert!(matches!(
            wf.add_connection("a", "a"),
            Err(EngineError::SelfLoop(id)) if id == "a"
        ));

        wf.add_connection("a", "b").unwrap();
        assert!(matches!(
            wf.add_connection("a", "b"),
            Err(EngineError::DuplicateConnection { .. })
        ));
    }

    #[test]
    fn node_lookup_by_id_and_name() {
        let mut wf = Workflow::new("test");
        wf.add_node(Arc::new(MockNode::returning("n1", "Input", json!({}))))
            .unwrap();

        assert!(wf.node("n1").is_some());
        assert!(wf.node_by_name("Input").is_some());
        assert!(wf.node("Input").is_none());
    }
}
