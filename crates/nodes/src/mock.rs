//! `MockNode` — a test double for `ExecutableNode`.
//!
//! Useful in unit and integration tests where a real node implementation is
//! either unavailable or irrelevant.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{ExecutableNode, ExecutionContext, NodeError, NodeState};

/// Behaviour injected into `MockNode` at construction time.
pub enum MockBehaviour {
    /// Return a fixed JSON output.
    ReturnValue(Value),
    /// Return the node's current (resolved) state wrapped as `{"data": state}`.
    EchoState,
    /// Fail with an execution error.
    Fail(String),
}

/// A mock node that records every call it receives and returns a
/// programmer-specified result.
pub struct MockNode {
    id: String,
    name: String,
    behaviour: MockBehaviour,
    state: Mutex<NodeState>,
    /// Context outputs seen by each call, in call order.
    calls: Mutex<Vec<BTreeMap<String, Value>>>,
}

impl MockNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>, behaviour: MockBehaviour) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            behaviour,
            state: Mutex::new(NodeState::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A mock that always succeeds with the given output value.
    pub fn returning(id: impl Into<String>, name: impl Into<String>, output: Value) -> Self {
        Self::new(id, name, MockBehaviour::ReturnValue(output))
    }

    /// A mock that outputs its own resolved state as `{"data": state}`.
    pub fn echoing(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, MockBehaviour::EchoState)
    }

    /// A mock that always fails with an execution error.
    pub fn failing(
        id: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(id, name, MockBehaviour::Fail(message.into()))
    }

    /// Replace the initial state (builder style).
    pub fn with_state(self, state: NodeState) -> Self {
        *self.state.lock().unwrap() = state;
        self
    }

    /// Number of times this node has been executed.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Context outputs observed on the given call.
    pub fn call_outputs(&self, call: usize) -> Option<BTreeMap<String, Value>> {
        self.calls.lock().unwrap().get(call).cloned()
    }
}

#[async_trait]
impl ExecutableNode for MockNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn node_type(&self) -> &str {
        "mock"
    }

    fn state(&self) -> NodeState {
        self.state.lock().unwrap().clone()
    }

    fn set_state(&self, state: NodeState) {
        *self.state.lock().unwrap() = state;
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<Value, NodeError> {
        self.calls.lock().unwrap().push(ctx.outputs().clone());

        match &self.behaviour {
            MockBehaviour::ReturnValue(v) => Ok(v.clone()),
            MockBehaviour::EchoState => {
                let state = self.state.lock().unwrap().clone();
                Ok(json!({ "data": Value::Object(state) }))
            }
            MockBehaviour::Fail(msg) => Err(NodeError::Execution(msg.clone())),
        }
    }
}
