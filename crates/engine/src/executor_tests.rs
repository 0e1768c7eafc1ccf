//! End-to-end tests for the workflow orchestrator.
//!
//! These drive full runs through `WorkflowExecutor` with mock and
//! test-local node implementations — no I/O, no logger.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use nodes::mock::MockNode;
use nodes::{ExecutableNode, ExecutionContext, NodeError, NodeState};

use crate::session::{ExecutionStatus, NodeRecordStatus, SessionManager};
use crate::{expression, EngineError, ExecutorConfig, Workflow, WorkflowExecutor};

fn executor() -> WorkflowExecutor {
    WorkflowExecutor::new(Arc::new(SessionManager::new()), ExecutorConfig::default())
}

fn state_of(pairs: &[(&str, Value)]) -> NodeState {
    let mut state = NodeState::new();
    for (k, v) in pairs {
        state.insert((*k).to_owned(), v.clone());
    }
    state
}

// ---------------------------------------------------------------------------
// Test-local node: evaluates its (resolved) "expression" state field.
// ---------------------------------------------------------------------------

struct CalculatorNode {
    id: String,
    name: String,
    state: Mutex<NodeState>,
}

impl CalculatorNode {
    fn new(id: &str, name: &str, expression_template: &str) -> Self {
        Self {
            id: id.to_owned(),
            name: name.to_owned(),
            state: Mutex::new(state_of(&[("expression", json!(expression_template))])),
        }
    }
}

#[async_trait]
impl ExecutableNode for CalculatorNode {
    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn node_type(&self) -> &str {
        "calculator"
    }
    fn state(&self) -> NodeState {
        self.state.lock().unwrap().clone()
    }
    fn set_state(&self, state: NodeState) {
        *self.state.lock().unwrap() = state;
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<Value, NodeError> {
        let state = self.state.lock().unwrap().clone();
        let expr = state
            .get("expression")
            .and_then(Value::as_str)
            .ok_or_else(|| NodeError::InvalidConfig("missing 'expression' field".into()))?;
        let value = expression::evaluate_expression(expr, ctx)
            .map_err(|e| NodeError::Execution(e.to_string()))?;
        Ok(json!({ "data": value }))
    }
}

// ---------------------------------------------------------------------------
// Test-local node: requests cancellation of its own session, then succeeds.
// ---------------------------------------------------------------------------

struct CancellingNode {
    id: String,
    name: String,
    sessions: Arc<SessionManager>,
    state: Mutex<NodeState>,
}

#[async_trait]
impl ExecutableNode for CancellingNode {
    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn node_type(&self) -> &str {
        "cancelling"
    }
    fn state(&self) -> NodeState {
        self.state.lock().unwrap().clone()
    }
    fn set_state(&self, state: NodeState) {
        *self.state.lock().unwrap() = state;
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<Value, NodeError> {
        self.sessions
            .cancel(ctx.session_id())
            .map_err(|e| NodeError::Execution(e.to_string()))?;
        Ok(json!({ "data": { "cancelled": true } }))
    }
}

// ===========================================================================
// Scenarios
// ===========================================================================

/// Input → Calculator → Form, exercising native typing, arithmetic done by
/// the node layer, and boolean expression resolution.
#[tokio::test]
async fn input_calculator_form_pipeline() {
    let mut wf = Workflow::new("onboarding");
    wf.add_node(Arc::new(MockNode::returning(
        "input",
        "Input",
        json!({ "data": { "name": "John", "age": 30 } }),
    )))
    .unwrap();
    wf.add_node(Arc::new(CalculatorNode::new(
        "calc",
        "Calculator",
        r#"{{$node["Input"].data.age}} + 5"#,
    )))
    .unwrap();
    wf.add_node(Arc::new(
        MockNode::echoing("form", "Form").with_state(state_of(&[
            ("fullName", json!(r#"{{$node["Input"].data.name}}"#)),
            ("isAdult", json!(r#"{{$node["Input"].data.age >= 18}}"#)),
        ])),
    ))
    .unwrap();
    wf.add_connection("input", "calc").unwrap();
    wf.add_connection("calc", "form").unwrap();

    let session = executor().execute_workflow(&wf, "input").await.unwrap();

    assert_eq!(session.status, ExecutionStatus::Completed);
    assert_eq!(session.nodes_executed, 3);
    assert_eq!(session.nodes_failed, 0);

    // Three sealed records in dispatch order.
    let dispatched: Vec<&str> = session.records.iter().map(|r| r.node_id.as_str()).collect();
    assert_eq!(dispatched, vec!["input", "calc", "form"]);
    assert!(session.records.iter().all(|r| r.is_sealed()));

    // The mixed template resolved to "30 + 5"; the calculator node itself
    // evaluated the arithmetic.
    assert_eq!(
        session.record("calc").unwrap().output,
        Some(json!({ "data": 35 }))
    );
    assert_eq!(
        session.record("form").unwrap().output,
        Some(json!({ "data": { "fullName": "John", "isAdult": true } }))
    );
}

/// A failed node's dependents fail through unresolved references, while an
/// independent sibling still completes; the session ends FAILED.
#[tokio::test]
async fn failure_cascades_through_references_but_spares_siblings() {
    let mut wf = Workflow::new("cascade");
    wf.add_node(Arc::new(MockNode::returning(
        "a",
        "A",
        json!({ "data": { "v": 1 } }),
    )))
    .unwrap();
    wf.add_node(Arc::new(MockNode::failing("b", "B", "b exploded"))).unwrap();
    wf.add_node(Arc::new(
        MockNode::echoing("c", "C")
            .with_state(state_of(&[("fromB", json!(r#"{{$node["B"].data}}"#))])),
    ))
    .unwrap();
    wf.add_node(Arc::new(
        MockNode::echoing("d", "D")
            .with_state(state_of(&[("fromA", json!(r#"{{$node["A"].data.v}}"#))])),
    ))
    .unwrap();
    wf.add_connection("a", "b").unwrap();
    wf.add_connection("b", "c").unwrap();
    wf.add_connection("a", "d").unwrap();

    let session = executor().execute_workflow(&wf, "a").await.unwrap();

    assert_eq!(session.status, ExecutionStatus::Failed);
    assert_eq!(session.records.len(), 4);
    assert_eq!(session.nodes_executed, 2);
    assert_eq!(session.nodes_failed, 2);

    let b = session.record("b").unwrap();
    assert_eq!(b.status, NodeRecordStatus::Failed);
    assert!(b.error.as_deref().unwrap().contains("b exploded"));

    // C failed at resolution time, naming the missing upstream node.
    let c = session.record("c").unwrap();
    assert_eq!(c.status, NodeRecordStatus::Failed);
    assert!(c.error.as_deref().unwrap().contains("unresolved reference"));
    assert!(c.error.as_deref().unwrap().contains("B"));

    let d = session.record("d").unwrap();
    assert_eq!(d.status, NodeRecordStatus::Completed);
    assert_eq!(d.output, Some(json!({ "data": { "fromA": 1 } })));
}

/// A node whose state fails to resolve is recorded as failed and its own
/// execute contract never runs.
#[tokio::test]
async fn resolution_failure_prevents_node_execution() {
    let broken = Arc::new(
        MockNode::echoing("b", "Broken")
            .with_state(state_of(&[("bad", json!("{{$node[}}"))])),
    );

    let mut wf = Workflow::new("bad-template");
    wf.add_node(broken.clone()).unwrap();

    let session = executor().execute_workflow(&wf, "b").await.unwrap();

    assert_eq!(session.status, ExecutionStatus::Failed);
    assert_eq!(session.record("b").unwrap().status, NodeRecordStatus::Failed);
    assert!(session.record("b").unwrap().error.as_deref().unwrap().contains("syntax error"));
    assert_eq!(broken.call_count(), 0, "execute must not run on resolution failure");
}

/// Cancellation after the second node: node 3 is never dispatched, exactly
/// two sealed records remain, the session ends CANCELLED.
#[tokio::test]
async fn cancellation_halts_dispatch_between_nodes() {
    let sessions = Arc::new(SessionManager::new());
    let exec = WorkflowExecutor::new(sessions.clone(), ExecutorConfig::default());

    let mut wf = Workflow::new("five-chain");
    let ids = ["n1", "n2", "n3", "n4", "n5"];
    let tail: Vec<Arc<MockNode>> = ids[2..]
        .iter()
        .map(|id| Arc::new(MockNode::returning(*id, *id, json!({ "data": {} }))))
        .collect();

    wf.add_node(Arc::new(MockNode::returning("n1", "n1", json!({ "data": {} }))))
        .unwrap();
    wf.add_node(Arc::new(CancellingNode {
        id: "n2".into(),
        name: "n2".into(),
        sessions: sessions.clone(),
        state: Mutex::new(NodeState::new()),
    }))
    .unwrap();
    for node in &tail {
        wf.add_node(node.clone()).unwrap();
    }
    for pair in ids.windows(2) {
        wf.add_connection(pair[0], pair[1]).unwrap();
    }

    let session = exec.execute_workflow(&wf, "n1").await.unwrap();

    assert_eq!(session.status, ExecutionStatus::Cancelled);
    assert_eq!(session.records.len(), 2);
    assert!(session.records.iter().all(|r| r.is_sealed()));
    assert_eq!(session.nodes_executed, 2);
    for node in &tail {
        assert_eq!(node.call_count(), 0, "{} must never be dispatched", node.id());
    }
}

/// Triggering mid-graph runs only nodes reachable forward from the trigger.
#[tokio::test]
async fn trigger_mid_graph_runs_downstream_only() {
    let mut wf = Workflow::new("mid-trigger");
    let a = Arc::new(MockNode::returning("a", "A", json!({ "data": {} })));
    wf.add_node(a.clone()).unwrap();
    wf.add_node(Arc::new(MockNode::returning("b", "B", json!({ "data": {} }))))
        .unwrap();
    wf.add_node(Arc::new(MockNode::returning("c", "C", json!({ "data": {} }))))
        .unwrap();
    wf.add_connection("a", "b").unwrap();
    wf.add_connection("b", "c").unwrap();

    let session = executor().execute_workflow(&wf, "b").await.unwrap();

    assert_eq!(session.execution_order, vec!["b", "c"]);
    assert_eq!(session.records.len(), 2);
    assert_eq!(a.call_count(), 0);
    assert_eq!(session.status, ExecutionStatus::Completed);
}

/// Unknown trigger fails fast — no session is ever created.
#[tokio::test]
async fn unknown_trigger_fails_without_creating_a_session() {
    let exec = executor();
    let mut wf = Workflow::new("empty-ish");
    wf.add_node(Arc::new(MockNode::returning("a", "A", json!({})))).unwrap();

    let err = exec.execute_workflow(&wf, "ghost").await.unwrap_err();
    assert!(matches!(err, EngineError::NodeNotFound(id) if id == "ghost"));
    assert!(exec.session_manager().get_execution_history(None, None).is_empty());
}

/// A cyclic graph is fatal before any session reaches RUNNING.
#[tokio::test]
async fn cycle_is_fatal_before_session_creation() {
    let exec = executor();
    let mut wf = Workflow::new("cyclic");
    wf.add_node(Arc::new(MockNode::returning("a", "A", json!({})))).unwrap();
    wf.add_node(Arc::new(MockNode::returning("b", "B", json!({})))).unwrap();
    wf.add_connection("a", "b").unwrap();
    wf.add_connection("b", "a").unwrap();

    let err = exec.execute_workflow(&wf, "a").await.unwrap_err();
    assert!(matches!(err, EngineError::CycleDetected { .. }));
    assert!(exec.session_manager().get_execution_history(None, None).is_empty());
}

/// With halt_on_failure, dispatch stops at the first failed node even for
/// independent siblings.
#[tokio::test]
async fn halt_on_failure_stops_dispatch_immediately() {
    let sessions = Arc::new(SessionManager::new());
    let exec = WorkflowExecutor::new(
        sessions,
        ExecutorConfig {
            halt_on_failure: true,
        },
    );

    let mut wf = Workflow::new("halting");
    wf.add_node(Arc::new(MockNode::failing("boom", "Boom", "broken"))).unwrap();
    let sibling = Arc::new(MockNode::returning("s", "Sibling", json!({ "data": {} })));
    wf.add_node(sibling.clone()).unwrap();
    wf.add_connection("boom", "s").unwrap();

    let session = exec.execute_workflow(&wf, "boom").await.unwrap();

    assert_eq!(session.status, ExecutionStatus::Failed);
    assert_eq!(session.records.len(), 1);
    assert_eq!(sibling.call_count(), 0);
}

/// Re-running the same workflow with deterministic nodes produces a new
/// session with identical per-node outputs and identical overall status.
#[tokio::test]
async fn reruns_are_deterministic_given_deterministic_nodes() {
    let build = || {
        let mut wf = Workflow::new("deterministic");
        wf.add_node(Arc::new(MockNode::returning(
            "input",
            "Input",
            json!({ "data": { "age": 21 } }),
        )))
        .unwrap();
        wf.add_node(Arc::new(
            MockNode::echoing("check", "Check")
                .with_state(state_of(&[("adult", json!(r#"{{$node["Input"].data.age >= 18}}"#))])),
        ))
        .unwrap();
        wf.add_connection("input", "check").unwrap();
        wf
    };

    let exec = executor();
    let first = exec.execute_workflow(&build(), "input").await.unwrap();
    let second = exec.execute_workflow(&build(), "input").await.unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(first.status, second.status);
    assert_eq!(first.records.len(), second.records.len());
    for (a, b) in first.records.iter().zip(&second.records) {
        assert_eq!(a.node_id, b.node_id);
        assert_eq!(a.status, b.status);
        assert_eq!(a.output, b.output);
    }
    assert_eq!(
        exec.session_manager().get_execution_history(None, None).len(),
        2
    );
}

/// Session ids are isolated: concurrent runs never share records.
#[tokio::test]
async fn concurrent_sessions_do_not_share_state() {
    let sessions = Arc::new(SessionManager::new());
    let exec = Arc::new(WorkflowExecutor::new(sessions, ExecutorConfig::default()));

    let build = |tag: &str| {
        let mut wf = Workflow::new(format!("wf-{tag}"));
        wf.add_node(Arc::new(MockNode::returning(
            "only",
            "Only",
            json!({ "data": { "tag": tag } }),
        )))
        .unwrap();
        wf
    };

    let wf_left = build("left");
    let wf_right = build("right");
    let (left, right) = tokio::join!(
        exec.execute_workflow(&wf_left, "only"),
        exec.execute_workflow(&wf_right, "only"),
    );
    let (left, right) = (left.unwrap(), right.unwrap());

    assert_ne!(left.id, right.id);
    assert_eq!(left.records.len(), 1);
    assert_eq!(right.records.len(), 1);
    assert_eq!(
        left.record("only").unwrap().output,
        Some(json!({ "data": { "tag": "left" } }))
    );
    assert_eq!(
        right.record("only").unwrap().output,
        Some(json!({ "data": { "tag": "right" } }))
    );
}
