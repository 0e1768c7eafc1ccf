//! Workflow execution orchestrator.
//!
//! `WorkflowExecutor` drives a run end to end:
//! 1. Resolves the reachable, topologically ordered node sequence from the
//!    trigger node.
//! 2. Asks the session manager to create and start a session scoped to that
//!    sequence.
//! 3. For each node in order: builds the context of completed outputs,
//!    resolves `{{ ... }}` expressions in the node's state, invokes the
//!    node's execute contract, and reports start/end to the session manager.
//! 4. Seals the session (`COMPLETED`/`FAILED`/`CANCELLED`) and returns it.
//!
//! A node whose state fails to resolve is recorded as failed without its
//! own logic ever running; downstream nodes that reference its output fail
//! the same way, so failures cascade naturally with no dedicated logic.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use nodes::ExecutionResult;

use crate::context::build_context;
use crate::session::{ExecutionSession, SessionManager};
use crate::{expression, graph, EngineError, Workflow};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct ExecutorConfig {
    /// Stop dispatching after the first failed node instead of letting
    /// independent branches continue.
    pub halt_on_failure: bool,
}

// ---------------------------------------------------------------------------
// WorkflowExecutor
// ---------------------------------------------------------------------------

/// Orchestrates sequential node execution for one workflow run at a time.
///
/// Holds no run state of its own; everything lives in the injected
/// [`SessionManager`], so one executor can serve many concurrent runs.
pub struct WorkflowExecutor {
    sessions: Arc<SessionManager>,
    config: ExecutorConfig,
}

impl WorkflowExecutor {
    pub fn new(sessions: Arc<SessionManager>, config: ExecutorConfig) -> Self {
        Self { sessions, config }
    }

    /// The session manager backing this executor (query/cancel surface).
    pub fn session_manager(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Execute the workflow starting from `triggered_by` and return the
    /// sealed terminal session.
    ///
    /// # Errors
    /// - [`EngineError::NodeNotFound`] if the trigger is absent (fail fast,
    ///   no session is created).
    /// - Graph errors from ordering — fatal, the session never reaches
    ///   `RUNNING`.
    ///
    /// Expression and node failures are *not* errors here: they are
    /// recorded on the failing node's record and reflected in the session's
    /// terminal status.
    #[instrument(skip(self, workflow), fields(workflow_id = %workflow.id, trigger = triggered_by))]
    pub async fn execute_workflow(
        &self,
        workflow: &Workflow,
        triggered_by: &str,
    ) -> Result<ExecutionSession, EngineError> {
        if !workflow.contains(triggered_by) {
            return Err(EngineError::NodeNotFound(triggered_by.to_owned()));
        }

        // ------------------------------------------------------------------
        // Ordering: nodes reachable forward from the trigger, dependency
        // order. Cycles and bad connections abort before any session exists.
        // ------------------------------------------------------------------
        let order = graph::reachable_from(workflow, triggered_by)?;
        info!(
            "resolved execution order — {} node(s): {:?}",
            order.len(),
            order
        );

        let session_id = self.sessions.create_session(
            workflow.id,
            &workflow.name,
            triggered_by,
            order.clone(),
        );
        self.sessions.start_session(session_id)?;

        // ------------------------------------------------------------------
        // Dispatch nodes sequentially in resolved order.
        // ------------------------------------------------------------------
        for node_id in &order {
            // Cooperative cancellation: checked between dispatches only; a
            // node already mid-execution is never interrupted.
            if self.sessions.is_cancel_requested(session_id)? {
                info!(session_id = %session_id, "cancellation requested; halting dispatch");
                break;
            }

            let Some(node) = workflow.node(node_id) else {
                warn!(node_id, "scheduled node missing from workflow; skipping");
                continue;
            };

            let records = self.sessions.records(session_id)?;
            let ctx = build_context(session_id, workflow.id, &records);

            let handle = self.sessions.begin_node(session_id, node.as_ref())?;

            let result = match expression::resolve_state(&node.state(), &ctx) {
                Ok(resolved) => {
                    node.set_state(resolved);
                    match node.execute(&ctx).await {
                        Ok(output) => ExecutionResult::ok(output),
                        Err(err) => {
                            warn!(node_id, error = %err, "node execution failed");
                            ExecutionResult::err(err.to_string())
                        }
                    }
                }
                // Resolution failure: the node's own logic never runs.
                Err(err) => {
                    warn!(node_id, error = %err, "state resolution failed");
                    ExecutionResult::err(err.to_string())
                }
            };

            let failed = !result.success;
            self.sessions.end_node(session_id, handle, result)?;

            if failed && self.config.halt_on_failure {
                info!(session_id = %session_id, node_id, "halting on first failure");
                break;
            }
        }

        self.sessions.end_session(session_id)?;
        self.sessions.get_session(session_id)
    }
}
