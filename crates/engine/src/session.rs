//! Execution session tracking.
//!
//! [`SessionManager`] owns the state machine and data records for workflow
//! runs. Its mutation operations are the only legal way to change an
//! [`ExecutionSession`] or [`NodeExecutionRecord`] — the orchestrator never
//! writes these structures directly. Every mutating call forwards an
//! equivalent event to an optional injected [`ExecutionLogger`]; logger
//! failures are swallowed and never abort an execution.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use nodes::{ExecutableNode, ExecutionResult};

use crate::{EngineError, ExecutionLogger};

// ---------------------------------------------------------------------------
// Statuses
// ---------------------------------------------------------------------------

/// Lifecycle status of an execution session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Pending,
    Initializing,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    /// Terminal sessions are immutable once reached.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }
}

/// Status of a single node execution record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeRecordStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Record of one node's execution within a session.
///
/// Created at dispatch time, sealed exactly once at completion.
#[derive(Debug, Clone, Serialize)]
pub struct NodeExecutionRecord {
    pub node_id: String,
    pub node_name: String,
    pub node_type: String,
    pub status: NodeRecordStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: i64,
    pub output: Option<Value>,
    pub error: Option<String>,
}

impl NodeExecutionRecord {
    fn begin(node: &dyn ExecutableNode) -> Self {
        Self {
            node_id: node.id().to_owned(),
            node_name: node.name().to_owned(),
            node_type: node.node_type().to_owned(),
            status: NodeRecordStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: 0,
            output: None,
            error: None,
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.ended_at.is_some()
    }

    fn seal(&mut self, result: ExecutionResult) {
        let ended = Utc::now();
        self.ended_at = Some(ended);
        self.duration_ms = (ended - self.started_at).num_milliseconds();
        if result.success {
            self.status = NodeRecordStatus::Completed;
            self.output = Some(result.output);
        } else {
            self.status = NodeRecordStatus::Failed;
            self.error = result.error;
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One end-to-end run of a workflow, with its own isolated records.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionSession {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub workflow_name: String,
    pub status: ExecutionStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Node id the run was triggered from.
    pub triggered_by: String,
    /// Node ids scheduled for this run, in dispatch order.
    pub execution_order: Vec<String>,
    pub nodes_executed: usize,
    pub nodes_failed: usize,
    /// One record per dispatched node, in dispatch order.
    pub records: Vec<NodeExecutionRecord>,
    #[serde(skip)]
    cancel_requested: bool,
}

impl ExecutionSession {
    fn new(
        workflow_id: Uuid,
        workflow_name: String,
        triggered_by: String,
        execution_order: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            workflow_name,
            status: ExecutionStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            triggered_by,
            execution_order,
            nodes_executed: 0,
            nodes_failed: 0,
            records: Vec::new(),
            cancel_requested: false,
        }
    }

    /// Total wall-clock duration, 0 until the session has started.
    pub fn duration_ms(&self) -> i64 {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => (end - start).num_milliseconds(),
            (Some(start), None) => (Utc::now() - start).num_milliseconds(),
            _ => 0,
        }
    }

    /// Record for a specific node, if it was dispatched.
    pub fn record(&self, node_id: &str) -> Option<&NodeExecutionRecord> {
        self.records.iter().find(|r| r.node_id == node_id)
    }

    fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            workflow_id: self.workflow_id,
            workflow_name: self.workflow_name.clone(),
            status: self.status,
            created_at: self.created_at,
            ended_at: self.ended_at,
            duration_ms: self.duration_ms(),
            triggered_by: self.triggered_by.clone(),
            nodes_executed: self.nodes_executed,
            nodes_failed: self.nodes_failed,
        }
    }
}

/// Condensed view of a session for history listings.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub workflow_name: String,
    pub status: ExecutionStatus,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: i64,
    pub triggered_by: String,
    pub nodes_executed: usize,
    pub nodes_failed: usize,
}

/// Opaque handle to a node record created by [`SessionManager::begin_node`].
#[derive(Debug, Clone, Copy)]
pub struct NodeRecordHandle(usize);

// ---------------------------------------------------------------------------
// SessionManager
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SessionStore {
    sessions: HashMap<Uuid, ExecutionSession>,
    /// Session ids in creation order (history is served most-recent-first).
    creation_order: Vec<Uuid>,
}

/// Owner of all execution sessions and their records.
///
/// Thread-safe: record creation and sealing are atomic per node, and
/// concurrent sessions share no mutable state beyond the id registry.
pub struct SessionManager {
    store: RwLock<SessionStore>,
    logger: Option<Arc<dyn ExecutionLogger>>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            store: RwLock::new(SessionStore::default()),
            logger: None,
        }
    }

    pub fn with_logger(logger: Arc<dyn ExecutionLogger>) -> Self {
        Self {
            store: RwLock::new(SessionStore::default()),
            logger: Some(logger),
        }
    }

    /// Create a session scoped to the given execution order.
    ///
    /// The session is registered as `INITIALIZING` and must be started via
    /// [`SessionManager::start_session`] before nodes are dispatched.
    pub fn create_session(
        &self,
        workflow_id: Uuid,
        workflow_name: &str,
        triggered_by: &str,
        execution_order: Vec<String>,
    ) -> Uuid {
        let mut session = ExecutionSession::new(
            workflow_id,
            workflow_name.to_owned(),
            triggered_by.to_owned(),
            execution_order,
        );
        session.status = ExecutionStatus::Initializing;
        let id = session.id;
        let snapshot = session.clone();

        {
            let mut store = self.store.write().unwrap();
            store.creation_order.push(id);
            store.sessions.insert(id, session);
        }

        info!(session_id = %id, workflow = %workflow_name, "execution session created");
        self.forward("session_created", |l| l.session_created(&snapshot));
        id
    }

    /// Transition the session to `RUNNING`.
    pub fn start_session(&self, id: Uuid) -> Result<(), EngineError> {
        let snapshot = {
            let mut store = self.store.write().unwrap();
            let session = store
                .sessions
                .get_mut(&id)
                .ok_or(EngineError::SessionNotFound(id))?;
            if session.status.is_terminal() {
                warn!(session_id = %id, "ignoring start of terminal session");
                return Ok(());
            }
            session.status = ExecutionStatus::Running;
            session.started_at = Some(Utc::now());
            session.clone()
        };

        self.forward("session_started", |l| l.session_started(&snapshot));
        Ok(())
    }

    /// Create a `RUNNING` record for the node being dispatched.
    pub fn begin_node(
        &self,
        id: Uuid,
        node: &dyn ExecutableNode,
    ) -> Result<NodeRecordHandle, EngineError> {
        let (handle, session, record) = {
            let mut store = self.store.write().unwrap();
            let session = store
                .sessions
                .get_mut(&id)
                .ok_or(EngineError::SessionNotFound(id))?;
            if session.status.is_terminal() {
                warn!(session_id = %id, node_id = node.id(), "ignoring dispatch in terminal session");
                // Inert handle: a later end_node against it is a no-op.
                return Ok(NodeRecordHandle(usize::MAX));
            }
            let record = NodeExecutionRecord::begin(node);
            session.records.push(record);
            let index = session.records.len() - 1;
            (
                NodeRecordHandle(index),
                session.clone(),
                session.records[index].clone(),
            )
        };

        self.forward("node_started", |l| l.node_started(&session, &record));
        Ok(handle)
    }

    /// Seal the record behind `handle` with the node's result.
    pub fn end_node(
        &self,
        id: Uuid,
        handle: NodeRecordHandle,
        result: ExecutionResult,
    ) -> Result<(), EngineError> {
        let snapshots = {
            let mut store = self.store.write().unwrap();
            let session = store
                .sessions
                .get_mut(&id)
                .ok_or(EngineError::SessionNotFound(id))?;
            if session.status.is_terminal() {
                warn!(session_id = %id, "ignoring node result for terminal session");
                return Ok(());
            }
            match session.records.get_mut(handle.0) {
                Some(record) if !record.is_sealed() => {
                    let success = result.success;
                    record.seal(result);
                    if success {
                        session.nodes_executed += 1;
                    } else {
                        session.nodes_failed += 1;
                    }
                    Some((session.clone(), session.records[handle.0].clone()))
                }
                Some(_) => {
                    warn!(session_id = %id, "record already sealed; ignoring duplicate result");
                    None
                }
                None => {
                    warn!(session_id = %id, "no record behind handle; ignoring result");
                    None
                }
            }
        };

        if let Some((session, record)) = snapshots {
            self.forward("node_ended", |l| l.node_ended(&session, &record));
        }
        Ok(())
    }

    /// Seal the session with its terminal status.
    ///
    /// `CANCELLED` if cancellation was requested, `FAILED` if any node
    /// failed, `COMPLETED` otherwise. The session is immutable afterwards.
    pub fn end_session(&self, id: Uuid) -> Result<(), EngineError> {
        let snapshot = {
            let mut store = self.store.write().unwrap();
            let session = store
                .sessions
                .get_mut(&id)
                .ok_or(EngineError::SessionNotFound(id))?;
            if session.status.is_terminal() {
                warn!(session_id = %id, "session already terminal; ignoring end request");
                return Ok(());
            }
            session.status = if session.cancel_requested {
                ExecutionStatus::Cancelled
            } else if session.nodes_failed > 0 {
                ExecutionStatus::Failed
            } else {
                ExecutionStatus::Completed
            };
            session.ended_at = Some(Utc::now());
            session.clone()
        };

        info!(
            session_id = %id,
            status = ?snapshot.status,
            executed = snapshot.nodes_executed,
            failed = snapshot.nodes_failed,
            "execution session ended"
        );
        self.forward("session_ended", |l| l.session_ended(&snapshot));
        Ok(())
    }

    /// Request cooperative cancellation.
    ///
    /// The orchestrator checks the flag between node dispatches; a node
    /// already mid-execution is never interrupted.
    pub fn cancel(&self, id: Uuid) -> Result<(), EngineError> {
        let mut store = self.store.write().unwrap();
        let session = store
            .sessions
            .get_mut(&id)
            .ok_or(EngineError::SessionNotFound(id))?;
        if session.status.is_terminal() {
            warn!(session_id = %id, "ignoring cancellation of terminal session");
            return Ok(());
        }
        session.cancel_requested = true;
        info!(session_id = %id, "cancellation requested");
        Ok(())
    }

    pub fn is_cancel_requested(&self, id: Uuid) -> Result<bool, EngineError> {
        let store = self.store.read().unwrap();
        store
            .sessions
            .get(&id)
            .map(|s| s.cancel_requested)
            .ok_or(EngineError::SessionNotFound(id))
    }

    /// Snapshot of a session.
    pub fn get_session(&self, id: Uuid) -> Result<ExecutionSession, EngineError> {
        let store = self.store.read().unwrap();
        store
            .sessions
            .get(&id)
            .cloned()
            .ok_or(EngineError::SessionNotFound(id))
    }

    /// Snapshot of a session's records in dispatch order.
    pub fn records(&self, id: Uuid) -> Result<Vec<NodeExecutionRecord>, EngineError> {
        let store = self.store.read().unwrap();
        store
            .sessions
            .get(&id)
            .map(|s| s.records.clone())
            .ok_or(EngineError::SessionNotFound(id))
    }

    /// Session summaries, most-recent-first, optionally filtered by status
    /// and capped to `limit`.
    pub fn get_execution_history(
        &self,
        limit: Option<usize>,
        status: Option<ExecutionStatus>,
    ) -> Vec<SessionSummary> {
        let store = self.store.read().unwrap();
        let iter = store
            .creation_order
            .iter()
            .rev()
            .filter_map(|id| store.sessions.get(id))
            .filter(|s| status.map_or(true, |wanted| s.status == wanted))
            .map(|s| s.summary());
        match limit {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        }
    }

    /// Forward an event to the logging collaborator, swallowing failures.
    fn forward(&self, event: &str, f: impl FnOnce(&dyn ExecutionLogger) -> anyhow::Result<()>) {
        if let Some(logger) = &self.logger {
            if let Err(err) = f(logger.as_ref()) {
                warn!(event, error = %err, "execution logger event failed; continuing");
            }
        }
    }
}
