//! The logging collaborator contract.
//!
//! An [`ExecutionLogger`] receives lifecycle events with enough data to
//! reconstruct an [`ExecutionSession`](crate::ExecutionSession) externally
//! (file, database, remote). Logging is best-effort: the session manager
//! swallows every error a logger returns, so an implementation can never
//! abort an execution.

use crate::session::{ExecutionSession, NodeExecutionRecord};

/// Receiver for session/node lifecycle events.
///
/// Each method gets the full session snapshot (and the affected record,
/// where applicable) at the moment of the event.
pub trait ExecutionLogger: Send + Sync {
    fn session_created(&self, session: &ExecutionSession) -> anyhow::Result<()>;

    fn session_started(&self, session: &ExecutionSession) -> anyhow::Result<()>;

    fn node_started(
        &self,
        session: &ExecutionSession,
        record: &NodeExecutionRecord,
    ) -> anyhow::Result<()>;

    fn node_ended(
        &self,
        session: &ExecutionSession,
        record: &NodeExecutionRecord,
    ) -> anyhow::Result<()>;

    fn session_ended(&self, session: &ExecutionSession) -> anyhow::Result<()>;
}
