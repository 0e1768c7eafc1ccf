//! Directory-per-session file logger.
//!
//! Layout under the base directory (default `.logs`):
//!
//! ```text
//! .logs/
//!   .gitignore
//!   execution_registry.json          — summaries of finished sessions
//!   <session-id>/
//!     execution_metadata.json        — full session snapshot, kept current
//!     execution_summary.log          — one line per lifecycle event
//!     node_<node-id>.log             — per-node start/end lines
//! ```
//!
//! Every event rewrites the metadata snapshot, so the session can be
//! reconstructed from disk at any point, not only after a clean end.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use engine::session::{ExecutionSession, NodeExecutionRecord};
use engine::ExecutionLogger;

pub struct FileLogger {
    base_dir: PathBuf,
}

impl FileLogger {
    /// Create the logger, the base directory, and a `.gitignore` that keeps
    /// logs out of version control.
    pub fn new(base_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;

        let gitignore = base_dir.join(".gitignore");
        if !gitignore.exists() {
            fs::write(&gitignore, "# Ignore all log files\n*\n!.gitignore\n")?;
        }

        Ok(Self { base_dir })
    }

    pub fn session_dir(&self, session_id: Uuid) -> PathBuf {
        self.base_dir.join(session_id.to_string())
    }

    pub fn registry_path(&self) -> PathBuf {
        self.base_dir.join("execution_registry.json")
    }

    fn write_metadata(&self, session: &ExecutionSession) -> anyhow::Result<()> {
        let path = self.session_dir(session.id).join("execution_metadata.json");
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, session)?;
        Ok(())
    }

    fn append_line(&self, path: &Path, level: &str, source: &str, message: &str) -> anyhow::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "[{}] [{level}] [{source}] {message}", Utc::now().to_rfc3339())?;
        Ok(())
    }

    fn append_summary(&self, session_id: Uuid, level: &str, source: &str, message: &str) -> anyhow::Result<()> {
        let path = self.session_dir(session_id).join("execution_summary.log");
        self.append_line(&path, level, source, message)
    }

    fn append_node_log(&self, session_id: Uuid, node_id: &str, level: &str, message: &str) -> anyhow::Result<()> {
        let path = self.session_dir(session_id).join(format!("node_{node_id}.log"));
        self.append_line(&path, level, node_id, message)
    }

    /// Append a finished session to the registry (read-modify-write; the
    /// registry is small and appended once per run).
    fn append_registry(&self, session: &ExecutionSession) -> anyhow::Result<()> {
        let path = self.registry_path();
        let mut entries: Vec<Value> = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?).unwrap_or_default()
        } else {
            Vec::new()
        };

        entries.push(json!({
            "id": session.id,
            "workflow_id": session.workflow_id,
            "workflow_name": session.workflow_name,
            "status": session.status,
            "created_at": session.created_at,
            "ended_at": session.ended_at,
            "duration_ms": session.duration_ms(),
            "nodes_executed": session.nodes_executed,
            "nodes_failed": session.nodes_failed,
            "log_directory": self.session_dir(session.id),
        }));

        fs::write(&path, serde_json::to_string_pretty(&entries)?)?;
        Ok(())
    }
}

impl ExecutionLogger for FileLogger {
    fn session_created(&self, session: &ExecutionSession) -> anyhow::Result<()> {
        fs::create_dir_all(self.session_dir(session.id))?;
        self.write_metadata(session)?;
        self.append_summary(
            session.id,
            "INFO",
            "SYSTEM",
            &format!(
                "execution session {} initialized for workflow '{}' ({} nodes)",
                session.id,
                session.workflow_name,
                session.execution_order.len()
            ),
        )
    }

    fn session_started(&self, session: &ExecutionSession) -> anyhow::Result<()> {
        self.write_metadata(session)?;
        self.append_summary(session.id, "INFO", "SYSTEM", "execution session started")
    }

    fn node_started(
        &self,
        session: &ExecutionSession,
        record: &NodeExecutionRecord,
    ) -> anyhow::Result<()> {
        self.write_metadata(session)?;
        self.append_summary(
            session.id,
            "INFO",
            &record.node_id,
            &format!("node '{}' ({}) started", record.node_name, record.node_type),
        )?;
        self.append_node_log(session.id, &record.node_id, "INFO", "execution started")
    }

    fn node_ended(
        &self,
        session: &ExecutionSession,
        record: &NodeExecutionRecord,
    ) -> anyhow::Result<()> {
        self.write_metadata(session)?;

        match &record.error {
            None => {
                self.append_summary(
                    session.id,
                    "INFO",
                    &record.node_id,
                    &format!("node '{}' completed in {}ms", record.node_name, record.duration_ms),
                )?;
                self.append_node_log(
                    session.id,
                    &record.node_id,
                    "INFO",
                    &format!(
                        "execution completed in {}ms, output: {}",
                        record.duration_ms,
                        record.output.as_ref().unwrap_or(&Value::Null)
                    ),
                )
            }
            Some(error) => {
                self.append_summary(
                    session.id,
                    "ERROR",
                    &record.node_id,
                    &format!("node '{}' failed: {error}", record.node_name),
                )?;
                self.append_node_log(
                    session.id,
                    &record.node_id,
                    "ERROR",
                    &format!("execution failed: {error}"),
                )
            }
        }
    }

    fn session_ended(&self, session: &ExecutionSession) -> anyhow::Result<()> {
        self.write_metadata(session)?;
        self.append_summary(
            session.id,
            "INFO",
            "SYSTEM",
            &format!(
                "execution session ended with status {:?} ({} executed, {} failed, {}ms)",
                session.status,
                session.nodes_executed,
                session.nodes_failed,
                session.duration_ms()
            ),
        )?;
        self.append_registry(session)
    }
}
