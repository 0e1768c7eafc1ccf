//! Execution context construction.
//!
//! Builds the read-only view of already-completed node outputs that the
//! expression engine consumes. Nodes that have not completed are simply
//! absent — absence only becomes an error at expression-resolution time.

use std::collections::BTreeMap;

use uuid::Uuid;

use nodes::ExecutionContext;

use crate::session::{NodeExecutionRecord, NodeRecordStatus};

/// Build a context from the records completed so far, keyed by node name.
///
/// Failed or unfinished records contribute nothing.
pub fn build_context(
    session_id: Uuid,
    workflow_id: Uuid,
    records: &[NodeExecutionRecord],
) -> ExecutionContext {
    let mut outputs = BTreeMap::new();
    for record in records {
        if record.status == NodeRecordStatus::Completed {
            if let Some(output) = &record.output {
                outputs.insert(record.node_name.clone(), output.clone());
            }
        }
    }
    ExecutionContext::new(session_id, workflow_id, outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn record(name: &str, status: NodeRecordStatus, output: Option<serde_json::Value>) -> NodeExecutionRecord {
        NodeExecutionRecord {
            node_id: format!("id-{name}"),
            node_name: name.to_owned(),
            node_type: "mock".to_owned(),
            status,
            started_at: Utc::now(),
            ended_at: Some(Utc::now()),
            duration_ms: 0,
            output,
            error: None,
        }
    }

    #[test]
    fn maps_completed_records_by_node_name() {
        let records = vec![
            record("Input", NodeRecordStatus::Completed, Some(json!({ "data": 1 }))),
            record("Second", NodeRecordStatus::Completed, Some(json!({ "data": 2 }))),
        ];
        let ctx = build_context(Uuid::new_v4(), Uuid::new_v4(), &records);

        assert_eq!(ctx.output("Input"), Some(&json!({ "data": 1 })));
        assert_eq!(ctx.output("Second"), Some(&json!({ "data": 2 })));
    }

    #[test]
    fn failed_and_running_records_are_absent() {
        let records = vec![
            record("Ok", NodeRecordStatus::Completed, Some(json!({ "data": 1 }))),
            record("Boom", NodeRecordStatus::Failed, None),
            record("Busy", NodeRecordStatus::Running, None),
        ];
        let ctx = build_context(Uuid::new_v4(), Uuid::new_v4(), &records);

        assert!(ctx.contains("Ok"));
        assert!(!ctx.contains("Boom"));
        assert!(!ctx.contains("Busy"));
    }
}
