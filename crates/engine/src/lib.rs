//! `engine` crate — core domain models, graph resolution, expression
//! evaluation, session tracking, and the workflow orchestrator.

pub mod context;
pub mod error;
pub mod executor;
pub mod expression;
pub mod graph;
pub mod logger;
pub mod models;
pub mod session;

pub use error::EngineError;
pub use executor::{ExecutorConfig, WorkflowExecutor};
pub use expression::ExpressionError;
pub use graph::{reachable_from, topological_sort};
pub use logger::ExecutionLogger;
pub use models::{Connection, Workflow};
pub use session::{
    ExecutionSession, ExecutionStatus, NodeExecutionRecord, NodeRecordStatus, SessionManager,
};

#[cfg(test)]
mod executor_tests;
