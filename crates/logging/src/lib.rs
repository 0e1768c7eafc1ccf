//! `logging` crate — file-backed implementation of the engine's
//! [`ExecutionLogger`](engine::ExecutionLogger) collaborator.
//!
//! Creates one directory per execution session with a metadata snapshot,
//! a summary log, and per-node log files, plus a top-level registry of
//! finished executions.

pub mod file_logger;

pub use file_logger::FileLogger;
