//! Scan pipeline
//!
//! - Worker: one table's fingerprint on one pooled connection
//! - Orchestrator: bounded fan-out over every enumerated table

pub mod orchestrator;
pub mod worker;

pub use orchestrator::SnapshotOrchestrator;
pub use worker::PostgresScanner;
