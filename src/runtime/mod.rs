/// Runtime Execution Engine
///
/// This module provides the sequential workflow interpreter. It handles:
/// - Walking the process graph from its start node under an iteration cap
/// - Per-node-type execution handlers
/// - Instance state, execution logs and checkpoints
/// - External service adapters

// Core interpreter loop
pub mod engine;

// Individual node execution handlers
pub mod executor;

// Run-time instance record and log entries
pub mod instance;

// Checkpoint stores (in-memory and SQLite)
pub mod checkpoint;

// Adapter configuration and HTTP invocation
pub mod service;

// Re-export main types
pub use checkpoint::{CheckpointStore, InMemoryCheckpointStore, SqliteCheckpointStore};
pub use engine::WorkflowEngine;
pub use executor::NodeExecutor;
pub use instance::{ExecutionLogEntry, InstanceStatus, LogStatus, WorkflowInstance};
pub use service::{AdapterConfig, AdapterRegistry, HttpServiceInvoker, ServiceInvoker, ServiceRequest};
