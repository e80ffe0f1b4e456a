/// Workflow Management Layer
///
/// This module handles workflow definitions and the in-memory registry:
/// - Type definitions (WorkflowDefinition, Node, NodeKind, Edge)
/// - Structural validation with petgraph
/// - Lock-free hot-reload registry using ArcSwap

// Core workflow type definitions
pub mod types;

// Structural checks (start/end nodes, dangling edges, reachability)
pub mod validation;

// Hot-reload registry using ArcSwap for zero-downtime updates
pub mod registry;

// Re-export commonly used types
pub use registry::WorkflowRegistry;
pub use types::{Assignment, Edge, Node, NodeKind, WorkflowDefinition};
pub use validation::{validate, ValidationReport};
