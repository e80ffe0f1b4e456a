/// Ruleway: decision automation core
///
/// This library provides a workflow interpreter that walks process graphs of
/// typed nodes over a JSON working state, and a static analyzer that detects
/// shadowed, contradictory and overlapping rules within a rule set.

// Core configuration and setup
pub mod config;

// Error taxonomy for workflow runs
pub mod error;

// Guard expressions, dotted paths and template interpolation
pub mod expression;

// Condition model, rule execution and conflict analysis
pub mod rules;

// Workflow management layer - definitions, validation and registry
pub mod workflow;

// Runtime execution engine - interpreter loop and node handlers
pub mod runtime;

// Command-line wiring
pub mod app;

// Re-export commonly used types for external consumers
pub use error::WorkflowError;
pub use rules::{analyze_conflicts, analyze_rule_set, RuleConflict, RuleSet};
pub use runtime::{WorkflowEngine, WorkflowInstance};
pub use workflow::{Edge, Node, NodeKind, WorkflowDefinition};
