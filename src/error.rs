/// Error taxonomy for workflow runs
///
/// Every variant is fatal to the run that raised it. The `Display` string is what
/// ends up in `WorkflowInstance::error` and in the failing log entry.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkflowError {
    // Definition errors
    #[error("workflow has no start node")]
    NoStartNode,

    #[error("workflow has {0} start nodes; expected exactly one")]
    MultipleStartNodes(usize),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("rule task '{0}' has no rule set reference")]
    MissingRuleSetReference(String),

    #[error("rule set not found: {0}")]
    RuleSetNotFound(String),

    #[error("adapter not found: {0}")]
    AdapterNotFound(String),

    #[error("decision '{0}' has no matching condition and no default branch")]
    NoMatchingBranch(String),

    #[error("node '{node_id}' has {count} outgoing edges; expected exactly one")]
    AmbiguousTransition { node_id: String, count: usize },

    // Collaborator errors
    #[error("rule execution failed: {0}")]
    RuleExecutionFailed(String),

    #[error("service call to adapter '{adapter_id}' timed out after {timeout_ms}ms")]
    ServiceTimeout { adapter_id: String, timeout_ms: u64 },

    // Runaway-graph errors
    #[error("maximum iterations exceeded ({0})")]
    MaxIterationsExceeded(usize),

    #[error("workflow ended without reaching an End node")]
    EndedWithoutEnd,
}
