/// Rules Layer
///
/// Condition/action model shared by the interpreter and the analyzer:
/// - Condition trees, rules and rule sets
/// - Static conflict analysis (shadow, contradiction, overlap)
/// - In-process rule execution behind the `RuleExecutor` interface
/// - Lock-free rule set registry

pub mod condition;

pub mod conflict;

pub mod engine;

pub mod registry;

pub use condition::{Condition, ConditionGroup, Operator, Rule, RuleAction, RuleSet};
pub use conflict::{analyze_conflicts, analyze_rule_set, ConflictType, RuleConflict, Severity};
pub use engine::{RuleEngine, RuleExecutionResult, RuleExecutor};
pub use registry::RuleSetRegistry;
