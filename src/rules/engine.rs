/// Rule execution
///
/// `RuleExecutor` is the collaborator interface the workflow interpreter calls
/// for `ruleTask` nodes. `RuleEngine` is the in-process implementation: it
/// evaluates the active rules of a set against the input and applies the
/// actions of every matching rule to a working copy.

use crate::expression::{as_number, resolve_path, resolve_template, set_path};
use crate::rules::condition::{ActionType, HitPolicy, RuleAction, RuleSet};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Instant;

/// Outcome of running a rule set against one input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleExecutionResult {
    /// State fragment to merge into the caller's state
    pub output: Map<String, Value>,
    /// Ids of the rules whose conditions matched, in firing order
    pub rules_fired: Vec<String>,
    pub execution_time_ms: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[async_trait]
pub trait RuleExecutor: Send + Sync {
    async fn execute(&self, rule_set: &RuleSet, input: &Value) -> Result<RuleExecutionResult>;
}

#[derive(Debug, Default, Clone)]
pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate synchronously. Exposed for callers outside an async context.
    pub fn evaluate(&self, rule_set: &RuleSet, input: &Value) -> RuleExecutionResult {
        let started = Instant::now();
        let mut working = input.clone();
        let mut touched: Vec<String> = Vec::new();
        let mut rules_fired = Vec::new();

        for rule in rule_set.active_rules() {
            // Conditions see the effects of earlier rules.
            if !rule.matches(&working) {
                continue;
            }

            tracing::debug!("🎯 Rule '{}' fired in set '{}'", rule.id, rule_set.id);
            for action in &rule.actions {
                apply_action(&mut working, action);
                let top = action.field.split('.').next().unwrap_or_default().to_string();
                if !top.is_empty() && !touched.contains(&top) {
                    touched.push(top);
                }
            }
            rules_fired.push(rule.id.clone());

            if rule_set.hit_policy == HitPolicy::First {
                break;
            }
        }

        let mut output = Map::new();
        for key in touched {
            if let Some(value) = working.get(&key) {
                output.insert(key, value.clone());
            }
        }

        RuleExecutionResult {
            output,
            rules_fired,
            execution_time_ms: started.elapsed().as_millis() as u64,
            success: true,
            error: None,
        }
    }
}

#[async_trait]
impl RuleExecutor for RuleEngine {
    async fn execute(&self, rule_set: &RuleSet, input: &Value) -> Result<RuleExecutionResult> {
        Ok(self.evaluate(rule_set, input))
    }
}

fn apply_action(working: &mut Value, action: &RuleAction) {
    let value = resolve_template(&action.value, working);
    let current = resolve_path(working, &action.field).cloned();

    let next = match action.action_type {
        ActionType::Set => value,
        ActionType::Increment | ActionType::Decrement => {
            let base = current.as_ref().and_then(as_number).unwrap_or(0.0);
            let step = as_number(&value).unwrap_or(1.0);
            let result = if action.action_type == ActionType::Increment { base + step } else { base - step };
            number_value(result)
        }
        ActionType::Append => {
            let mut items = match current {
                Some(Value::Array(items)) => items,
                Some(Value::Null) | None => Vec::new(),
                Some(other) => vec![other],
            };
            items.push(value);
            Value::Array(items)
        }
    };

    set_path(working, &action.field, next);
}

// Whole results stay integers so `10 + 5` serializes as `15`, not `15.0`.
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}
