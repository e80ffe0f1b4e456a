/// Node execution handlers
///
/// This module contains the execution logic for each node type:
/// - Start / End: entry and terminal markers
/// - RuleTask: rule set evaluation through the `RuleExecutor` collaborator
/// - Decision: first matching guard, else the default branch
/// - ServiceTask: adapter call through the `ServiceInvoker` collaborator
/// - Script: field assignments into the working state
/// - Timer: recorded, never waited on

use crate::{
    error::WorkflowError,
    expression::{self, resolve_template, set_path},
    rules::{RuleExecutor, RuleSetRegistry},
    runtime::instance::LogStatus,
    runtime::service::{AdapterRegistry, AdapterType, ServiceInvoker, ServiceRequest},
    workflow::types::{
        Assignment, Node, NodeKind, RuleTaskConfig, ServiceTaskConfig, TimerConfig, WorkflowDefinition,
    },
};
use anyhow::Result;
use serde_json::{json, Map, Value};
use std::{sync::Arc, time::Duration};

/// Where the run goes after a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Continue with this node id
    Next(String),
    /// No outgoing edge; the run stops here
    DeadEnd,
    /// An end node was reached
    Complete,
}

/// Result of executing a single node
///
/// Carries what goes into the log entry plus the transition. Node id, type,
/// timestamp and duration are filled in by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOutcome {
    pub status: LogStatus,
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub transition: Transition,
}

impl NodeOutcome {
    fn completed(transition: Transition) -> Self {
        Self { status: LogStatus::Completed, input: None, output: None, transition }
    }

    fn with_input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }

    fn with_output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }
}

/// Node executor that dispatches on node type
///
/// Holds the collaborators node handlers need. Stateless between calls: all
/// run state lives in the working-state value passed in.
pub struct NodeExecutor {
    rule_sets: Arc<RuleSetRegistry>,
    rule_executor: Arc<dyn RuleExecutor>,
    adapters: Arc<AdapterRegistry>,
    service: Arc<dyn ServiceInvoker>,
    service_timeout: Duration,
}

impl NodeExecutor {
    pub fn new(
        rule_sets: Arc<RuleSetRegistry>,
        rule_executor: Arc<dyn RuleExecutor>,
        adapters: Arc<AdapterRegistry>,
        service: Arc<dyn ServiceInvoker>,
        service_timeout: Duration,
    ) -> Self {
        Self { rule_sets, rule_executor, adapters, service, service_timeout }
    }

    /// Execute one node against the working state.
    pub async fn execute_node(
        &self,
        definition: &WorkflowDefinition,
        node: &Node,
        state: &mut Value,
    ) -> Result<NodeOutcome> {
        tracing::debug!("🚀 Executing node: {} (type: {})", node.id, node.type_name());

        match &node.kind {
            NodeKind::Start => Ok(NodeOutcome::completed(single_transition(definition, node)?)),
            NodeKind::End => Ok(NodeOutcome::completed(Transition::Complete).with_output(state.clone())),
            NodeKind::RuleTask(config) => self.execute_rule_task_node(definition, node, config, state).await,
            NodeKind::Decision => execute_decision_node(definition, node, state),
            NodeKind::ServiceTask(config) => self.execute_service_task_node(definition, node, config, state).await,
            NodeKind::Script(config) => {
                let input = state.clone();
                apply_assignments(&config.assignments, state);
                Ok(NodeOutcome::completed(single_transition(definition, node)?)
                    .with_input(input)
                    .with_output(state.clone()))
            }
            NodeKind::Timer(config) => execute_timer_node(definition, node, config),
            NodeKind::Unknown { node_type, .. } => {
                tracing::warn!("⏭️ Skipping node '{}' with unrecognised type '{}'", node.id, node_type);
                Ok(NodeOutcome {
                    status: LogStatus::Skipped,
                    input: None,
                    output: None,
                    transition: single_transition(definition, node)?,
                })
            }
        }
    }

    async fn execute_rule_task_node(
        &self,
        definition: &WorkflowDefinition,
        node: &Node,
        config: &RuleTaskConfig,
        state: &mut Value,
    ) -> Result<NodeOutcome> {
        let rule_set_id = config
            .rule_set_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| WorkflowError::MissingRuleSetReference(node.id.clone()))?;
        let rule_set = self
            .rule_sets
            .get(rule_set_id)
            .ok_or_else(|| WorkflowError::RuleSetNotFound(rule_set_id.to_string()))?;

        tracing::debug!("🧠 Running rule set '{}' for node '{}'", rule_set_id, node.id);
        let input = state.clone();
        let result = self.rule_executor.execute(&rule_set, &input).await?;

        if !result.success {
            let message = result.error.unwrap_or_else(|| "rule set reported failure".to_string());
            return Err(WorkflowError::RuleExecutionFailed(message).into());
        }

        merge_into(state, result.output.clone());
        tracing::debug!("🎯 Rules fired in '{}': {:?}", rule_set_id, result.rules_fired);

        Ok(NodeOutcome::completed(single_transition(definition, node)?)
            .with_input(input)
            .with_output(json!({
                "ruleSetId": rule_set_id,
                "rulesFired": result.rules_fired,
                "output": result.output,
                "executionTimeMs": result.execution_time_ms,
            })))
    }

    async fn execute_service_task_node(
        &self,
        definition: &WorkflowDefinition,
        node: &Node,
        config: &ServiceTaskConfig,
        state: &mut Value,
    ) -> Result<NodeOutcome> {
        let input = state.clone();
        let mut response = Value::Null;

        if let Some(adapter_id) = config.adapter_id.as_deref().filter(|id| !id.is_empty()) {
            let adapter = self
                .adapters
                .get(adapter_id)
                .ok_or_else(|| WorkflowError::AdapterNotFound(adapter_id.to_string()))?;

            if adapter.adapter_type == AdapterType::Rest {
                let request = ServiceRequest {
                    method: config.method.clone().unwrap_or_else(|| "POST".to_string()),
                    path: config.path.clone().unwrap_or_default(),
                    headers: config.headers.clone(),
                    body: state.clone(),
                    timeout: self.service_timeout,
                };

                tracing::debug!("🌐 Calling adapter '{}' for node '{}'", adapter_id, node.id);
                response = tokio::time::timeout(self.service_timeout, self.service.invoke(&adapter, request))
                    .await
                    .map_err(|_| WorkflowError::ServiceTimeout {
                        adapter_id: adapter_id.to_string(),
                        timeout_ms: self.service_timeout.as_millis() as u64,
                    })??;

                match config.output_field.as_deref().filter(|f| !f.is_empty()) {
                    Some(field) => set_path(state, field, response.clone()),
                    None => match &response {
                        Value::Object(fields) => merge_into(state, fields.clone()),
                        other => set_path(state, "response", other.clone()),
                    },
                }
            } else {
                tracing::debug!(
                    "⏭️ Adapter '{}' is {:?}, not REST; skipping the call for node '{}'",
                    adapter_id,
                    adapter.adapter_type,
                    node.id
                );
            }
        }

        if !config.transform.is_empty() {
            apply_assignments(&config.transform, state);
        }

        Ok(NodeOutcome::completed(single_transition(definition, node)?)
            .with_input(input)
            .with_output(json!({ "response": response, "state": state.clone() })))
    }
}

fn execute_decision_node(definition: &WorkflowDefinition, node: &Node, state: &Value) -> Result<NodeOutcome> {
    let outgoing: Vec<_> = definition.outgoing(&node.id).collect();

    for edge in &outgoing {
        let Some(guard) = edge.guard() else { continue };
        match expression::evaluate(state, guard) {
            Ok(true) => {
                tracing::debug!("🔀 Decision '{}' took edge '{}' ({})", node.id, edge.id, guard);
                return Ok(NodeOutcome::completed(Transition::Next(edge.target.clone())).with_output(json!({
                    "edgeId": edge.id,
                    "target": edge.target,
                    "condition": guard,
                })));
            }
            Ok(false) => {}
            Err(e) => tracing::warn!("⚠️ Guard on edge '{}' treated as false: {}", edge.id, e),
        }
    }

    let fallback = outgoing
        .iter()
        .find(|edge| edge.is_fallback())
        .ok_or_else(|| WorkflowError::NoMatchingBranch(node.id.clone()))?;

    tracing::debug!("🔀 Decision '{}' fell back to edge '{}'", node.id, fallback.id);
    Ok(NodeOutcome::completed(Transition::Next(fallback.target.clone())).with_output(json!({
        "edgeId": fallback.id,
        "target": fallback.target,
        "default": true,
    })))
}

fn execute_timer_node(definition: &WorkflowDefinition, node: &Node, config: &TimerConfig) -> Result<NodeOutcome> {
    // Durable timers need a suspend/resume checkpoint; until then the delay is only recorded.
    let delay = config.delay.clone().unwrap_or(Value::Null);
    tracing::debug!("⏰ Timer '{}' recorded delay {} without waiting", node.id, delay);
    Ok(NodeOutcome::completed(single_transition(definition, node)?).with_output(json!({ "delay": delay })))
}

/// Apply script assignments in order; later assignments see earlier ones.
pub fn apply_assignments(assignments: &[Assignment], state: &mut Value) {
    for assignment in assignments {
        let value = resolve_template(&assignment.value, state);
        set_path(state, &assignment.field, value);
    }
}

/// Shallow merge: incoming top-level fields replace existing ones.
pub fn merge_into(state: &mut Value, fields: Map<String, Value>) {
    if !state.is_object() {
        *state = Value::Object(Map::new());
    }
    if let Value::Object(target) = state {
        target.extend(fields);
    }
}

/// Target of the only outgoing edge of a linear node.
fn single_transition(definition: &WorkflowDefinition, node: &Node) -> Result<Transition, WorkflowError> {
    let mut outgoing = definition.outgoing(&node.id);
    match (outgoing.next(), outgoing.count()) {
        (None, _) => Ok(Transition::DeadEnd),
        (Some(edge), 0) => Ok(Transition::Next(edge.target.clone())),
        (Some(_), extra) => Err(WorkflowError::AmbiguousTransition { node_id: node.id.clone(), count: extra + 1 }),
    }
}
