/// Workflow execution engine
///
/// Walks a process graph from its start node, one node at a time, threading a
/// single working state through the node handlers. Branching happens only at
/// decision nodes, cycles are allowed and bounded by `max_iterations`, and
/// every visit is appended to the instance log.

use crate::{
    config::EngineConfig,
    error::WorkflowError,
    rules::{RuleEngine, RuleSetRegistry},
    runtime::{
        checkpoint::{CheckpointStore, InMemoryCheckpointStore},
        executor::{NodeExecutor, Transition},
        instance::{ExecutionLogEntry, InstanceStatus, LogStatus, WorkflowInstance},
        service::{AdapterRegistry, HttpServiceInvoker},
    },
    workflow::{WorkflowDefinition, WorkflowRegistry},
};
use anyhow::Result;
use chrono::Utc;
use serde_json::Value;
use std::{sync::Arc, time::Instant};
use tokio::task::JoinHandle;

/// Sequential interpreter for workflow definitions
pub struct WorkflowEngine {
    /// Node executor for handling individual node execution
    executor: NodeExecutor,
    checkpoints: Arc<dyn CheckpointStore>,
    max_iterations: usize,
}

impl WorkflowEngine {
    pub fn new(executor: NodeExecutor, checkpoints: Arc<dyn CheckpointStore>, max_iterations: usize) -> Self {
        Self { executor, checkpoints, max_iterations }
    }

    /// Engine with the in-process rule engine, the reqwest invoker and in-memory checkpoints.
    pub fn with_defaults(
        rule_sets: Arc<RuleSetRegistry>,
        adapters: Arc<AdapterRegistry>,
        config: &EngineConfig,
    ) -> Self {
        let executor = NodeExecutor::new(
            rule_sets,
            Arc::new(RuleEngine::new()),
            adapters,
            Arc::new(HttpServiceInvoker::new()),
            config.service_timeout(),
        );
        Self::new(executor, Arc::new(InMemoryCheckpointStore::new()), config.max_iterations)
    }

    pub fn with_checkpoint_store(mut self, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = checkpoints;
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn checkpoints(&self) -> &Arc<dyn CheckpointStore> {
        &self.checkpoints
    }

    /// Run a definition to completion under a fresh instance id.
    pub async fn execute(&self, definition: &WorkflowDefinition, initial_state: Value) -> WorkflowInstance {
        let instance_id = uuid::Uuid::new_v4().to_string();
        self.execute_with_id(definition, instance_id, initial_state).await
    }

    /// Run a definition to completion under a caller-supplied instance id.
    ///
    /// Never returns an error: every failure ends the run with status `failed`
    /// and the message in `error`.
    pub async fn execute_with_id(
        &self,
        definition: &WorkflowDefinition,
        instance_id: impl Into<String>,
        initial_state: Value,
    ) -> WorkflowInstance {
        let mut instance = WorkflowInstance::new(instance_id, definition.id.clone(), initial_state);
        let run_started = Instant::now();

        tracing::info!(
            "🚀 Starting workflow run {} (workflow: {})",
            instance.id,
            definition.id.as_deref().unwrap_or("<inline>")
        );

        self.run(definition, &mut instance).await;
        self.checkpoint(&instance).await;

        match instance.status {
            InstanceStatus::Completed => tracing::info!(
                "🎉 Workflow run {} completed in {:?} after {} nodes",
                instance.id,
                run_started.elapsed(),
                instance.logs.len()
            ),
            _ => tracing::error!(
                "❌ Workflow run {} failed after {} nodes: {}",
                instance.id,
                instance.logs.len(),
                instance.error.as_deref().unwrap_or_default()
            ),
        }

        instance
    }

    /// Look up a registered workflow and run it.
    pub async fn execute_registered(
        &self,
        registry: &WorkflowRegistry,
        workflow_id: &str,
        initial_state: Value,
    ) -> Result<WorkflowInstance> {
        let definition = registry
            .get(workflow_id)
            .ok_or_else(|| anyhow::anyhow!("Workflow not found: {}", workflow_id))?;
        Ok(self.execute(&definition, initial_state).await)
    }

    /// Run on its own tokio task.
    pub fn spawn(self: &Arc<Self>, definition: Arc<WorkflowDefinition>, initial_state: Value) -> JoinHandle<WorkflowInstance> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.execute(&definition, initial_state).await })
    }

    async fn run(&self, definition: &WorkflowDefinition, instance: &mut WorkflowInstance) {
        let mut current = match definition.start_node() {
            Ok(start) => start.id.clone(),
            Err(e) => return instance.fail(e.to_string()),
        };
        let mut iterations = 0usize;

        loop {
            if iterations >= self.max_iterations {
                tracing::warn!("⚠️ Run {} hit the iteration cap at node '{}'", instance.id, current);
                return instance.fail(WorkflowError::MaxIterationsExceeded(self.max_iterations).to_string());
            }
            iterations += 1;

            let Some(node) = definition.node(&current) else {
                return instance.fail(WorkflowError::NodeNotFound(current).to_string());
            };

            instance.current_node = Some(node.id.clone());
            instance.updated_at = Utc::now();
            self.checkpoint(instance).await;

            tracing::info!("📍 Step {}: executing node '{}' (type: {})", iterations, node.id, node.type_name());
            let timestamp = Utc::now();
            let node_started = Instant::now();
            let result = self.executor.execute_node(definition, node, &mut instance.state).await;
            let duration_ms = node_started.elapsed().as_millis() as u64;

            match result {
                Ok(outcome) => {
                    if outcome.status == LogStatus::Completed {
                        tracing::info!("✅ Node '{}' completed in {}ms", node.id, duration_ms);
                    }
                    instance.logs.push(ExecutionLogEntry {
                        node_id: node.id.clone(),
                        node_type: node.type_name().to_string(),
                        label: node.display_label().to_string(),
                        status: outcome.status,
                        input: outcome.input,
                        output: outcome.output,
                        error: None,
                        timestamp,
                        duration_ms,
                    });

                    match outcome.transition {
                        Transition::Next(next) => current = next,
                        Transition::Complete => return instance.complete(),
                        Transition::DeadEnd => {
                            return instance.fail(WorkflowError::EndedWithoutEnd.to_string());
                        }
                    }
                }
                Err(e) => {
                    let message = e.to_string();
                    tracing::error!("❌ Node '{}' failed: {}", node.id, message);
                    instance.logs.push(ExecutionLogEntry {
                        node_id: node.id.clone(),
                        node_type: node.type_name().to_string(),
                        label: node.display_label().to_string(),
                        status: LogStatus::Error,
                        input: Some(instance.state.clone()),
                        output: None,
                        error: Some(message.clone()),
                        timestamp,
                        duration_ms,
                    });
                    return instance.fail(message);
                }
            }
        }
    }

    async fn checkpoint(&self, instance: &WorkflowInstance) {
        if let Err(e) = self.checkpoints.save(instance).await {
            tracing::warn!("⚠️ Failed to checkpoint run {}: {}", instance.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{Edge, Node, NodeKind};
    use serde_json::json;

    fn engine(max_iterations: usize) -> WorkflowEngine {
        let config = EngineConfig { max_iterations, service_timeout_secs: 1 };
        WorkflowEngine::with_defaults(Arc::new(RuleSetRegistry::new()), Arc::new(AdapterRegistry::new()), &config)
    }

    #[tokio::test]
    async fn start_to_end_completes_with_input_as_output() {
        let def = WorkflowDefinition::new(
            vec![Node::new("s", NodeKind::Start), Node::new("e", NodeKind::End)],
            vec![Edge::new("e1", "s", "e")],
        );
        let instance = engine(10).execute_with_id(&def, "run", json!({ "x": 1 })).await;

        assert_eq!(instance.status, InstanceStatus::Completed);
        assert_eq!(instance.output, Some(json!({ "x": 1 })));
        assert_eq!(instance.path(), vec!["s", "e"]);
        assert!(instance.completed_at.is_some());
    }

    #[tokio::test]
    async fn iteration_cap_is_configurable() {
        let def = WorkflowDefinition::new(
            vec![Node::new("s", NodeKind::Start), Node::new("a", NodeKind::Timer(Default::default()))],
            vec![Edge::new("e1", "s", "a"), Edge::new("e2", "a", "a")],
        );
        let instance = engine(5).execute(&def, json!({})).await;

        assert_eq!(instance.status, InstanceStatus::Failed);
        assert_eq!(instance.logs.len(), 5);
        assert_eq!(instance.error.as_deref(), Some("maximum iterations exceeded (5)"));
    }

    #[tokio::test]
    async fn failing_node_gets_an_error_entry() {
        let def = WorkflowDefinition::new(
            vec![Node::new("s", NodeKind::Start), Node::new("r", NodeKind::RuleTask(Default::default()))],
            vec![Edge::new("e1", "s", "r")],
        );
        let instance = engine(10).execute(&def, json!({})).await;

        assert_eq!(instance.status, InstanceStatus::Failed);
        let last = instance.logs.last().unwrap();
        assert_eq!(last.node_id, "r");
        assert_eq!(last.status, LogStatus::Error);
        assert_eq!(last.error, instance.error);
    }
}
