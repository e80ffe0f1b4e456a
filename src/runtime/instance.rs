/// Run-time record of one workflow execution
///
/// A `WorkflowInstance` is created when a run starts, mutated after every node
/// transition and becomes immutable once `completed` or `failed`. Its log is
/// append-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Running,
    Completed,
    Failed,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Running => "running",
            InstanceStatus::Completed => "completed",
            InstanceStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, InstanceStatus::Running)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Completed,
    Skipped,
    Error,
}

/// One node visit in the audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionLogEntry {
    pub node_id: String,
    pub node_type: String,
    pub label: String,
    pub status: LogStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowInstance {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    pub status: InstanceStatus,
    pub current_node: Option<String>,
    /// Working state threaded through the run
    pub state: Value,
    pub logs: Vec<ExecutionLogEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowInstance {
    /// New running instance. A non-object initial state is wrapped as `{ "input": .. }`.
    pub fn new(id: impl Into<String>, workflow_id: Option<String>, initial_state: Value) -> Self {
        let state = match initial_state {
            Value::Object(_) => initial_state,
            Value::Null => Value::Object(Default::default()),
            other => serde_json::json!({ "input": other }),
        };
        let now = Utc::now();

        Self {
            id: id.into(),
            workflow_id,
            status: InstanceStatus::Running,
            current_node: None,
            state,
            logs: Vec::new(),
            output: None,
            error: None,
            started_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn complete(&mut self) {
        let now = Utc::now();
        self.status = InstanceStatus::Completed;
        self.output = Some(self.state.clone());
        self.updated_at = now;
        self.completed_at = Some(now);
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        let now = Utc::now();
        self.status = InstanceStatus::Failed;
        self.error = Some(message.into());
        self.updated_at = now;
        self.completed_at = Some(now);
    }

    /// Node ids in visiting order.
    pub fn path(&self) -> Vec<&str> {
        self.logs.iter().map(|entry| entry.node_id.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wraps_scalar_input() {
        let instance = WorkflowInstance::new("i", None, json!(5));
        assert_eq!(instance.state, json!({ "input": 5 }));
        assert_eq!(WorkflowInstance::new("i", None, Value::Null).state, json!({}));
    }

    #[test]
    fn terminal_transitions() {
        let mut done = WorkflowInstance::new("a", None, json!({ "x": 1 }));
        done.complete();
        assert_eq!(done.status, InstanceStatus::Completed);
        assert_eq!(done.output, Some(json!({ "x": 1 })));
        assert!(done.status.is_terminal());

        let mut failed = WorkflowInstance::new("b", None, json!({}));
        failed.fail("boom");
        assert_eq!(failed.status.as_str(), "failed");
        assert_eq!(failed.error.as_deref(), Some("boom"));
        assert!(failed.output.is_none());
    }

    #[test]
    fn serializes_camel_case() {
        let instance = WorkflowInstance::new("a", Some("wf".into()), json!({}));
        let value = serde_json::to_value(&instance).unwrap();
        assert_eq!(value["workflowId"], json!("wf"));
        assert_eq!(value["status"], json!("running"));
        assert!(value.get("currentNode").is_some());
        assert!(value.get("startedAt").is_some());
    }
}
