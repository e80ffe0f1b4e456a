/// Core workflow type definitions
///
/// Defines the process graph the interpreter walks: typed nodes and directed,
/// optionally guarded edges. Definitions arrive as editor JSON
/// (`{nodes: [{id, type, position, data}], edges: [...]}`); each node's `data`
/// bag is parsed into a typed configuration for its node type.

use crate::error::WorkflowError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A complete workflow definition containing nodes and their connections
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Workflow identifier (optional for ad hoc runs)
    #[serde(default)]
    pub id: Option<String>,
    /// Human-readable workflow name
    #[serde(default)]
    pub name: Option<String>,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// A single node in the process graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNode", into = "RawNode")]
pub struct Node {
    /// Unique node identifier within the workflow (e.g., "start", "check-score")
    pub id: String,
    /// Display label; falls back to the node id
    pub label: Option<String>,
    /// Editor canvas position, opaque to the interpreter
    pub position: Value,
    /// Node type and its typed configuration
    pub kind: NodeKind,
}

/// Node types and their configuration
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Entry point. Exactly one per workflow.
    Start,
    /// Terminal node. The final state becomes the run output.
    End,
    /// Runs a rule set against the state
    RuleTask(RuleTaskConfig),
    /// Branches on the guards of its outgoing edges
    Decision,
    /// Calls an external adapter and/or applies an inline transform
    ServiceTask(ServiceTaskConfig),
    /// Ordered field assignments
    Script(ScriptConfig),
    /// Records a delay; does not wait
    Timer(TimerConfig),
    /// Unrecognised type, logged as skipped at run time
    Unknown { node_type: String, data: Value },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleTaskConfig {
    /// Expected data: { "ruleSetId": "pricing" }
    #[serde(default, alias = "ruleSet", alias = "rulesetId")]
    pub rule_set_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTaskConfig {
    /// Expected data: { "adapterId": "crm", "method": "POST", "path": "/score" }
    #[serde(default, alias = "adapter")]
    pub adapter_id: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Write the response here instead of merging it into the state
    #[serde(default)]
    pub output_field: Option<String>,
    /// Inline transform applied after the call (or alone, without an adapter)
    #[serde(default, alias = "transformScript")]
    pub transform: Vec<Assignment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptConfig {
    /// Expected data: { "assignments": [{ "field": "risk.level", "value": "{{score}}" }] }
    #[serde(default)]
    pub assignments: Vec<Assignment>,
}

/// `field = value`, where value is a literal or a `{{path}}` reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    #[serde(alias = "target")]
    pub field: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerConfig {
    /// Expected data: { "delay": "PT5M" } or { "delay": 300000 }
    #[serde(default, alias = "duration", alias = "delayMs")]
    pub delay: Option<Value>,
}

/// Wire shape of a node
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawNode {
    id: String,
    #[serde(rename = "type")]
    node_type: String,
    #[serde(default)]
    position: Value,
    #[serde(default)]
    data: Value,
}

fn config<T: serde::de::DeserializeOwned + Default>(data: &Value) -> Result<T, serde_json::Error> {
    if data.is_null() {
        Ok(T::default())
    } else {
        serde_json::from_value(data.clone())
    }
}

impl TryFrom<RawNode> for Node {
    type Error = String;

    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        let invalid = |e: serde_json::Error| format!("invalid data for node '{}': {}", raw.id, e);

        let kind = match raw.node_type.as_str() {
            "start" => NodeKind::Start,
            "end" => NodeKind::End,
            "ruleTask" => NodeKind::RuleTask(config(&raw.data).map_err(invalid)?),
            "decision" => NodeKind::Decision,
            "serviceTask" => NodeKind::ServiceTask(config(&raw.data).map_err(invalid)?),
            "script" => NodeKind::Script(config(&raw.data).map_err(invalid)?),
            "timer" => NodeKind::Timer(config(&raw.data).map_err(invalid)?),
            other => NodeKind::Unknown { node_type: other.to_string(), data: raw.data.clone() },
        };

        let label = raw.data.get("label").and_then(Value::as_str).map(str::to_string);

        Ok(Node { id: raw.id, label, position: raw.position, kind })
    }
}

impl From<Node> for RawNode {
    fn from(node: Node) -> Self {
        let node_type = node.type_name().to_string();
        let mut data = match node.kind {
            NodeKind::Start | NodeKind::End | NodeKind::Decision => Value::Object(Default::default()),
            NodeKind::RuleTask(c) => serde_json::to_value(c).unwrap_or_default(),
            NodeKind::ServiceTask(c) => serde_json::to_value(c).unwrap_or_default(),
            NodeKind::Script(c) => serde_json::to_value(c).unwrap_or_default(),
            NodeKind::Timer(c) => serde_json::to_value(c).unwrap_or_default(),
            NodeKind::Unknown { data, .. } => data,
        };
        if let (Some(label), Some(obj)) = (node.label, data.as_object_mut()) {
            obj.insert("label".to_string(), Value::String(label));
        }
        RawNode { id: node.id, node_type, position: node.position, data }
    }
}

impl Node {
    /// Build a node with no label or position, mostly for programmatic definitions.
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self { id: id.into(), label: None, position: Value::Null, kind }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Wire name of the node type (e.g. "ruleTask").
    pub fn type_name(&self) -> &str {
        match &self.kind {
            NodeKind::Start => "start",
            NodeKind::End => "end",
            NodeKind::RuleTask(_) => "ruleTask",
            NodeKind::Decision => "decision",
            NodeKind::ServiceTask(_) => "serviceTask",
            NodeKind::Script(_) => "script",
            NodeKind::Timer(_) => "timer",
            NodeKind::Unknown { node_type, .. } => node_type,
        }
    }

    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }

    /// Nodes that advance along exactly one outgoing edge.
    pub fn is_linear(&self) -> bool {
        !matches!(self.kind, NodeKind::End | NodeKind::Decision)
    }
}

/// Directed connection between two nodes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Editor handle, opaque to the interpreter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    /// `default` / `else` marks the fallback branch of a decision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub data: EdgeData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    /// Guard expression, e.g. "score >= 80"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl Edge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self { id: id.into(), source: source.into(), target: target.into(), ..Default::default() }
    }

    pub fn with_guard(mut self, condition: impl Into<String>) -> Self {
        self.data.condition = Some(condition.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Guard expression, ignoring blank strings.
    pub fn guard(&self) -> Option<&str> {
        self.data.condition.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }

    /// Unguarded, or labeled `default`/`else` (case-insensitive).
    pub fn is_fallback(&self) -> bool {
        self.guard().is_none()
            || self.label.as_deref().is_some_and(|label| {
                let label = label.trim();
                label.eq_ignore_ascii_case("default") || label.eq_ignore_ascii_case("else")
            })
    }
}

impl WorkflowDefinition {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { id: None, name: None, nodes, edges }
    }

    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    /// The single start node.
    pub fn start_node(&self) -> Result<&Node, WorkflowError> {
        let mut starts = self.nodes.iter().filter(|n| n.kind == NodeKind::Start);
        match (starts.next(), starts.count()) {
            (None, _) => Err(WorkflowError::NoStartNode),
            (Some(start), 0) => Ok(start),
            (Some(_), extra) => Err(WorkflowError::MultipleStartNodes(extra + 1)),
        }
    }

    /// Outgoing edges of a node, in definition order.
    pub fn outgoing<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == node_id)
    }
}
