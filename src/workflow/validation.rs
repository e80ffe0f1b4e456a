/// Structural validation of workflow definitions
///
/// Builds a petgraph `DiGraph` from the definition and reports problems the
/// interpreter would otherwise only hit at run time. Cycles are allowed (the
/// interpreter bounds them with its iteration cap), so they are not reported.

use crate::workflow::types::{NodeKind, WorkflowDefinition};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Problems that make the definition unrunnable or ambiguous
    pub errors: Vec<String>,
    /// Suspicious but runnable structure
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate a definition.
pub fn validate(definition: &WorkflowDefinition) -> ValidationReport {
    let mut report = ValidationReport::default();

    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut index_of: HashMap<&str, NodeIndex> = HashMap::new();
    for node in &definition.nodes {
        if index_of.contains_key(node.id.as_str()) {
            report.errors.push(format!("duplicate node id '{}'", node.id));
            continue;
        }
        index_of.insert(node.id.as_str(), graph.add_node(node.id.as_str()));
    }

    for edge in &definition.edges {
        match (index_of.get(edge.source.as_str()), index_of.get(edge.target.as_str())) {
            (Some(&from), Some(&to)) => {
                graph.add_edge(from, to, ());
            }
            (None, _) => report
                .errors
                .push(format!("edge '{}' references unknown source node '{}'", edge.id, edge.source)),
            (_, None) => report
                .errors
                .push(format!("edge '{}' references unknown target node '{}'", edge.id, edge.target)),
        }
    }

    let starts: Vec<&str> = definition
        .nodes
        .iter()
        .filter(|n| n.kind == NodeKind::Start)
        .map(|n| n.id.as_str())
        .collect();
    match starts.len() {
        0 => report.errors.push("workflow has no start node".to_string()),
        1 => {}
        n => report.errors.push(format!("workflow has {} start nodes; expected exactly one", n)),
    }

    let ends: Vec<&str> = definition
        .nodes
        .iter()
        .filter(|n| n.kind == NodeKind::End)
        .map(|n| n.id.as_str())
        .collect();
    if ends.is_empty() {
        report.errors.push("workflow has no end node".to_string());
    }

    for node in definition.nodes.iter().filter(|n| n.is_linear()) {
        let count = definition.outgoing(&node.id).count();
        if count > 1 {
            report.errors.push(format!(
                "{} node '{}' has {} outgoing edges; expected exactly one",
                node.type_name(),
                node.id,
                count
            ));
        }
    }

    if let [start] = starts.as_slice() {
        let reachable = reachable_from(&graph, index_of[start]);

        for node in &definition.nodes {
            if !reachable.contains(node.id.as_str()) {
                report
                    .warnings
                    .push(format!("node '{}' is not reachable from start node '{}'", node.id, start));
            }
        }
        if !ends.is_empty() && !ends.iter().any(|end| reachable.contains(end)) {
            report.warnings.push("no end node is reachable from the start node".to_string());
        }
    }

    tracing::debug!(
        "🔍 Validated workflow: {} errors, {} warnings",
        report.errors.len(),
        report.warnings.len()
    );
    report
}

fn reachable_from<'a>(graph: &DiGraph<&'a str, ()>, start: NodeIndex) -> HashSet<&'a str> {
    let mut reachable = HashSet::new();
    let mut bfs = Bfs::new(graph, start);
    while let Some(index) = bfs.next(graph) {
        reachable.insert(graph[index]);
    }
    reachable
}
