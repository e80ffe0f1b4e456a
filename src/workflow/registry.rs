/// Hot-reload workflow registry using ArcSwap
///
/// Provides lock-free, atomic updates to the in-memory set of workflow
/// definitions. Each update swaps the entire map pointer, so runs that already
/// hold an `Arc<WorkflowDefinition>` continue on the version they started with.

use crate::workflow::types::WorkflowDefinition;
use crate::workflow::validation::{validate, ValidationReport};
use anyhow::Result;
use arc_swap::ArcSwap;
use std::{collections::HashMap, path::Path, sync::Arc};

/// Lock-free workflow registry
///
/// Definitions are validated on registration; structural errors reject the
/// definition, warnings are logged and the definition is kept.
#[derive(Debug, Default)]
pub struct WorkflowRegistry {
    /// Key: workflow id, Value: validated definition
    workflows: ArcSwap<HashMap<String, Arc<WorkflowDefinition>>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add (or hot-replace) a workflow under `workflow_id`.
    pub fn register(&self, workflow_id: &str, definition: WorkflowDefinition) -> Result<ValidationReport> {
        let report = validate(&definition);
        if !report.is_valid() {
            tracing::error!("❌ Rejected workflow '{}': {}", workflow_id, report.errors.join("; "));
            return Err(anyhow::anyhow!(
                "Workflow '{}' is invalid: {}",
                workflow_id,
                report.errors.join("; ")
            ));
        }
        for warning in &report.warnings {
            tracing::warn!("⚠️ Workflow '{}': {}", workflow_id, warning);
        }

        let current = self.workflows.load();
        let mut next = (**current).clone();
        next.insert(workflow_id.to_string(), Arc::new(definition));
        self.workflows.store(Arc::new(next));

        tracing::info!("Hot-reloaded workflow: {}", workflow_id);
        Ok(report)
    }

    /// Load a definition from a JSON file. The id is the definition's `id`,
    /// falling back to the file stem.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read workflow file {}: {}", path.display(), e))?;
        let definition: WorkflowDefinition = serde_json::from_str(&text)
            .map_err(|e| anyhow::anyhow!("Failed to parse workflow file {}: {}", path.display(), e))?;

        let workflow_id = definition
            .id
            .clone()
            .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "workflow".to_string());

        self.register(&workflow_id, definition)?;
        Ok(workflow_id)
    }

    /// Get a workflow by id (lock-free read)
    pub fn get(&self, workflow_id: &str) -> Option<Arc<WorkflowDefinition>> {
        self.workflows.load().get(workflow_id).cloned()
    }

    pub fn list_workflow_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.workflows.load().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Remove a workflow from the registry
    pub fn remove(&self, workflow_id: &str) -> bool {
        let current = self.workflows.load();
        let mut next = (**current).clone();
        let removed = next.remove(workflow_id).is_some();
        if removed {
            self.workflows.store(Arc::new(next));
            tracing::info!("Removed workflow from registry: {}", workflow_id);
        }
        removed
    }
}
