/// Hot-reload rule set registry using ArcSwap
///
/// `ruleTask` nodes reference rule sets by id; the interpreter resolves them
/// here. Updates swap the whole map atomically, so runs already holding an
/// `Arc<RuleSet>` keep the version they started with.

use crate::rules::condition::RuleSet;
use crate::rules::conflict::{analyze_rule_set, RuleConflict};
use anyhow::Result;
use arc_swap::ArcSwap;
use std::{collections::HashMap, path::Path, sync::Arc};

#[derive(Debug, Default)]
pub struct RuleSetRegistry {
    /// Key: rule set id
    rule_sets: ArcSwap<HashMap<String, Arc<RuleSet>>>,
}

impl RuleSetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of rule sets.
    pub fn from_rule_sets(rule_sets: impl IntoIterator<Item = RuleSet>) -> Self {
        let map = rule_sets
            .into_iter()
            .map(|set| (set.id.clone(), Arc::new(set)))
            .collect::<HashMap<_, _>>();
        Self { rule_sets: ArcSwap::new(Arc::new(map)) }
    }

    /// Load rule sets from a JSON file holding either one rule set or an array.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read rule file {}: {}", path.display(), e))?;
        let value: serde_json::Value = serde_json::from_str(&text)?;

        let sets: Vec<RuleSet> = if value.is_array() {
            serde_json::from_value(value)?
        } else {
            vec![serde_json::from_value(value)?]
        };

        let count = sets.len();
        for set in sets {
            self.register(set);
        }
        tracing::info!("📥 Loaded {} rule sets from {}", count, path.display());
        Ok(count)
    }

    /// Add or replace a rule set.
    pub fn register(&self, rule_set: RuleSet) {
        let id = rule_set.id.clone();
        let current = self.rule_sets.load();
        let mut next = (**current).clone();
        next.insert(id.clone(), Arc::new(rule_set));
        self.rule_sets.store(Arc::new(next));

        tracing::info!("Registered rule set: {}", id);
    }

    pub fn remove(&self, rule_set_id: &str) -> bool {
        let current = self.rule_sets.load();
        let mut next = (**current).clone();
        let removed = next.remove(rule_set_id).is_some();
        if removed {
            self.rule_sets.store(Arc::new(next));
            tracing::info!("Removed rule set from registry: {}", rule_set_id);
        }
        removed
    }

    /// Lock-free lookup.
    pub fn get(&self, rule_set_id: &str) -> Option<Arc<RuleSet>> {
        self.rule_sets.load().get(rule_set_id).cloned()
    }

    /// Sorted for stable output.
    pub fn list_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.rule_sets.load().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Conflict analysis for a registered rule set; `None` when unknown.
    pub fn analyze(&self, rule_set_id: &str) -> Option<Vec<RuleConflict>> {
        self.get(rule_set_id).map(|set| analyze_rule_set(&set))
    }
}
