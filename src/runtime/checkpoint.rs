/// Checkpoint stores for in-flight workflow instances
///
/// The interpreter writes the instance (current node, state, logs) before every
/// node it executes so observers can follow progress. Stores are collaborators:
/// the interpreter never reads its own checkpoints back.

use crate::runtime::instance::WorkflowInstance;
use anyhow::Result;
use async_trait::async_trait;
use sqlx::{sqlite::SqliteConnectOptions, sqlite::SqlitePool, Row};
use std::{
    collections::{HashMap, VecDeque},
    path::Path,
};
use tokio::sync::RwLock;

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, instance: &WorkflowInstance) -> Result<()>;
    async fn load(&self, instance_id: &str) -> Result<Option<WorkflowInstance>>;
    /// Drop a stored instance. Returns whether it existed.
    async fn remove(&self, instance_id: &str) -> Result<bool>;
}

/// Finished runs kept by the in-memory store before the oldest are evicted
pub const DEFAULT_TERMINAL_CAPACITY: usize = 256;

/// Process-local store, the default when no database is configured
///
/// Running instances are always kept. Completed and failed instances are kept
/// up to `terminal_capacity`, oldest evicted first.
#[derive(Debug)]
pub struct InMemoryCheckpointStore {
    inner: RwLock<MemoryCheckpoints>,
    terminal_capacity: usize,
}

#[derive(Debug, Default)]
struct MemoryCheckpoints {
    instances: HashMap<String, WorkflowInstance>,
    /// Terminal instance ids in the order they finished
    finished: VecDeque<String>,
}

impl Default for InMemoryCheckpointStore {
    fn default() -> Self {
        Self::with_terminal_capacity(DEFAULT_TERMINAL_CAPACITY)
    }
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_terminal_capacity(terminal_capacity: usize) -> Self {
        Self { inner: RwLock::new(MemoryCheckpoints::default()), terminal_capacity }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.instances.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, instance: &WorkflowInstance) -> Result<()> {
        let mut inner = self.inner.write().await;
        if instance.status.is_terminal() && !inner.finished.contains(&instance.id) {
            inner.finished.push_back(instance.id.clone());
        }
        inner.instances.insert(instance.id.clone(), instance.clone());

        while inner.finished.len() > self.terminal_capacity {
            if let Some(evicted) = inner.finished.pop_front() {
                inner.instances.remove(&evicted);
                tracing::debug!("🧹 Evicted finished run {} from in-memory checkpoints", evicted);
            }
        }
        Ok(())
    }

    async fn load(&self, instance_id: &str) -> Result<Option<WorkflowInstance>> {
        Ok(self.inner.read().await.instances.get(instance_id).cloned())
    }

    async fn remove(&self, instance_id: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        inner.finished.retain(|id| id != instance_id);
        Ok(inner.instances.remove(instance_id).is_some())
    }
}

/// SQLite-backed checkpoint store
///
/// One row per instance; state and logs are stored as JSON text.
#[derive(Debug, Clone)]
pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) a database file and initialise the schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        let store = Self::new(pool);
        store.init_schema().await?;
        Ok(store)
    }

    /// Create the checkpoint table. Safe to call multiple times.
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workflow_instances (
                id TEXT PRIMARY KEY,
                workflow_id TEXT,
                status TEXT NOT NULL,
                current_node TEXT,
                instance JSON NOT NULL,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_workflow_instances_status
            ON workflow_instances(status)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Ids of instances in the given status, oldest update first.
    pub async fn list_by_status(&self, status: &str) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT id FROM workflow_instances WHERE status = ? ORDER BY updated_at, id")
            .bind(status)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(|row| Ok(row.try_get::<String, _>("id")?)).collect()
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn save(&self, instance: &WorkflowInstance) -> Result<()> {
        let instance_json = serde_json::to_string(instance)?;

        sqlx::query(
            r#"
            INSERT INTO workflow_instances (id, workflow_id, status, current_node, instance, updated_at)
            VALUES (?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(id) DO UPDATE SET
                workflow_id = excluded.workflow_id,
                status = excluded.status,
                current_node = excluded.current_node,
                instance = excluded.instance,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&instance.id)
        .bind(&instance.workflow_id)
        .bind(instance.status.as_str())
        .bind(&instance.current_node)
        .bind(&instance_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load(&self, instance_id: &str) -> Result<Option<WorkflowInstance>> {
        let row = sqlx::query("SELECT instance FROM workflow_instances WHERE id = ?")
            .bind(instance_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let text: String = row.try_get("instance")?;
                Ok(Some(serde_json::from_str(&text)?))
            }
            None => Ok(None),
        }
    }

    async fn remove(&self, instance_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM workflow_instances WHERE id = ?")
            .bind(instance_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn in_memory_store_keeps_latest_snapshot() {
        let store = InMemoryCheckpointStore::new();
        let mut instance = WorkflowInstance::new("run-1", None, json!({ "n": 1 }));
        store.save(&instance).await.unwrap();

        instance.current_node = Some("next".into());
        store.save(&instance).await.unwrap();

        let loaded = store.load("run-1").await.unwrap().unwrap();
        assert_eq!(loaded.current_node.as_deref(), Some("next"));
        assert!(store.load("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn in_memory_store_evicts_oldest_finished_runs() {
        let store = InMemoryCheckpointStore::with_terminal_capacity(2);
        let running = WorkflowInstance::new("live", None, json!({}));
        store.save(&running).await.unwrap();

        for id in ["a", "b", "c"] {
            let mut instance = WorkflowInstance::new(id, None, json!({}));
            store.save(&instance).await.unwrap();
            instance.complete();
            store.save(&instance).await.unwrap();
        }

        assert!(store.load("a").await.unwrap().is_none());
        assert!(store.load("b").await.unwrap().is_some());
        assert!(store.load("c").await.unwrap().is_some());
        assert!(store.load("live").await.unwrap().is_some());
        assert_eq!(store.len().await, 3);

        assert!(store.remove("live").await.unwrap());
        assert!(!store.remove("live").await.unwrap());
        assert_eq!(store.len().await, 2);
    }
}
