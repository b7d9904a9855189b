//! Task persistence.
//!
//! A task is its full op list. `save_ops` replaces it wholesale; the
//! executor calls it before and after every batch.

use crate::error::TaskStoreError;
use crate::op::Operation;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

pub type OpStream = BoxStream<'static, Result<Operation, TaskStoreError>>;

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn save_ops(&self, task_id: &str, ops: &[Operation]) -> Result<(), TaskStoreError>;

    /// Stream a task's ops in id order.
    async fn get_task(&self, task_id: &str) -> Result<OpStream, TaskStoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    tasks: RwLock<HashMap<String, Vec<Operation>>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn save_ops(&self, task_id: &str, ops: &[Operation]) -> Result<(), TaskStoreError> {
        self.tasks
            .write()
            .await
            .insert(task_id.to_string(), ops.to_vec());
        Ok(())
    }

    async fn get_task(&self, task_id: &str) -> Result<OpStream, TaskStoreError> {
        let ops = self
            .tasks
            .read()
            .await
            .get(task_id)
            .cloned()
            .ok_or_else(|| TaskStoreError::NotFound(task_id.to_string()))?;
        Ok(stream::iter(ops.into_iter().map(Ok)).boxed())
    }
}

/// One `{task_id}.jsonl` file per task under `root`, replaced atomically on
/// every save.
#[derive(Debug, Clone)]
pub struct JsonlTaskStore {
    root: PathBuf,
}

impl JsonlTaskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, task_id: &str) -> PathBuf {
        self.root.join(format!("{task_id}.jsonl"))
    }
}

const OP_RECORD: &str = "operation";

fn join_err(err: tokio::task::JoinError) -> TaskStoreError {
    TaskStoreError::Io(err.to_string())
}

#[async_trait]
impl TaskStore for JsonlTaskStore {
    async fn save_ops(&self, task_id: &str, ops: &[Operation]) -> Result<(), TaskStoreError> {
        let path = self.path_for(task_id);
        let ops = ops.to_vec();
        tokio::task::spawn_blocking(move || locus_kernel::save_snapshot(path, OP_RECORD, &ops))
            .await
            .map_err(join_err)??;
        Ok(())
    }

    async fn get_task(&self, task_id: &str) -> Result<OpStream, TaskStoreError> {
        let path = self.path_for(task_id);
        let loaded = tokio::task::spawn_blocking(move || locus_kernel::load_snapshot::<Operation>(path, OP_RECORD))
            .await
            .map_err(join_err)?;
        let mut ops = match loaded {
            Ok(ops) => ops,
            Err(err) if err.is_not_found() => return Err(TaskStoreError::NotFound(task_id.to_string())),
            Err(err) => return Err(err.into()),
        };
        ops.sort_by_key(|op| op.op_id);
        Ok(stream::iter(ops.into_iter().map(Ok)).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use locus_kernel::SnapshotError;
    use serde_json::Value;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryTaskStore::new();
        let ops = vec![
            Operation::new(0, "a", Value::Null, vec![]),
            Operation::new(1, "b", Value::Null, vec![0]),
        ];
        store.save_ops("t1", &ops).await.expect("save");
        let back: Vec<Operation> = store
            .get_task("t1")
            .await
            .expect("get")
            .try_collect()
            .await
            .expect("collect");
        assert_eq!(back, ops);

        let missing = store.get_task("nope").await;
        assert!(matches!(missing, Err(TaskStoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn jsonl_store_reports_missing_and_corrupt_tasks() {
        let unique = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let root = std::env::temp_dir().join(format!("locus-ops-store-{}-{unique}", std::process::id()));
        let store = JsonlTaskStore::new(&root);

        assert!(matches!(store.get_task("absent").await, Err(TaskStoreError::NotFound(_))));

        store
            .save_ops("t1", &[Operation::new(0, "a", Value::Null, vec![])])
            .await
            .expect("save");
        let path = store.path_for("t1");
        let mut text = std::fs::read_to_string(&path).expect("read");
        text.push_str("{\"opId\": \"zero\"}\n");
        std::fs::write(&path, text).expect("append");

        match store.get_task("t1").await {
            Err(TaskStoreError::Snapshot(SnapshotError::Record { line, kind, .. })) => {
                assert_eq!(line, 2);
                assert_eq!(kind, "operation");
            }
            Err(other) => panic!("expected a bad record, got {other:?}"),
            Ok(_) => panic!("expected a bad record"),
        }
        let _ = std::fs::remove_dir_all(root);
    }
}
