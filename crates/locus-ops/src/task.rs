//! Task: an append-only graph of ops and the executor that drives it.
//!
//! The graph only grows. An op is ready once it is `pending` and every one
//! of its inputs is `done`; execution proceeds in batches of ready ops and
//! stops when nothing is ready, an op fails, or an op blocks. Cycles are not
//! detected; they simply never become ready.

use crate::error::{OpError, TaskError};
use crate::handle::{Mutation, OpContext, TaskHandle};
use crate::op::{OpState, Operation};
use crate::registry::OpRegistry;
use crate::store::TaskStore;
use chrono::Utc;
use futures::TryStreamExt;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Outcome of one `execute` call that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatus {
    /// The root op is done; its output.
    Done(Value),
    /// Progress stopped on blocking ops.
    Waiting { blocked: Vec<u64> },
    /// Nothing runnable and nothing blocking: unresolvable inputs or a cycle.
    Stalled { pending: Vec<u64> },
}

pub struct Task {
    task_id: String,
    ops: BTreeMap<u64, Operation>,
    next_id: u64,
    registry: Arc<OpRegistry>,
    store: Arc<dyn TaskStore>,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("task_id", &self.task_id)
            .field("ops", &self.ops.len())
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

impl Task {
    pub fn new(
        task_id: impl Into<String>,
        registry: Arc<OpRegistry>,
        store: Arc<dyn TaskStore>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            ops: BTreeMap::new(),
            next_id: 0,
            registry,
            store,
        }
    }

    /// Load a persisted task and apply the restart rules (see
    /// [`Operation::rehydrate`]). The reset state is saved before returning.
    pub async fn hydrate(
        task_id: impl Into<String>,
        registry: Arc<OpRegistry>,
        store: Arc<dyn TaskStore>,
    ) -> Result<Self, TaskError> {
        let task_id = task_id.into();
        let loaded: Vec<Operation> = store.get_task(&task_id).await?.try_collect().await?;
        let mut ops = BTreeMap::new();
        for mut op in loaded {
            let registered = registry
                .get(&op.op_name)
                .ok_or_else(|| TaskError::UnknownOp(op.op_name.clone()))?;
            op.rehydrate(registered.idempotent);
            ops.insert(op.op_id, op);
        }
        let next_id = ops.keys().next_back().map_or(0, |id| id + 1);
        let task = Self {
            task_id,
            ops,
            next_id,
            registry,
            store,
        };
        tracing::debug!(task = %task.task_id, ops = task.ops.len(), "task hydrated");
        task.persist().await?;
        Ok(task)
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn ops(&self) -> impl Iterator<Item = &Operation> {
        self.ops.values()
    }

    pub fn op(&self, op_id: u64) -> Option<&Operation> {
        self.ops.get(&op_id)
    }

    pub fn root(&self) -> Option<&Operation> {
        self.ops.values().find(|op| op.root)
    }

    /// Append an op. Its name must be registered and its inputs must exist.
    pub fn enqueue(
        &mut self,
        op_name: impl Into<String>,
        args: Value,
        inputs: Vec<u64>,
    ) -> Result<u64, TaskError> {
        let op_name = op_name.into();
        if !self.registry.contains(&op_name) {
            return Err(TaskError::UnknownOp(op_name));
        }
        let op_id = self.next_id;
        for input_id in &inputs {
            if !self.ops.contains_key(input_id) {
                return Err(TaskError::MissingInput {
                    op_id,
                    input_id: *input_id,
                });
            }
        }
        self.next_id += 1;
        self.ops
            .insert(op_id, Operation::new(op_id, op_name, args, inputs));
        Ok(op_id)
    }

    /// Mark `root_id` as the op whose output is the task's result, and
    /// persist the graph.
    pub async fn commit(&mut self, root_id: u64) -> Result<(), TaskError> {
        if !self.ops.contains_key(&root_id) {
            return Err(TaskError::MissingInput {
                op_id: root_id,
                input_id: root_id,
            });
        }
        for op in self.ops.values_mut() {
            op.root = op.op_id == root_id;
        }
        self.persist().await
    }

    async fn persist(&self) -> Result<(), TaskError> {
        let ops: Vec<Operation> = self.ops.values().cloned().collect();
        self.store.save_ops(&self.task_id, &ops).await?;
        Ok(())
    }

    /// Pending ops whose inputs are all done, in id order. A reference to a
    /// non-existent op is fatal.
    fn ready_ops(&self) -> Result<Vec<u64>, TaskError> {
        let mut ready = Vec::new();
        for op in self.ops.values() {
            if op.state != OpState::Pending {
                continue;
            }
            let mut satisfied = true;
            for input_id in &op.inputs {
                match self.ops.get(input_id) {
                    Some(input) if input.state == OpState::Done => {}
                    Some(_) => satisfied = false,
                    None => {
                        return Err(TaskError::MissingInput {
                            op_id: op.op_id,
                            input_id: *input_id,
                        });
                    }
                }
            }
            if satisfied {
                ready.push(op.op_id);
            }
        }
        Ok(ready)
    }

    fn dependents_map(&self) -> HashMap<u64, Vec<u64>> {
        let mut map: HashMap<u64, Vec<u64>> = HashMap::new();
        for op in self.ops.values() {
            for input_id in &op.inputs {
                map.entry(*input_id).or_default().push(op.op_id);
            }
        }
        map
    }

    fn apply_mutations(&mut self, mutations: Vec<Mutation>, next_id: u64) -> Result<(), TaskError> {
        self.next_id = self.next_id.max(next_id);
        for mutation in mutations {
            match mutation {
                Mutation::Enqueue {
                    op_id,
                    op_name,
                    args,
                    inputs,
                } => {
                    if !self.registry.contains(&op_name) {
                        return Err(TaskError::UnknownOp(op_name));
                    }
                    self.ops
                        .insert(op_id, Operation::new(op_id, op_name, args, inputs));
                }
                Mutation::AddDependency { op_id, input_id } => {
                    let invalid = |reason: &str| TaskError::InvalidDependency {
                        op_id,
                        input_id,
                        reason: reason.to_string(),
                    };
                    if !self.ops.contains_key(&input_id) {
                        return Err(invalid("input op does not exist"));
                    }
                    let op = self
                        .ops
                        .get_mut(&op_id)
                        .ok_or_else(|| invalid("op does not exist"))?;
                    if op.state != OpState::Pending {
                        return Err(invalid("op already ran"));
                    }
                    if !op.inputs.contains(&input_id) {
                        op.inputs.push(input_id);
                    }
                }
            }
        }
        Ok(())
    }

    /// Run ready ops, at most `parallelism` at a time, until the root is
    /// done or nothing more can run.
    pub async fn execute(&mut self, parallelism: usize) -> Result<TaskStatus, TaskError> {
        let parallelism = parallelism.max(1);
        let root_id = self
            .root()
            .map(|op| op.op_id)
            .ok_or_else(|| TaskError::NotCommitted(self.task_id.clone()))?;

        loop {
            let ready = match self.ready_ops() {
                Ok(ready) => ready,
                Err(err) => {
                    self.persist().await?;
                    return Err(err);
                }
            };
            if ready.is_empty() {
                break;
            }
            let batch: Vec<u64> = ready.into_iter().take(parallelism).collect();

            let now = Utc::now();
            for op_id in &batch {
                if let Some(op) = self.ops.get_mut(op_id) {
                    op.last_ran_at = Some(now);
                }
            }
            self.persist().await?;

            let handle = TaskHandle::new(self.next_id, self.dependents_map());
            let mut calls = Vec::with_capacity(batch.len());
            for op_id in &batch {
                let op = &self.ops[op_id];
                let registered = self
                    .registry
                    .get(&op.op_name)
                    .ok_or_else(|| TaskError::UnknownOp(op.op_name.clone()))?;
                let ctx = OpContext {
                    op_id: *op_id,
                    args: op.args.clone(),
                    inputs: op
                        .inputs
                        .iter()
                        .map(|id| self.ops[id].output.clone().unwrap_or(Value::Null))
                        .collect(),
                    handle: handle.clone(),
                };
                tracing::debug!(task = %self.task_id, op_id, op = %op.op_name, "op start");
                calls.push(async move { registered.callback.call(ctx).await });
            }
            let results = futures::future::join_all(calls).await;

            let mut failure = None;
            let mut blocked = Vec::new();
            for (op_id, result) in batch.iter().zip(results) {
                let Some(op) = self.ops.get_mut(op_id) else {
                    continue;
                };
                match result {
                    Ok(output) => {
                        op.state = OpState::Done;
                        op.output = Some(output);
                    }
                    Err(OpError::Blocked(reason)) => {
                        tracing::info!(task = %self.task_id, op_id, op = %op.op_name, %reason, "op blocked");
                        op.state = OpState::Blocked(reason);
                        blocked.push(*op_id);
                    }
                    Err(err) => {
                        tracing::warn!(task = %self.task_id, op_id, op = %op.op_name, %err, "op failed");
                        op.state = OpState::Error;
                        op.message = Some(err.to_string());
                        if failure.is_none() {
                            failure = Some(TaskError::OpFailed {
                                op_id: *op_id,
                                op_name: op.op_name.clone(),
                                message: err.to_string(),
                            });
                        }
                    }
                }
            }

            let applied = self.apply_mutations(handle.take_mutations(), handle.next_id());
            self.persist().await?;
            applied?;

            if let Some(err) = failure {
                return Err(err);
            }
            if !blocked.is_empty() {
                return Ok(TaskStatus::Waiting { blocked });
            }
        }

        if let Some(root) = self.ops.get(&root_id)
            && root.state == OpState::Done
        {
            return Ok(TaskStatus::Done(root.output.clone().unwrap_or(Value::Null)));
        }
        let blocked: Vec<u64> = self
            .ops
            .values()
            .filter(|op| op.state.is_blocking())
            .map(|op| op.op_id)
            .collect();
        if !blocked.is_empty() {
            return Ok(TaskStatus::Waiting { blocked });
        }
        let pending = self
            .ops
            .values()
            .filter(|op| op.state == OpState::Pending)
            .map(|op| op.op_id)
            .collect();
        Ok(TaskStatus::Stalled { pending })
    }
}
