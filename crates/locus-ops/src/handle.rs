//! The narrow view of a running task handed to op callbacks.
//!
//! Callbacks may grow the graph but never see or touch the task itself.
//! Mutations are queued here and applied by the executor once the batch
//! that produced them has finished.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Mutation {
    Enqueue {
        op_id: u64,
        op_name: String,
        args: Value,
        inputs: Vec<u64>,
    },
    AddDependency {
        op_id: u64,
        input_id: u64,
    },
}

#[derive(Debug)]
struct HandleState {
    next_id: AtomicU64,
    dependents: HashMap<u64, Vec<u64>>,
    mutations: Mutex<Vec<Mutation>>,
}

#[derive(Debug, Clone)]
pub struct TaskHandle {
    state: Arc<HandleState>,
}

impl TaskHandle {
    pub(crate) fn new(next_id: u64, dependents: HashMap<u64, Vec<u64>>) -> Self {
        Self {
            state: Arc::new(HandleState {
                next_id: AtomicU64::new(next_id),
                dependents,
                mutations: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Queue a new op and return the id it will get.
    pub fn enqueue(&self, op_name: impl Into<String>, args: Value, inputs: Vec<u64>) -> u64 {
        let op_id = self.state.next_id.fetch_add(1, Ordering::SeqCst);
        self.push(Mutation::Enqueue {
            op_id,
            op_name: op_name.into(),
            args,
            inputs,
        });
        op_id
    }

    /// Make `op_id` wait for `input_id` as well.
    pub fn add_dependency(&self, op_id: u64, input_id: u64) {
        self.push(Mutation::AddDependency { op_id, input_id });
    }

    /// Ops that list `op_id` as an input, as of the start of this batch.
    pub fn dependents(&self, op_id: u64) -> Vec<u64> {
        self.state
            .dependents
            .get(&op_id)
            .cloned()
            .unwrap_or_default()
    }

    fn push(&self, mutation: Mutation) {
        self.state
            .mutations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(mutation);
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.state.next_id.load(Ordering::SeqCst)
    }

    pub(crate) fn take_mutations(&self) -> Vec<Mutation> {
        std::mem::take(
            &mut *self
                .state
                .mutations
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}

/// Everything a callback gets for one invocation.
#[derive(Debug, Clone)]
pub struct OpContext {
    pub op_id: u64,
    pub args: Value,
    /// Outputs of the op's inputs, in input order.
    pub inputs: Vec<Value>,
    pub handle: TaskHandle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_allocates_sequential_ids() {
        let handle = TaskHandle::new(10, HashMap::new());
        assert_eq!(handle.enqueue("a", Value::Null, vec![]), 10);
        assert_eq!(handle.enqueue("b", Value::Null, vec![10]), 11);
        handle.add_dependency(11, 3);
        assert_eq!(handle.next_id(), 12);

        let mutations = handle.take_mutations();
        assert_eq!(mutations.len(), 3);
        assert!(handle.take_mutations().is_empty());
    }

    #[test]
    fn dependents_are_read_only_snapshot() {
        let handle = TaskHandle::new(3, HashMap::from([(1, vec![2])]));
        handle.enqueue("c", Value::Null, vec![1]);
        assert_eq!(handle.dependents(1), vec![2]);
        assert!(handle.dependents(9).is_empty());
    }
}
