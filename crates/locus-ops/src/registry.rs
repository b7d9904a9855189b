//! Op name → callback registry.
//!
//! Tasks are persisted by op *name*, so the registry is what lets a
//! hydrated task find its code again. Both explicit instances and one
//! process-wide registry are supported.

use crate::error::{OpError, TaskError};
use crate::handle::OpContext;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

#[async_trait]
pub trait OpCallback: Send + Sync {
    async fn call(&self, ctx: OpContext) -> Result<Value, OpError>;
}

/// Adapter for plain async closures.
pub struct FnOp<F>(F);

#[async_trait]
impl<F, Fut> OpCallback for FnOp<F>
where
    F: Fn(OpContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, OpError>> + Send + 'static,
{
    async fn call(&self, ctx: OpContext) -> Result<Value, OpError> {
        (self.0)(ctx).await
    }
}

pub fn op_fn<F, Fut>(f: F) -> Arc<dyn OpCallback>
where
    F: Fn(OpContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, OpError>> + Send + 'static,
{
    Arc::new(FnOp(f))
}

#[derive(Clone)]
pub struct RegisteredOp {
    pub callback: Arc<dyn OpCallback>,
    pub idempotent: bool,
}

impl std::fmt::Debug for RegisteredOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredOp")
            .field("idempotent", &self.idempotent)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct OpRegistry {
    ops: RwLock<HashMap<String, RegisteredOp>>,
}

static GLOBAL: OnceLock<Arc<OpRegistry>> = OnceLock::new();

impl OpRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> Arc<OpRegistry> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(OpRegistry::new())))
    }

    /// Register `callback` under `name`. Registering the same callback again
    /// is a no-op; a different callback under a taken name is an error.
    pub fn register(
        &self,
        name: impl Into<String>,
        callback: Arc<dyn OpCallback>,
        idempotent: bool,
    ) -> Result<(), TaskError> {
        let name = name.into();
        let mut ops = self.ops.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = ops.get(&name) {
            if Arc::ptr_eq(&existing.callback, &callback) {
                return Ok(());
            }
            return Err(TaskError::DuplicateOp(name));
        }
        tracing::debug!(op = %name, idempotent, "op registered");
        ops.insert(
            name,
            RegisteredOp {
                callback,
                idempotent,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<RegisteredOp> {
        self.ops
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ops
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }
}
