//! # Locus Ops
//!
//! A small, resumable operation-graph scheduler.
//!
//! A [`Task`] is an append-only DAG of named ops. Callbacks are looked up by
//! name in an [`OpRegistry`], so a task persisted through a [`TaskStore`]
//! can be hydrated in a new process and pick up where it stopped.
//!
//! ```text
//! enqueue ─► commit(root) ─► execute(parallelism)
//!                               │ ready = pending ∧ inputs done
//!                               │ stamp lastRanAt, persist
//!                               │ join_all(batch)
//!                               │ apply TaskHandle mutations, persist
//!                               └─► Done(output) | Waiting | Stalled | Err
//! ```

pub mod chunk;
pub mod error;
pub mod handle;
pub mod op;
pub mod registry;
pub mod store;
pub mod task;

pub use chunk::{ChunkArgs, ChunkLimits, enqueue_chunk_flow, register_chunk_ops, split_chunks};
pub use error::{OpError, TaskError, TaskStoreError};
pub use handle::{OpContext, TaskHandle};
pub use op::{INTERRUPTED, OpState, Operation};
pub use registry::{FnOp, OpCallback, OpRegistry, RegisteredOp, op_fn};
pub use store::{JsonlTaskStore, MemoryTaskStore, OpStream, TaskStore};
pub use task::{Task, TaskStatus};
