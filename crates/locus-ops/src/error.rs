use locus_kernel::SnapshotError;

/// Failure returned by an op callback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OpError {
    #[error("invalid op arguments: {0}")]
    InvalidArgs(String),

    /// The op cannot make progress now; the task parks on it.
    #[error("blocked: {0}")]
    Blocked(String),

    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum TaskStoreError {
    #[error("task not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("task store I/O error: {0}")]
    Io(String),
}

/// Errors fatal to a task run. State is persisted before any of these is
/// returned from `execute`.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("unknown op: {0}")]
    UnknownOp(String),

    #[error("op already registered with a different callback: {0}")]
    DuplicateOp(String),

    #[error("op {op_id} depends on missing op {input_id}")]
    MissingInput { op_id: u64, input_id: u64 },

    #[error("invalid dependency {op_id} -> {input_id}: {reason}")]
    InvalidDependency {
        op_id: u64,
        input_id: u64,
        reason: String,
    },

    #[error("op {op_id} ({op_name}) failed: {message}")]
    OpFailed {
        op_id: u64,
        op_name: String,
        message: String,
    },

    #[error("task {0} has no root op; commit it first")]
    NotCommitted(String),

    #[error(transparent)]
    Store(#[from] TaskStoreError),
}
