use locus_kernel::SnapshotError;

/// Errors from job artifact persistence.
#[derive(Debug, thiserror::Error)]
pub enum JobStoreError {
    /// Artifacts are immutable: one write per `(provider, pair, guid, status)`.
    #[error("job artifact already written: {0}")]
    AlreadyWritten(String),

    #[error("job store I/O error: {0}")]
    Io(String),

    #[error("job artifact {path}: {message}")]
    Malformed { path: String, message: String },

    #[error("serialization error: {0}")]
    Serialize(String),
}

/// Errors raised by the translation memory layer.
#[derive(Debug, thiserror::Error)]
pub enum TmError {
    #[error(transparent)]
    SnapshotFile(#[from] SnapshotError),

    #[error(transparent)]
    JobStore(#[from] JobStoreError),

    #[error("job {job_guid} is {found}, this memory holds {expected}")]
    PairMismatch {
        job_guid: String,
        expected: String,
        found: String,
    },

    #[error("invalid snapshot: {0}")]
    Snapshot(String),
}
