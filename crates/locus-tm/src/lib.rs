//! # Locus TM
//!
//! Job artifacts, the stores that hold them, and the translation memory
//! rebuilt from them.
//!
//! - `job`: job wire model and status lifecycle.
//! - `job_store`: write-once artifact persistence (memory and filesystem).
//! - `memory`: ranked TM for one language pair with transactional ingestion.
//! - `manager`: per-pair memories behind async locks and job-store warm-up.

pub mod error;
pub mod job;
pub mod job_store;
pub mod manager;
pub mod memory;

pub use error::{JobStoreError, TmError};
pub use job::{Job, JobKey, JobStatus, JobSummary};
pub use job_store::{FsJobStore, JobStore, MemoryJobStore};
pub use manager::{DEFAULT_WARM_UP_CONCURRENCY, SharedTm, TmManager, WarmUpReport};
pub use memory::{IngestReport, JobStatusRow, TmStats, TmTransaction, TranslationMemory};
