//! # Locus Dispatch
//!
//! Turns untranslated TUs into jobs and jobs into TM entries.
//!
//! ```text
//! translate(items)
//!   │ settle_held      ─► pending "repetition" jobs against the TM
//!   │ skip what the TM already covers
//!   │ plan_repetitions ─► send (donors + uncovered) / holdouts / TM matches
//!   │ create_jobs      ─► provider pipeline, in order, max_tus_per_job slices
//!   │ start_jobs       ─► process_job: write request + response, TM ingest
//!   │ backfill         ─► "repetition" job from donors' translations
//!   └ hold_job         ─► pending "repetition" job for donors still in flight
//! ```
//!
//! Providers are picked by [`ProviderCapability`]; the chunked families run
//! on the `locus-ops` scheduler so a pending job resumes where it stopped.

pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod provider;
pub mod providers;
pub mod repetition;
pub mod retry;

pub use config::LocusConfig;
pub use context::DispatchContext;
pub use dispatcher::{Assignment, ContinueOutcome, Dispatcher, JobOutcome, PendingJob, TranslateReport};
pub use error::{ConfigError, DispatchError, ProviderError};
pub use provider::{JobRequest, PendingTu, ProviderCapability, TranslationProvider, response_for};
pub use providers::{
    ChunkRequest, ChunkSegment, ChunkTranslator, ChunkedProvider, CompletionClient, GrandfatherProvider,
    LlmTranslator, RepetitionProvider,
};
pub use repetition::{
    Backfill, Holdout, REPETITION_PROVIDER, RepetitionPlan, RepetitionPolicy, Settlement, backfill,
    donor_in_flight, hold_job, plan_repetitions, settle_held,
};
pub use retry::RetryPolicy;
