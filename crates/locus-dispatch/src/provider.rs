//! The provider contract.
//!
//! Providers are selected by their declared [`ProviderCapability`], never
//! by probing. Each call gets the run's [`DispatchContext`] explicitly.

use crate::context::DispatchContext;
use crate::error::ProviderError;
use async_trait::async_trait;
use locus_kernel::TranslationUnit;
use locus_tm::{Job, JobStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProviderCapability {
    /// Adopts translations that already exist in target resources.
    Grandfather,
    /// Reuses exact TM matches across segment ids.
    Repetition,
    /// Chunked payloads through the op scheduler to a remote service.
    ChunkedRemote,
    /// Chunked payloads to a completion model.
    Llm,
}

impl fmt::Display for ProviderCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderCapability::Grandfather => "grandfather",
            ProviderCapability::Repetition => "repetition",
            ProviderCapability::ChunkedRemote => "chunked-remote",
            ProviderCapability::Llm => "llm",
        };
        f.write_str(name)
    }
}

/// A source TU waiting for a translation of at least `min_q`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTu {
    pub tu: TranslationUnit,
    pub min_q: u32,
}

impl PendingTu {
    pub fn new(tu: TranslationUnit, min_q: u32) -> Self {
        Self { tu, min_q }
    }
}

/// Work offered to providers for one language pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub source_lang: String,
    pub target_lang: String,
    pub items: Vec<PendingTu>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl JobRequest {
    pub fn new(source_lang: impl Into<String>, target_lang: impl Into<String>, items: Vec<PendingTu>) -> Self {
        Self {
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            items,
            instructions: None,
        }
    }

    /// A created job for `accepted`, carrying source projections only.
    pub fn job_for(
        &self,
        provider: &str,
        accepted: impl IntoIterator<Item = TranslationUnit>,
        ctx: &DispatchContext,
    ) -> Job {
        let mut job = Job::new(
            ctx.new_job_guid(),
            &self.source_lang,
            &self.target_lang,
            provider,
            JobStatus::Created,
        );
        job.updated_at = ctx.now();
        job.instructions = self.instructions.clone();
        job.tus = accepted.into_iter().map(|tu| tu.as_source()).collect();
        job
    }
}

#[async_trait]
pub trait TranslationProvider: Send + Sync {
    fn id(&self) -> &str;

    fn capability(&self) -> ProviderCapability;

    /// Largest number of TUs accepted in one job.
    fn max_tus_per_job(&self) -> Option<usize> {
        None
    }

    /// Claim what this provider can handle. An empty job claims nothing.
    async fn create(&self, request: &JobRequest, ctx: &DispatchContext) -> Result<Job, ProviderError>;

    /// Send a created job; the response is `done`, `pending` or `cancelled`.
    async fn start(&self, job: &Job, ctx: &DispatchContext) -> Result<Job, ProviderError>;

    /// Poll a pending job. `None` means nothing new yet.
    async fn continue_job(&self, job: &Job, ctx: &DispatchContext) -> Result<Option<Job>, ProviderError>;
}

/// Response skeleton for `job` with `status`, stamped from `ctx`.
pub fn response_for(job: &Job, status: JobStatus, ctx: &DispatchContext) -> Job {
    let mut response = job.response(status);
    response.updated_at = ctx.now();
    response
}
