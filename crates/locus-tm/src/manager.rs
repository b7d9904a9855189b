//! Per-pair translation memories behind async locks, kept in sync with the
//! job store.

use crate::error::TmError;
use crate::job::{Job, JobSummary};
use crate::job_store::JobStore;
use crate::memory::{IngestReport, TranslationMemory};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

pub const DEFAULT_WARM_UP_CONCURRENCY: usize = 8;

pub type SharedTm = Arc<RwLock<TranslationMemory>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmUpReport {
    pub jobs: usize,
    pub written: usize,
    pub dropped: usize,
}

pub struct TmManager {
    job_store: Arc<dyn JobStore>,
    tms: Mutex<HashMap<(String, String), SharedTm>>,
    concurrency: usize,
}

impl TmManager {
    pub fn new(job_store: Arc<dyn JobStore>) -> Self {
        Self::with_concurrency(job_store, DEFAULT_WARM_UP_CONCURRENCY)
    }

    pub fn with_concurrency(job_store: Arc<dyn JobStore>, concurrency: usize) -> Self {
        Self {
            job_store,
            tms: Mutex::new(HashMap::new()),
            concurrency: concurrency.max(1),
        }
    }

    /// Artifact fetches in flight during [`TmManager::warm_up`].
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn job_store(&self) -> &Arc<dyn JobStore> {
        &self.job_store
    }

    /// The memory for a pair, created empty on first use.
    pub async fn tm(&self, source_lang: &str, target_lang: &str) -> SharedTm {
        let mut tms = self.tms.lock().await;
        tms.entry((source_lang.to_string(), target_lang.to_string()))
            .or_insert_with(|| Arc::new(RwLock::new(TranslationMemory::new(source_lang, target_lang))))
            .clone()
    }

    /// Ingest one job into its pair's memory. Staging happens under the read
    /// lock; only the commit holds the write lock.
    pub async fn ingest(&self, response: &Job, request: Option<&Job>) -> Result<IngestReport, TmError> {
        let tm = self.tm(&response.source_lang, &response.target_lang).await;
        let tx = tm.read().await.stage_job(response, request)?;
        Ok(tm.write().await.commit(tx))
    }

    /// Bring the memories for `pairs` up to date with the job store.
    ///
    /// Jobs whose latest response is already recorded at the same status are
    /// skipped. Artifacts are fetched through a bounded pool; completion
    /// order does not matter since each job is one transaction.
    pub async fn warm_up(&self, pairs: &[(String, String)]) -> Result<WarmUpReport, TmError> {
        let mut report = WarmUpReport::default();
        for (source_lang, target_lang) in pairs {
            let tm = self.tm(source_lang, target_lang).await;
            let summaries = self.job_store.list_jobs(source_lang, target_lang).await?;
            let unseen: Vec<JobSummary> = {
                let tm = tm.read().await;
                summaries
                    .into_iter()
                    .filter(|summary| match summary.latest_response() {
                        Some(status) => tm
                            .job_status(&summary.job_guid)
                            .is_none_or(|row| row.status != status),
                        None => false,
                    })
                    .collect()
            };
            tracing::debug!(
                pair = %format!("{source_lang}→{target_lang}"),
                unseen = unseen.len(),
                "tm warm-up"
            );

            let mut fetched = futures::stream::iter(unseen)
                .map(|summary| {
                    let store = Arc::clone(&self.job_store);
                    async move {
                        let response = store.get_latest_response(&summary).await?;
                        let request = store.get_request(&summary).await?;
                        Ok::<_, TmError>((response, request))
                    }
                })
                .buffer_unordered(self.concurrency);

            while let Some(result) = fetched.next().await {
                let (Some(response), request) = result? else {
                    continue;
                };
                let tx = tm.read().await.stage_job(&response, request.as_ref())?;
                let ingested = tm.write().await.commit(tx);
                report.jobs += 1;
                report.written += ingested.written;
                report.dropped += ingested.dropped;
            }
        }
        tracing::info!(jobs = report.jobs, written = report.written, "tm warm-up complete");
        Ok(report)
    }
}
