//! Serve TUs from TM exact matches recorded under other segment ids.

use crate::context::DispatchContext;
use crate::error::ProviderError;
use crate::provider::{JobRequest, PendingTu, ProviderCapability, TranslationProvider, response_for};
use crate::repetition::RepetitionPolicy;
use async_trait::async_trait;
use locus_kernel::TranslationUnit;
use locus_tm::{Job, JobStatus, TmManager};
use std::sync::Arc;

pub struct RepetitionProvider {
    id: String,
    tm: Arc<TmManager>,
    policy: RepetitionPolicy,
}

impl RepetitionProvider {
    pub fn new(id: impl Into<String>, tm: Arc<TmManager>, policy: RepetitionPolicy) -> Self {
        Self {
            id: id.into(),
            tm,
            policy,
        }
    }
}

#[async_trait]
impl TranslationProvider for RepetitionProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn capability(&self) -> ProviderCapability {
        ProviderCapability::Repetition
    }

    async fn create(&self, request: &JobRequest, ctx: &DispatchContext) -> Result<Job, ProviderError> {
        let tm = self.tm.tm(&request.source_lang, &request.target_lang).await;
        let tm = tm.read().await;
        let accepted: Vec<TranslationUnit> = request
            .items
            .iter()
            .filter(|item| self.policy.best_exact_match(&tm, item).is_some())
            .map(|item| item.tu.clone())
            .collect();
        Ok(request.job_for(&self.id, accepted, ctx))
    }

    /// Matches are looked up again: the TM may have improved since `create`.
    async fn start(&self, job: &Job, ctx: &DispatchContext) -> Result<Job, ProviderError> {
        let tm = self.tm.tm(&job.source_lang, &job.target_lang).await;
        let tm = tm.read().await;
        let ts = ctx.now_millis();
        let mut response = response_for(job, JobStatus::Done, ctx);
        response.tus = job
            .tus
            .iter()
            .filter_map(|tu| {
                let lookup = PendingTu::new(tu.clone(), 0);
                let (entry, q) = self.policy.best_exact_match(&tm, &lookup)?;
                Some(TranslationUnit {
                    ntgt: entry.ntgt.clone(),
                    q: Some(q),
                    ts: Some(ts),
                    ..tu.as_source()
                })
            })
            .collect();
        Ok(response)
    }

    async fn continue_job(&self, _job: &Job, _ctx: &DispatchContext) -> Result<Option<Job>, ProviderError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locus_kernel::NormalizedString;
    use locus_tm::MemoryJobStore;

    #[tokio::test]
    async fn serves_exact_matches_across_sids() {
        let tm = Arc::new(TmManager::new(Arc::new(MemoryJobStore::new())));
        let known = TranslationUnit::new_source("a.json", "save", NormalizedString::plain("Save"));
        let mut done = Job::new("j1", "en", "de", "mt", JobStatus::Done);
        done.tus = vec![TranslationUnit {
            ntgt: Some(NormalizedString::plain("Speichern")),
            q: Some(90),
            ts: Some(1),
            ..known.clone()
        }];
        tm.ingest(&done, None).await.expect("ingest");

        let provider = RepetitionProvider::new("repetition", Arc::clone(&tm), RepetitionPolicy::default());
        let ctx = DispatchContext::regression("/tmp");
        let request = JobRequest::new(
            "en",
            "de",
            vec![
                PendingTu::new(
                    TranslationUnit::new_source("b.json", "save_button", NormalizedString::plain("Save")),
                    80,
                ),
                PendingTu::new(
                    TranslationUnit::new_source("b.json", "quit", NormalizedString::plain("Quit")),
                    0,
                ),
            ],
        );
        let job = provider.create(&request, &ctx).await.expect("create");
        assert_eq!(job.tus.len(), 1);
        assert_eq!(job.tus[0].sid, "save_button");

        let response = provider.start(&job, &ctx).await.expect("start");
        assert_eq!(response.tus.len(), 1);
        // Same group, so the sid mismatch costs nothing.
        assert_eq!(response.tus[0].q, Some(90));
        assert_eq!(response.tus[0].ntgt, Some(NormalizedString::plain("Speichern")));
    }
}
