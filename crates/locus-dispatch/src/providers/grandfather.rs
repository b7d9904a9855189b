//! Adopt translations that already exist in target resources.

use crate::context::DispatchContext;
use crate::error::ProviderError;
use crate::provider::{JobRequest, ProviderCapability, TranslationProvider, response_for};
use async_trait::async_trait;
use locus_kernel::{NormalizedString, TranslationUnit, compatible};
use locus_tm::{Job, JobStatus};
use std::collections::HashMap;

pub struct GrandfatherProvider {
    id: String,
    quality: u32,
    /// Existing target strings, by TU guid.
    translations: HashMap<String, NormalizedString>,
}

impl GrandfatherProvider {
    pub fn new(
        id: impl Into<String>,
        quality: u32,
        translations: impl IntoIterator<Item = (String, NormalizedString)>,
    ) -> Self {
        Self {
            id: id.into(),
            quality,
            translations: translations.into_iter().collect(),
        }
    }

    fn translation_for(&self, tu: &TranslationUnit) -> Option<&NormalizedString> {
        self.translations
            .get(&tu.guid)
            .filter(|ntgt| compatible(&tu.nsrc, ntgt))
    }
}

#[async_trait]
impl TranslationProvider for GrandfatherProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn capability(&self) -> ProviderCapability {
        ProviderCapability::Grandfather
    }

    async fn create(&self, request: &JobRequest, ctx: &DispatchContext) -> Result<Job, ProviderError> {
        let accepted = request
            .items
            .iter()
            .filter(|item| item.min_q <= self.quality && self.translation_for(&item.tu).is_some())
            .map(|item| item.tu.clone());
        Ok(request.job_for(&self.id, accepted, ctx))
    }

    async fn start(&self, job: &Job, ctx: &DispatchContext) -> Result<Job, ProviderError> {
        let ts = ctx.now_millis();
        let mut response = response_for(job, JobStatus::Done, ctx);
        response.tus = job
            .tus
            .iter()
            .filter_map(|tu| {
                let ntgt = self.translation_for(tu)?.clone();
                Some(TranslationUnit {
                    ntgt: Some(ntgt),
                    q: Some(self.quality),
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
    use crate::provider::PendingTu;
    use locus_kernel::{Part, Placeholder};

    fn pending(sid: &str, text: &str, min_q: u32) -> PendingTu {
        PendingTu::new(
            TranslationUnit::new_source("app.json", sid, NormalizedString::plain(text)),
            min_q,
        )
    }

    #[tokio::test]
    async fn adopts_compatible_existing_translations() {
        let ok = pending("ok", "OK", 50);
        let greedy = pending("cancel", "Cancel", 90);
        let broken = PendingTu::new(
            TranslationUnit::new_source(
                "app.json",
                "hello",
                NormalizedString::new(vec![Part::text("Hi "), Placeholder::standalone("{name}").into()]),
            ),
            10,
        );
        let provider = GrandfatherProvider::new(
            "grandfather",
            70,
            [
                (ok.tu.guid.clone(), NormalizedString::plain("D'accord")),
                (greedy.tu.guid.clone(), NormalizedString::plain("Annuler")),
                (broken.tu.guid.clone(), NormalizedString::plain("Salut")),
            ],
        );
        let ctx = DispatchContext::regression("/tmp");
        let request = JobRequest::new("en", "fr", vec![ok.clone(), greedy, broken]);

        let job = provider.create(&request, &ctx).await.expect("create");
        assert_eq!(job.status, JobStatus::Created);
        assert_eq!(job.tus.len(), 1);
        assert_eq!(job.tus[0].guid, ok.tu.guid);
        assert!(job.tus[0].ntgt.is_none());

        let response = provider.start(&job, &ctx).await.expect("start");
        assert_eq!(response.status, JobStatus::Done);
        assert_eq!(response.tus[0].ntgt, Some(NormalizedString::plain("D'accord")));
        assert_eq!(response.tus[0].q, Some(70));
        assert_eq!(response.tus[0].ts, Some(0));
    }
}
