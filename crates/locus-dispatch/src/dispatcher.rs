//! Job lifecycle: offer work to the provider pipeline, record every status
//! change as a write-once artifact, and feed responses into the TM.
//!
//! ```text
//! created ──► done
//!    │   └──► pending ──► done
//!    │            └─────► done (resolved part) + created/pending (new guid,
//!    │                    originalJobGuid → lineage root)
//!    └──► cancelled (empty; nothing written)
//! ```

use crate::config::LocusConfig;
use crate::context::DispatchContext;
use crate::error::{DispatchError, ProviderError};
use crate::provider::{JobRequest, PendingTu, TranslationProvider, response_for};
use crate::repetition::{
    Holdout, REPETITION_PROVIDER, RepetitionPolicy, backfill, donor_in_flight, hold_job, plan_repetitions,
    settle_held,
};
use locus_kernel::TranslationUnit;
use locus_tm::{Job, JobStatus, JobStore, TmManager, TranslationMemory};
use std::collections::HashSet;
use std::sync::Arc;

/// What happened to one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Request and response artifacts written and the response ingested.
    Recorded {
        job_guid: String,
        provider: String,
        status: JobStatus,
        written: usize,
        dropped: usize,
    },
    /// Nothing to do; no artifact written.
    Cancelled { job_guid: String, provider: String },
    /// The provider failed to start the job; no artifact written.
    Failed {
        job_guid: String,
        provider: String,
        message: String,
    },
}

/// Jobs claimed by the pipeline and what nobody took.
#[derive(Debug, Clone, Default)]
pub struct Assignment {
    pub jobs: Vec<Job>,
    pub unassigned: Vec<PendingTu>,
}

/// A job whose latest response is `pending`.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingJob {
    pub request: Option<Job>,
    pub response: Job,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContinueOutcome {
    /// The provider has nothing new.
    Unchanged,
    Done(JobOutcome),
    /// Part of the job resolved; the rest moved to `next_job_guid`.
    Split {
        done: JobOutcome,
        next_job_guid: String,
        remaining: usize,
    },
}

#[derive(Debug, Clone, Default)]
pub struct TranslateReport {
    /// Already resolved (or in flight) in the TM at the requested quality.
    pub skipped: usize,
    /// Resolved from TM exact matches or donor translations.
    pub leveraged: usize,
    pub jobs: Vec<JobOutcome>,
    /// Receivers recorded on a pending `repetition` job, waiting on a donor
    /// still in flight.
    pub held: Vec<Holdout>,
    /// No provider took these, or their donor never got in flight.
    pub unassigned: Vec<PendingTu>,
}

/// Resolved at `min_q` or better, or in flight on a job that is still
/// pending.
fn already_covered(tm: &TranslationMemory, item: &PendingTu) -> bool {
    tm.entries_for(&item.tu.guid).any(|entry| {
        if entry.inflight {
            tm.is_pending(entry)
        } else {
            entry.is_resolved() && entry.q.unwrap_or(0) >= item.min_q
        }
    })
}

fn written(outcome: &JobOutcome) -> usize {
    match outcome {
        JobOutcome::Recorded { written, .. } => *written,
        _ => 0,
    }
}

pub struct Dispatcher {
    providers: Vec<Arc<dyn TranslationProvider>>,
    job_store: Arc<dyn JobStore>,
    tm: Arc<TmManager>,
    ctx: Arc<DispatchContext>,
    repetition: RepetitionPolicy,
}

impl Dispatcher {
    /// Providers are offered work in the order given.
    pub fn new(
        providers: Vec<Arc<dyn TranslationProvider>>,
        tm: Arc<TmManager>,
        ctx: Arc<DispatchContext>,
    ) -> Self {
        Self {
            providers,
            job_store: Arc::clone(tm.job_store()),
            tm,
            ctx,
            repetition: RepetitionPolicy::default(),
        }
    }

    pub fn with_config(mut self, config: &LocusConfig) -> Self {
        self.repetition = config.repetition.policy();
        self
    }

    pub fn with_repetition_policy(mut self, policy: RepetitionPolicy) -> Self {
        self.repetition = policy;
        self
    }

    pub fn repetition_policy(&self) -> &RepetitionPolicy {
        &self.repetition
    }

    pub fn context(&self) -> &DispatchContext {
        &self.ctx
    }

    pub fn tm(&self) -> &Arc<TmManager> {
        &self.tm
    }

    fn provider(&self, id: &str) -> Result<&Arc<dyn TranslationProvider>, DispatchError> {
        self.providers
            .iter()
            .find(|p| p.id() == id)
            .ok_or_else(|| DispatchError::UnknownProvider(id.to_string()))
    }

    /// Offer the pool to each provider in order, in slices of at most
    /// `max_tus_per_job`. Accepted TUs leave the pool.
    pub async fn create_jobs(&self, request: &JobRequest) -> Result<Assignment, DispatchError> {
        let mut pool = request.items.clone();
        let mut jobs = Vec::new();

        for provider in &self.providers {
            if pool.is_empty() {
                break;
            }
            let slice_len = provider.max_tus_per_job().unwrap_or(pool.len()).max(1);
            let mut accepted: HashSet<String> = HashSet::new();
            for slice in pool.chunks(slice_len) {
                let offer = JobRequest {
                    source_lang: request.source_lang.clone(),
                    target_lang: request.target_lang.clone(),
                    items: slice.to_vec(),
                    instructions: request.instructions.clone(),
                };
                let job = match provider.create(&offer, &self.ctx).await {
                    Ok(job) => job,
                    Err(err) => {
                        tracing::warn!(provider = provider.id(), %err, "provider declined work");
                        continue;
                    }
                };
                if !job.has_work() {
                    self.process_job(Some(job), None).await?;
                    continue;
                }
                tracing::info!(
                    provider = provider.id(),
                    job = %job.job_guid,
                    tus = job.tus.len(),
                    "job created"
                );
                accepted.extend(job.tus.iter().map(|tu| tu.guid.clone()));
                jobs.push(job);
            }
            pool.retain(|item| !accepted.contains(&item.tu.guid));
        }

        if !pool.is_empty() {
            tracing::info!(unassigned = pool.len(), "no provider accepted some units");
        }
        Ok(Assignment {
            jobs,
            unassigned: pool,
        })
    }

    /// Start created jobs and record each response. A provider failure is
    /// reported for that job only.
    pub async fn start_jobs(&self, jobs: Vec<Job>) -> Result<Vec<JobOutcome>, DispatchError> {
        let mut outcomes = Vec::with_capacity(jobs.len());
        for job in jobs {
            let provider = self.provider(&job.translation_provider)?;
            match provider.start(&job, &self.ctx).await {
                Ok(response) => outcomes.push(self.process_job(Some(job), Some(response)).await?),
                Err(err) => {
                    tracing::warn!(provider = provider.id(), job = %job.job_guid, %err, "job failed to start");
                    outcomes.push(JobOutcome::Failed {
                        job_guid: job.job_guid,
                        provider: job.translation_provider,
                        message: err.to_string(),
                    });
                }
            }
        }
        Ok(outcomes)
    }

    /// Record a request/response pair.
    ///
    /// An empty response, or a lone `created` request, cancels the job and
    /// writes nothing. Otherwise the request is pruned to the guids the
    /// response covers, both artifacts are written, and the response is
    /// ingested into the TM.
    pub async fn process_job(
        &self,
        request: Option<Job>,
        response: Option<Job>,
    ) -> Result<JobOutcome, DispatchError> {
        match (request, response) {
            (Some(request), Some(response)) if !response.has_work() => Ok(self.cancelled(&request)),
            (Some(request), None) if request.status == JobStatus::Created => Ok(self.cancelled(&request)),
            (None, None) => Err(DispatchError::EmptyJob),
            (mut request, response) => {
                if let (Some(request), Some(response)) = (request.as_mut(), response.as_ref()) {
                    let covered: HashSet<&str> = response
                        .tus
                        .iter()
                        .map(|tu| tu.guid.as_str())
                        .chain(response.inflight.iter().map(String::as_str))
                        .collect();
                    request.tus = request
                        .tus
                        .iter()
                        .filter(|tu| covered.contains(tu.guid.as_str()))
                        .map(TranslationUnit::as_source)
                        .collect();
                }
                if let Some(request) = &request {
                    self.job_store.write_job(request).await?;
                }
                let Some(response) = response else {
                    let request = request.ok_or(DispatchError::EmptyJob)?;
                    return Ok(JobOutcome::Recorded {
                        job_guid: request.job_guid,
                        provider: request.translation_provider,
                        status: request.status,
                        written: 0,
                        dropped: 0,
                    });
                };
                self.record_response(&response, request.as_ref()).await
            }
        }
    }

    fn cancelled(&self, request: &Job) -> JobOutcome {
        tracing::info!(provider = %request.translation_provider, job = %request.job_guid, "job cancelled");
        JobOutcome::Cancelled {
            job_guid: request.job_guid.clone(),
            provider: request.translation_provider.clone(),
        }
    }

    async fn record_response(&self, response: &Job, request: Option<&Job>) -> Result<JobOutcome, DispatchError> {
        self.job_store.write_job(response).await?;
        let report = self.tm.ingest(response, request).await?;
        tracing::info!(
            provider = %response.translation_provider,
            job = %response.job_guid,
            status = %response.status,
            tus = response.tus.len(),
            inflight = response.inflight.len(),
            "job recorded"
        );
        Ok(JobOutcome::Recorded {
            job_guid: response.job_guid.clone(),
            provider: response.translation_provider.clone(),
            status: response.status,
            written: report.written,
            dropped: report.dropped,
        })
    }

    /// Jobs for a pair whose latest response is `pending`.
    pub async fn pending_jobs(&self, source_lang: &str, target_lang: &str) -> Result<Vec<PendingJob>, DispatchError> {
        let mut pending = Vec::new();
        for summary in self.job_store.list_jobs(source_lang, target_lang).await? {
            if summary.latest_response() != Some(JobStatus::Pending) {
                continue;
            }
            let Some(response) = self.job_store.get_latest_response(&summary).await? else {
                continue;
            };
            let request = self.job_store.get_request(&summary).await?;
            pending.push(PendingJob { request, response });
        }
        Ok(pending)
    }

    /// Poll the provider of a pending job.
    ///
    /// A `pending` update carrying translations splits the job: the resolved
    /// part is recorded as `done` under the current guid and the rest moves
    /// to a new guid whose `originalJobGuid` is the lineage root.
    pub async fn continue_job(&self, pending: &PendingJob) -> Result<ContinueOutcome, DispatchError> {
        if pending.response.translation_provider == REPETITION_PROVIDER {
            return self.settle_held_job(pending).await;
        }
        let PendingJob { request, response } = pending;
        let provider = self.provider(&response.translation_provider)?;
        let update = provider
            .continue_job(response, &self.ctx)
            .await
            .map_err(|source| DispatchError::Provider {
                provider: provider.id().to_string(),
                source,
            })?;
        let Some(update) = update else {
            return Ok(ContinueOutcome::Unchanged);
        };

        match update.status {
            JobStatus::Done => Ok(ContinueOutcome::Done(
                self.record_response(&update, request.as_ref()).await?,
            )),
            JobStatus::Pending if update.tus.is_empty() => Ok(ContinueOutcome::Unchanged),
            JobStatus::Pending => self.split_partial(request.as_ref(), response, update).await,
            other => Err(DispatchError::Provider {
                provider: provider.id().to_string(),
                source: ProviderError::Malformed(format!("unexpected continue status {other}")),
            }),
        }
    }

    async fn split_partial(
        &self,
        request: Option<&Job>,
        previous: &Job,
        update: Job,
    ) -> Result<ContinueOutcome, DispatchError> {
        let resolved: HashSet<&str> = update.tus.iter().map(|tu| tu.guid.as_str()).collect();
        let still_open = if update.inflight.is_empty() {
            &previous.inflight
        } else {
            &update.inflight
        };
        let remaining: Vec<String> = still_open
            .iter()
            .filter(|guid| !resolved.contains(guid.as_str()))
            .cloned()
            .collect();

        let mut done = response_for(previous, JobStatus::Done, &self.ctx);
        done.tus = update.tus.clone();
        let done = self.record_response(&done, request).await?;
        if remaining.is_empty() {
            return Ok(ContinueOutcome::Done(done));
        }

        let lineage = previous
            .original_job_guid
            .clone()
            .unwrap_or_else(|| previous.job_guid.clone());
        let open: HashSet<&str> = remaining.iter().map(String::as_str).collect();
        let mut next = Job::new(
            self.ctx.new_job_guid(),
            &previous.source_lang,
            &previous.target_lang,
            &previous.translation_provider,
            JobStatus::Created,
        );
        next.updated_at = self.ctx.now();
        next.original_job_guid = Some(lineage);
        next.instructions = previous.instructions.clone();
        next.tus = request
            .map(|request| {
                request
                    .tus
                    .iter()
                    .filter(|tu| open.contains(tu.guid.as_str()))
                    .map(TranslationUnit::as_source)
                    .collect()
            })
            .unwrap_or_default();
        let mut next_response = response_for(&next, JobStatus::Pending, &self.ctx);
        next_response.inflight = remaining;

        let next_job_guid = next.job_guid.clone();
        let remaining = next_response.inflight.len();
        tracing::info!(
            job = %previous.job_guid,
            next = %next_job_guid,
            remaining,
            "partial result; remainder moved to a new job"
        );
        self.process_job(Some(next), Some(next_response)).await?;
        Ok(ContinueOutcome::Split {
            done,
            next_job_guid,
            remaining,
        })
    }

    /// Settle a pending `repetition` job against the TM. Resolved units are
    /// recorded `done` under the current guid, units whose donor is still in
    /// flight move to a new guid in the same lineage, and the rest are
    /// released.
    async fn settle_held_job(&self, pending: &PendingJob) -> Result<ContinueOutcome, DispatchError> {
        let PendingJob { request, response } = pending;
        let settlement = {
            let tm = self.tm.tm(&response.source_lang, &response.target_lang).await;
            let tm = tm.read().await;
            settle_held(response, &tm, &self.ctx)
        };
        if settlement.is_unchanged() {
            return Ok(ContinueOutcome::Unchanged);
        }

        let released = settlement.released.len();
        let mut done = response_for(response, JobStatus::Done, &self.ctx);
        done.tus = settlement.resolved;
        let done = self.record_response(&done, request.as_ref()).await?;

        let lineage = response
            .original_job_guid
            .clone()
            .unwrap_or_else(|| response.job_guid.clone());
        let Some((next, next_response)) = hold_job(
            settlement.waiting,
            &response.source_lang,
            &response.target_lang,
            Some(lineage),
            &self.ctx,
        ) else {
            return Ok(ContinueOutcome::Done(done));
        };
        let next_job_guid = next.job_guid.clone();
        let remaining = next_response.inflight.len();
        tracing::info!(
            job = %response.job_guid,
            next = %next_job_guid,
            remaining,
            released,
            "held units moved to a new job"
        );
        self.process_job(Some(next), Some(next_response)).await?;
        Ok(ContinueOutcome::Split {
            done,
            next_job_guid,
            remaining,
        })
    }

    /// Translate `request.items`: settle units held by earlier passes, skip
    /// what the TM already covers, hold back repetitions, dispatch the rest,
    /// then backfill from the TM and record what is still held.
    pub async fn translate(&self, request: JobRequest) -> Result<TranslateReport, DispatchError> {
        let JobRequest {
            source_lang,
            target_lang,
            items,
            instructions,
        } = request;
        let tm = self.tm.tm(&source_lang, &target_lang).await;
        let mut report = TranslateReport::default();

        for pending in self.pending_jobs(&source_lang, &target_lang).await? {
            if pending.response.translation_provider != REPETITION_PROVIDER {
                continue;
            }
            match self.settle_held_job(&pending).await? {
                ContinueOutcome::Unchanged => {}
                ContinueOutcome::Done(done) | ContinueOutcome::Split { done, .. } => {
                    report.leveraged += written(&done);
                    report.jobs.push(done);
                }
            }
        }

        let plan = {
            let tm = tm.read().await;
            let (covered, todo): (Vec<PendingTu>, Vec<PendingTu>) =
                items.into_iter().partition(|item| already_covered(&tm, item));
            report.skipped = covered.len();
            plan_repetitions(todo, Some(&tm), &self.repetition)
        };

        let dispatch = JobRequest {
            source_lang: source_lang.clone(),
            target_lang: target_lang.clone(),
            items: plan.send.clone(),
            instructions,
        };
        let assignment = self.create_jobs(&dispatch).await?;
        report.unassigned = assignment.unassigned;
        report.jobs = self.start_jobs(assignment.jobs).await?;

        let filled = {
            let tm = tm.read().await;
            backfill(&plan, &tm, &source_lang, &target_lang, &self.ctx)
        };
        if let Some((request, response)) = filled.jobs {
            report.leveraged += response.tus.len();
            report.jobs.push(self.process_job(Some(request), Some(response)).await?);
        }

        let (waiting, released): (Vec<Holdout>, Vec<Holdout>) = {
            let tm = tm.read().await;
            filled
                .unresolved
                .into_iter()
                .partition(|holdout| donor_in_flight(&tm, &holdout.parent_guid))
        };
        let held = waiting.iter().map(Holdout::as_inflight).collect();
        if let Some((request, response)) = hold_job(held, &source_lang, &target_lang, None, &self.ctx) {
            report.jobs.push(self.process_job(Some(request), Some(response)).await?);
        }
        report.held = waiting;
        report
            .unassigned
            .extend(released.into_iter().map(|holdout| holdout.item));
        tracing::info!(
            source = %source_lang,
            target = %target_lang,
            skipped = report.skipped,
            leveraged = report.leveraged,
            jobs = report.jobs.len(),
            held = report.held.len(),
            unassigned = report.unassigned.len(),
            "translate pass finished"
        );
        Ok(report)
    }
}
