//! Chunked translation through the op scheduler.
//!
//! A job becomes one task (keyed by the job's lineage guid) running the
//! split → translate × N → merge flow. Each translate op flattens its TUs to
//! XML-V1, calls the [`ChunkTranslator`] with retries and extracts the
//! results. Because the task is persisted, a crashed or pending job resumes
//! from the chunks that already came back.

use crate::config::LocusConfig;
use crate::context::DispatchContext;
use crate::error::ProviderError;
use crate::provider::{JobRequest, ProviderCapability, TranslationProvider, response_for};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use locus_kernel::{NormalizedString, TranslationUnit, extract_xml, flatten_xml};
use locus_ops::{
    ChunkArgs, ChunkLimits, OpCallback, OpContext, OpError, OpRegistry, Task, TaskError, TaskStatus,
    TaskStore, TaskStoreError, enqueue_chunk_flow, op_fn, register_chunk_ops,
};
use locus_tm::{Job, JobStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// One TU as sent to a translator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkSegment {
    pub guid: String,
    /// XML-V1 flattened source.
    pub xml: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRequest {
    pub source_lang: String,
    pub target_lang: String,
    pub segments: Vec<ChunkSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

#[async_trait]
pub trait ChunkTranslator: Send + Sync + 'static {
    fn capability(&self) -> ProviderCapability {
        ProviderCapability::ChunkedRemote
    }

    /// Whether a call may be repeated after a crash mid-flight.
    fn idempotent(&self) -> bool {
        true
    }

    /// One XML-V1 translation per segment, in order.
    async fn translate_chunk(&self, request: &ChunkRequest) -> Result<Vec<String>, ProviderError>;
}

/// Shared by every translate op of a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowContext {
    source_lang: String,
    target_lang: String,
    #[serde(default)]
    instructions: Option<String>,
}

/// One translate-op result item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChunkItem {
    guid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ntgt: Option<NormalizedString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn invalid(err: serde_json::Error) -> OpError {
    OpError::InvalidArgs(err.to_string())
}

async fn translate_chunk(
    translator: &dyn ChunkTranslator,
    retry: RetryPolicy,
    provider: &str,
    ctx: OpContext,
) -> Result<Value, OpError> {
    let args: ChunkArgs = serde_json::from_value(ctx.args).map_err(invalid)?;
    let flow: FlowContext = serde_json::from_value(args.context).map_err(invalid)?;

    let flattened: Vec<_> = args
        .tus
        .iter()
        .map(|tu| {
            let (xml, ph_map) = flatten_xml(&tu.nsrc);
            (tu.guid.as_str(), xml, ph_map, tu.notes_desc())
        })
        .collect();
    let request = ChunkRequest {
        source_lang: flow.source_lang,
        target_lang: flow.target_lang,
        segments: flattened
            .iter()
            .map(|(guid, xml, _, notes)| ChunkSegment {
                guid: guid.to_string(),
                xml: xml.clone(),
                notes: notes.map(str::to_string),
            })
            .collect(),
        instructions: flow.instructions,
    };

    let label = format!("{provider} chunk {}", args.chunk);
    let translations = retry
        .run(&label, || translator.translate_chunk(&request))
        .await
        .map_err(|err| OpError::Failed(err.to_string()))?;
    if translations.len() != flattened.len() {
        // The merge rejects a short or long chunk whole; the rest of the job
        // still goes through.
        tracing::warn!(
            provider,
            chunk = args.chunk,
            got = translations.len(),
            sent = flattened.len(),
            "translator returned the wrong number of strings"
        );
        return Ok(Value::Array(Vec::new()));
    }

    let items: Vec<ChunkItem> = flattened
        .iter()
        .zip(&translations)
        .map(|((guid, _, ph_map, _), translated)| match extract_xml(translated, ph_map) {
            Ok(ntgt) => ChunkItem {
                guid: guid.to_string(),
                ntgt: Some(ntgt),
                error: None,
            },
            Err(err) => ChunkItem {
                guid: guid.to_string(),
                ntgt: None,
                error: Some(err.to_string()),
            },
        })
        .collect();
    serde_json::to_value(items).map_err(|err| OpError::Failed(err.to_string()))
}

/// Provider running jobs as persisted chunk flows.
pub struct ChunkedProvider {
    id: String,
    translator: Arc<dyn ChunkTranslator>,
    quality: u32,
    limits: ChunkLimits,
    retry: RetryPolicy,
    parallelism: usize,
    max_tus: Option<usize>,
    translate_op: String,
    registry: Arc<OpRegistry>,
    store: Arc<dyn TaskStore>,
}

impl ChunkedProvider {
    pub fn new(
        id: impl Into<String>,
        translator: Arc<dyn ChunkTranslator>,
        quality: u32,
        store: Arc<dyn TaskStore>,
    ) -> Result<Self, TaskError> {
        Self::from_config(id, translator, quality, store, &LocusConfig::default())
    }

    /// Chunk limits, retries and scheduler parallelism from `config`.
    pub fn from_config(
        id: impl Into<String>,
        translator: Arc<dyn ChunkTranslator>,
        quality: u32,
        store: Arc<dyn TaskStore>,
        config: &LocusConfig,
    ) -> Result<Self, TaskError> {
        Self::with_settings(
            id,
            translator,
            quality,
            store,
            config.chunking.limits(),
            config.retry.policy(),
            config.scheduler.parallelism,
        )
    }

    pub fn with_settings(
        id: impl Into<String>,
        translator: Arc<dyn ChunkTranslator>,
        quality: u32,
        store: Arc<dyn TaskStore>,
        limits: ChunkLimits,
        retry: RetryPolicy,
        parallelism: usize,
    ) -> Result<Self, TaskError> {
        let id = id.into();
        let translate_op = format!("translate:{id}");
        let registry = Arc::new(OpRegistry::new());
        register_chunk_ops(&registry)?;

        let callback: Arc<dyn OpCallback> = {
            let translator = Arc::clone(&translator);
            let provider = id.clone();
            op_fn(move |ctx: OpContext| {
                let translator = Arc::clone(&translator);
                let provider = provider.clone();
                async move { translate_chunk(translator.as_ref(), retry, &provider, ctx).await }
            })
        };
        registry.register(translate_op.as_str(), callback, translator.idempotent())?;

        Ok(Self {
            id,
            translator,
            quality,
            limits,
            retry,
            parallelism: parallelism.max(1),
            max_tus: None,
            translate_op,
            registry,
            store,
        })
    }

    pub fn with_max_tus_per_job(mut self, max_tus: usize) -> Self {
        self.max_tus = Some(max_tus.max(1));
        self
    }

    pub fn limits(&self) -> ChunkLimits {
        self.limits
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Task id for a job: pending splits share their root's task.
    pub fn task_id(job: &Job) -> &str {
        job.original_job_guid.as_deref().unwrap_or(&job.job_guid)
    }

    async fn load_or_create(&self, job: &Job) -> Result<Task, ProviderError> {
        let task_id = Self::task_id(job);
        match Task::hydrate(task_id, Arc::clone(&self.registry), Arc::clone(&self.store)).await {
            Ok(task) if task.root().is_some() => Ok(task),
            Ok(_) | Err(TaskError::Store(TaskStoreError::NotFound(_))) => {
                let mut task = Task::new(task_id, Arc::clone(&self.registry), Arc::clone(&self.store));
                let flow = serde_json::to_value(FlowContext {
                    source_lang: job.source_lang.clone(),
                    target_lang: job.target_lang.clone(),
                    instructions: job.instructions.clone(),
                })
                .map_err(|err| ProviderError::Malformed(err.to_string()))?;
                enqueue_chunk_flow(&mut task, job.tus.clone(), self.limits, &self.translate_op, flow).await?;
                tracing::debug!(provider = %self.id, task = task_id, tus = job.tus.len(), "chunk flow created");
                Ok(task)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Response from a finished flow: extracted TUs, failures dropped.
    fn done_response(&self, job: &Job, output: Value, ctx: &DispatchContext) -> Result<Job, ProviderError> {
        let items: Vec<ChunkItem> =
            serde_json::from_value(output).map_err(|err| ProviderError::Malformed(err.to_string()))?;
        let sources: HashMap<&str, &TranslationUnit> =
            job.tus.iter().map(|tu| (tu.guid.as_str(), tu)).collect();
        let ts = ctx.now_millis();
        let mut response = response_for(job, JobStatus::Done, ctx);
        for item in items {
            let Some(source) = sources.get(item.guid.as_str()) else {
                tracing::warn!(provider = %self.id, guid = %item.guid, "translation for unknown guid");
                continue;
            };
            match (item.ntgt, item.error) {
                (Some(ntgt), _) => response.tus.push(TranslationUnit {
                    ntgt: Some(ntgt),
                    q: Some(self.quality),
                    ts: Some(ts),
                    ..source.as_source()
                }),
                (None, error) => {
                    tracing::warn!(
                        provider = %self.id,
                        guid = %item.guid,
                        error = error.as_deref().unwrap_or("missing translation"),
                        "dropping untranslatable unit"
                    );
                }
            }
        }
        Ok(response)
    }

    async fn drive(&self, job: &Job, ctx: &DispatchContext) -> Result<Option<Job>, ProviderError> {
        let mut task = self.load_or_create(job).await?;
        match task.execute(self.parallelism).await? {
            TaskStatus::Done(output) => self.done_response(job, output, ctx).map(Some),
            TaskStatus::Waiting { blocked } => {
                tracing::info!(provider = %self.id, job = %job.job_guid, ?blocked, "chunk flow waiting");
                Ok(None)
            }
            TaskStatus::Stalled { pending } => {
                tracing::warn!(provider = %self.id, job = %job.job_guid, ?pending, "chunk flow stalled");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl TranslationProvider for ChunkedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn capability(&self) -> ProviderCapability {
        self.translator.capability()
    }

    fn max_tus_per_job(&self) -> Option<usize> {
        self.max_tus
    }

    async fn create(&self, request: &JobRequest, ctx: &DispatchContext) -> Result<Job, ProviderError> {
        let accepted = request
            .items
            .iter()
            .filter(|item| item.min_q <= self.quality)
            .map(|item| item.tu.clone());
        Ok(request.job_for(&self.id, accepted, ctx))
    }

    async fn start(&self, job: &Job, ctx: &DispatchContext) -> Result<Job, ProviderError> {
        match self.drive(job, ctx).await? {
            Some(done) => Ok(done),
            None => {
                let mut pending = response_for(job, JobStatus::Pending, ctx);
                pending.inflight = job.tus.iter().map(|tu| tu.guid.clone()).collect();
                Ok(pending)
            }
        }
    }

    async fn continue_job(&self, job: &Job, ctx: &DispatchContext) -> Result<Option<Job>, ProviderError> {
        self.drive(job, ctx).await
    }
}
