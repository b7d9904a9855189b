//! Job artifact persistence.
//!
//! Every artifact is addressed by its [`JobKey`] and may be written exactly
//! once. The dispatcher and the TM warm-up operate only through
//! [`JobStore`], so backends are interchangeable.

use crate::error::JobStoreError;
use crate::job::{Job, JobKey, JobStatus, JobSummary};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use locus_kernel::snapshot::temp_sibling;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist an artifact. Fails with [`JobStoreError::AlreadyWritten`]
    /// when the key exists.
    async fn write_job(&self, job: &Job) -> Result<(), JobStoreError>;

    async fn get_job(&self, key: &JobKey) -> Result<Option<Job>, JobStoreError>;

    /// One summary per `(provider, jobGuid)` for a language pair.
    async fn list_jobs(
        &self,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<JobSummary>, JobStoreError>;

    async fn get_request(&self, summary: &JobSummary) -> Result<Option<Job>, JobStoreError> {
        match summary.request_status() {
            Some(status) => self.get_job(&summary.key(status)).await,
            None => Ok(None),
        }
    }

    async fn get_latest_response(
        &self,
        summary: &JobSummary,
    ) -> Result<Option<Job>, JobStoreError> {
        match summary.latest_response() {
            Some(status) => self.get_job(&summary.key(status)).await,
            None => Ok(None),
        }
    }
}

fn summarize(entries: impl IntoIterator<Item = (JobKey, DateTime<Utc>)>) -> Vec<JobSummary> {
    let mut grouped: BTreeMap<(String, String), JobSummary> = BTreeMap::new();
    for (key, updated_at) in entries {
        let summary = grouped
            .entry((key.translation_provider.clone(), key.job_guid.clone()))
            .or_insert_with(|| JobSummary {
                job_guid: key.job_guid.clone(),
                translation_provider: key.translation_provider.clone(),
                source_lang: key.source_lang.clone(),
                target_lang: key.target_lang.clone(),
                statuses: Vec::new(),
                updated_at,
            });
        summary.statuses.push(key.status);
        summary.updated_at = summary.updated_at.max(updated_at);
    }
    grouped
        .into_values()
        .map(|mut summary| {
            summary.statuses.sort();
            summary
        })
        .collect()
}

// ── In-memory backend ──

#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: RwLock<BTreeMap<JobKey, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn write_job(&self, job: &Job) -> Result<(), JobStoreError> {
        let key = job.key();
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&key) {
            return Err(JobStoreError::AlreadyWritten(key.to_string()));
        }
        tracing::debug!(job = %key, tus = job.tus.len(), "job artifact written");
        jobs.insert(key, job.clone());
        Ok(())
    }

    async fn get_job(&self, key: &JobKey) -> Result<Option<Job>, JobStoreError> {
        Ok(self.jobs.read().await.get(key).cloned())
    }

    async fn list_jobs(
        &self,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<JobSummary>, JobStoreError> {
        let jobs = self.jobs.read().await;
        Ok(summarize(
            jobs.iter()
                .filter(|(k, _)| k.source_lang == source_lang && k.target_lang == target_lang)
                .map(|(k, job)| (k.clone(), job.updated_at)),
        ))
    }
}

// ── Filesystem backend ──

/// Artifacts laid out as `{root}/{src}/{tgt}/{provider}/job_{guid}-{status}.json`.
///
/// A write lands in a temp file first and is then hard-linked into place;
/// linking never replaces an existing file, so a concurrent second writer
/// of the same key loses instead of clobbering.
#[derive(Debug, Clone)]
pub struct FsJobStore {
    root: PathBuf,
}

impl FsJobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &JobKey) -> PathBuf {
        self.root
            .join(&key.source_lang)
            .join(&key.target_lang)
            .join(&key.translation_provider)
            .join(format!("job_{}-{}.json", key.job_guid, key.status))
    }
}

fn io_err(path: &Path, err: std::io::Error) -> JobStoreError {
    JobStoreError::Io(format!("{}: {err}", path.display()))
}

/// `job_{guid}-{status}.json` → `(guid, status)`.
fn parse_artifact_name(name: &str) -> Option<(String, JobStatus)> {
    let stem = name.strip_prefix("job_")?.strip_suffix(".json")?;
    let (guid, status) = stem.rsplit_once('-')?;
    let status = status.parse().ok()?;
    Some((guid.to_string(), status))
}

#[async_trait]
impl JobStore for FsJobStore {
    async fn write_job(&self, job: &Job) -> Result<(), JobStoreError> {
        let key = job.key();
        let path = self.path_for(&key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_err(parent, e))?;
        }

        let body =
            serde_json::to_vec_pretty(job).map_err(|e| JobStoreError::Serialize(e.to_string()))?;
        let tmp_path = temp_sibling(&path);
        let write_result = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(&body).await?;
            file.sync_all().await
        }
        .await;
        if let Err(err) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(io_err(&tmp_path, err));
        }

        let linked = tokio::fs::hard_link(&tmp_path, &path).await;
        let _ = tokio::fs::remove_file(&tmp_path).await;
        match linked {
            Ok(()) => {
                tracing::debug!(job = %key, path = %path.display(), "job artifact written");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                Err(JobStoreError::AlreadyWritten(key.to_string()))
            }
            Err(err) => Err(io_err(&path, err)),
        }
    }

    async fn get_job(&self, key: &JobKey) -> Result<Option<Job>, JobStoreError> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_err(&path, err)),
        };
        let job = serde_json::from_slice(&bytes).map_err(|e| JobStoreError::Malformed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(Some(job))
    }

    async fn list_jobs(
        &self,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<JobSummary>, JobStoreError> {
        let pair_dir = self.root.join(source_lang).join(target_lang);
        let mut providers = match tokio::fs::read_dir(&pair_dir).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_err(&pair_dir, err)),
        };

        let mut found = Vec::new();
        while let Some(provider) = providers
            .next_entry()
            .await
            .map_err(|e| io_err(&pair_dir, e))?
        {
            let provider_path = provider.path();
            let is_dir = provider
                .file_type()
                .await
                .map_err(|e| io_err(&provider_path, e))?
                .is_dir();
            if !is_dir {
                continue;
            }
            let provider_name = provider.file_name().to_string_lossy().into_owned();
            let mut files = tokio::fs::read_dir(&provider_path)
                .await
                .map_err(|e| io_err(&provider_path, e))?;
            while let Some(file) = files
                .next_entry()
                .await
                .map_err(|e| io_err(&provider_path, e))?
            {
                let name = file.file_name().to_string_lossy().into_owned();
                let Some((job_guid, status)) = parse_artifact_name(&name) else {
                    continue;
                };
                let modified = file
                    .metadata()
                    .await
                    .and_then(|m| m.modified())
                    .map(DateTime::<Utc>::from)
                    .map_err(|e| io_err(&file.path(), e))?;
                found.push((
                    JobKey {
                        translation_provider: provider_name.clone(),
                        source_lang: source_lang.to_string(),
                        target_lang: target_lang.to_string(),
                        job_guid,
                        status,
                    },
                    modified,
                ));
            }
        }
        Ok(summarize(found))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_names_parse_with_dashed_guids() {
        assert_eq!(
            parse_artifact_name("job_3f2a-77b1-done.json"),
            Some(("3f2a-77b1".to_string(), JobStatus::Done))
        );
        assert_eq!(parse_artifact_name("job_x-weird.json"), None);
        assert_eq!(parse_artifact_name("notes.txt"), None);
    }

    #[tokio::test]
    async fn memory_store_rejects_second_write() {
        let store = MemoryJobStore::new();
        let job = Job::new("g1", "en", "fr", "mt", JobStatus::Created);
        store.write_job(&job).await.expect("first write");
        let err = store.write_job(&job).await.expect_err("second write must fail");
        assert!(matches!(err, JobStoreError::AlreadyWritten(_)));

        let done = job.response(JobStatus::Done);
        store.write_job(&done).await.expect("new status is a new artifact");
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn list_groups_statuses_per_guid() {
        let store = MemoryJobStore::new();
        let req = Job::new("g1", "en", "fr", "mt", JobStatus::Created);
        store.write_job(&req).await.expect("write");
        store
            .write_job(&req.response(JobStatus::Pending))
            .await
            .expect("write");
        store
            .write_job(&Job::new("g2", "en", "de", "mt", JobStatus::Created))
            .await
            .expect("write");

        let jobs = store.list_jobs("en", "fr").await.expect("list");
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].statuses, vec![JobStatus::Created, JobStatus::Pending]);

        let latest = store
            .get_latest_response(&jobs[0])
            .await
            .expect("get")
            .expect("present");
        assert_eq!(latest.status, JobStatus::Pending);
    }
}
