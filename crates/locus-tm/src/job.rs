//! Job artifacts: the unit of work exchanged with providers.
//!
//! A job is written once per status. A status change is a new artifact,
//! never an overwrite; pending work split off a job moves to a new guid that
//! points back through `originalJobGuid`.

use chrono::{DateTime, Utc};
use locus_kernel::TranslationUnit;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Created,
    Blocked,
    Cancelled,
    Pending,
    Done,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Created => "created",
            JobStatus::Blocked => "blocked",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Pending => "pending",
            JobStatus::Done => "done",
        }
    }

    /// Request-side statuses: what the dispatcher asked for.
    pub fn is_request(&self) -> bool {
        matches!(self, JobStatus::Created | JobStatus::Blocked)
    }

    /// Precedence when several response artifacts exist for one guid.
    pub fn response_rank(&self) -> u8 {
        match self {
            JobStatus::Done => 3,
            JobStatus::Pending => 2,
            JobStatus::Cancelled => 1,
            JobStatus::Created | JobStatus::Blocked => 0,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(JobStatus::Created),
            "blocked" => Ok(JobStatus::Blocked),
            "cancelled" => Ok(JobStatus::Cancelled),
            "pending" => Ok(JobStatus::Pending),
            "done" => Ok(JobStatus::Done),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// A job artifact (request or response).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_guid: String,
    pub source_lang: String,
    pub target_lang: String,
    pub status: JobStatus,
    pub translation_provider: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub tus: Vec<TranslationUnit>,
    /// Guids accepted by the provider but not yet translated.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inflight: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_job_guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envelope: Option<Value>,
}

impl Job {
    pub fn new(
        job_guid: impl Into<String>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
        translation_provider: impl Into<String>,
        status: JobStatus,
    ) -> Self {
        Self {
            job_guid: job_guid.into(),
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            status,
            translation_provider: translation_provider.into(),
            updated_at: Utc::now(),
            tus: Vec::new(),
            inflight: Vec::new(),
            original_job_guid: None,
            instructions: None,
            envelope: None,
        }
    }

    /// The immutability key of this artifact.
    pub fn key(&self) -> JobKey {
        JobKey {
            translation_provider: self.translation_provider.clone(),
            source_lang: self.source_lang.clone(),
            target_lang: self.target_lang.clone(),
            job_guid: self.job_guid.clone(),
            status: self.status,
        }
    }

    /// Whether the artifact carries any work at all.
    pub fn has_work(&self) -> bool {
        !self.tus.is_empty() || !self.inflight.is_empty()
    }

    /// Response-side copy with the same identity and a new status.
    pub fn response(&self, status: JobStatus) -> Self {
        Self {
            status,
            tus: Vec::new(),
            inflight: Vec::new(),
            updated_at: Utc::now(),
            ..self.clone()
        }
    }
}

/// `(provider, sourceLang, targetLang, jobGuid, status)`: written at most once.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobKey {
    pub translation_provider: String,
    pub source_lang: String,
    pub target_lang: String,
    pub job_guid: String,
    pub status: JobStatus,
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_job_{}-{}",
            self.translation_provider, self.source_lang, self.target_lang, self.job_guid, self.status
        )
    }
}

/// Listing view of one job guid and the artifacts written for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub job_guid: String,
    pub translation_provider: String,
    pub source_lang: String,
    pub target_lang: String,
    pub statuses: Vec<JobStatus>,
    pub updated_at: DateTime<Utc>,
}

impl JobSummary {
    /// Most advanced response status written for this guid, if any.
    pub fn latest_response(&self) -> Option<JobStatus> {
        self.statuses
            .iter()
            .copied()
            .filter(|s| !s.is_request())
            .max_by_key(JobStatus::response_rank)
    }

    pub fn request_status(&self) -> Option<JobStatus> {
        self.statuses.iter().copied().find(JobStatus::is_request)
    }

    pub fn key(&self, status: JobStatus) -> JobKey {
        JobKey {
            translation_provider: self.translation_provider.clone(),
            source_lang: self.source_lang.clone(),
            target_lang: self.target_lang.clone(),
            job_guid: self.job_guid.clone(),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_names_are_lowercase() {
        let value = serde_json::to_value(JobStatus::Pending).expect("serialize");
        assert_eq!(value, serde_json::json!("pending"));
        assert_eq!("done".parse::<JobStatus>(), Ok(JobStatus::Done));
    }

    #[test]
    fn key_display_matches_artifact_naming() {
        let job = Job::new("abc", "en", "fr", "mt", JobStatus::Created);
        assert_eq!(job.key().to_string(), "mt_en_fr_job_abc-created");
    }

    #[test]
    fn summary_prefers_done_over_pending() {
        let summary = JobSummary {
            job_guid: "g".to_string(),
            translation_provider: "mt".to_string(),
            source_lang: "en".to_string(),
            target_lang: "fr".to_string(),
            statuses: vec![JobStatus::Created, JobStatus::Pending, JobStatus::Done],
            updated_at: Utc::now(),
        };
        assert_eq!(summary.latest_response(), Some(JobStatus::Done));
        assert_eq!(summary.request_status(), Some(JobStatus::Created));
    }

    #[test]
    fn job_wire_shape_is_camel_case() {
        let mut job = Job::new("g", "en", "de", "mt", JobStatus::Pending);
        job.inflight = vec!["tu-1".to_string()];
        job.original_job_guid = Some("g0".to_string());
        let value = serde_json::to_value(&job).expect("serialize");
        for key in ["jobGuid", "sourceLang", "targetLang", "translationProvider", "updatedAt", "originalJobGuid", "inflight"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }
}
