//! `locus.toml`: tunables for leverage, chunking, retries and scheduling.
//!
//! Every table and field is optional; a missing file section falls back to
//! the defaults below.

use crate::error::ConfigError;
use crate::repetition::RepetitionPolicy;
use crate::retry::RetryPolicy;
use locus_ops::ChunkLimits;
use locus_tm::{DEFAULT_WARM_UP_CONCURRENCY, JobStore, TmManager};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LocusConfig {
    pub repetition: RepetitionConfig,
    pub chunking: ChunkingConfig,
    pub retry: RetryConfig,
    pub scheduler: SchedulerConfig,
    pub tm: TmConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RepetitionConfig {
    pub expected_quality: u32,
    pub qualified_penalty: u32,
    pub unqualified_penalty: u32,
    pub notes_mismatch_penalty: u32,
    pub group_penalty: u32,
}

impl Default for RepetitionConfig {
    fn default() -> Self {
        let policy = RepetitionPolicy::default();
        Self {
            expected_quality: policy.expected_quality,
            qualified_penalty: policy.qualified_penalty,
            unqualified_penalty: policy.unqualified_penalty,
            notes_mismatch_penalty: policy.notes_mismatch_penalty,
            group_penalty: policy.group_penalty,
        }
    }
}

impl RepetitionConfig {
    pub fn policy(&self) -> RepetitionPolicy {
        RepetitionPolicy {
            expected_quality: self.expected_quality,
            qualified_penalty: self.qualified_penalty,
            unqualified_penalty: self.unqualified_penalty,
            notes_mismatch_penalty: self.notes_mismatch_penalty,
            group_penalty: self.group_penalty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ChunkingConfig {
    pub max_units: usize,
    pub max_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        let limits = ChunkLimits::default();
        Self {
            max_units: limits.max_units,
            max_chars: limits.max_chars,
        }
    }
}

impl ChunkingConfig {
    pub fn limits(&self) -> ChunkLimits {
        ChunkLimits {
            max_units: self.max_units,
            max_chars: self.max_chars,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetryConfig {
    pub base_ms: u64,
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_ms: 500,
            max_attempts: 3,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            base: Duration::from_millis(self.base_ms),
            max_attempts: self.max_attempts,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SchedulerConfig {
    pub parallelism: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { parallelism: 4 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TmConfig {
    pub warm_up_concurrency: usize,
}

impl Default for TmConfig {
    fn default() -> Self {
        Self {
            warm_up_concurrency: DEFAULT_WARM_UP_CONCURRENCY,
        }
    }
}

impl TmConfig {
    pub fn manager(&self, job_store: Arc<dyn JobStore>) -> TmManager {
        TmManager::with_concurrency(job_store, self.warm_up_concurrency)
    }
}

impl LocusConfig {
    /// Parse `text`; `origin` only labels errors.
    pub fn from_toml_str(text: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::ParseToml {
            path: origin.to_string(),
            source,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| ConfigError::Read {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        let config = Self::from_toml_str(&text, &path.display().to_string())?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_all_defaults() {
        let config = LocusConfig::from_toml_str("", "inline").expect("parse");
        assert_eq!(config, LocusConfig::default());
        assert_eq!(config.repetition.policy(), RepetitionPolicy::default());
        assert_eq!(config.chunking.limits(), ChunkLimits::default());
        assert_eq!(config.retry.policy(), RetryPolicy::default());
    }

    #[test]
    fn partial_tables_keep_remaining_defaults() {
        let config = LocusConfig::from_toml_str(
            r#"
[repetition]
expected-quality = 90
group-penalty = 0

[retry]
max-attempts = 5

[scheduler]
parallelism = 2
"#,
            "inline",
        )
        .expect("parse");
        let policy = config.repetition.policy();
        assert_eq!(policy.expected_quality, 90);
        assert_eq!(policy.group_penalty, 0);
        assert_eq!(policy.unqualified_penalty, 5);
        assert_eq!(config.retry.policy().max_attempts, 5);
        assert_eq!(config.retry.policy().base, Duration::from_millis(500));
        assert_eq!(config.scheduler.parallelism, 2);
        assert_eq!(config.tm.warm_up_concurrency, DEFAULT_WARM_UP_CONCURRENCY);
    }

    #[test]
    fn invalid_toml_names_its_origin() {
        let err = LocusConfig::from_toml_str("[retry]\nmax-attempts = \"many\"", "locus.toml")
            .expect_err("type mismatch");
        assert!(matches!(err, ConfigError::ParseToml { ref path, .. } if path == "locus.toml"));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = LocusConfig::load("/nonexistent/locus.toml").expect_err("missing");
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
