use locus_ops::TaskError;
use locus_tm::{JobStoreError, TmError};

/// Failure talking to, or coming back from, a provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider timed out: {0}")]
    Timeout(String),

    #[error("provider rate limited: {0}")]
    RateLimited(String),

    #[error("provider returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("provider failed with unknown status: {0}")]
    Unknown(String),

    #[error("provider rejected the request: {0}")]
    Rejected(String),

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Tm(#[from] TmError),
}

impl ProviderError {
    /// Timeouts, rate limits, 5xx and unknown failures may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Timeout(_)
            | ProviderError::RateLimited(_)
            | ProviderError::Unknown(_) => true,
            ProviderError::Http { status, .. } => *status == 429 || *status >= 500,
            ProviderError::Rejected(_)
            | ProviderError::Malformed(_)
            | ProviderError::Task(_)
            | ProviderError::Tm(_) => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no provider registered with id {0}")]
    UnknownProvider(String),

    #[error("provider {provider}: {source}")]
    Provider {
        provider: String,
        #[source]
        source: ProviderError,
    },

    #[error("job has neither a request nor a response")]
    EmptyJob,

    #[error(transparent)]
    JobStore(#[from] JobStoreError),

    #[error(transparent)]
    Tm(#[from] TmError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("invalid toml at {path}: {source}")]
    ParseToml {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classes() {
        assert!(ProviderError::Timeout("t".into()).is_retryable());
        assert!(ProviderError::RateLimited("r".into()).is_retryable());
        assert!(ProviderError::Unknown("?".into()).is_retryable());
        assert!(
            ProviderError::Http {
                status: 503,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(
            !ProviderError::Http {
                status: 400,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(!ProviderError::Rejected("no".into()).is_retryable());
        assert!(!ProviderError::Malformed("bad".into()).is_retryable());
    }
}
