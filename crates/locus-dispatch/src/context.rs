//! Explicit per-run context threaded through every provider call.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct DispatchContext {
    /// Fixed clock and sequential job guids, for reproducible artifacts.
    pub regression: bool,
    /// Root for provider-side files (task stores, payload dumps).
    pub base_dir: PathBuf,
    counter: AtomicU64,
}

impl DispatchContext {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    pub fn regression(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            regression: true,
            ..Self::new(base_dir)
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        if self.regression {
            DateTime::<Utc>::UNIX_EPOCH
        } else {
            Utc::now()
        }
    }

    pub fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }

    pub fn new_job_guid(&self) -> String {
        if self.regression {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            format!("regression-{n:06}")
        } else {
            uuid::Uuid::new_v4().to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regression_mode_is_deterministic() {
        let ctx = DispatchContext::regression("/tmp/locus");
        assert_eq!(ctx.new_job_guid(), "regression-000000");
        assert_eq!(ctx.new_job_guid(), "regression-000001");
        assert_eq!(ctx.now_millis(), 0);
    }

    #[test]
    fn live_mode_uses_uuids() {
        let ctx = DispatchContext::new("/tmp/locus");
        let guid = ctx.new_job_guid();
        assert!(uuid::Uuid::parse_str(&guid).is_ok());
        assert_ne!(guid, ctx.new_job_guid());
    }
}
