//! Persisted operation records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Blocking state assigned on hydration to a non-idempotent op that had
/// started but never finished.
pub const INTERRUPTED: &str = "interrupted";

/// Op lifecycle. Serialized as a bare string: anything other than
/// `pending`, `done` or `error` is a blocking state carrying its own name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OpState {
    Pending,
    Done,
    Error,
    Blocked(String),
}

impl OpState {
    pub fn as_str(&self) -> &str {
        match self {
            OpState::Pending => "pending",
            OpState::Done => "done",
            OpState::Error => "error",
            OpState::Blocked(state) => state,
        }
    }

    pub fn is_blocking(&self) -> bool {
        matches!(self, OpState::Blocked(_))
    }
}

impl From<String> for OpState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => OpState::Pending,
            "done" => OpState::Done,
            "error" => OpState::Error,
            _ => OpState::Blocked(s),
        }
    }
}

impl From<OpState> for String {
    fn from(state: OpState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for OpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub op_id: u64,
    pub op_name: String,
    #[serde(default)]
    pub args: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<u64>,
    pub state: OpState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_ran_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub root: bool,
}

impl Operation {
    pub fn new(op_id: u64, op_name: impl Into<String>, args: Value, inputs: Vec<u64>) -> Self {
        Self {
            op_id,
            op_name: op_name.into(),
            args,
            inputs,
            state: OpState::Pending,
            output: None,
            message: None,
            last_ran_at: None,
            root: false,
        }
    }

    /// Reset after a process restart.
    ///
    /// `error` retries. `done` stays. A pending op that had been started
    /// either retries (idempotent) or parks as [`INTERRUPTED`].
    pub fn rehydrate(&mut self, idempotent: bool) {
        match &self.state {
            OpState::Error => {
                self.state = OpState::Pending;
                self.message = None;
            }
            OpState::Pending if self.last_ran_at.is_some() && !idempotent => {
                self.state = OpState::Blocked(INTERRUPTED.to_string());
            }
            OpState::Pending | OpState::Done | OpState::Blocked(_) => {}
        }
    }
}
