//! Translation unit: the record every pipeline stage passes around.
//!
//! Two wire whitelists exist. A *source* TU carries identity and source
//! content; a *target* TU additionally carries translation state. Fields
//! outside the whitelist are dropped at construction, and missing mandatory
//! fields are construction errors.

use crate::error::TuError;
use crate::guid::guid;
use crate::part::NormalizedString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Fields a source TU may carry.
pub const SOURCE_FIELDS: &[&str] = &[
    "guid",
    "nid",
    "seq",
    "rid",
    "sid",
    "nsrc",
    "prj",
    "isSuffixPluralized",
    "notes",
];

/// Fields a target TU may carry in addition to the source fields.
pub const TARGET_FIELDS: &[&str] = &[
    "inflight",
    "q",
    "ntgt",
    "cost",
    "jobGuid",
    "translationProvider",
    "ts",
    "th",
    "rev",
    "parentGuid",
];

const SOURCE_REQUIRED: &[&str] = &["guid", "rid", "sid", "nsrc"];
const TARGET_REQUIRED: &[&str] = &["guid", "q", "ts"];

/// Per-placeholder annotation attached by resource authors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhNote {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

/// Translator-facing notes for a segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "NotesWire")]
pub struct Notes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ph: BTreeMap<String, PhNote>,
}

impl Notes {
    pub fn desc(desc: impl Into<String>) -> Self {
        Self {
            desc: Some(desc.into()),
            ph: BTreeMap::new(),
        }
    }
}

/// Older resources ship notes as a bare string.
#[derive(Deserialize)]
#[serde(untagged)]
enum NotesWire {
    Text(String),
    Full {
        #[serde(default)]
        desc: Option<String>,
        #[serde(default)]
        ph: BTreeMap<String, PhNote>,
    },
}

impl From<NotesWire> for Notes {
    fn from(wire: NotesWire) -> Self {
        match wire {
            NotesWire::Text(desc) => Notes::desc(desc),
            NotesWire::Full { desc, ph } => Notes { desc, ph },
        }
    }
}

/// A translation unit, source or target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationUnit {
    // ── Identity ──
    #[serde(default)]
    pub guid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    #[serde(default)]
    pub rid: String,
    #[serde(default)]
    pub sid: String,

    // ── Source ──
    #[serde(default)]
    pub nsrc: NormalizedString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prj: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_suffix_pluralized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Notes>,

    // ── Translation state ──
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub inflight: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ntgt: Option<NormalizedString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation_provider: Option<String>,
    /// Guid of the in-flight TU whose translation this one waits to copy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_guid: Option<String>,
    /// Milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub th: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
}

impl TranslationUnit {
    /// New source TU with its guid derived from `(rid, sid, nsrc)`.
    pub fn new_source(
        rid: impl Into<String>,
        sid: impl Into<String>,
        nsrc: NormalizedString,
    ) -> Self {
        let rid = rid.into();
        let sid = sid.into();
        Self {
            guid: guid(&rid, &sid, &nsrc),
            rid,
            sid,
            nsrc,
            ..Self::default()
        }
    }

    /// Parse a source TU from a wire value.
    pub fn source_from_value(value: &Value) -> Result<Self, TuError> {
        require_fields(value, SOURCE_REQUIRED)?;
        let tu: Self =
            serde_json::from_value(value.clone()).map_err(|e| TuError::Malformed(e.to_string()))?;
        Ok(tu.as_source())
    }

    /// Parse a target TU from a wire value.
    pub fn target_from_value(value: &Value) -> Result<Self, TuError> {
        require_fields(value, TARGET_REQUIRED)?;
        let tu: Self =
            serde_json::from_value(value.clone()).map_err(|e| TuError::Malformed(e.to_string()))?;
        tu.validate_target()?;
        Ok(tu)
    }

    /// Projection onto the source whitelist.
    pub fn as_source(&self) -> Self {
        Self {
            guid: self.guid.clone(),
            nid: self.nid.clone(),
            seq: self.seq,
            rid: self.rid.clone(),
            sid: self.sid.clone(),
            nsrc: self.nsrc.clone(),
            prj: self.prj.clone(),
            is_suffix_pluralized: self.is_suffix_pluralized,
            notes: self.notes.clone(),
            ..Self::default()
        }
    }

    /// Check mandatory target fields: a resolved target needs `ntgt`, an
    /// in-flight one does not.
    pub fn validate_target(&self) -> Result<(), TuError> {
        if self.guid.is_empty() {
            return Err(TuError::MissingField("guid"));
        }
        if self.q.is_none() {
            return Err(TuError::MissingField("q"));
        }
        if self.ts.is_none() {
            return Err(TuError::MissingField("ts"));
        }
        if !self.inflight && self.ntgt.is_none() {
            return Err(TuError::MissingField("ntgt"));
        }
        Ok(())
    }

    /// Whether this entry carries a usable translation.
    pub fn is_resolved(&self) -> bool {
        !self.inflight && self.ntgt.is_some()
    }

    /// Description used for notes-mismatch comparisons.
    pub fn notes_desc(&self) -> Option<&str> {
        self.notes.as_ref().and_then(|n| n.desc.as_deref())
    }
}

fn require_fields(value: &Value, fields: &[&'static str]) -> Result<(), TuError> {
    let obj = value.as_object().ok_or(TuError::NotAnObject)?;
    for field in fields {
        match obj.get(*field) {
            None | Some(Value::Null) => return Err(TuError::MissingField(field)),
            Some(_) => {}
        }
    }
    Ok(())
}
