//! Translation memory for one language pair.
//!
//! Entries are keyed by `(guid, jobGuid)` and never deleted: every job that
//! touched a guid leaves its own row, and lookups rank them. Ingestion is
//! two-phase. [`TranslationMemory::stage_job`] builds a [`TmTransaction`]
//! against a shared borrow, and [`TranslationMemory::commit`] applies it in
//! one mutable step. Dropping a transaction discards it.

use crate::error::TmError;
use crate::job::{Job, JobStatus};
use chrono::{DateTime, Utc};
use locus_kernel::{NormalizedString, TranslationUnit, compatible, flatten_ordinal};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::OnceLock;

type EntryKey = (String, String);

/// Status row kept for every job the memory has ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusRow {
    pub job_guid: String,
    pub status: JobStatus,
    pub updated_at: DateTime<Utc>,
    pub translation_provider: String,
    /// Units written by this job (translated plus in-flight).
    pub units: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TmStats {
    pub entries: usize,
    pub distinct_guids: usize,
    pub inflight: usize,
    pub jobs: usize,
    pub by_provider: BTreeMap<String, usize>,
}

/// Staged result of one job's ingestion.
#[derive(Debug, Clone)]
#[must_use = "a transaction does nothing until committed"]
pub struct TmTransaction {
    entries: Vec<TranslationUnit>,
    job: JobStatusRow,
    dropped: usize,
}

impl TmTransaction {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub written: usize,
    pub dropped: usize,
}

const TM_RECORD: &str = "TM record";

/// One snapshot line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum TmRecord {
    #[serde(rename_all = "camelCase")]
    Pair {
        source_lang: String,
        target_lang: String,
    },
    Job(JobStatusRow),
    Entry(TranslationUnit),
}

/// Ranking: resolved beats in-flight, then quality, then recency.
fn rank(tu: &TranslationUnit) -> (bool, u32, i64) {
    (tu.is_resolved(), tu.q.unwrap_or(0), tu.ts.unwrap_or(0))
}

/// Target fields from `target` laid over the source projection of `source`.
fn merge_over(source: &TranslationUnit, target: TranslationUnit) -> TranslationUnit {
    let base = source.as_source();
    TranslationUnit {
        guid: if target.guid.is_empty() { base.guid } else { target.guid },
        nid: target.nid.or(base.nid),
        seq: target.seq.or(base.seq),
        rid: if target.rid.is_empty() { base.rid } else { target.rid },
        sid: if target.sid.is_empty() { base.sid } else { target.sid },
        nsrc: if target.nsrc.is_empty() { base.nsrc } else { target.nsrc },
        prj: target.prj.or(base.prj),
        is_suffix_pluralized: target.is_suffix_pluralized || base.is_suffix_pluralized,
        notes: target.notes.or(base.notes),
        ..target
    }
}

#[derive(Debug, Default)]
pub struct TranslationMemory {
    source_lang: String,
    target_lang: String,
    entries: BTreeMap<EntryKey, TranslationUnit>,
    jobs: BTreeMap<String, JobStatusRow>,
    exact_index: OnceLock<HashMap<String, Vec<EntryKey>>>,
}

impl TranslationMemory {
    pub fn new(source_lang: impl Into<String>, target_lang: impl Into<String>) -> Self {
        Self {
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            ..Self::default()
        }
    }

    pub fn source_lang(&self) -> &str {
        &self.source_lang
    }

    pub fn target_lang(&self) -> &str {
        &self.target_lang
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every row recorded for `guid`, one per job.
    pub fn entries_for<'a>(&'a self, guid: &str) -> impl Iterator<Item = &'a TranslationUnit> + use<'a> {
        let key = guid.to_string();
        self.entries
            .range((key.clone(), String::new())..)
            .take_while(move |((g, _), _)| *g == key)
            .map(|(_, tu)| tu)
    }

    /// Best entry for `guid`.
    pub fn get_entry(&self, guid: &str) -> Option<&TranslationUnit> {
        self.entries_for(guid).max_by_key(|tu| rank(tu))
    }

    pub fn job_status(&self, job_guid: &str) -> Option<&JobStatusRow> {
        self.jobs.get(job_guid)
    }

    /// In flight on a job whose status row is still `pending`.
    pub fn is_pending(&self, entry: &TranslationUnit) -> bool {
        entry.inflight
            && entry
                .job_guid
                .as_deref()
                .and_then(|job| self.job_status(job))
                .is_some_and(|row| row.status == JobStatus::Pending)
    }

    pub fn jobs(&self) -> impl Iterator<Item = &JobStatusRow> {
        self.jobs.values()
    }

    fn exact_index(&self) -> &HashMap<String, Vec<EntryKey>> {
        self.exact_index.get_or_init(|| {
            let mut index: HashMap<String, Vec<EntryKey>> = HashMap::new();
            for (key, tu) in &self.entries {
                if tu.is_resolved() {
                    index
                        .entry(flatten_ordinal(&tu.nsrc))
                        .or_default()
                        .push(key.clone());
                }
            }
            tracing::debug!(buckets = index.len(), "exact-match index built");
            index
        })
    }

    /// Resolved entries whose source matches `nsrc` exactly (any rid/sid)
    /// and whose target is placeholder-compatible with it. Best first.
    pub fn exact_matches(&self, nsrc: &NormalizedString) -> Vec<&TranslationUnit> {
        let Some(keys) = self.exact_index().get(&flatten_ordinal(nsrc)) else {
            return Vec::new();
        };
        let mut matches: Vec<&TranslationUnit> = keys
            .iter()
            .filter_map(|key| self.entries.get(key))
            .filter(|tu| tu.ntgt.as_ref().is_some_and(|ntgt| compatible(nsrc, ntgt)))
            .collect();
        matches.sort_by_key(|tu| std::cmp::Reverse(rank(tu)));
        matches
    }

    /// Stage a job response (and its request, when known) for ingestion.
    pub fn stage_job(&self, response: &Job, request: Option<&Job>) -> Result<TmTransaction, TmError> {
        if response.source_lang != self.source_lang || response.target_lang != self.target_lang {
            return Err(TmError::PairMismatch {
                job_guid: response.job_guid.clone(),
                expected: format!("{}→{}", self.source_lang, self.target_lang),
                found: format!("{}→{}", response.source_lang, response.target_lang),
            });
        }

        let sources: HashMap<&str, &TranslationUnit> = request
            .map(|req| req.tus.iter().map(|tu| (tu.guid.as_str(), tu)).collect())
            .unwrap_or_default();
        let job_ts = response.updated_at.timestamp_millis();
        let mut staged = Vec::new();
        let mut seen = HashSet::new();
        let mut dropped = 0;

        for tu in &response.tus {
            let merged = match sources.get(tu.guid.as_str()) {
                Some(source) => merge_over(source, tu.clone()),
                None => tu.clone(),
            };
            let merged = TranslationUnit {
                job_guid: Some(response.job_guid.clone()),
                translation_provider: Some(response.translation_provider.clone()),
                ts: merged.ts.or(Some(job_ts)),
                ..merged
            };
            if let Err(err) = merged.validate_target() {
                tracing::warn!(guid = %merged.guid, job = %response.job_guid, %err, "dropping invalid translation");
                dropped += 1;
                continue;
            }
            if let Some(ntgt) = merged.ntgt.as_ref()
                && !compatible(&merged.nsrc, ntgt)
            {
                tracing::warn!(guid = %merged.guid, job = %response.job_guid, "dropping incompatible translation");
                dropped += 1;
                continue;
            }
            seen.insert(merged.guid.clone());
            staged.push(merged);
        }

        for guid in &response.inflight {
            let key = (guid.clone(), response.job_guid.clone());
            if seen.contains(guid) || self.entries.contains_key(&key) {
                continue;
            }
            let base = sources
                .get(guid.as_str())
                .map(|tu| tu.as_source())
                .unwrap_or_else(|| TranslationUnit {
                    guid: guid.clone(),
                    ..TranslationUnit::default()
                });
            seen.insert(guid.clone());
            staged.push(TranslationUnit {
                inflight: true,
                q: Some(0),
                job_guid: Some(response.job_guid.clone()),
                translation_provider: Some(response.translation_provider.clone()),
                ts: Some(job_ts),
                ..base
            });
        }

        Ok(TmTransaction {
            job: JobStatusRow {
                job_guid: response.job_guid.clone(),
                status: response.status,
                updated_at: response.updated_at,
                translation_provider: response.translation_provider.clone(),
                units: staged.len(),
            },
            entries: staged,
            dropped,
        })
    }

    /// Apply a staged transaction.
    pub fn commit(&mut self, tx: TmTransaction) -> IngestReport {
        let mut written = 0;
        for tu in tx.entries {
            let key = (tu.guid.clone(), tu.job_guid.clone().unwrap_or_default());
            if tu.inflight && self.entries.contains_key(&key) {
                continue;
            }
            self.entries.insert(key, tu);
            written += 1;
        }
        tracing::info!(
            job = %tx.job.job_guid,
            status = %tx.job.status,
            written,
            dropped = tx.dropped,
            "job ingested"
        );
        self.jobs.insert(tx.job.job_guid.clone(), tx.job);
        self.exact_index = OnceLock::new();
        IngestReport {
            written,
            dropped: tx.dropped,
        }
    }

    /// Stage and commit in one call.
    pub fn ingest_job(&mut self, response: &Job, request: Option<&Job>) -> Result<IngestReport, TmError> {
        let tx = self.stage_job(response, request)?;
        Ok(self.commit(tx))
    }

    pub fn stats(&self) -> TmStats {
        let mut stats = TmStats {
            entries: self.entries.len(),
            jobs: self.jobs.len(),
            ..TmStats::default()
        };
        let mut last_guid: Option<&str> = None;
        for ((guid, _), tu) in &self.entries {
            if last_guid != Some(guid.as_str()) {
                stats.distinct_guids += 1;
                last_guid = Some(guid.as_str());
            }
            if tu.inflight {
                stats.inflight += 1;
            }
            let provider = tu.translation_provider.as_deref().unwrap_or("unknown");
            *stats.by_provider.entry(provider.to_string()).or_default() += 1;
        }
        stats
    }

    /// Persist the memory as JSONL: a pair header, job rows, then entries.
    pub fn save_jsonl(&self, path: impl AsRef<Path>) -> Result<(), TmError> {
        let mut records = Vec::with_capacity(1 + self.jobs.len() + self.entries.len());
        records.push(TmRecord::Pair {
            source_lang: self.source_lang.clone(),
            target_lang: self.target_lang.clone(),
        });
        records.extend(self.jobs.values().cloned().map(TmRecord::Job));
        records.extend(self.entries.values().cloned().map(TmRecord::Entry));
        locus_kernel::save_snapshot(path, TM_RECORD, &records)?;
        Ok(())
    }

    pub fn load_jsonl(path: impl AsRef<Path>) -> Result<Self, TmError> {
        let records: Vec<TmRecord> = locus_kernel::load_snapshot(path, TM_RECORD)?;
        let mut records = records.into_iter();
        let Some(TmRecord::Pair {
            source_lang,
            target_lang,
        }) = records.next()
        else {
            return Err(TmError::Snapshot("first record must be the language pair".to_string()));
        };
        let mut tm = Self::new(source_lang, target_lang);
        for record in records {
            match record {
                TmRecord::Pair { .. } => {
                    return Err(TmError::Snapshot("duplicate language pair record".to_string()));
                }
                TmRecord::Job(row) => {
                    tm.jobs.insert(row.job_guid.clone(), row);
                }
                TmRecord::Entry(tu) => {
                    let key = (tu.guid.clone(), tu.job_guid.clone().unwrap_or_default());
                    tm.entries.insert(key, tu);
                }
            }
        }
        Ok(tm)
    }
}
