//! Repetition leverage.
//!
//! TUs sharing the same normalized source are translated once. Within each
//! bucket of identical ordinal text, a donor is sent downstream and the
//! receivers it can serve at or above their `min_q` are held back until the
//! donor's translation is in the TM, then backfilled from it.
//!
//! Holdouts that outlive a pass are recorded as a pending `repetition` job
//! whose TUs are in flight with `q` and `parentGuid` set. Later passes settle
//! that job against the TM.

use crate::context::DispatchContext;
use crate::provider::{PendingTu, response_for};
use locus_kernel::{TranslationUnit, compatible, flatten_ordinal};
use locus_tm::{Job, JobStatus, TranslationMemory};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const REPETITION_PROVIDER: &str = "repetition";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepetitionPolicy {
    pub expected_quality: u32,
    /// Applied when donor and receiver share a sid.
    pub qualified_penalty: u32,
    /// Applied when they do not.
    pub unqualified_penalty: u32,
    pub notes_mismatch_penalty: u32,
    pub group_penalty: u32,
}

impl Default for RepetitionPolicy {
    fn default() -> Self {
        Self {
            expected_quality: 80,
            qualified_penalty: 0,
            unqualified_penalty: 5,
            notes_mismatch_penalty: 5,
            group_penalty: 5,
        }
    }
}

impl RepetitionPolicy {
    /// Penalty for reusing `donor`'s translation on `receiver`.
    pub fn penalty(&self, donor: &TranslationUnit, receiver: &TranslationUnit) -> u32 {
        let mut penalty = if donor.sid == receiver.sid {
            self.qualified_penalty
        } else {
            self.unqualified_penalty
        };
        if donor.notes_desc() != receiver.notes_desc() {
            penalty += self.notes_mismatch_penalty;
        }
        penalty + self.group_penalty_for(donor, receiver)
    }

    /// `group_penalty` when the two TUs belong to different groups.
    pub fn group_penalty_for(&self, donor: &TranslationUnit, receiver: &TranslationUnit) -> u32 {
        if donor.prj == receiver.prj { 0 } else { self.group_penalty }
    }

    /// Quality a not-yet-translated donor offers a receiver.
    pub fn effective_quality(&self, donor: &TranslationUnit, receiver: &TranslationUnit) -> i64 {
        i64::from(self.expected_quality) - i64::from(self.penalty(donor, receiver))
    }

    /// Best TM exact match for `item`. A match is already translated, so
    /// only a group mismatch costs anything. Returns the match and its
    /// penalized quality.
    pub fn best_exact_match<'a>(
        &self,
        tm: &'a TranslationMemory,
        item: &PendingTu,
    ) -> Option<(&'a TranslationUnit, u32)> {
        tm.exact_matches(&item.tu.nsrc)
            .into_iter()
            .filter_map(|entry| {
                let q = i64::from(entry.q.unwrap_or(0)) - i64::from(self.group_penalty_for(entry, &item.tu));
                (q >= i64::from(item.min_q)).then(|| (entry, q.max(0) as u32))
            })
            .reduce(|best, next| if next.1 > best.1 { next } else { best })
    }
}

/// A receiver waiting on its donor.
#[derive(Debug, Clone, PartialEq)]
pub struct Holdout {
    pub item: PendingTu,
    pub q: u32,
    pub parent_guid: String,
}

impl Holdout {
    /// In-flight view of the held TU.
    pub fn as_inflight(&self) -> TranslationUnit {
        TranslationUnit {
            inflight: true,
            q: Some(self.q),
            parent_guid: Some(self.parent_guid.clone()),
            ..self.item.tu.as_source()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepetitionPlan {
    /// Donors and uncovered TUs: what goes downstream.
    pub send: Vec<PendingTu>,
    pub holdouts: Vec<Holdout>,
    /// TM exact matches accepted outright, as target TUs.
    pub matched: Vec<TranslationUnit>,
}

fn matched_target(item: &PendingTu, entry: &TranslationUnit, q: u32) -> TranslationUnit {
    TranslationUnit {
        ntgt: entry.ntgt.clone(),
        q: Some(q),
        ..item.tu.as_source()
    }
}

/// Partition `items` into what must be sent and what can be leveraged.
pub fn plan_repetitions(
    items: Vec<PendingTu>,
    tm: Option<&TranslationMemory>,
    policy: &RepetitionPolicy,
) -> RepetitionPlan {
    let mut plan = RepetitionPlan::default();
    let mut buckets: Vec<Vec<PendingTu>> = Vec::new();
    let mut bucket_of: HashMap<String, usize> = HashMap::new();

    for item in items {
        if let Some(tm) = tm
            && let Some((entry, q)) = policy.best_exact_match(tm, &item)
        {
            plan.matched.push(matched_target(&item, entry, q));
            continue;
        }
        if item.tu.is_suffix_pluralized {
            plan.send.push(item);
            continue;
        }
        let key = flatten_ordinal(&item.tu.nsrc);
        let idx = *bucket_of.entry(key).or_insert_with(|| {
            buckets.push(Vec::new());
            buckets.len() - 1
        });
        buckets[idx].push(item);
    }

    for bucket in buckets {
        let (send, holdouts) = cover_bucket(bucket, policy);
        plan.send.extend(send);
        plan.holdouts.extend(holdouts);
    }
    tracing::debug!(
        send = plan.send.len(),
        held = plan.holdouts.len(),
        matched = plan.matched.len(),
        "repetition plan"
    );
    plan
}

/// Greedy cover: repeatedly pick the donor serving the most remaining
/// receivers, ties going to the earlier item.
fn cover_bucket(bucket: Vec<PendingTu>, policy: &RepetitionPolicy) -> (Vec<PendingTu>, Vec<Holdout>) {
    let mut remaining: Vec<Option<PendingTu>> = bucket.into_iter().map(Some).collect();
    let mut send = Vec::new();
    let mut holdouts = Vec::new();

    let covers = |donor: &PendingTu, receiver: &PendingTu| {
        policy.effective_quality(&donor.tu, &receiver.tu) >= i64::from(receiver.min_q)
    };

    loop {
        let live: Vec<usize> = (0..remaining.len()).filter(|i| remaining[*i].is_some()).collect();
        if live.is_empty() {
            break;
        }
        let mut best: Option<(usize, Vec<usize>)> = None;
        for &d in &live {
            let Some(donor) = remaining[d].as_ref() else {
                continue;
            };
            let covered: Vec<usize> = live
                .iter()
                .copied()
                .filter(|&r| r != d)
                .filter(|&r| remaining[r].as_ref().is_some_and(|receiver| covers(donor, receiver)))
                .collect();
            if best.as_ref().is_none_or(|(_, b)| covered.len() > b.len()) {
                best = Some((d, covered));
            }
        }
        let Some((d, covered)) = best else {
            break;
        };
        let Some(donor) = remaining[d].take() else {
            break;
        };
        for r in covered {
            if let Some(receiver) = remaining[r].take() {
                let q = policy.effective_quality(&donor.tu, &receiver.tu).max(0) as u32;
                holdouts.push(Holdout {
                    item: receiver,
                    q,
                    parent_guid: donor.tu.guid.clone(),
                });
            }
        }
        send.push(donor);
    }
    (send, holdouts)
}

/// Outcome of a backfill pass.
#[derive(Debug, Clone, Default)]
pub struct Backfill {
    /// Request/response pair for everything resolved, if anything was.
    pub jobs: Option<(Job, Job)>,
    /// Holdouts whose donors have no usable translation yet.
    pub unresolved: Vec<Holdout>,
}

/// Resolve holdouts from their donors' TM entries and emit TM matches, as
/// one `repetition` job.
pub fn backfill(
    plan: &RepetitionPlan,
    tm: &TranslationMemory,
    source_lang: &str,
    target_lang: &str,
    ctx: &DispatchContext,
) -> Backfill {
    let ts = ctx.now_millis();
    let mut targets: Vec<TranslationUnit> = plan
        .matched
        .iter()
        .cloned()
        .map(|tu| TranslationUnit { ts: Some(ts), ..tu })
        .collect();
    let mut unresolved = Vec::new();

    for holdout in &plan.holdouts {
        let donor_target = tm
            .get_entry(&holdout.parent_guid)
            .filter(|entry| entry.is_resolved())
            .and_then(|entry| entry.ntgt.clone());
        match donor_target {
            Some(ntgt) if compatible(&holdout.item.tu.nsrc, &ntgt) => {
                targets.push(TranslationUnit {
                    ntgt: Some(ntgt),
                    q: Some(holdout.q),
                    ts: Some(ts),
                    ..holdout.item.tu.as_source()
                });
            }
            Some(_) => {
                tracing::warn!(
                    guid = %holdout.item.tu.guid,
                    donor = %holdout.parent_guid,
                    "donor translation incompatible with receiver"
                );
                unresolved.push(holdout.clone());
            }
            None => unresolved.push(holdout.clone()),
        }
    }

    if targets.is_empty() {
        return Backfill {
            jobs: None,
            unresolved,
        };
    }

    let mut request = Job::new(
        ctx.new_job_guid(),
        source_lang,
        target_lang,
        REPETITION_PROVIDER,
        JobStatus::Created,
    );
    request.updated_at = ctx.now();
    request.tus = targets.iter().map(TranslationUnit::as_source).collect();
    let mut response = request.response(JobStatus::Done);
    response.tus = targets;
    Backfill {
        jobs: Some((request, response)),
        unresolved,
    }
}

/// Whether the donor `parent_guid` is still in flight on a pending job.
pub fn donor_in_flight(tm: &TranslationMemory, parent_guid: &str) -> bool {
    tm.entries_for(parent_guid).any(|entry| tm.is_pending(entry))
}

/// Request/response pair recording `held` (in-flight TUs carrying `q` and
/// `parentGuid`) as a pending `repetition` job. `None` when nothing is held.
pub fn hold_job(
    held: Vec<TranslationUnit>,
    source_lang: &str,
    target_lang: &str,
    original_job_guid: Option<String>,
    ctx: &DispatchContext,
) -> Option<(Job, Job)> {
    if held.is_empty() {
        return None;
    }
    let mut request = Job::new(
        ctx.new_job_guid(),
        source_lang,
        target_lang,
        REPETITION_PROVIDER,
        JobStatus::Created,
    );
    request.updated_at = ctx.now();
    request.original_job_guid = original_job_guid;
    request.tus = held.iter().map(TranslationUnit::as_source).collect();
    let mut response = response_for(&request, JobStatus::Pending, ctx);
    let ts = ctx.now_millis();
    response.inflight = held.iter().map(|tu| tu.guid.clone()).collect();
    response.tus = held
        .into_iter()
        .map(|tu| TranslationUnit { ts: Some(ts), ..tu })
        .collect();
    Some((request, response))
}

/// Held TUs of a pending `repetition` job, sorted by what their donors offer now.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settlement {
    /// Copied from a resolved donor, at the held quality.
    pub resolved: Vec<TranslationUnit>,
    /// Donor still in flight; these stay held.
    pub waiting: Vec<TranslationUnit>,
    /// Donor gone, failed or incompatible; free to be planned again.
    pub released: Vec<TranslationUnit>,
}

impl Settlement {
    /// Nothing moved since the job was recorded.
    pub fn is_unchanged(&self) -> bool {
        self.resolved.is_empty() && self.released.is_empty()
    }
}

pub fn settle_held(response: &Job, tm: &TranslationMemory, ctx: &DispatchContext) -> Settlement {
    let ts = ctx.now_millis();
    let mut settlement = Settlement::default();
    for tu in response.tus.iter().filter(|tu| tu.inflight) {
        let Some(parent) = tu.parent_guid.as_deref() else {
            settlement.released.push(tu.as_source());
            continue;
        };
        let donor_target = tm
            .get_entry(parent)
            .filter(|entry| entry.is_resolved())
            .and_then(|entry| entry.ntgt.clone());
        match donor_target {
            Some(ntgt) if compatible(&tu.nsrc, &ntgt) => settlement.resolved.push(TranslationUnit {
                ntgt: Some(ntgt),
                q: tu.q,
                ts: Some(ts),
                ..tu.as_source()
            }),
            Some(_) => {
                tracing::warn!(guid = %tu.guid, donor = parent, "donor translation incompatible with held unit");
                settlement.released.push(tu.as_source());
            }
            None if donor_in_flight(tm, parent) => settlement.waiting.push(TranslationUnit {
                inflight: true,
                q: tu.q,
                parent_guid: tu.parent_guid.clone(),
                ..tu.as_source()
            }),
            None => settlement.released.push(tu.as_source()),
        }
    }
    tracing::debug!(
        job = %response.job_guid,
        resolved = settlement.resolved.len(),
        waiting = settlement.waiting.len(),
        released = settlement.released.len(),
        "held units settled"
    );
    settlement
}
