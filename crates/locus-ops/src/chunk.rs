//! Chunked translation flow: split → translate × N → merge.
//!
//! The split op only knows its merge op through `dependents`, enqueues one
//! translate op per chunk and wires each into the merge. The merge keeps
//! every chunk that came back with exactly as many units as it was sent,
//! rejects the others whole, and restores the original order.

use crate::error::{OpError, TaskError};
use crate::handle::OpContext;
use crate::registry::{OpCallback, OpRegistry, op_fn};
use crate::task::Task;
use locus_kernel::TranslationUnit;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

pub const SPLIT_OP: &str = "chunk.split";
pub const MERGE_OP: &str = "chunk.merge";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkLimits {
    pub max_units: usize,
    pub max_chars: usize,
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self {
            max_units: 50,
            max_chars: 8_000,
        }
    }
}

/// Greedy split bounded by unit count and total size. An item larger than
/// `max_chars` on its own still gets a chunk.
pub fn split_chunks<T>(items: Vec<T>, limits: ChunkLimits, size: impl Fn(&T) -> usize) -> Vec<Vec<T>> {
    let max_units = limits.max_units.max(1);
    let mut chunks = Vec::new();
    let mut current: Vec<T> = Vec::new();
    let mut chars = 0;
    for item in items {
        let len = size(&item);
        if !current.is_empty() && (current.len() >= max_units || chars + len > limits.max_chars) {
            chunks.push(std::mem::take(&mut current));
            chars = 0;
        }
        chars += len;
        current.push(item);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Args of a translate op produced by the split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkArgs {
    pub chunk: usize,
    pub tus: Vec<TranslationUnit>,
    /// Whatever the flow was enqueued with, passed through untouched.
    #[serde(default)]
    pub context: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SplitArgs {
    tus: Vec<TranslationUnit>,
    limits: ChunkLimits,
    translate_op: String,
    #[serde(default)]
    context: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SplitPlan {
    chunks: Vec<Vec<String>>,
}

fn parse<T: for<'de> Deserialize<'de>>(value: Value) -> Result<T, OpError> {
    serde_json::from_value(value).map_err(|e| OpError::InvalidArgs(e.to_string()))
}

async fn split(ctx: OpContext) -> Result<Value, OpError> {
    let args: SplitArgs = parse(ctx.args)?;
    let merges = ctx.handle.dependents(ctx.op_id);
    if merges.is_empty() {
        return Err(OpError::InvalidArgs("split has no merge op".to_string()));
    }
    let SplitArgs {
        tus,
        limits,
        translate_op,
        context,
    } = args;
    let chunks = split_chunks(tus, limits, |tu| tu.nsrc.char_len());
    let mut plan = SplitPlan {
        chunks: Vec::with_capacity(chunks.len()),
    };
    for (chunk, tus) in chunks.into_iter().enumerate() {
        plan.chunks.push(tus.iter().map(|tu| tu.guid.clone()).collect());
        let chunk_args = serde_json::to_value(ChunkArgs {
            chunk,
            tus,
            context: context.clone(),
        })
        .map_err(|e| OpError::Failed(e.to_string()))?;
        let translate_id = ctx.handle.enqueue(translate_op.as_str(), chunk_args, vec![]);
        for merge_id in &merges {
            ctx.handle.add_dependency(*merge_id, translate_id);
        }
    }
    tracing::debug!(op_id = ctx.op_id, chunks = plan.chunks.len(), "split planned");
    serde_json::to_value(plan).map_err(|e| OpError::Failed(e.to_string()))
}

/// Pair a chunk's output with the guids it was sent. Any cardinality or
/// identity mismatch rejects the whole chunk.
fn accept_chunk(guids: &[String], output: Value) -> Result<Vec<(String, Value)>, String> {
    let Value::Array(items) = output else {
        return Err("result is not a list".to_string());
    };
    if items.len() != guids.len() {
        return Err(format!("returned {} units for {} sent", items.len(), guids.len()));
    }
    let mut accepted = Vec::with_capacity(items.len());
    for (guid, item) in guids.iter().zip(items) {
        let item_guid = item.get("guid").and_then(Value::as_str).unwrap_or(guid).to_string();
        if !guids.contains(&item_guid) {
            return Err(format!("returned unknown guid {item_guid}"));
        }
        accepted.push((item_guid, item));
    }
    Ok(accepted)
}

async fn merge(ctx: OpContext) -> Result<Value, OpError> {
    let mut inputs = ctx.inputs.into_iter();
    let plan: SplitPlan = parse(inputs.next().unwrap_or(Value::Null))?;
    let outputs: Vec<Value> = inputs.collect();
    if outputs.len() != plan.chunks.len() {
        return Err(OpError::Failed(format!(
            "expected {} chunk results, got {}",
            plan.chunks.len(),
            outputs.len()
        )));
    }

    let mut by_guid: HashMap<String, Value> = HashMap::new();
    for (chunk, (guids, output)) in plan.chunks.iter().zip(outputs).enumerate() {
        match accept_chunk(guids, output) {
            Ok(items) => by_guid.extend(items),
            Err(reason) => {
                tracing::warn!(op_id = ctx.op_id, chunk, units = guids.len(), %reason, "chunk rejected");
            }
        }
    }

    let merged: Vec<Value> = plan
        .chunks
        .iter()
        .flatten()
        .filter_map(|guid| by_guid.remove(guid))
        .collect();
    Ok(Value::Array(merged))
}

fn split_callback() -> Arc<dyn OpCallback> {
    static CB: OnceLock<Arc<dyn OpCallback>> = OnceLock::new();
    Arc::clone(CB.get_or_init(|| op_fn(split)))
}

fn merge_callback() -> Arc<dyn OpCallback> {
    static CB: OnceLock<Arc<dyn OpCallback>> = OnceLock::new();
    Arc::clone(CB.get_or_init(|| op_fn(merge)))
}

/// Register the split and merge ops. Safe to call repeatedly.
pub fn register_chunk_ops(registry: &OpRegistry) -> Result<(), TaskError> {
    registry.register(SPLIT_OP, split_callback(), true)?;
    registry.register(MERGE_OP, merge_callback(), true)
}

/// Enqueue split and merge for `tus` and commit the merge as the task root.
/// `translate_op` must be registered and return one target TU per input TU;
/// a chunk that does not is left out of the merged output.
pub async fn enqueue_chunk_flow(
    task: &mut Task,
    tus: Vec<TranslationUnit>,
    limits: ChunkLimits,
    translate_op: &str,
    context: Value,
) -> Result<u64, TaskError> {
    let split_id = task.enqueue(
        SPLIT_OP,
        json!({
            "tus": tus,
            "limits": limits,
            "translateOp": translate_op,
            "context": context,
        }),
        vec![],
    )?;
    let merge_id = task.enqueue(MERGE_OP, Value::Null, vec![split_id])?;
    task.commit(merge_id).await?;
    Ok(merge_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_respects_count_and_size() {
        let chunks = split_chunks(vec![3, 3, 3, 3, 3], ChunkLimits { max_units: 2, max_chars: 100 }, |n| *n);
        assert_eq!(chunks, vec![vec![3, 3], vec![3, 3], vec![3]]);

        let chunks = split_chunks(vec![4, 4, 4], ChunkLimits { max_units: 10, max_chars: 8 }, |n| *n);
        assert_eq!(chunks, vec![vec![4, 4], vec![4]]);
    }

    #[test]
    fn oversized_item_gets_its_own_chunk() {
        let chunks = split_chunks(vec![1, 50, 1], ChunkLimits { max_units: 10, max_chars: 10 }, |n| *n);
        assert_eq!(chunks, vec![vec![1], vec![50], vec![1]]);
    }

    #[test]
    fn registering_twice_is_a_no_op() {
        let registry = OpRegistry::new();
        register_chunk_ops(&registry).expect("first");
        register_chunk_ops(&registry).expect("second");
    }
}
