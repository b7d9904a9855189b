//! Restart behaviour and the chunk flow, persisted through JSONL task files.

use locus_kernel::{NormalizedString, TranslationUnit};
use locus_ops::{
    ChunkArgs, ChunkLimits, INTERRUPTED, JsonlTaskStore, OpError, OpRegistry, OpState, Operation,
    Task, TaskStatus, TaskStore, enqueue_chunk_flow, op_fn, register_chunk_ops,
};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

fn temp_root() -> PathBuf {
    std::env::temp_dir().join(format!("locus-tasks-{}", Uuid::new_v4()))
}

fn started(op_id: u64, op_name: &str, inputs: Vec<u64>) -> Operation {
    let mut op = Operation::new(op_id, op_name, json!(op_id), inputs);
    op.last_ran_at = Some(chrono::Utc::now());
    op
}

fn counting_registry(calls: Arc<AtomicUsize>) -> Arc<OpRegistry> {
    let registry = Arc::new(OpRegistry::new());
    let idem_calls = Arc::clone(&calls);
    registry
        .register(
            "idempotent",
            op_fn(move |ctx| {
                let calls = Arc::clone(&idem_calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(ctx.args)
                }
            }),
            true,
        )
        .expect("register");
    registry
        .register(
            "side_effect",
            op_fn(move |ctx| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(ctx.args)
                }
            }),
            false,
        )
        .expect("register");
    registry
}

#[tokio::test]
async fn interrupted_idempotent_ops_rerun_and_others_park() {
    let root = temp_root();
    let store = Arc::new(JsonlTaskStore::new(&root));

    let mut done = Operation::new(0, "idempotent", json!("kept"), vec![]);
    done.state = OpState::Done;
    done.output = Some(json!("kept"));
    let mut sink = Operation::new(3, "idempotent", Value::Null, vec![1, 2]);
    sink.root = true;
    store
        .save_ops(
            "crashed",
            &[
                done,
                started(1, "idempotent", vec![0]),
                started(2, "side_effect", vec![0]),
                sink,
            ],
        )
        .await
        .expect("seed");

    let calls = Arc::new(AtomicUsize::new(0));
    let mut task = Task::hydrate("crashed", counting_registry(Arc::clone(&calls)), store.clone())
        .await
        .expect("hydrate");
    assert_eq!(task.op(1).map(|op| op.state.clone()), Some(OpState::Pending));
    assert_eq!(
        task.op(2).map(|op| op.state.clone()),
        Some(OpState::Blocked(INTERRUPTED.to_string()))
    );

    let status = task.execute(4).await.expect("execute");
    assert_eq!(status, TaskStatus::Waiting { blocked: vec![2] });
    assert_eq!(calls.load(Ordering::SeqCst), 1, "only op 1 may run");
    assert_eq!(task.op(0).and_then(|op| op.output.clone()), Some(json!("kept")));

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn errored_ops_retry_after_hydration() {
    let root = temp_root();
    let store = Arc::new(JsonlTaskStore::new(&root));
    let mut failed = Operation::new(0, "idempotent", json!(7), vec![]);
    failed.state = OpState::Error;
    failed.root = true;
    store.save_ops("t", &[failed]).await.expect("seed");

    let calls = Arc::new(AtomicUsize::new(0));
    let mut task = Task::hydrate("t", counting_registry(calls), store)
        .await
        .expect("hydrate");
    let status = task.execute(1).await.expect("execute");
    assert_eq!(status, TaskStatus::Done(json!(7)));

    let _ = std::fs::remove_dir_all(root);
}

fn tu(sid: &str, text: &str) -> TranslationUnit {
    TranslationUnit::new_source("app.json", sid, NormalizedString::plain(text))
}

fn upper_registry() -> Arc<OpRegistry> {
    let registry = Arc::new(OpRegistry::new());
    register_chunk_ops(&registry).expect("chunk ops");
    registry
        .register(
            "upper",
            op_fn(|ctx| async move {
                let args: ChunkArgs = serde_json::from_value(ctx.args)
                    .map_err(|e| OpError::InvalidArgs(e.to_string()))?;
                let out: Vec<TranslationUnit> = args
                    .tus
                    .into_iter()
                    .rev()
                    .map(|tu| TranslationUnit {
                        ntgt: Some(NormalizedString::plain(
                            tu.nsrc.parts()[0].as_text().unwrap_or_default().to_uppercase(),
                        )),
                        q: Some(50),
                        ts: Some(1),
                        ..tu
                    })
                    .collect();
                serde_json::to_value(out).map_err(|e| OpError::Failed(e.to_string()))
            }),
            true,
        )
        .expect("register");
    registry
}

#[tokio::test]
async fn chunk_flow_reassembles_in_source_order() {
    let root = temp_root();
    let store = Arc::new(JsonlTaskStore::new(&root));
    let tus: Vec<TranslationUnit> = (0..7).map(|i| tu(&format!("s{i}"), &format!("item {i}"))).collect();
    let guids: Vec<String> = tus.iter().map(|tu| tu.guid.clone()).collect();

    let mut task = Task::new("chunks", upper_registry(), store);
    enqueue_chunk_flow(
        &mut task,
        tus,
        ChunkLimits {
            max_units: 3,
            max_chars: 1_000,
        },
        "upper",
        Value::Null,
    )
    .await
    .expect("enqueue");

    let TaskStatus::Done(output) = task.execute(2).await.expect("execute") else {
        panic!("task should finish");
    };
    let merged: Vec<TranslationUnit> = serde_json::from_value(output).expect("tus");
    let merged_guids: Vec<String> = merged.iter().map(|tu| tu.guid.clone()).collect();
    assert_eq!(merged_guids, guids);
    assert_eq!(merged[0].ntgt, Some(NormalizedString::plain("ITEM 0")));
    // split + merge + three translate chunks
    assert_eq!(task.ops().count(), 5);

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn chunk_with_wrong_cardinality_is_rejected_alone() {
    let registry = Arc::new(OpRegistry::new());
    register_chunk_ops(&registry).expect("chunk ops");
    registry
        .register(
            "lossy",
            op_fn(|ctx| async move {
                let args: ChunkArgs = serde_json::from_value(ctx.args)
                    .map_err(|e| OpError::InvalidArgs(e.to_string()))?;
                if args.tus.iter().any(|tu| tu.sid == "bad") {
                    return Ok(json!([]));
                }
                serde_json::to_value(args.tus).map_err(|e| OpError::Failed(e.to_string()))
            }),
            true,
        )
        .expect("register");

    let tus = vec![tu("a", "A"), tu("bad", "B"), tu("c", "C")];
    let kept = vec![tus[0].guid.clone(), tus[2].guid.clone()];
    let mut task = Task::new("t", registry, Arc::new(locus_ops::MemoryTaskStore::new()));
    enqueue_chunk_flow(
        &mut task,
        tus,
        ChunkLimits {
            max_units: 1,
            max_chars: 1_000,
        },
        "lossy",
        Value::Null,
    )
    .await
    .expect("enqueue");

    let TaskStatus::Done(output) = task.execute(4).await.expect("execute") else {
        panic!("task should finish");
    };
    let merged: Vec<TranslationUnit> = serde_json::from_value(output).expect("tus");
    let merged_guids: Vec<String> = merged.iter().map(|tu| tu.guid.clone()).collect();
    assert_eq!(merged_guids, kept);
}
