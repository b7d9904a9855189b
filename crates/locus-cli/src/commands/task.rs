use crate::support::{print_json, runtime_or_exit};
use futures::TryStreamExt;
use locus_ops::{JsonlTaskStore, Operation, TaskStore, TaskStoreError};
use serde_json::json;
use std::process;
use tracing::debug;

pub fn run_show(task_id: String, store: String, json_output: bool) {
    let store = JsonlTaskStore::new(store);
    let ops = runtime_or_exit()
        .block_on(async {
            let stream = store.get_task(&task_id).await?;
            stream.try_collect::<Vec<Operation>>().await
        })
        .unwrap_or_else(|e: TaskStoreError| {
            eprintln!("error: failed to load task {task_id}: {e}");
            process::exit(1);
        });
    debug!(task_id = %task_id, ops = ops.len(), "task loaded");

    if json_output {
        print_json(&json!({
            "taskId": task_id,
            "path": store.path_for(&task_id).display().to_string(),
            "ops": ops,
        }));
        return;
    }

    println!("locus task {task_id}");
    for op in &ops {
        let inputs = if op.inputs.is_empty() {
            String::new()
        } else {
            let ids: Vec<String> = op.inputs.iter().map(u64::to_string).collect();
            format!(" <- [{}]", ids.join(", "))
        };
        let root = if op.root { " (root)" } else { "" };
        println!("  #{} {} [{}]{inputs}{root}", op.op_id, op.op_name, op.state);
        if let Some(message) = &op.message {
            println!("      {message}");
        }
    }
}
