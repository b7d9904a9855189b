use crate::support::{print_json, runtime_or_exit};
use locus_tm::{FsJobStore, JobStatus, JobStore};
use std::process;
use tracing::debug;

pub fn run_list(source: String, target: String, root: String, pending_only: bool, json_output: bool) {
    let store = FsJobStore::new(&root);
    let mut summaries = runtime_or_exit()
        .block_on(store.list_jobs(&source, &target))
        .unwrap_or_else(|e| {
            eprintln!("error: failed to list jobs under {root}: {e}");
            process::exit(1);
        });
    debug!(root = %root, jobs = summaries.len(), "job store listed");
    if pending_only {
        summaries.retain(|summary| summary.latest_response() == Some(JobStatus::Pending));
    }

    if json_output {
        print_json(&summaries);
        return;
    }
    if summaries.is_empty() {
        println!("no jobs for {source} -> {target}");
        return;
    }
    for summary in &summaries {
        let statuses: Vec<&str> = summary.statuses.iter().map(JobStatus::as_str).collect();
        println!(
            "{}  {}  [{}]  {}",
            summary.job_guid,
            summary.translation_provider,
            statuses.join(", "),
            summary.updated_at.to_rfc3339()
        );
    }
}
