use crate::cli::DecoderArg;
use crate::support::{load_tm_or_exit, normalize_text, print_json};
use locus_kernel::{TranslationUnit, flatten_linear};
use serde_json::json;

pub fn run_stats(snapshot: String, json_output: bool) {
    let tm = load_tm_or_exit(&snapshot);
    let stats = tm.stats();

    if json_output {
        print_json(&json!({
            "sourceLang": tm.source_lang(),
            "targetLang": tm.target_lang(),
            "stats": stats,
        }));
        return;
    }
    println!("locus tm stats");
    println!("  Pair: {} -> {}", tm.source_lang(), tm.target_lang());
    println!("  Entries: {}", stats.entries);
    println!("  Distinct guids: {}", stats.distinct_guids);
    println!("  In flight: {}", stats.inflight);
    println!("  Jobs: {}", stats.jobs);
    for (provider, count) in &stats.by_provider {
        println!("    {provider}: {count}");
    }
}

pub struct LookupArgs {
    pub snapshot: String,
    pub guid: Option<String>,
    pub text: Option<String>,
    pub decoders: Vec<DecoderArg>,
    pub json: bool,
}

fn describe(tu: &TranslationUnit) -> String {
    let target = tu
        .ntgt
        .as_ref()
        .map(|ntgt| flatten_linear(ntgt).0)
        .unwrap_or_else(|| "<in flight>".to_string());
    format!(
        "{} q={} job={} provider={}  {}",
        tu.guid,
        tu.q.unwrap_or(0),
        tu.job_guid.as_deref().unwrap_or("-"),
        tu.translation_provider.as_deref().unwrap_or("-"),
        target
    )
}

pub fn run_lookup(args: LookupArgs) {
    let tm = load_tm_or_exit(&args.snapshot);

    let (mode, entries): (&str, Vec<&TranslationUnit>) = match (&args.guid, &args.text) {
        (Some(guid), _) => {
            let mut entries: Vec<&TranslationUnit> = tm.entries_for(guid).collect();
            // Best first, matching `get_entry`.
            if let Some(best) = tm.get_entry(guid) {
                entries.retain(|tu| !std::ptr::eq(*tu, best));
                entries.insert(0, best);
            }
            ("guid", entries)
        }
        (None, Some(text)) => {
            let (nsrc, _) = normalize_text(text, &args.decoders);
            ("exact", tm.exact_matches(&nsrc))
        }
        (None, None) => {
            eprintln!("error: pass --guid or --text");
            std::process::exit(1);
        }
    };

    if args.json {
        print_json(&json!({
            "mode": mode,
            "count": entries.len(),
            "entries": entries,
        }));
        return;
    }
    if entries.is_empty() {
        println!("no entries");
        return;
    }
    for tu in entries {
        println!("{}", describe(tu));
    }
}
