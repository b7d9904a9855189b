use async_trait::async_trait;
use locus_dispatch::{
    ChunkRequest, ChunkTranslator, ChunkedProvider, DispatchContext, Dispatcher, JobOutcome, JobRequest,
    LocusConfig, PendingTu, ProviderError, TranslationProvider,
};
use locus_kernel::{NormalizedString, TranslationUnit};
use locus_ops::MemoryTaskStore;
use locus_tm::{JobStatus, MemoryJobStore};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

const LOCUS_TOML: &str = r#"
[repetition]
expected-quality = 40

[chunking]
max-units = 1

[retry]
base-ms = 0
max-attempts = 2

[scheduler]
parallelism = 3

[tm]
warm-up-concurrency = 2
"#;

/// Times out on its first call, then echoes. Records every chunk size.
#[derive(Default)]
struct FlakyEcho {
    sizes: Mutex<Vec<usize>>,
}

#[async_trait]
impl ChunkTranslator for FlakyEcho {
    async fn translate_chunk(&self, request: &ChunkRequest) -> Result<Vec<String>, ProviderError> {
        let first = {
            let mut sizes = self.sizes.lock().unwrap_or_else(PoisonError::into_inner);
            sizes.push(request.segments.len());
            sizes.len() == 1
        };
        if first {
            return Err(ProviderError::Timeout("slow upstream".into()));
        }
        Ok(request.segments.iter().map(|seg| seg.xml.clone()).collect())
    }
}

fn pending(rid: &str, sid: &str, text: &str, min_q: u32) -> PendingTu {
    PendingTu::new(
        TranslationUnit::new_source(rid, sid, NormalizedString::plain(text)),
        min_q,
    )
}

#[test]
fn config_values_reach_every_component() {
    let config = LocusConfig::from_toml_str(LOCUS_TOML, "locus.toml").expect("parse");

    let provider = ChunkedProvider::from_config(
        "mt",
        Arc::new(FlakyEcho::default()),
        70,
        Arc::new(MemoryTaskStore::new()),
        &config,
    )
    .expect("provider");
    assert_eq!(provider.limits().max_units, 1);
    assert_eq!(provider.retry().max_attempts, 2);
    assert_eq!(provider.retry().base, Duration::ZERO);
    assert_eq!(provider.parallelism(), 3);

    let tm = Arc::new(config.tm.manager(Arc::new(MemoryJobStore::new())));
    assert_eq!(tm.concurrency(), 2);

    let dispatcher = Dispatcher::new(Vec::new(), tm, Arc::new(DispatchContext::regression("/tmp/locus")))
        .with_config(&config);
    assert_eq!(dispatcher.repetition_policy().expected_quality, 40);
}

#[tokio::test]
async fn configured_dispatch_chunks_retries_and_skips_weak_leverage() {
    let config = LocusConfig::from_toml_str(LOCUS_TOML, "locus.toml").expect("parse");
    let translator = Arc::new(FlakyEcho::default());
    let provider: Arc<dyn TranslationProvider> = Arc::new(
        ChunkedProvider::from_config(
            "mt",
            translator.clone(),
            70,
            Arc::new(MemoryTaskStore::new()),
            &config,
        )
        .expect("provider"),
    );
    let tm = Arc::new(config.tm.manager(Arc::new(MemoryJobStore::new())));
    let dispatcher = Dispatcher::new(vec![provider], tm, Arc::new(DispatchContext::regression("/tmp/locus")))
        .with_config(&config);

    // A donor would only offer 40, below minQ 50, so both "Save" units go out.
    let items = vec![
        pending("a.json", "save", "Save", 50),
        pending("b.json", "save", "Save", 50),
        pending("a.json", "quit", "Quit", 0),
    ];
    let report = dispatcher
        .translate(JobRequest::new("en", "fr", items))
        .await
        .expect("translate");
    assert_eq!(report.leveraged, 0);
    assert!(report.held.is_empty());
    assert!(matches!(
        &report.jobs[..],
        [JobOutcome::Recorded { status: JobStatus::Done, written: 3, .. }]
    ));

    let sizes = translator.sizes.lock().unwrap_or_else(PoisonError::into_inner).clone();
    // Three one-unit chunks plus the retried timeout.
    assert_eq!(sizes, vec![1, 1, 1, 1]);
}
