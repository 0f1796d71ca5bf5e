//! End-to-end runs over in-memory sources, a scripted collector, and
//! in-memory or on-disk cursor stores.

use std::sync::Arc;
use std::time::Duration;

use ferry_config::{
    BookmarkMode, Config, FileFormat, FilesSourceConfig, SourceConfig, WarehouseSourceConfig,
};
use ferry_pipeline::{
    FileProgressStore, MemoryProgressStore, PipelineRunner, ProgressStore, RunLock,
};
use ferry_protocol::{Cursor, DedupKey, ItemStatus, RowId, RunState, Value};
use ferry_sinks::{Reply, RetryPolicy, ScriptedCollector, SendError, Sender};
use ferry_sources::{MemorySource, MemoryTable, RowSource, WarehouseSource, build_source};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn config(max_hits: usize) -> Config {
    let mut config = Config::default();
    config.pipeline.name = "test".into();
    config.batch.max_hits = max_hits;
    config.retry.max_attempts = 5;
    config.retry.base_delay = Duration::from_millis(100);
    config.retry.max_delay = Duration::from_secs(60);
    config.retry.jitter = 0.0;
    config
}

fn row(client: &str) -> Vec<(&'static str, Value)> {
    vec![
        ("client_id", Value::String(client.to_string())),
        ("event_name", Value::String("purchase".into())),
    ]
}

fn source(n: usize) -> MemorySource {
    let mut source = MemorySource::new();
    for i in 0..n {
        source.push_row(row(&format!("c{}", i)));
    }
    source
}

fn key_of(index: u64) -> DedupKey {
    DedupKey::derive(&RowId::Offset { index }, "purchase")
}

fn runner(
    config: &Config,
    source: impl RowSource + 'static,
    collector: &Arc<ScriptedCollector>,
    store: Arc<dyn ProgressStore>,
) -> PipelineRunner {
    let sender = Sender::new(collector.clone(), RetryPolicy::from(&config.retry));
    PipelineRunner::new(config, Box::new(source), sender, store)
}

#[tokio::test]
async fn test_five_rows_in_batches_of_two() {
    let collector = Arc::new(ScriptedCollector::new());
    let store = Arc::new(MemoryProgressStore::new());

    let summary = runner(&config(2), source(5), &collector, store.clone())
        .run(CancellationToken::new())
        .await;

    assert_eq!(summary.state, RunState::Drained);
    assert_eq!(summary.rows_read, 5);
    assert_eq!(summary.hits_sent, 5);
    assert_eq!(summary.hits_failed, 0);
    assert_eq!(summary.batches_sent, 3);
    assert_eq!(summary.final_cursor, Some(Cursor::Offset { rows: 5 }));
    assert_eq!(store.get("test"), Some(Cursor::Offset { rows: 5 }));

    let sizes: Vec<usize> = collector.calls().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![2, 2, 1]);
}

#[tokio::test]
async fn test_invalid_row_is_skipped() {
    let source = MemorySource::new()
        .with_row(row("c0"))
        .with_row(vec![("event_name", Value::String("purchase".into()))])
        .with_row(row("c2"));
    let collector = Arc::new(ScriptedCollector::new());

    let summary = runner(&config(10), source, &collector, Arc::new(MemoryProgressStore::new()))
        .run(CancellationToken::new())
        .await;

    assert_eq!(summary.state, RunState::Drained);
    assert_eq!(summary.hits_sent, 2);
    assert_eq!(summary.hits_skipped, 1);
    assert_eq!(summary.final_cursor, Some(Cursor::Offset { rows: 3 }));
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].row, RowId::Offset { index: 1 });
    assert_eq!(summary.failures[0].code, "missing_field");
}

#[tokio::test]
async fn test_malformed_record_is_skipped_and_never_sent() {
    let source = MemorySource::new()
        .with_row(row("c0"))
        .with_malformed("unterminated string")
        .with_row(row("c2"));
    let collector = Arc::new(ScriptedCollector::new());

    let summary = runner(&config(10), source, &collector, Arc::new(MemoryProgressStore::new()))
        .run(CancellationToken::new())
        .await;

    assert_eq!(summary.rows_read, 3);
    assert_eq!(summary.hits_sent, 2);
    assert_eq!(summary.hits_skipped, 1);
    assert_eq!(summary.failures[0].code, "malformed_record");
    assert_eq!(collector.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_throttled_then_accepted() {
    let throttled = ItemStatus::Throttled { retry_after: None };
    let collector = Arc::new(ScriptedCollector::new().then_times(3, Reply::All(throttled)));

    let summary = runner(&config(10), source(2), &collector, Arc::new(MemoryProgressStore::new()))
        .run(CancellationToken::new())
        .await;

    assert_eq!(summary.state, RunState::Drained);
    assert_eq!(summary.hits_sent, 2);
    assert_eq!(summary.retries, 3);
    assert_eq!(collector.accepted(), vec![key_of(0), key_of(1)]);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_payload_fails_without_retry() {
    let collector = Arc::new(
        ScriptedCollector::new().then(Reply::Fail(SendError::Permanent("http_400".into()))),
    );

    let summary = runner(&config(10), source(2), &collector, Arc::new(MemoryProgressStore::new()))
        .run(CancellationToken::new())
        .await;

    assert_eq!(summary.state, RunState::Drained);
    assert_eq!(summary.hits_failed, 2);
    assert_eq!(summary.retries, 0);
    assert_eq!(collector.call_count(), 1);
    // permanently failed hits are terminal, so the cursor moves past them
    assert_eq!(summary.final_cursor, Some(Cursor::Offset { rows: 2 }));
    assert!(summary.failures.iter().all(|f| f.code == "http_400"));
}

#[tokio::test(start_paused = true)]
async fn test_retries_exhausted_is_permanent() {
    let collector = Arc::new(ScriptedCollector::new().then_times(
        10,
        Reply::Fail(SendError::Transient("connection reset".into())),
    ));
    let mut cfg = config(10);
    cfg.retry.max_attempts = 3;

    let summary = runner(&cfg, source(1), &collector, Arc::new(MemoryProgressStore::new()))
        .run(CancellationToken::new())
        .await;

    assert_eq!(summary.hits_failed, 1);
    assert_eq!(summary.retries, 2);
    assert_eq!(summary.failures[0].code, "retries_exhausted");
}

#[tokio::test(start_paused = true)]
async fn test_partial_batch_resends_only_failures() {
    let collector = Arc::new(ScriptedCollector::new().then(Reply::PerItem(vec![
        ItemStatus::Accepted,
        ItemStatus::Transient("http_503".into()),
        ItemStatus::Accepted,
    ])));

    let summary = runner(&config(10), source(3), &collector, Arc::new(MemoryProgressStore::new()))
        .run(CancellationToken::new())
        .await;

    assert_eq!(summary.hits_sent, 3);
    let calls = collector.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1], vec![key_of(1)]);
    assert_eq!(collector.accepted().len(), 3);
}

#[tokio::test]
async fn test_crash_between_send_and_commit_then_resume() {
    let store = Arc::new(MemoryProgressStore::new());
    // first commit succeeds, second fails: the "crash"
    store.fail_after(1);

    let first = Arc::new(ScriptedCollector::new());
    let summary = runner(&config(2), source(5), &first, store.clone())
        .run(CancellationToken::new())
        .await;

    assert_eq!(summary.state, RunState::Aborted);
    assert!(summary.abort_reason.as_deref().unwrap().contains("commit"));
    assert_eq!(summary.final_cursor, Some(Cursor::Offset { rows: 2 }));
    assert_eq!(first.accepted(), vec![key_of(0), key_of(1), key_of(2), key_of(3)]);

    store.heal();
    let second = Arc::new(ScriptedCollector::new());
    let summary = runner(&config(2), source(5), &second, store.clone())
        .run(CancellationToken::new())
        .await;

    assert_eq!(summary.state, RunState::Drained);
    assert_eq!(summary.resumed_from, Some(Cursor::Offset { rows: 2 }));
    assert_eq!(summary.final_cursor, Some(Cursor::Offset { rows: 5 }));

    // committed rows are never resent; only the uncommitted batch repeats
    let resent = second.accepted();
    assert_eq!(resent, vec![key_of(2), key_of(3), key_of(4)]);
    assert!(!resent.contains(&key_of(0)));
    assert!(!resent.contains(&key_of(1)));
}

#[tokio::test]
async fn test_resume_from_committed_cursor() {
    let store = Arc::new(MemoryProgressStore::new());
    store.save("test", &Cursor::Offset { rows: 3 }).unwrap();
    let collector = Arc::new(ScriptedCollector::new());

    let summary = runner(&config(10), source(5), &collector, store)
        .run(CancellationToken::new())
        .await;

    assert_eq!(summary.rows_read, 2);
    assert_eq!(collector.accepted(), vec![key_of(3), key_of(4)]);
}

#[tokio::test]
async fn test_source_unavailable_aborts_after_committing_prior_batch() {
    let mut cfg = config(2);
    cfg.pipeline.read_batch_rows = 2;
    let source = source(6).fail_on_read(1);
    let collector = Arc::new(ScriptedCollector::new());

    let summary = runner(&cfg, source, &collector, Arc::new(MemoryProgressStore::new()))
        .run(CancellationToken::new())
        .await;

    assert_eq!(summary.state, RunState::Aborted);
    assert!(summary.abort_reason.is_some());
    assert_eq!(summary.hits_sent, 2);
    assert_eq!(summary.final_cursor, Some(Cursor::Offset { rows: 2 }));
}

#[tokio::test]
async fn test_schema_mismatch_aborts_before_sending() {
    let cfg = config(10);
    let expected = cfg
        .schema
        .expected_columns()
        .into_iter()
        .map(String::from)
        .collect();
    let source = MemorySource::new()
        .with_row(vec![("cid", Value::String("c0".into()))])
        .with_expected_columns(expected);
    let collector = Arc::new(ScriptedCollector::new());

    let summary = runner(&cfg, source, &collector, Arc::new(MemoryProgressStore::new()))
        .run(CancellationToken::new())
        .await;

    assert_eq!(summary.state, RunState::Aborted);
    assert_eq!(collector.call_count(), 0);
    assert!(summary.final_cursor.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_failure_threshold_aborts() {
    let mut cfg = config(1);
    cfg.pipeline.fatal_failure_threshold = 2;
    let collector = Arc::new(
        ScriptedCollector::new()
            .then_times(10, Reply::Fail(SendError::Permanent("http_403".into()))),
    );

    let summary = runner(&cfg, source(6), &collector, Arc::new(MemoryProgressStore::new()))
        .run(CancellationToken::new())
        .await;

    assert_eq!(summary.state, RunState::Aborted);
    assert!(summary.abort_reason.as_deref().unwrap().contains("consecutive"));
    assert_eq!(summary.hits_failed, 2);
    assert_eq!(summary.batches_committed, 2);
    assert_eq!(collector.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_retry_does_not_commit() {
    let collector = Arc::new(ScriptedCollector::new().then_times(
        10,
        Reply::All(ItemStatus::Throttled {
            retry_after: Some(Duration::from_secs(30)),
        }),
    ));
    let store = Arc::new(MemoryProgressStore::new());
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let summary = runner(&config(10), source(3), &collector, store.clone())
        .run(cancel)
        .await;

    assert_eq!(summary.state, RunState::Aborted);
    assert_eq!(summary.abort_reason.as_deref(), Some("run cancelled"));
    assert!(summary.final_cursor.is_none());
    assert!(store.get("test").is_none());
}

#[tokio::test]
async fn test_cancel_before_start_sends_nothing() {
    let collector = Arc::new(ScriptedCollector::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = runner(&config(10), source(3), &collector, Arc::new(MemoryProgressStore::new()))
        .run(cancel)
        .await;

    assert_eq!(summary.state, RunState::Aborted);
    assert_eq!(collector.call_count(), 0);
}

#[tokio::test]
async fn test_duplicate_keys_are_dropped() {
    let table = MemoryTable::new(&["id", "client_id", "event_name"])
        .with_row(vec![json!(7), json!("c1"), json!("purchase")])
        .with_row(vec![json!(7), json!("c1"), json!("purchase")])
        .with_row(vec![json!(8), json!("c2"), json!("purchase")]);
    let wh = WarehouseSourceConfig {
        table: "ds.conversions".into(),
        bookmark: BookmarkMode::PageToken,
        key_column: Some("id".into()),
        ..Default::default()
    };
    let collector = Arc::new(ScriptedCollector::new());

    let summary = runner(
        &config(10),
        WarehouseSource::new(table, &wh),
        &collector,
        Arc::new(MemoryProgressStore::new()),
    )
    .run(CancellationToken::new())
    .await;

    assert_eq!(summary.state, RunState::Drained);
    assert_eq!(summary.rows_read, 3);
    assert_eq!(summary.hits_sent, 2);
    assert_eq!(summary.hits_duplicate, 1);
}

#[tokio::test]
async fn test_dedup_window_forgets_old_keys() {
    let table = MemoryTable::new(&["id", "client_id", "event_name"])
        .with_row(vec![json!(7), json!("c1"), json!("purchase")])
        .with_row(vec![json!(7), json!("c1"), json!("purchase")])
        .with_row(vec![json!(8), json!("c2"), json!("purchase")])
        .with_row(vec![json!(7), json!("c1"), json!("purchase")]);
    let wh = WarehouseSourceConfig {
        table: "ds.conversions".into(),
        bookmark: BookmarkMode::PageToken,
        key_column: Some("id".into()),
        ..Default::default()
    };
    let mut cfg = config(10);
    cfg.pipeline.dedup_window = 1;
    let collector = Arc::new(ScriptedCollector::new());

    let summary = runner(
        &cfg,
        WarehouseSource::new(table, &wh),
        &collector,
        Arc::new(MemoryProgressStore::new()),
    )
    .run(CancellationToken::new())
    .await;

    // The adjacent repeat is caught; the one behind key 8 fell out of the window
    assert_eq!(summary.state, RunState::Drained);
    assert_eq!(summary.hits_duplicate, 1);
    assert_eq!(summary.hits_sent, 3);
}

#[tokio::test]
async fn test_oversized_hit_is_skipped() {
    let mut cfg = config(10);
    cfg.batch.max_bytes = 200;
    cfg.schema.include_unmapped = true;
    let source = MemorySource::new()
        .with_row(row("c0"))
        .with_row(vec![
            ("client_id", Value::String("c1".into())),
            ("event_name", Value::String("purchase".into())),
            ("note", Value::String("x".repeat(500))),
        ])
        .with_row(row("c2"));
    let collector = Arc::new(ScriptedCollector::new());

    let summary = runner(&cfg, source, &collector, Arc::new(MemoryProgressStore::new()))
        .run(CancellationToken::new())
        .await;

    assert_eq!(summary.hits_sent, 2);
    assert_eq!(summary.hits_skipped, 1);
    assert_eq!(summary.failures[0].code, "hit_too_large");
    assert_eq!(summary.final_cursor, Some(Cursor::Offset { rows: 3 }));
}

#[tokio::test]
async fn test_sequential_mode_matches_pipelined() {
    let mut cfg = config(2);
    cfg.pipeline.pipelining = false;
    let collector = Arc::new(ScriptedCollector::new());

    let summary = runner(&cfg, source(5), &collector, Arc::new(MemoryProgressStore::new()))
        .run(CancellationToken::new())
        .await;

    assert_eq!(summary.batches_sent, 3);
    assert_eq!(summary.hits_sent, 5);
    assert_eq!(
        collector.accepted(),
        (0..5).map(key_of).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_state_ends_drained() {
    let collector = Arc::new(ScriptedCollector::new());
    let runner = runner(&config(2), source(3), &collector, Arc::new(MemoryProgressStore::new()));
    let state = runner.subscribe();

    runner.run(CancellationToken::new()).await;
    assert_eq!(*state.borrow(), RunState::Drained);
}

#[tokio::test]
async fn test_jsonl_files_resume_at_line_with_file_store() {
    let data = tempfile::TempDir::new().unwrap();
    std::fs::write(
        data.path().join("a.jsonl"),
        "{\"client_id\":\"c0\",\"event_name\":\"purchase\"}\n\
         {\"client_id\":\"c1\",\"event_name\":\"purchase\"}\n",
    )
    .unwrap();
    std::fs::write(
        data.path().join("b.jsonl"),
        "{\"client_id\":\"c2\",\"event_name\":\"purchase\"}\n",
    )
    .unwrap();

    let state = tempfile::TempDir::new().unwrap();
    let store = Arc::new(FileProgressStore::new(state.path()));
    store
        .save(
            "test",
            &Cursor::File {
                object: "a.jsonl".into(),
                line: 1,
            },
        )
        .unwrap();

    let source_config = SourceConfig::Files(FilesSourceConfig {
        url: data.path().to_string_lossy().into_owned(),
        format: FileFormat::Jsonl,
        ..Default::default()
    });
    let source = build_source(&source_config, Vec::new()).unwrap();

    let _lock = RunLock::acquire(state.path(), "test").unwrap();
    let collector = Arc::new(ScriptedCollector::new());
    let sender = Sender::new(collector.clone(), RetryPolicy::immediate(3));
    let summary = PipelineRunner::new(&config(10), source, sender, store.clone())
        .run(CancellationToken::new())
        .await;

    assert_eq!(summary.state, RunState::Drained);
    assert_eq!(summary.rows_read, 2);
    assert_eq!(summary.hits_sent, 2);
    assert_eq!(
        store.load("test").unwrap(),
        Some(Cursor::File {
            object: "b.jsonl".into(),
            line: 1
        })
    );
}
