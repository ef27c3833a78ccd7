//! End-to-end orchestrator tests with stub adapters
//!
//! Exercises the full run lifecycle against a real SQLite database: adapter
//! failure isolation, deduplication across sources, run ledger terminal
//! states, staleness GC, and fatal persistence failures.

use async_trait::async_trait;
use coinflow::ingest::{IngestError, IngestErrorKind, Ingestor};
use coinflow::pipeline::db::init_schema;
use coinflow::pipeline::{
    CanonicalRecord, CanonicalStore, CoinFilter, EtlEngine, PipelineError, RawRecord, RunLedger,
    RunStatus, SqliteRunLedger, SqliteStore, StoreError,
};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// Stub adapter returning a fixed batch, or failing outright
struct StubSource {
    name: String,
    records: Vec<RawRecord>,
    fail: bool,
}

impl StubSource {
    fn ok(name: &str, records: Vec<RawRecord>) -> Self {
        Self {
            name: name.to_string(),
            records,
            fail: false,
        }
    }

    fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            records: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl Ingestor for StubSource {
    async fn ingest(&self, limit: usize) -> Result<Vec<RawRecord>, IngestError> {
        if self.fail {
            return Err(IngestError::new(
                &self.name,
                IngestErrorKind::Api("stub source down".to_string()),
            ));
        }
        Ok(self.records.iter().take(limit).cloned().collect())
    }

    fn source_name(&self) -> String {
        self.name.clone()
    }
}

/// Store whose commit step always fails; everything else delegates to SQLite
struct BrokenCommitStore {
    inner: SqliteStore,
}

#[async_trait]
impl CanonicalStore for BrokenCommitStore {
    async fn clear(&self) -> Result<usize, StoreError> {
        self.inner.clear().await
    }

    async fn upsert_batch(&self, _records: Vec<CanonicalRecord>) -> Result<usize, StoreError> {
        Err(StoreError::Database("disk I/O error".to_string()))
    }

    async fn delete_stale(&self, cutoff: i64) -> Result<usize, StoreError> {
        self.inner.delete_stale(cutoff).await
    }

    async fn record_raw_batch(&self, records: &[RawRecord]) -> Result<(), StoreError> {
        self.inner.record_raw_batch(records).await
    }

    async fn count(&self) -> Result<i64, StoreError> {
        self.inner.count().await
    }

    async fn list(&self, filter: CoinFilter) -> Result<(Vec<CanonicalRecord>, i64), StoreError> {
        self.inner.list(filter).await
    }
}

fn make_raw(source: &str, external_id: &str, symbol: &str, price: Option<f64>) -> RawRecord {
    RawRecord {
        source_id: source.to_string(),
        external_id: external_id.to_string(),
        symbol: symbol.to_string(),
        name: format!("{} Coin", symbol),
        price_usd: price,
        market_cap_usd: None,
        volume_24h_usd: None,
        platform_id: None,
        observed_at: 1_700_000_000,
    }
}

struct TestContext {
    _temp: NamedTempFile,
    store: Arc<SqliteStore>,
    ledger: Arc<SqliteRunLedger>,
}

fn create_test_context() -> TestContext {
    let temp = NamedTempFile::new().unwrap();
    let conn = Connection::open(temp.path()).unwrap();
    init_schema(&conn).unwrap();

    let conn = Arc::new(Mutex::new(conn));
    TestContext {
        _temp: temp,
        store: Arc::new(SqliteStore::new(conn.clone())),
        ledger: Arc::new(SqliteRunLedger::new(conn)),
    }
}

fn make_engine(ctx: &TestContext, ingestors: Vec<Box<dyn Ingestor>>) -> EtlEngine {
    EtlEngine::new(ingestors, ctx.store.clone(), ctx.ledger.clone())
}

#[tokio::test]
async fn test_run_completes_and_counts_only_succeeding_sources() {
    let ctx = create_test_context();

    let engine = make_engine(
        &ctx,
        vec![
            Box::new(StubSource::ok(
                "alpha",
                vec![
                    make_raw("alpha", "alpha:btc", "BTC", Some(45_000.0)),
                    make_raw("alpha", "alpha:eth", "ETH", Some(2_400.0)),
                ],
            )),
            Box::new(StubSource::failing("beta")),
            Box::new(StubSource::ok(
                "gamma",
                vec![make_raw("gamma", "gamma:sol", "SOL", Some(95.0))],
            )),
        ],
    );

    let summary = engine.run_all_sources(100, false).await.unwrap();

    // total_records counts only the succeeding adapters' output
    assert_eq!(summary.total_records, 3);
    assert_eq!(summary.processed_records, 3);

    let run = ctx.ledger.get_run(summary.run_id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.total_records, 3);
    assert!(run.completed_at.is_some());
    assert!(run.error_message.is_none());
}

#[tokio::test]
async fn test_all_sources_failing_still_completes() {
    let ctx = create_test_context();

    let engine = make_engine(
        &ctx,
        vec![
            Box::new(StubSource::failing("alpha")),
            Box::new(StubSource::failing("beta")),
        ],
    );

    let summary = engine.run_all_sources(100, false).await.unwrap();
    assert_eq!(summary.total_records, 0);
    assert_eq!(summary.processed_records, 0);

    let run = ctx.ledger.get_run(summary.run_id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_cross_source_dedup_first_price_wins() {
    let ctx = create_test_context();

    // alpha runs first with a priceless BTC, beta's priced record takes over,
    // gamma's later price never unseats it
    let engine = make_engine(
        &ctx,
        vec![
            Box::new(StubSource::ok(
                "alpha",
                vec![make_raw("alpha", "alpha:btc", "btc", None)],
            )),
            Box::new(StubSource::ok(
                "beta",
                vec![make_raw("beta", "beta:btc", "BTC", Some(45_000.0))],
            )),
            Box::new(StubSource::ok(
                "gamma",
                vec![make_raw("gamma", "gamma:btc", "BTC", Some(50_000.0))],
            )),
        ],
    );

    let summary = engine.run_all_sources(100, false).await.unwrap();
    assert_eq!(summary.total_records, 3);
    assert_eq!(summary.processed_records, 1);

    let (records, total) = ctx
        .store
        .list(CoinFilter { limit: 10, ..Default::default() })
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(records[0].symbol, "BTC");
    assert_eq!(records[0].price_usd, Some(45_000.0));
    assert_eq!(records[0].coin_id, "beta:btc");
    assert_eq!(records[0].source, "beta");
}

#[tokio::test]
async fn test_full_reload_with_dead_sources_leaves_store_empty() {
    let ctx = create_test_context();

    // Seed the store from an earlier run
    let seed_engine = make_engine(
        &ctx,
        vec![Box::new(StubSource::ok(
            "alpha",
            vec![make_raw("alpha", "alpha:btc", "BTC", Some(45_000.0))],
        ))],
    );
    seed_engine.run_all_sources(100, false).await.unwrap();
    assert_eq!(ctx.store.count().await.unwrap(), 1);

    // Reload with every source down: clear commits, nothing replaces it
    let reload_engine = make_engine(&ctx, vec![Box::new(StubSource::failing("alpha"))]);
    let summary = reload_engine.run_full_reload(1000).await.unwrap();

    assert_eq!(summary.processed_records, 0);
    assert_eq!(ctx.store.count().await.unwrap(), 0);

    let run = ctx.ledger.get_run(summary.run_id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.processed_records, 0);
}

#[tokio::test]
async fn test_commit_failure_fails_run_and_surfaces_error() {
    let ctx = create_test_context();

    let inner_temp = NamedTempFile::new().unwrap();
    let inner_conn = Connection::open(inner_temp.path()).unwrap();
    init_schema(&inner_conn).unwrap();

    let broken = Arc::new(BrokenCommitStore {
        inner: SqliteStore::new(Arc::new(Mutex::new(inner_conn))),
    });

    let engine = EtlEngine::new(
        vec![Box::new(StubSource::ok(
            "alpha",
            vec![make_raw("alpha", "alpha:btc", "BTC", Some(45_000.0))],
        ))],
        broken,
        ctx.ledger.clone(),
    );

    let err = engine.run_all_sources(100, false).await.unwrap_err();
    assert!(matches!(err, PipelineError::Store(_)));
    assert!(err.to_string().contains("disk I/O error"));

    // The run reached a terminal Failed state with the same error text
    let runs = ctx.ledger.recent_runs(1).await.unwrap();
    assert_eq!(runs[0].status, RunStatus::Failed);
    assert!(runs[0].error_message.as_deref().unwrap().contains("disk I/O error"));
    assert!(runs[0].completed_at.is_some());
}

#[tokio::test]
async fn test_incremental_removes_only_stale_records() {
    let ctx = create_test_context();
    let now = chrono::Utc::now().timestamp();

    // One record well past the 24h window, one fresh
    ctx.store
        .upsert_batch(vec![
            CanonicalRecord {
                coin_id: "old".to_string(),
                symbol: "OLD".to_string(),
                name: "Old Coin".to_string(),
                price_usd: None,
                market_cap_usd: None,
                volume_24h_usd: None,
                platform_id: None,
                source: "test".to_string(),
                updated_at: now - 48 * 3600,
            },
            CanonicalRecord {
                coin_id: "fresh".to_string(),
                symbol: "FRESH".to_string(),
                name: "Fresh Coin".to_string(),
                price_usd: None,
                market_cap_usd: None,
                volume_24h_usd: None,
                platform_id: None,
                source: "test".to_string(),
                updated_at: now - 3600,
            },
        ])
        .await
        .unwrap();

    let engine = make_engine(
        &ctx,
        vec![Box::new(StubSource::ok(
            "alpha",
            vec![make_raw("alpha", "alpha:btc", "BTC", Some(45_000.0))],
        ))],
    );

    engine.run_incremental(100, 24).await.unwrap();

    let (records, _) = ctx
        .store
        .list(CoinFilter { limit: 10, ..Default::default() })
        .await
        .unwrap();
    let ids: Vec<&str> = records.iter().map(|r| r.coin_id.as_str()).collect();

    assert!(!ids.contains(&"old"));
    assert!(ids.contains(&"fresh"));
    assert!(ids.contains(&"alpha:btc"));
}

#[tokio::test]
async fn test_invalid_records_dropped_but_run_completes() {
    let ctx = create_test_context();

    let engine = make_engine(
        &ctx,
        vec![Box::new(StubSource::ok(
            "alpha",
            vec![
                make_raw("alpha", "alpha:btc", "BTC", Some(-5.0)),
                make_raw("alpha", "alpha:eth", "ETH", Some(2_400.0)),
            ],
        ))],
    );

    let summary = engine.run_all_sources(100, false).await.unwrap();

    assert_eq!(summary.total_records, 2);
    assert_eq!(summary.processed_records, 1);

    let run = ctx.ledger.get_run(summary.run_id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_limit_bounds_each_adapter() {
    let ctx = create_test_context();

    let records: Vec<RawRecord> = (0..10)
        .map(|i| make_raw("alpha", &format!("alpha:coin{}", i), &format!("C{}", i), Some(1.0)))
        .collect();

    let engine = make_engine(&ctx, vec![Box::new(StubSource::ok("alpha", records))]);

    let summary = engine.run_all_sources(3, false).await.unwrap();
    assert_eq!(summary.total_records, 3);
}

#[tokio::test]
async fn test_each_run_creates_a_new_ledger_row() {
    let ctx = create_test_context();

    let engine = make_engine(
        &ctx,
        vec![Box::new(StubSource::ok(
            "alpha",
            vec![make_raw("alpha", "alpha:btc", "BTC", Some(45_000.0))],
        ))],
    );

    let first = engine.run_all_sources(100, false).await.unwrap();
    let second = engine.run_all_sources(100, false).await.unwrap();

    assert_ne!(first.run_id, second.run_id);

    let runs = ctx.ledger.recent_runs(5).await.unwrap();
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|r| r.status == RunStatus::Completed));
}
