//! ETL Runtime - batch ingestion entry point
//!
//! Runs the full multi-source pipeline once and exits. The run mode selects
//! how the canonical store is treated before ingestion.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin etl_runtime -- --mode full
//! cargo run --release --bin etl_runtime -- --mode incremental
//! cargo run --release --bin etl_runtime -- --mode reload
//! ```
//!
//! ## Environment variables
//!
//! - COINFLOW_DB_PATH - SQLite database path (default: data/coinflow.db)
//! - CSV_SOURCE_PATH - CSV source file (default: data/coins_source.csv)
//! - COINGECKO_API_URL - CoinGecko base URL
//! - COINPAPRIKA_API_URL - CoinPaprika base URL
//! - INGEST_BATCH_LIMIT - Per-adapter limit for full/incremental runs (default: 100)
//! - RELOAD_BATCH_LIMIT - Per-adapter limit for reload runs (default: 1000)
//! - MAX_INGESTION_BATCH - Hard ceiling on any limit (default: 1000)
//! - STALENESS_WINDOW_HOURS - GC window for incremental runs (default: 24)
//! - RUST_LOG - Logging level (optional, default: info)

use coinflow::config::Config;
use coinflow::ingest::{CoinGeckoSource, CoinPaprikaSource, CsvSource, Ingestor};
use coinflow::pipeline::db::init_schema;
use coinflow::pipeline::stats::ingestion_stats;
use coinflow::pipeline::{CanonicalStore, EtlEngine, RunLedger, SqliteRunLedger, SqliteStore};
use dotenv::dotenv;
use log::info;
use rusqlite::Connection;
use std::env;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq)]
enum RunMode {
    Full,
    Incremental,
    Reload,
}

fn parse_mode_from_args() -> RunMode {
    let args: Vec<String> = env::args().collect();
    if let Some(idx) = args.iter().position(|a| a == "--mode") {
        match args.get(idx + 1).map(|s| s.as_str()) {
            Some("incremental") => return RunMode::Incremental,
            Some("reload") => return RunMode::Reload,
            Some("full") | None => return RunMode::Full,
            Some(other) => {
                log::warn!("Unknown mode '{}', falling back to full", other);
                return RunMode::Full;
            }
        }
    }
    RunMode::Full
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env();
    let mode = parse_mode_from_args();

    info!("🚀 coinflow ETL runtime");
    info!("   ├─ Mode: {:?}", mode);
    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ CSV source: {}", config.csv_source_path);
    info!("   ├─ Batch limit: {}", config.ingest_batch_limit);
    info!("   └─ Staleness window: {}h", config.staleness_window_hours);

    if let Some(parent) = std::path::Path::new(&config.db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open(&config.db_path)?;
    init_schema(&conn)?;

    // One shared connection: store and ledger writes interleave within a run
    let conn = Arc::new(Mutex::new(conn));
    let store: Arc<dyn CanonicalStore> = Arc::new(SqliteStore::new(conn.clone()));
    let ledger: Arc<dyn RunLedger> = Arc::new(SqliteRunLedger::new(conn));

    // Fixed adapter order; the reconciliation tie-break depends on it
    let ingestors: Vec<Box<dyn Ingestor>> = vec![
        Box::new(CsvSource::new(&config.csv_source_path)),
        Box::new(CoinGeckoSource::new(&config.coingecko_api_url)),
        Box::new(CoinPaprikaSource::new(&config.coinpaprika_api_url)),
    ];

    let engine = EtlEngine::new(ingestors, store.clone(), ledger.clone());

    let summary = match mode {
        RunMode::Full => {
            engine
                .run_all_sources(config.clamp_limit(config.ingest_batch_limit), false)
                .await?
        }
        RunMode::Incremental => {
            engine
                .run_incremental(
                    config.clamp_limit(config.ingest_batch_limit),
                    config.staleness_window_hours,
                )
                .await?
        }
        RunMode::Reload => {
            engine
                .run_full_reload(config.clamp_limit(config.reload_batch_limit))
                .await?
        }
    };

    info!(
        "📦 Run {} finished: {} raw records, {} canonical records",
        summary.run_id, summary.total_records, summary.processed_records
    );

    let stats = ingestion_stats(store.as_ref(), ledger.as_ref()).await?;
    info!(
        "📊 Store status: {} coins, {} recent runs, status: {}",
        stats.total_coins,
        stats.recent_runs.len(),
        stats.ingestion_status
    );

    Ok(())
}
