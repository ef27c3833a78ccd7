//! Runtime configuration from environment variables

use std::env;

/// Configuration for the ETL runtime
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: String,

    /// Path to the CSV source file
    pub csv_source_path: String,

    /// CoinGecko API base URL
    pub coingecko_api_url: String,

    /// CoinPaprika API base URL
    pub coinpaprika_api_url: String,

    /// Per-adapter request limit for normal runs (records)
    pub ingest_batch_limit: usize,

    /// Per-adapter request limit for full reloads (records)
    pub reload_batch_limit: usize,

    /// Hard ceiling on any requested batch size (records)
    pub max_ingestion_batch: usize,

    /// Staleness window for incremental runs (hours)
    pub staleness_window_hours: i64,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `COINFLOW_DB_PATH` (default: data/coinflow.db)
    /// - `CSV_SOURCE_PATH` (default: data/coins_source.csv)
    /// - `COINGECKO_API_URL` (default: https://api.coingecko.com/api/v3)
    /// - `COINPAPRIKA_API_URL` (default: https://api.coinpaprika.com/v1)
    /// - `INGEST_BATCH_LIMIT` (default: 100)
    /// - `RELOAD_BATCH_LIMIT` (default: 1000)
    /// - `MAX_INGESTION_BATCH` (default: 1000)
    /// - `STALENESS_WINDOW_HOURS` (default: 24)
    pub fn from_env() -> Self {
        Self {
            db_path: env::var("COINFLOW_DB_PATH")
                .unwrap_or_else(|_| "data/coinflow.db".to_string()),

            csv_source_path: env::var("CSV_SOURCE_PATH")
                .unwrap_or_else(|_| "data/coins_source.csv".to_string()),

            coingecko_api_url: env::var("COINGECKO_API_URL")
                .unwrap_or_else(|_| "https://api.coingecko.com/api/v3".to_string()),

            coinpaprika_api_url: env::var("COINPAPRIKA_API_URL")
                .unwrap_or_else(|_| "https://api.coinpaprika.com/v1".to_string()),

            ingest_batch_limit: env::var("INGEST_BATCH_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100),

            reload_batch_limit: env::var("RELOAD_BATCH_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1_000),

            max_ingestion_batch: env::var("MAX_INGESTION_BATCH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1_000),

            staleness_window_hours: env::var("STALENESS_WINDOW_HOURS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(24),
        }
    }

    /// Clamp a requested batch size to the configured ceiling
    pub fn clamp_limit(&self, requested: usize) -> usize {
        requested.min(self.max_ingestion_batch)
    }
}
