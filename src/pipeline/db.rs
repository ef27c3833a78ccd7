//! SQLite schema initialization
//!
//! The schema is embedded and idempotent (every statement uses IF NOT EXISTS),
//! so initialization runs unconditionally at startup.

use rusqlite::Connection;

/// Full schema for the three pipeline tables
///
/// - `coin_raw` - append-only intake of every raw record collected per run
/// - `coin_normalized` - canonical store, one row per asset keyed by coin_id
/// - `etl_runs` - run ledger, one row per pipeline invocation
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS coin_raw (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id        TEXT NOT NULL,
    external_id      TEXT NOT NULL,
    symbol           TEXT NOT NULL,
    name             TEXT NOT NULL,
    price_usd        REAL,
    market_cap_usd   REAL,
    volume_24h_usd   REAL,
    platform_id      TEXT,
    observed_at      INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_coin_raw_symbol ON coin_raw(symbol);

CREATE TABLE IF NOT EXISTS coin_normalized (
    coin_id          TEXT PRIMARY KEY,
    symbol           TEXT NOT NULL,
    name             TEXT NOT NULL,
    price_usd        REAL,
    market_cap_usd   REAL,
    volume_24h_usd   REAL,
    platform_id      TEXT,
    source           TEXT NOT NULL,
    updated_at       INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_coin_normalized_symbol ON coin_normalized(symbol);
CREATE INDEX IF NOT EXISTS idx_coin_normalized_updated_at ON coin_normalized(updated_at);

CREATE TABLE IF NOT EXISTS etl_runs (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    source            TEXT NOT NULL,
    total_records     INTEGER NOT NULL DEFAULT 0,
    processed_records INTEGER NOT NULL DEFAULT 0,
    status            TEXT NOT NULL,
    started_at        INTEGER NOT NULL,
    completed_at      INTEGER,
    duration_seconds  REAL,
    error_message     TEXT
);

CREATE INDEX IF NOT EXISTS idx_etl_runs_started_at ON etl_runs(started_at);
"#;

/// Initialize the database schema
///
/// Enables WAL mode and creates all tables and indexes if missing. Safe to
/// call on every startup.
pub fn init_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.execute_batch(SCHEMA_SQL)?;
    log::info!("📊 Database schema initialized (WAL mode)");
    Ok(())
}
