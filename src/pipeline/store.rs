//! Canonical store - persisted one-row-per-asset state
//!
//! `CanonicalStore` abstracts the persistence operations the orchestrator
//! needs; `SqliteStore` is the production implementation over rusqlite.
//! Batch writes run inside a single transaction so a reconciliation pass is
//! all-or-nothing: either every surviving canonical record commits, or none do.

use super::types::{CanonicalRecord, RawRecord};
use async_trait::async_trait;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
pub enum StoreError {
    Database(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "store database error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

/// Filter and pagination for canonical record queries
#[derive(Debug, Clone, Default)]
pub struct CoinFilter {
    pub source: Option<String>,
    /// Matched case-insensitively (upper-cased before comparison)
    pub symbol: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

/// Persistence operations consumed by the orchestrator
#[async_trait]
pub trait CanonicalStore: Send + Sync {
    /// Delete every canonical record, returning the number removed
    async fn clear(&self) -> Result<usize, StoreError>;

    /// Upsert a batch of canonical records in one transaction
    ///
    /// An existing row with the same `coin_id` is fully replaced and its
    /// `updated_at` refreshed. Returns the number of records written.
    async fn upsert_batch(&self, records: Vec<CanonicalRecord>) -> Result<usize, StoreError>;

    /// Delete canonical records with `updated_at` older than `cutoff`
    async fn delete_stale(&self, cutoff: i64) -> Result<usize, StoreError>;

    /// Append raw records to the intake table in one transaction
    async fn record_raw_batch(&self, records: &[RawRecord]) -> Result<(), StoreError>;

    /// Count canonical records
    async fn count(&self) -> Result<i64, StoreError>;

    /// List canonical records ordered by `updated_at` descending
    ///
    /// Returns the page plus the total count matching the filter.
    async fn list(&self, filter: CoinFilter) -> Result<(Vec<CanonicalRecord>, i64), StoreError>;
}

const UPSERT_SQL: &str = r#"
INSERT INTO coin_normalized (
    coin_id, symbol, name, price_usd, market_cap_usd, volume_24h_usd,
    platform_id, source, updated_at
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
ON CONFLICT(coin_id) DO UPDATE SET
    symbol = excluded.symbol,
    name = excluded.name,
    price_usd = excluded.price_usd,
    market_cap_usd = excluded.market_cap_usd,
    volume_24h_usd = excluded.volume_24h_usd,
    platform_id = excluded.platform_id,
    source = excluded.source,
    updated_at = excluded.updated_at
"#;

/// SQLite implementation of the canonical store
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Wrap an existing connection (shared with the run ledger)
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> Result<CanonicalRecord, rusqlite::Error> {
        Ok(CanonicalRecord {
            coin_id: row.get(0)?,
            symbol: row.get(1)?,
            name: row.get(2)?,
            price_usd: row.get(3)?,
            market_cap_usd: row.get(4)?,
            volume_24h_usd: row.get(5)?,
            platform_id: row.get(6)?,
            source: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

#[async_trait]
impl CanonicalStore for SqliteStore {
    async fn clear(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute("DELETE FROM coin_normalized", [])?;
        Ok(removed)
    }

    async fn upsert_batch(&self, records: Vec<CanonicalRecord>) -> Result<usize, StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        for record in &records {
            tx.execute(
                UPSERT_SQL,
                rusqlite::params![
                    record.coin_id,
                    record.symbol,
                    record.name,
                    record.price_usd,
                    record.market_cap_usd,
                    record.volume_24h_usd,
                    record.platform_id,
                    record.source,
                    record.updated_at,
                ],
            )?;
        }

        tx.commit()?;
        Ok(records.len())
    }

    async fn delete_stale(&self, cutoff: i64) -> Result<usize, StoreError> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute(
            "DELETE FROM coin_normalized WHERE updated_at < ?1",
            [cutoff],
        )?;
        Ok(removed)
    }

    async fn record_raw_batch(&self, records: &[RawRecord]) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        for record in records {
            tx.execute(
                r#"
                INSERT INTO coin_raw (
                    source_id, external_id, symbol, name,
                    price_usd, market_cap_usd, volume_24h_usd,
                    platform_id, observed_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                rusqlite::params![
                    record.source_id,
                    record.external_id,
                    record.symbol,
                    record.name,
                    record.price_usd,
                    record.market_cap_usd,
                    record.volume_24h_usd,
                    record.platform_id,
                    record.observed_at,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row("SELECT COUNT(*) FROM coin_normalized", [], |row| row.get(0))?;
        Ok(count)
    }

    async fn list(&self, filter: CoinFilter) -> Result<(Vec<CanonicalRecord>, i64), StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(source) = &filter.source {
            clauses.push("source = ?");
            params.push(source.clone());
        }
        if let Some(symbol) = &filter.symbol {
            clauses.push("symbol = ?");
            params.push(symbol.to_uppercase());
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM coin_normalized{}", where_sql),
            rusqlite::params_from_iter(params.iter()),
            |row| row.get(0),
        )?;

        let query = format!(
            "SELECT coin_id, symbol, name, price_usd, market_cap_usd, volume_24h_usd, \
             platform_id, source, updated_at \
             FROM coin_normalized{} ORDER BY updated_at DESC LIMIT {} OFFSET {}",
            where_sql, filter.limit, filter.offset
        );

        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), |row| {
            Self::row_to_record(row)
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }

        Ok((records, total))
    }
}
