//! Run ledger - auditable history of pipeline invocations
//!
//! Every pipeline run creates one `RunRecord` in the `etl_runs` table. The
//! record is owned by the orchestrator that created it and mutated exactly
//! twice more: once to attach final counts, once to reach a terminal state.
//! `RunStatus` guards the lifecycle; moves out of a terminal state are
//! rejected both in memory and at the SQL level (`WHERE status = 'running'`).

use async_trait::async_trait;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Run lifecycle state
///
/// Normal path: Pending -> Running -> Completed.
/// Failure path: Pending -> Running -> Failed.
/// Completed and Failed are terminal; no automatic retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RunStatus::Pending),
            "running" => Some(RunStatus::Running),
            "completed" => Some(RunStatus::Completed),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    /// Whether a transition to `next` is legal
    pub fn can_transition(&self, next: RunStatus) -> bool {
        match (self, next) {
            (RunStatus::Pending, RunStatus::Running) => true,
            (RunStatus::Running, RunStatus::Completed) => true,
            (RunStatus::Running, RunStatus::Failed) => true,
            _ => false,
        }
    }
}

/// One pipeline invocation, tracked end-to-end
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: i64,
    /// Run label (e.g. "multi-source")
    pub source: String,
    /// Raw records collected across all adapters
    pub total_records: u64,
    /// Canonical records actually written
    pub processed_records: u64,
    pub status: RunStatus,
    pub started_at: i64,
    pub completed_at: Option<i64>,
    pub duration_seconds: Option<f64>,
    pub error_message: Option<String>,
}

#[derive(Debug)]
pub enum LedgerError {
    Database(String),
    /// Attempted to move a run out of a terminal state (or the run is gone)
    InvalidTransition { run_id: i64, to: RunStatus },
}

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        LedgerError::Database(err.to_string())
    }
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::Database(e) => write!(f, "ledger database error: {}", e),
            LedgerError::InvalidTransition { run_id, to } => {
                write!(f, "run {} cannot transition to {}", run_id, to.as_str())
            }
        }
    }
}

impl std::error::Error for LedgerError {}

/// Ledger operations consumed by the orchestrator
#[async_trait]
pub trait RunLedger: Send + Sync {
    /// Open a new run in `Running`, returning the persisted record
    async fn create_run(&self, source: &str) -> Result<RunRecord, LedgerError>;

    /// Terminal transition to `Completed` with final counts and duration
    async fn complete_run(
        &self,
        run_id: i64,
        total_records: u64,
        processed_records: u64,
    ) -> Result<(), LedgerError>;

    /// Terminal transition to `Failed` with the causing error's text
    async fn fail_run(&self, run_id: i64, error_message: &str) -> Result<(), LedgerError>;

    async fn get_run(&self, run_id: i64) -> Result<Option<RunRecord>, LedgerError>;

    /// Most recent runs, newest first
    async fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>, LedgerError>;
}

/// SQLite implementation of the run ledger
pub struct SqliteRunLedger {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRunLedger {
    /// Wrap an existing connection (shared with the canonical store)
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn row_to_run(row: &rusqlite::Row<'_>) -> Result<RunRecord, rusqlite::Error> {
        let status_str: String = row.get(4)?;
        let status = RunStatus::parse(&status_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                format!("unknown run status: {}", status_str).into(),
            )
        })?;

        Ok(RunRecord {
            id: row.get(0)?,
            source: row.get(1)?,
            total_records: row.get::<_, i64>(2)? as u64,
            processed_records: row.get::<_, i64>(3)? as u64,
            status,
            started_at: row.get(5)?,
            completed_at: row.get(6)?,
            duration_seconds: row.get(7)?,
            error_message: row.get(8)?,
        })
    }
}

const RUN_COLUMNS: &str = "id, source, total_records, processed_records, status, \
                           started_at, completed_at, duration_seconds, error_message";

#[async_trait]
impl RunLedger for SqliteRunLedger {
    async fn create_run(&self, source: &str) -> Result<RunRecord, LedgerError> {
        let started_at = chrono::Utc::now().timestamp();
        let status = RunStatus::Running;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO etl_runs (source, total_records, processed_records, status, started_at)
             VALUES (?1, 0, 0, ?2, ?3)",
            rusqlite::params![source, status.as_str(), started_at],
        )?;

        Ok(RunRecord {
            id: conn.last_insert_rowid(),
            source: source.to_string(),
            total_records: 0,
            processed_records: 0,
            status,
            started_at,
            completed_at: None,
            duration_seconds: None,
            error_message: None,
        })
    }

    async fn complete_run(
        &self,
        run_id: i64,
        total_records: u64,
        processed_records: u64,
    ) -> Result<(), LedgerError> {
        let completed_at = chrono::Utc::now().timestamp();

        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE etl_runs SET
                 status = 'completed',
                 total_records = ?1,
                 processed_records = ?2,
                 completed_at = ?3,
                 duration_seconds = CAST(?3 - started_at AS REAL)
             WHERE id = ?4 AND status = 'running'",
            rusqlite::params![total_records as i64, processed_records as i64, completed_at, run_id],
        )?;

        if updated == 0 {
            return Err(LedgerError::InvalidTransition {
                run_id,
                to: RunStatus::Completed,
            });
        }
        Ok(())
    }

    async fn fail_run(&self, run_id: i64, error_message: &str) -> Result<(), LedgerError> {
        let completed_at = chrono::Utc::now().timestamp();

        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE etl_runs SET
                 status = 'failed',
                 error_message = ?1,
                 completed_at = ?2,
                 duration_seconds = CAST(?2 - started_at AS REAL)
             WHERE id = ?3 AND status = 'running'",
            rusqlite::params![error_message, completed_at, run_id],
        )?;

        if updated == 0 {
            return Err(LedgerError::InvalidTransition {
                run_id,
                to: RunStatus::Failed,
            });
        }
        Ok(())
    }

    async fn get_run(&self, run_id: i64) -> Result<Option<RunRecord>, LedgerError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM etl_runs WHERE id = ?1",
            RUN_COLUMNS
        ))?;

        let mut rows = stmt.query_map([run_id], |row| Self::row_to_run(row))?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    async fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>, LedgerError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM etl_runs ORDER BY started_at DESC, id DESC LIMIT ?1",
            RUN_COLUMNS
        ))?;

        let rows = stmt.query_map([limit as i64], |row| Self::row_to_run(row))?;
        let mut runs = Vec::new();
        for row in rows {
            runs.push(row?);
        }
        Ok(runs)
    }
}
