//! Pipeline orchestrator
//!
//! Sequences adapter execution, isolates per-adapter failure, invokes the
//! reconciliation engine, and drives the run ledger through its state machine.
//!
//! ## Failure policy
//!
//! - One adapter failing is absorbed: logged with adapter identity and cause,
//!   treated as zero records from that source, run continues
//! - One record failing validation is dropped and counted, batch continues
//! - Store or ledger failure is fatal to the run: the RunRecord transitions
//!   to Failed with the error text, then the same error propagates to the
//!   caller. The orchestrator always reaches a terminal RunRecord state
//!   before re-raising.

use super::ledger::{LedgerError, RunLedger};
use super::reconcile::reconcile;
use super::store::{CanonicalStore, StoreError};
use super::types::RawRecord;
use crate::ingest::Ingestor;
use serde::Serialize;
use std::sync::Arc;

/// Run label recorded on every multi-source RunRecord
const RUN_SOURCE_LABEL: &str = "multi-source";

#[derive(Debug)]
pub enum PipelineError {
    Store(StoreError),
    Ledger(LedgerError),
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        PipelineError::Store(err)
    }
}

impl From<LedgerError> for PipelineError {
    fn from(err: LedgerError) -> Self {
        PipelineError::Ledger(err)
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Store(e) => write!(f, "{}", e),
            PipelineError::Ledger(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for PipelineError {}

/// Outcome of one completed run, immediately usable for status polling
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: i64,
    pub total_records: u64,
    pub processed_records: u64,
}

/// Orchestrates one batch execution of the ingestion pipeline
///
/// Holds the configured adapter list in execution order plus the store and
/// ledger handles. Constructed explicitly by the process entry point; no
/// global state.
pub struct EtlEngine {
    ingestors: Vec<Box<dyn Ingestor>>,
    store: Arc<dyn CanonicalStore>,
    ledger: Arc<dyn RunLedger>,
}

impl EtlEngine {
    pub fn new(
        ingestors: Vec<Box<dyn Ingestor>>,
        store: Arc<dyn CanonicalStore>,
        ledger: Arc<dyn RunLedger>,
    ) -> Self {
        Self {
            ingestors,
            store,
            ledger,
        }
    }

    /// Run every configured source and reconcile the union of their output
    ///
    /// Opens a RunRecord in Running, optionally clears the canonical store
    /// (full reload), executes adapters in fixed order with per-adapter
    /// failure isolation, reconciles, commits, and closes the RunRecord
    /// terminal. Any error outside adapter execution fails the run and is
    /// re-raised after being recorded.
    pub async fn run_all_sources(
        &self,
        limit: usize,
        clear_existing: bool,
    ) -> Result<RunSummary, PipelineError> {
        let run = self.ledger.create_run(RUN_SOURCE_LABEL).await?;
        log::info!(
            "🚀 ETL run {} started (limit: {}, clear_existing: {})",
            run.id,
            limit,
            clear_existing
        );

        match self.execute(limit, clear_existing).await {
            Ok((total, processed)) => {
                self.ledger.complete_run(run.id, total, processed).await?;
                log::info!(
                    "✅ ETL run {} completed: {} raw records in, {} canonical records written",
                    run.id,
                    total,
                    processed
                );
                Ok(RunSummary {
                    run_id: run.id,
                    total_records: total,
                    processed_records: processed,
                })
            }
            Err(e) => {
                log::error!("❌ ETL run {} failed: {}", run.id, e);
                // Reach a terminal state before re-raising; if even that
                // write fails there is nothing left to record against
                if let Err(ledger_err) = self.ledger.fail_run(run.id, &e.to_string()).await {
                    log::error!(
                        "❌ Could not record failure for run {}: {}",
                        run.id,
                        ledger_err
                    );
                }
                Err(e)
            }
        }
    }

    /// Garbage-collect stale canonical records, then run all sources
    ///
    /// Removes rows whose `updated_at` is older than now minus the window;
    /// rows updated within the window are never touched.
    pub async fn run_incremental(
        &self,
        limit: usize,
        staleness_window_hours: i64,
    ) -> Result<RunSummary, PipelineError> {
        let cutoff = chrono::Utc::now().timestamp() - staleness_window_hours * 3600;
        let removed = self.store.delete_stale(cutoff).await?;
        log::info!(
            "🧹 Incremental run: removed {} records older than {}h",
            removed,
            staleness_window_hours
        );

        self.run_all_sources(limit, false).await
    }

    /// Purge the canonical store and rebuild it from every source
    pub async fn run_full_reload(&self, limit: usize) -> Result<RunSummary, PipelineError> {
        self.run_all_sources(limit, true).await
    }

    /// Fallible portion of a run; errors here fail the RunRecord
    async fn execute(
        &self,
        limit: usize,
        clear_existing: bool,
    ) -> Result<(u64, u64), PipelineError> {
        if clear_existing {
            // Own committed step, so a crash mid-run never leaves the store
            // cleared with uncommitted replacement data in limbo
            let removed = self.store.clear().await?;
            log::info!("🗑️  Cleared canonical store ({} records)", removed);
        }

        let raw = self.collect_raw(limit).await;
        let total = raw.len() as u64;

        // Peripheral raw intake, committed before reconciliation
        self.store.record_raw_batch(&raw).await?;

        let now = chrono::Utc::now().timestamp();
        let outcome = reconcile(raw, now);
        if outcome.dropped > 0 {
            log::warn!(
                "⚠️  Reconciliation dropped {} invalid records",
                outcome.dropped
            );
        }

        let processed = self.store.upsert_batch(outcome.canonical).await? as u64;
        Ok((total, processed))
    }

    /// Run every adapter in fixed order, isolating individual failures
    ///
    /// A failing adapter contributes zero records and never aborts the run.
    /// Output order is adapter execution order, then intra-adapter order,
    /// which the reconciliation tie-break depends on.
    async fn collect_raw(&self, limit: usize) -> Vec<RawRecord> {
        let mut all_records = Vec::new();

        for ingestor in &self.ingestors {
            let name = ingestor.source_name();
            match ingestor.ingest(limit).await {
                Ok(records) => {
                    log::info!("📥 Source {}: {} records", name, records.len());
                    all_records.extend(records);
                }
                Err(e) => {
                    log::warn!("⚠️  Source {} failed, continuing without it: {}", name, e);
                }
            }
        }

        all_records
    }
}
