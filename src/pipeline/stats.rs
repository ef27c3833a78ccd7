//! Ingestion status snapshot for health reporting

use super::engine::PipelineError;
use super::ledger::{RunLedger, RunRecord};
use super::store::CanonicalStore;
use serde::Serialize;

/// How many runs the snapshot reports
const RECENT_RUN_COUNT: usize = 5;

#[derive(Debug, Serialize)]
pub struct IngestionStats {
    pub total_coins: i64,
    /// Most recent runs, newest first
    pub recent_runs: Vec<RunRecord>,
    pub ingestion_status: String,
}

/// Snapshot the current state of the canonical store and run ledger
pub async fn ingestion_stats(
    store: &dyn CanonicalStore,
    ledger: &dyn RunLedger,
) -> Result<IngestionStats, PipelineError> {
    let total_coins = store.count().await?;
    let recent_runs = ledger.recent_runs(RECENT_RUN_COUNT).await?;

    Ok(IngestionStats {
        total_coins,
        recent_runs,
        ingestion_status: "healthy".to_string(),
    })
}
