//! # Ingestion-and-normalization pipeline
//!
//! The core of coinflow: runs multiple independent source adapters, merges
//! their output under a deduplication policy, and records success, failure,
//! and timing for each execution as a first-class queryable entity.
//!
//! ## Control flow
//!
//! Orchestrator -> run ledger (open) -> each source adapter (isolated) ->
//! aggregate raw records -> reconciliation -> canonical store -> run ledger
//! (close, completed or failed).
//!
//! ## Module organization
//!
//! - `types` - RawRecord, CanonicalRecord, validation
//! - `reconcile` - deduplication and conflict resolution
//! - `db` - SQLite schema initialization
//! - `store` - canonical store (upsert, clear, staleness GC, queries)
//! - `ledger` - run history with guarded lifecycle transitions
//! - `engine` - the orchestrator and its three run modes
//! - `stats` - ingestion status snapshot

pub mod db;
pub mod engine;
pub mod ledger;
pub mod reconcile;
pub mod stats;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use engine::{EtlEngine, PipelineError, RunSummary};
pub use ledger::{LedgerError, RunLedger, RunRecord, RunStatus, SqliteRunLedger};
pub use reconcile::{reconcile, ReconcileOutcome};
pub use store::{CanonicalStore, CoinFilter, SqliteStore, StoreError};
pub use types::{CanonicalRecord, RawRecord, ValidationError};
