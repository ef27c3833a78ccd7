//! # coinflow - Crypto Market Data ETL Backend
//!
//! Aggregates cryptocurrency market data from heterogeneous sources (CSV files
//! and public market-data APIs), reconciles it into one canonical record per
//! asset, and persists both the raw intake and the normalized result alongside
//! an auditable run history.
//!
//! ## Architecture
//!
//! 1. Source adapters (`ingest`) pull bounded batches of raw records
//! 2. The orchestrator (`pipeline::engine`) runs every adapter, isolating
//!    per-source failures so one dead API never loses already-collected data
//! 3. The reconciliation engine (`pipeline::reconcile`) deduplicates by symbol
//!    with a first-writer-wins policy (price presence breaks ties)
//! 4. Survivors are upserted into SQLite (`pipeline::store`) in one transaction
//! 5. Every run is tracked end-to-end in the run ledger (`pipeline::ledger`)

pub mod config;
pub mod ingest;
pub mod pipeline;
