//! Normalization and reconciliation engine
//!
//! Consumes the union of raw records from all adapters that succeeded in the
//! current run and merges them into one canonical record per asset.
//!
//! ## Deduplication policy
//!
//! Records are grouped by upper-cased symbol (deliberately symbol, not
//! external id, because sources use different identifier schemes for the same
//! asset). Within a group the policy is first-writer-wins with one override:
//! a later record replaces the provisional winner only when the winner carries
//! no price and the candidate does. Price-bearing duplicates never unseat each
//! other; the first stays authoritative.
//!
//! A record that fails canonical conversion is dropped and counted; it never
//! aborts the batch.

use super::types::{CanonicalRecord, RawRecord};
use std::collections::HashMap;

/// Result of one reconciliation pass
#[derive(Debug)]
pub struct ReconcileOutcome {
    /// Canonical records to upsert, in first-seen symbol order
    pub canonical: Vec<CanonicalRecord>,
    /// Raw records dropped during conversion
    pub dropped: usize,
}

/// Merge raw records from all sources into canonical records
///
/// Input order matters: it must be adapter execution order, then intra-adapter
/// order, because the tie-break depends on arrival order. Deterministic and
/// idempotent for a fixed input order.
pub fn reconcile(raw: Vec<RawRecord>, now: i64) -> ReconcileOutcome {
    let mut winners: Vec<RawRecord> = Vec::new();
    let mut by_symbol: HashMap<String, usize> = HashMap::new();

    for record in raw {
        let key = record.symbol.to_uppercase();
        match by_symbol.get(&key) {
            None => {
                by_symbol.insert(key, winners.len());
                winners.push(record);
            }
            Some(&idx) => {
                // Single override rule: presence of price data breaks the tie
                if winners[idx].price_usd.is_none() && record.price_usd.is_some() {
                    winners[idx] = record;
                }
            }
        }
    }

    let mut canonical = Vec::with_capacity(winners.len());
    let mut dropped = 0usize;

    for winner in &winners {
        match CanonicalRecord::from_raw(winner, now) {
            Ok(record) => canonical.push(record),
            Err(e) => {
                dropped += 1;
                log::warn!(
                    "⚠️  Dropping record {} from {}: {}",
                    winner.external_id,
                    winner.source_id,
                    e
                );
            }
        }
    }

    ReconcileOutcome { canonical, dropped }
}
