//! Core record types for the ingestion pipeline
//!
//! `RawRecord` is the immutable shape every source adapter must produce.
//! `CanonicalRecord` is the reconciled, one-per-asset row stored in
//! `coin_normalized`. Conversion between the two enforces the record
//! invariants (non-empty keys, non-negative numerics).

use serde::{Deserialize, Serialize};

/// Separator in namespaced external ids (e.g. "csv:coins_source.csv")
const SOURCE_SEPARATOR: char = ':';

/// Raw market-data record as returned by a source adapter
///
/// Numeric fields are optional because not every source quotes every metric.
/// `observed_at` is unix-epoch seconds, defaulting to ingestion time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    /// Origin adapter (e.g. "csv:coins_source.csv", "coingecko")
    pub source_id: String,
    /// Source-local identifier for the asset
    pub external_id: String,
    /// Ticker symbol, case-insensitive logical key
    pub symbol: String,
    pub name: String,
    pub price_usd: Option<f64>,
    pub market_cap_usd: Option<f64>,
    pub volume_24h_usd: Option<f64>,
    pub platform_id: Option<String>,
    pub observed_at: i64,
}

/// Reconciled record, one per asset, keyed by `coin_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Lower-cased external identifier, unique across the store
    pub coin_id: String,
    /// Upper-cased ticker symbol
    pub symbol: String,
    pub name: String,
    pub price_usd: Option<f64>,
    pub market_cap_usd: Option<f64>,
    pub volume_24h_usd: Option<f64>,
    pub platform_id: Option<String>,
    /// Provenance of the winning record
    pub source: String,
    /// Last reconciliation time (unix seconds), refreshed on every upsert
    pub updated_at: i64,
}

/// A raw record that cannot be converted to canonical form
///
/// Validation failures drop the single record, never the batch.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyField(&'static str),
    NegativeValue { field: &'static str, value: f64 },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "empty required field: {}", field),
            ValidationError::NegativeValue { field, value } => {
                write!(f, "negative value for {}: {}", field, value)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

fn check_non_negative(field: &'static str, value: Option<f64>) -> Result<(), ValidationError> {
    if let Some(v) = value {
        if v < 0.0 {
            return Err(ValidationError::NegativeValue { field, value: v });
        }
    }
    Ok(())
}

/// Derive canonical provenance from a namespaced external id
///
/// Ids like "csv:coins_source.csv" carry their source as the prefix before
/// the separator. Ids without a separator map to "unknown".
pub fn derive_source(external_id: &str) -> String {
    match external_id.split_once(SOURCE_SEPARATOR) {
        Some((prefix, _)) if !prefix.is_empty() => prefix.to_string(),
        _ => "unknown".to_string(),
    }
}

impl CanonicalRecord {
    /// Convert a raw record into canonical form
    ///
    /// Enforces the record invariants:
    /// - `external_id` and `symbol` must be non-empty
    /// - numeric fields, if present, must be non-negative
    ///
    /// Normalization:
    /// - `coin_id` = lower-cased external id
    /// - `symbol` = upper-cased symbol
    /// - `source` = external id prefix before ':' (else "unknown")
    /// - `updated_at` = `now` (reconciliation time)
    pub fn from_raw(raw: &RawRecord, now: i64) -> Result<Self, ValidationError> {
        if raw.external_id.trim().is_empty() {
            return Err(ValidationError::EmptyField("external_id"));
        }
        if raw.symbol.trim().is_empty() {
            return Err(ValidationError::EmptyField("symbol"));
        }

        check_non_negative("price_usd", raw.price_usd)?;
        check_non_negative("market_cap_usd", raw.market_cap_usd)?;
        check_non_negative("volume_24h_usd", raw.volume_24h_usd)?;

        Ok(Self {
            coin_id: raw.external_id.to_lowercase(),
            symbol: raw.symbol.to_uppercase(),
            name: raw.name.clone(),
            price_usd: raw.price_usd,
            market_cap_usd: raw.market_cap_usd,
            volume_24h_usd: raw.volume_24h_usd,
            platform_id: raw.platform_id.clone(),
            source: derive_source(&raw.external_id),
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_raw(external_id: &str, symbol: &str, price: Option<f64>) -> RawRecord {
        RawRecord {
            source_id: "test".to_string(),
            external_id: external_id.to_string(),
            symbol: symbol.to_string(),
            name: "Test Coin".to_string(),
            price_usd: price,
            market_cap_usd: None,
            volume_24h_usd: None,
            platform_id: None,
            observed_at: 1_700_000_000,
        }
    }

    #[test]
    fn test_case_normalization() {
        // Symbol is upper-cased, coin_id is the lower-cased external id
        let raw = make_raw("BTC", "btc", Some(45_000.0));
        let canonical = CanonicalRecord::from_raw(&raw, 1_700_000_100).unwrap();

        assert_eq!(canonical.coin_id, "btc");
        assert_eq!(canonical.symbol, "BTC");
        assert_eq!(canonical.price_usd, Some(45_000.0));
        assert_eq!(canonical.updated_at, 1_700_000_100);
    }

    #[test]
    fn test_source_derived_from_id_prefix() {
        let raw = make_raw("csv:btc", "btc", None);
        let canonical = CanonicalRecord::from_raw(&raw, 0).unwrap();
        assert_eq!(canonical.source, "csv");

        let bare = make_raw("bitcoin", "btc", None);
        let canonical = CanonicalRecord::from_raw(&bare, 0).unwrap();
        assert_eq!(canonical.source, "unknown");
    }

    #[test]
    fn test_empty_symbol_rejected() {
        let raw = make_raw("btc", "  ", None);
        let err = CanonicalRecord::from_raw(&raw, 0).unwrap_err();
        assert_eq!(err, ValidationError::EmptyField("symbol"));
    }

    #[test]
    fn test_empty_external_id_rejected() {
        let raw = make_raw("", "BTC", None);
        let err = CanonicalRecord::from_raw(&raw, 0).unwrap_err();
        assert_eq!(err, ValidationError::EmptyField("external_id"));
    }

    #[test]
    fn test_negative_price_rejected() {
        let raw = make_raw("btc", "BTC", Some(-1.0));
        let err = CanonicalRecord::from_raw(&raw, 0).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::NegativeValue { field: "price_usd", .. }
        ));
    }

    #[test]
    fn test_optional_fields_pass_through() {
        let mut raw = make_raw("eth", "eth", None);
        raw.market_cap_usd = Some(1.0e9);
        raw.platform_id = Some("ethereum".to_string());

        let canonical = CanonicalRecord::from_raw(&raw, 0).unwrap();
        assert!(canonical.price_usd.is_none());
        assert_eq!(canonical.market_cap_usd, Some(1.0e9));
        assert_eq!(canonical.platform_id.as_deref(), Some("ethereum"));
    }
}
