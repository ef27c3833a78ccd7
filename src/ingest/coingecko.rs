//! CoinGecko API source adapter
//!
//! Endpoint: `{base}/coins/markets?vs_currency=usd&per_page={limit}&page=1`
//! Returns an array of market rows for the top assets by market cap.

use super::{IngestError, IngestErrorKind, Ingestor};
use crate::pipeline::types::RawRecord;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One row of the /coins/markets response
#[derive(Debug, Deserialize)]
struct MarketRow {
    id: String,
    symbol: String,
    name: String,
    current_price: Option<f64>,
    market_cap: Option<f64>,
    total_volume: Option<f64>,
}

pub struct CoinGeckoSource {
    base_url: String,
}

impl CoinGeckoSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Ingestor for CoinGeckoSource {
    async fn ingest(&self, limit: usize) -> Result<Vec<RawRecord>, IngestError> {
        let source = self.source_name();
        let url = format!("{}/coins/markets", self.base_url.trim_end_matches('/'));

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| IngestError::new(&source, IngestErrorKind::Http(e)))?;

        let response = client
            .get(&url)
            .query(&[
                ("vs_currency", "usd".to_string()),
                ("per_page", limit.to_string()),
                ("page", "1".to_string()),
            ])
            .send()
            .await
            .map_err(|e| IngestError::new(&source, IngestErrorKind::Http(e)))?;

        if !response.status().is_success() {
            return Err(IngestError::new(
                &source,
                IngestErrorKind::Api(format!("CoinGecko API error: {}", response.status())),
            ));
        }

        let rows: Vec<MarketRow> = response
            .json()
            .await
            .map_err(|e| IngestError::new(&source, IngestErrorKind::Http(e)))?;

        let now = chrono::Utc::now().timestamp();
        let records = rows
            .into_iter()
            .take(limit)
            .map(|row| RawRecord {
                source_id: source.clone(),
                external_id: format!("coingecko:{}", row.id),
                symbol: row.symbol,
                name: row.name,
                price_usd: row.current_price,
                market_cap_usd: row.market_cap,
                volume_24h_usd: row.total_volume,
                platform_id: None,
                observed_at: now,
            })
            .collect();

        Ok(records)
    }

    fn source_name(&self) -> String {
        "coingecko".to_string()
    }
}
