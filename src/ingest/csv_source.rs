//! CSV file source adapter
//!
//! Reads a flat file with the columns
//! `id,symbol,name,price_usd,market_cap_usd,volume_24h_usd,platform_id`
//! and emits at most `limit` raw records. A missing file is an ingestion
//! error, not a panic; an empty file is simply an empty batch.

use super::{IngestError, IngestErrorKind, Ingestor};
use crate::pipeline::types::RawRecord;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct CsvRow {
    id: Option<String>,
    symbol: Option<String>,
    name: Option<String>,
    price_usd: Option<f64>,
    market_cap_usd: Option<f64>,
    volume_24h_usd: Option<f64>,
    platform_id: Option<String>,
}

pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[async_trait]
impl Ingestor for CsvSource {
    async fn ingest(&self, limit: usize) -> Result<Vec<RawRecord>, IngestError> {
        let source = self.source_name();

        if !self.path.exists() {
            return Err(IngestError::new(
                source,
                IngestErrorKind::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("CSV file not found: {}", self.path.display()),
                )),
            ));
        }

        let mut reader = csv::Reader::from_path(&self.path)
            .map_err(|e| IngestError::new(&source, IngestErrorKind::Csv(e)))?;

        let now = chrono::Utc::now().timestamp();
        let mut records = Vec::new();

        for result in reader.deserialize::<CsvRow>().take(limit) {
            let row = result.map_err(|e| IngestError::new(&source, IngestErrorKind::Csv(e)))?;

            // Fall back to the symbol when the id column is missing
            let native_id = row
                .id
                .or_else(|| row.symbol.clone())
                .unwrap_or_else(|| "unknown".to_string());

            records.push(RawRecord {
                source_id: source.clone(),
                external_id: format!("csv:{}", native_id),
                symbol: row.symbol.unwrap_or_else(|| "unknown".to_string()),
                name: row.name.unwrap_or_else(|| "Unknown".to_string()),
                price_usd: row.price_usd,
                market_cap_usd: row.market_cap_usd,
                volume_24h_usd: row.volume_24h_usd,
                platform_id: row.platform_id,
                observed_at: now,
            });
        }

        Ok(records)
    }

    fn source_name(&self) -> String {
        format!("csv:{}", self.file_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_ingest_parses_rows() {
        let file = write_csv(
            "id,symbol,name,price_usd,market_cap_usd,volume_24h_usd,platform_id\n\
             btc,BTC,Bitcoin,45000.0,880000000000,21000000000,\n\
             eth,ETH,Ethereum,2400.0,,,ethereum\n",
        );

        let source = CsvSource::new(file.path());
        let records = source.ingest(100).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].external_id, "csv:btc");
        assert_eq!(records[0].symbol, "BTC");
        assert_eq!(records[0].price_usd, Some(45_000.0));
        assert_eq!(records[1].platform_id.as_deref(), Some("ethereum"));
        assert!(records[1].market_cap_usd.is_none());
    }

    #[tokio::test]
    async fn test_limit_truncates_rows() {
        let file = write_csv(
            "id,symbol,name,price_usd,market_cap_usd,volume_24h_usd,platform_id\n\
             btc,BTC,Bitcoin,45000.0,,,\n\
             eth,ETH,Ethereum,2400.0,,,\n\
             sol,SOL,Solana,95.0,,,\n",
        );

        let source = CsvSource::new(file.path());
        let records = source.ingest(2).await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_file_is_ingest_error() {
        let source = CsvSource::new("/nonexistent/coins.csv");
        let err = source.ingest(10).await.unwrap_err();

        assert!(matches!(err.kind, IngestErrorKind::Io(_)));
        assert!(err.source.starts_with("csv:"));
    }

    #[tokio::test]
    async fn test_empty_file_is_empty_batch_not_error() {
        let file = write_csv("id,symbol,name,price_usd,market_cap_usd,volume_24h_usd,platform_id\n");

        let source = CsvSource::new(file.path());
        let records = source.ingest(10).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_missing_id_falls_back_to_symbol() {
        let file = write_csv(
            "id,symbol,name,price_usd,market_cap_usd,volume_24h_usd,platform_id\n\
             ,doge,Dogecoin,0.08,,,\n",
        );

        let source = CsvSource::new(file.path());
        let records = source.ingest(10).await.unwrap();
        assert_eq!(records[0].external_id, "csv:doge");
    }
}
