//! Source adapters - one per data source
//!
//! Each adapter is stateless aside from its own configuration and pulls a
//! bounded batch of raw records, tagging each with its source identity.
//! "No data" is an empty vec, never an error; `IngestError` always carries
//! the source name so the orchestrator can log which adapter died.

pub mod coingecko;
pub mod coinpaprika;
pub mod csv_source;

pub use coingecko::CoinGeckoSource;
pub use coinpaprika::CoinPaprikaSource;
pub use csv_source::CsvSource;

use crate::pipeline::types::RawRecord;
use async_trait::async_trait;

#[derive(Debug)]
pub enum IngestErrorKind {
    Io(std::io::Error),
    Http(reqwest::Error),
    Csv(csv::Error),
    /// Non-success HTTP status or unexpected payload
    Api(String),
}

/// A single source failed to produce its batch
#[derive(Debug)]
pub struct IngestError {
    pub source: String,
    pub kind: IngestErrorKind,
}

impl IngestError {
    pub fn new(source: impl Into<String>, kind: IngestErrorKind) -> Self {
        Self {
            source: source.into(),
            kind,
        }
    }
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            IngestErrorKind::Io(e) => write!(f, "ingestion failed for {}: {}", self.source, e),
            IngestErrorKind::Http(e) => {
                write!(f, "ingestion failed for {}: http error: {}", self.source, e)
            }
            IngestErrorKind::Csv(e) => {
                write!(f, "ingestion failed for {}: csv error: {}", self.source, e)
            }
            IngestErrorKind::Api(msg) => {
                write!(f, "ingestion failed for {}: {}", self.source, msg)
            }
        }
    }
}

impl std::error::Error for IngestError {}

/// Contract every source adapter implements
///
/// `limit` bounds the number of records requested, not guaranteed returned.
/// Side effects (network calls, file reads) are confined to `ingest`.
#[async_trait]
pub trait Ingestor: Send + Sync {
    async fn ingest(&self, limit: usize) -> Result<Vec<RawRecord>, IngestError>;

    /// Source identity used for tagging and logging
    fn source_name(&self) -> String;
}
