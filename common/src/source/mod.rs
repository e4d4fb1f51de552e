// External availability source: query client and payload extraction

pub mod extractor;
pub mod railway;

pub use extractor::RailwayExtractor;
pub use railway::RailwayClient;

use crate::errors::FetchError;
use crate::models::{QueryParams, Record};
use async_trait::async_trait;

/// Raw availability payload as returned by the external source
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub body: serde_json::Value,
}

impl Snapshot {
    pub fn new(body: serde_json::Value) -> Self {
        Self { body }
    }
}

/// Read-only query against the availability source
///
/// Implementations must return within a bounded time and report failures as
/// errors rather than as an empty snapshot.
#[async_trait]
pub trait ExternalQuery: Send + Sync {
    async fn fetch(&self, params: &QueryParams) -> Result<Snapshot, FetchError>;
}

/// Turns a snapshot into records, dropping entries without free capacity
pub trait Extractor: Send + Sync {
    fn to_records(&self, snapshot: &Snapshot) -> Result<Vec<Record>, FetchError>;
}
