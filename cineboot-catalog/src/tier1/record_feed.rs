// Tier 1: Provider Record Feeds
//
// Scraping is out of scope: each provider's scraper exports its listing as
// a JSON array of records, which a feed hands to the pipeline unchanged
// apart from stamping the provider tag on records that omit it.

use crate::error::CatalogResult;
use crate::types::SourceRecord;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Source of one provider's records
#[async_trait]
pub trait RecordFeed: Send + Sync {
    fn provider(&self) -> &str;

    async fn records(&self) -> CatalogResult<Vec<SourceRecord>>;
}

/// Feed backed by an exported JSON file
pub struct JsonRecordFeed {
    provider: String,
    path: PathBuf,
}

impl JsonRecordFeed {
    pub fn new(provider: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            provider: provider.into(),
            path: path.into(),
        }
    }

    /// Feed named after the file stem (`rtve.json` → `rtve`)
    pub fn from_path(path: &Path) -> Option<Self> {
        let stem = path.file_stem()?.to_str()?;
        Some(Self::new(stem, path))
    }
}

#[async_trait]
impl RecordFeed for JsonRecordFeed {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn records(&self) -> CatalogResult<Vec<SourceRecord>> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let mut records: Vec<SourceRecord> = serde_json::from_str(&content)?;

        for r in records.iter_mut() {
            if r.provider.trim().is_empty() {
                r.provider = self.provider.clone();
            }
        }

        tracing::info!(
            provider = %self.provider,
            count = records.len(),
            "Loaded provider feed from {}",
            self.path.display()
        );
        Ok(records)
    }
}

/// Static feed, mostly for tests and one-off runs
pub struct VecRecordFeed {
    provider: String,
    records: Vec<SourceRecord>,
}

impl VecRecordFeed {
    pub fn new(provider: impl Into<String>, records: Vec<SourceRecord>) -> Self {
        Self {
            provider: provider.into(),
            records,
        }
    }
}

#[async_trait]
impl RecordFeed for VecRecordFeed {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn records(&self) -> CatalogResult<Vec<SourceRecord>> {
        Ok(self.records.clone())
    }
}
