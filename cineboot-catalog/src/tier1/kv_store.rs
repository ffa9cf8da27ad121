// Tier 1: Persisted Key-Value Stores
//
// Two small maps outlive a run: the id-mapping cache (`provider:id` →
// canonical id) and the publication log (`provider:id` → first date seen).
// Both are loaded once at start and written once at the end of a successful
// run; a failed run leaves the files as they were.

use crate::error::CatalogResult;
use cineboot_common::config::write_atomic;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Opaque key→value store
pub trait KvStore<V>: Send {
    fn get(&self, key: &str) -> Option<&V>;

    fn put(&mut self, key: String, value: V);

    /// Persist pending changes
    fn flush(&mut self) -> CatalogResult<()>;
}

/// JSON object on disk, held in memory for the run
pub struct JsonKvStore<V> {
    path: Option<PathBuf>,
    entries: BTreeMap<String, V>,
    dirty: bool,
}

impl<V> JsonKvStore<V>
where
    V: Serialize + DeserializeOwned + PartialEq,
{
    /// Load from `path`; a missing file starts empty
    pub fn load(path: &Path) -> CatalogResult<Self> {
        let entries = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            tracing::debug!("No cache at {}, starting empty", path.display());
            BTreeMap::new()
        };

        Ok(Self {
            path: Some(path.to_path_buf()),
            entries,
            dirty: false,
        })
    }

    /// Store that is never written anywhere
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: BTreeMap::new(),
            dirty: false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> KvStore<V> for JsonKvStore<V>
where
    V: Serialize + DeserializeOwned + PartialEq + Send,
{
    fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    fn put(&mut self, key: String, value: V) {
        if self.entries.get(&key) != Some(&value) {
            self.entries.insert(key, value);
            self.dirty = true;
        }
    }

    fn flush(&mut self) -> CatalogResult<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(path) = &self.path {
            let json = serde_json::to_vec_pretty(&self.entries)?;
            write_atomic(path, &json)?;
            tracing::debug!(entries = self.entries.len(), "Flushed cache to {}", path.display());
        }
        self.dirty = false;
        Ok(())
    }
}
