use crate::domain::errors::PipelineError;
use crate::infrastructure::csv_loader::{LoadedSeries, MarketCsvLoader};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Memoizes loaded series by a SHA-256 digest of the raw input bytes.
///
/// Owned by the caller's session; identical uploads are parsed once.
#[derive(Debug, Default)]
pub struct SeriesCache {
    entries: HashMap<String, Arc<LoadedSeries>>,
}

impl SeriesCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn digest(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    pub fn get_or_load(&mut self, bytes: &[u8]) -> Result<Arc<LoadedSeries>, PipelineError> {
        let key = Self::digest(bytes);
        if let Some(hit) = self.entries.get(&key) {
            debug!("SeriesCache hit {}", &key[..12]);
            return Ok(Arc::clone(hit));
        }
        let loaded = Arc::new(MarketCsvLoader::load_bytes(bytes)?);
        self.entries.insert(key, Arc::clone(&loaded));
        Ok(loaded)
    }

    pub fn get_or_load_path(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<Arc<LoadedSeries>, PipelineError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            PipelineError::data_format(format!("cannot read {}: {}", path.display(), e))
        })?;
        self.get_or_load(&bytes)
    }

    pub fn contains(&self, bytes: &[u8]) -> bool {
        self.entries.contains_key(&Self::digest(bytes))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
