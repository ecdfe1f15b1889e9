use std::path::{Path, PathBuf};
use std::sync::Arc;

use lru::LruCache;
use tracing::debug;

use crate::decoder::DecoderRegistry;
use crate::sound::SoundAsset;
use crate::util::{AssetError, DEFAULT_CACHE_BUDGET_BYTES};

/// Decoded assets keyed by canonical path, bounded by total PCM bytes.
pub struct SoundLoader {
    registry: DecoderRegistry,
    cache: LruCache<PathBuf, Arc<SoundAsset>>,
    cached_bytes: usize,
    memory_budget: usize,
}

impl SoundLoader {
    pub fn new(registry: DecoderRegistry, memory_budget: usize) -> Self {
        Self {
            registry,
            cache: LruCache::unbounded(),
            cached_bytes: 0,
            memory_budget,
        }
    }

    pub fn registry(&self) -> &DecoderRegistry {
        &self.registry
    }

    pub fn memory_budget(&self) -> usize {
        self.memory_budget
    }

    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<Arc<SoundAsset>, AssetError> {
        let path = path.as_ref();
        let key = std::fs::canonicalize(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AssetError::NotFound(path.to_path_buf()),
            _ => AssetError::Io(e),
        })?;

        if let Some(asset) = self.cache.get(&key) {
            return Ok(asset.clone());
        }

        let asset = Arc::new(self.registry.load(&key)?);
        let size = asset.byte_len();
        if size > self.memory_budget {
            debug!(
                path = %key.display(),
                size,
                budget = self.memory_budget,
                "asset exceeds cache budget, not cached"
            );
            return Ok(asset);
        }

        if let Some((_, old)) = self.cache.push(key, asset.clone()) {
            self.cached_bytes = self.cached_bytes.saturating_sub(old.byte_len());
        }
        self.cached_bytes += size;
        self.evict_to_budget();
        Ok(asset)
    }

    pub fn cached_bytes(&self) -> usize {
        self.cached_bytes
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
        self.cached_bytes = 0;
    }

    fn evict_to_budget(&mut self) {
        while self.cached_bytes > self.memory_budget {
            match self.cache.pop_lru() {
                Some((path, asset)) => {
                    self.cached_bytes = self.cached_bytes.saturating_sub(asset.byte_len());
                    debug!(path = %path.display(), "evicted cached asset");
                }
                None => break,
            }
        }
    }
}

impl Default for SoundLoader {
    fn default() -> Self {
        Self::new(DecoderRegistry::with_defaults(), DEFAULT_CACHE_BUDGET_BYTES)
    }
}
