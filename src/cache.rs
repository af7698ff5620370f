//! LRU cache of fetched volumes.

use crate::types::VolumeKey;
use crate::volume::Volume;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Volumes keyed by (timestep, channel), bounded by entry count
pub struct VolumeCache {
    cache: LruCache<VolumeKey, Arc<Volume>>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl VolumeCache {
    /// Create a cache holding at most `capacity` volumes (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Look up a volume, marking it most recently used
    pub fn get(&mut self, key: &VolumeKey) -> Option<Arc<Volume>> {
        match self.cache.get(key) {
            Some(volume) => {
                self.hits += 1;
                Some(Arc::clone(volume))
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Check if a key exists in the cache without updating LRU order.
    pub fn contains(&self, key: &VolumeKey) -> bool {
        self.cache.contains(key)
    }

    /// Insert a volume, evicting the least recently used one when full
    pub fn insert(&mut self, volume: Arc<Volume>) {
        let key = volume.key();
        if let Some((evicted, _)) = self.cache.push(key, volume) {
            if evicted != key {
                self.evictions += 1;
                tracing::debug!(%evicted, "Evicted volume from cache");
            }
        }
    }

    /// Latest cached timestep for `channel`
    pub fn latest_timestep(&self, channel: usize) -> Option<usize> {
        self.cache
            .iter()
            .filter(|(key, _)| key.channel == channel)
            .map(|(key, _)| key.timestep)
            .max()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.cache.len(),
            capacity: self.cache.cap().get(),
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
        }
    }
}
