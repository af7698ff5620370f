//! Async volume loading with a shared cache
//!
//! Reads are blocking file I/O, so each one runs on tokio's blocking pool
//! with its own `SlabReader` cloned from a configuration-only template.
//! Readers are never shared between tasks; the cache is.

use crate::cache::{CacheStats, VolumeCache};
use crate::error::Result;
use crate::reader::SlabReader;
use crate::types::VolumeKey;
use crate::volume::{Field2D, Volume};
use futures::future::try_join_all;
use parking_lot::Mutex;
use std::sync::Arc;

/// Loads volumes concurrently, keeping recent ones in an LRU cache
#[derive(Clone)]
pub struct VolumeLoader {
    template: SlabReader,
    cache: Arc<Mutex<VolumeCache>>,
}

impl VolumeLoader {
    /// Create a loader; `template` is cloned per read and never opened itself
    pub fn new(template: SlabReader, cache_size: usize) -> Self {
        Self {
            template: template.clone(),
            cache: Arc::new(Mutex::new(VolumeCache::new(cache_size))),
        }
    }

    pub fn reader(&self) -> &SlabReader {
        &self.template
    }

    /// Whether a volume is already cached
    pub fn is_cached(&self, key: VolumeKey) -> bool {
        self.cache.lock().contains(&key)
    }

    /// Load one volume, from the cache if present
    pub async fn load(&self, key: VolumeKey) -> Result<Arc<Volume>> {
        let cached = self.cache.lock().get(&key);
        if let Some(volume) = cached {
            return Ok(volume);
        }

        // Reject bad keys before spawning anything.
        self.template.volume_offset(key.timestep, key.channel)?;

        let mut reader = self.template.clone();
        tracing::debug!(%key, path = %reader.path().display(), "Spawning volume load");

        let volume = tokio::task::spawn_blocking(move || {
            reader.fetch_volume(key.timestep, key.channel)
        })
        .await??;

        let volume = Arc::new(volume);
        self.cache.lock().insert(Arc::clone(&volume));
        Ok(volume)
    }

    /// Load several volumes concurrently, in the order given
    pub async fn load_many(&self, keys: &[VolumeKey]) -> Result<Vec<Arc<Volume>>> {
        try_join_all(keys.iter().map(|&key| self.load(key))).await
    }

    /// Load every channel of one timestep
    pub async fn load_timestep(&self, timestep: usize) -> Result<Vec<Arc<Volume>>> {
        let keys: Vec<_> = (0..self.template.num_channels())
            .map(|channel| VolumeKey::new(timestep, channel))
            .collect();
        self.load_many(&keys).await
    }

    /// Load a 2D field; fields are not cached
    pub async fn load_field_2d(&self, index: usize) -> Result<Field2D> {
        self.template.field_2d_offset(index)?;
        let mut reader = self.template.clone();
        let field = tokio::task::spawn_blocking(move || reader.fetch_field_2d(index)).await??;
        Ok(field)
    }

    /// Timestep to prefetch next for `channel`
    ///
    /// The one after the latest cached timestep, wrapping to the start; the
    /// first timestep when nothing is cached.
    pub fn next_prefetch(&self, channel: usize) -> usize {
        let timesteps = self.template.num_timesteps().max(1);
        match self.cache.lock().latest_timestep(channel) {
            Some(latest) => (latest + 1) % timesteps,
            None => 0,
        }
    }

    /// Load the next timestep for `channel` unless it is already cached
    pub async fn prefetch(&self, channel: usize) -> Result<Arc<Volume>> {
        let key = VolumeKey::new(self.next_prefetch(channel), channel);
        self.load(key).await
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SlabError;
    use crate::layout::{GridGeometry, StrideLayout};
    use crate::writer::SlabWriter;
    use tempfile::TempDir;

    fn dataset(dir: &TempDir) -> SlabReader {
        let path = dir.path().join("wrf.bin");
        let geometry = GridGeometry::new(3, 3, 2, 4, 2)
            .with_fields_2d(1)
            .with_frame_markers(false);
        let mut writer = SlabWriter::create(&path, geometry, StrideLayout::Packed).unwrap();
        for t in 0..4 {
            for c in 0..2 {
                writer
                    .write_volume(t, c, &vec![(t * 10 + c) as f32; 18])
                    .unwrap();
            }
        }
        writer.write_field_2d(0, &[-1.0; 9]).unwrap();
        writer.finish().unwrap();
        SlabReader::new(&path, geometry)
    }

    #[tokio::test]
    async fn test_load_caches() {
        let dir = TempDir::new().unwrap();
        let loader = VolumeLoader::new(dataset(&dir), 8);

        let first = loader.load(VolumeKey::new(2, 1)).await.unwrap();
        assert_eq!(first.data()[0], 21.0);
        assert!(loader.is_cached(VolumeKey::new(2, 1)));

        let again = loader.load(VolumeKey::new(2, 1)).await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(loader.cache_stats().hits, 1);
    }

    #[tokio::test]
    async fn test_load_many_keeps_order() {
        let dir = TempDir::new().unwrap();
        let loader = VolumeLoader::new(dataset(&dir), 8);

        let keys = [VolumeKey::new(3, 0), VolumeKey::new(0, 1), VolumeKey::new(1, 0)];
        let volumes = loader.load_many(&keys).await.unwrap();
        let firsts: Vec<f32> = volumes.iter().map(|v| v.data()[0]).collect();
        assert_eq!(firsts, vec![30.0, 1.0, 10.0]);

        let step = loader.load_timestep(2).await.unwrap();
        assert_eq!(step.len(), 2);
        assert_eq!(step[1].key(), VolumeKey::new(2, 1));
    }

    #[tokio::test]
    async fn test_bad_key_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let loader = VolumeLoader::new(dataset(&dir), 8);
        let err = loader.load(VolumeKey::new(4, 0)).await.unwrap_err();
        assert!(err.is_configuration());
        assert!(loader.load_field_2d(1).await.unwrap_err().is_configuration());
    }

    #[tokio::test]
    async fn test_field_2d() {
        let dir = TempDir::new().unwrap();
        let loader = VolumeLoader::new(dataset(&dir), 8);
        let field = loader.load_field_2d(0).await.unwrap();
        assert_eq!(field.data(), &[-1.0; 9]);
    }

    #[tokio::test]
    async fn test_prefetch_wraps() {
        let dir = TempDir::new().unwrap();
        let loader = VolumeLoader::new(dataset(&dir), 8);
        assert_eq!(loader.next_prefetch(0), 0);

        loader.load(VolumeKey::new(2, 0)).await.unwrap();
        assert_eq!(loader.next_prefetch(0), 3);
        let v = loader.prefetch(0).await.unwrap();
        assert_eq!(v.key(), VolumeKey::new(3, 0));
        assert_eq!(loader.next_prefetch(0), 0);
        assert_eq!(loader.next_prefetch(1), 0);
    }

    #[tokio::test]
    async fn test_missing_file_surfaces_open_error() {
        let dir = TempDir::new().unwrap();
        let geometry = GridGeometry::new(2, 2, 1, 1, 1);
        let loader = VolumeLoader::new(SlabReader::new(dir.path().join("none.bin"), geometry), 2);
        assert!(matches!(
            loader.load(VolumeKey::new(0, 0)).await,
            Err(SlabError::Open { .. })
        ));
    }
}
