//! Small LRU cache of decoded tiles in front of a [`TileStore`].
//!
//! Consecutive query points are usually close together, so the same few
//! tiles are hit over and over. Keeping them decoded avoids repeating the
//! inflate step. Absent tiles are cached too.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use crate::addressing::TileId;
use crate::store::TileStore;
use crate::tile::Tile;

/// Default number of tiles kept by a [`TileCache`]. A stencil touches at
/// most four tiles.
pub const DEFAULT_CACHE_SIZE: usize = 4;

/// Statistics about cache usage.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of tiles currently in the cache.
    pub entry_count: u64,
    /// Number of cache hits (requests served from cache).
    pub hit_count: u64,
    /// Number of cache misses (tiles fetched from the store).
    pub miss_count: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0).
    ///
    /// Returns 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

/// Fixed-capacity LRU cache over a tile store.
///
/// A cache belongs to one query session and is not shared between threads.
pub struct TileCache<S> {
    store: S,
    /// Decoded tiles keyed by id; `None` records an absent tile.
    entries: LruCache<TileId, Option<Arc<Tile>>>,
    hit_count: u64,
    miss_count: u64,
}

impl<S: TileStore> TileCache<S> {
    /// Wrap `store` with a cache of `capacity` tiles (at least one).
    pub fn new(store: S, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            store,
            entries: LruCache::new(capacity),
            hit_count: 0,
            miss_count: 0,
        }
    }

    /// Fetch a tile, from the cache if possible.
    ///
    /// Returns `None` when the tile is absent. A store error is logged and
    /// also reported as `None`, but is not cached, so a later call retries.
    pub fn get_tile(&mut self, id: TileId) -> Option<Arc<Tile>> {
        if let Some(entry) = self.entries.get(&id) {
            self.hit_count += 1;
            return entry.clone();
        }

        self.miss_count += 1;
        match self.store.get(id) {
            Ok(tile) => {
                let tile = tile.map(Arc::new);
                tracing::trace!(tile = %id, present = tile.is_some(), "Tile fetched");
                self.entries.put(id, tile.clone());
                tile
            }
            Err(e) => {
                tracing::warn!(tile = %id, error = %e, "Tile read failed, treating as missing");
                None
            }
        }
    }

    /// Maximum number of cached tiles.
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.entries.len() as u64,
            hit_count: self.hit_count,
            miss_count: self.miss_count,
        }
    }
}

#[cfg(test)]
impl<S: TileStore> TileCache<S> {
    /// Whether a tile is currently cached, without touching its recency.
    fn contains(&self, id: &TileId) -> bool {
        self.entries.contains(id)
    }

    fn store(&self) -> &S {
        &self.store
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DemError, Result};
    use crate::grid::GridConfig;
    use crate::store::MemoryTileStore;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Store wrapper counting `get` calls.
    struct CountingStore {
        inner: MemoryTileStore,
        gets: AtomicU64,
    }

    impl CountingStore {
        fn with_tiles(ids: &[TileId]) -> Self {
            let inner = MemoryTileStore::new(GridConfig::new(4, 2).unwrap());
            for id in ids {
                inner
                    .put(*id, &Tile::from_samples(2, vec![id.sub_tile as i16; 4]).unwrap())
                    .unwrap();
            }
            Self {
                inner,
                gets: AtomicU64::new(0),
            }
        }

        fn gets(&self) -> u64 {
            self.gets.load(Ordering::Relaxed)
        }
    }

    impl TileStore for CountingStore {
        fn grid(&self) -> GridConfig {
            self.inner.grid()
        }

        fn get(&self, id: TileId) -> Result<Option<Tile>> {
            self.gets.fetch_add(1, Ordering::Relaxed);
            self.inner.get(id)
        }

        fn put(&self, id: TileId, tile: &Tile) -> Result<()> {
            self.inner.put(id, tile)
        }
    }

    /// Store that always fails.
    struct BrokenStore;

    impl TileStore for BrokenStore {
        fn grid(&self) -> GridConfig {
            GridConfig::default()
        }

        fn get(&self, id: TileId) -> Result<Option<Tile>> {
            Err(DemError::CorruptTile {
                id,
                reason: "broken".to_string(),
            })
        }

        fn put(&self, _id: TileId, _tile: &Tile) -> Result<()> {
            Ok(())
        }
    }

    fn ids(n: u8) -> Vec<TileId> {
        (0..n).map(|i| TileId::new(0, i as i32, i % 4)).collect()
    }

    #[test]
    fn test_hit_does_not_touch_store() {
        let all = ids(2);
        let mut cache = TileCache::new(CountingStore::with_tiles(&all), 4);

        let first = cache.get_tile(all[0]).unwrap();
        let second = cache.get_tile(all[0]).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.store().gets(), 1);

        let stats = cache.stats();
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_missing_tile_is_cached() {
        let mut cache = TileCache::new(CountingStore::with_tiles(&[]), 4);
        let id = TileId::new(1, 1, 1);

        assert!(cache.get_tile(id).is_none());
        assert!(cache.get_tile(id).is_none());
        assert_eq!(cache.store().gets(), 1);
        assert!(cache.contains(&id));
    }

    #[test]
    fn test_lru_evicted_after_capacity_plus_one() {
        let capacity = DEFAULT_CACHE_SIZE;
        let all = ids(capacity as u8 + 1);
        let mut cache = TileCache::new(CountingStore::with_tiles(&all), capacity);

        for id in &all {
            cache.get_tile(*id);
        }
        assert_eq!(cache.store().gets(), all.len() as u64);
        assert!(!cache.contains(&all[0]));

        // The least recently used tile needs a fresh fetch
        cache.get_tile(all[0]);
        assert_eq!(cache.store().gets(), all.len() as u64 + 1);

        // The most recently used one is still cached
        cache.get_tile(all[capacity]);
        assert_eq!(cache.store().gets(), all.len() as u64 + 1);
    }

    #[test]
    fn test_hit_promotes_entry() {
        let all = ids(3);
        let mut cache = TileCache::new(CountingStore::with_tiles(&all), 2);

        cache.get_tile(all[0]);
        cache.get_tile(all[1]);
        // Touch 0 so 1 becomes least recently used
        cache.get_tile(all[0]);
        cache.get_tile(all[2]);

        assert!(cache.contains(&all[0]));
        assert!(!cache.contains(&all[1]));
        assert!(cache.contains(&all[2]));
    }

    #[test]
    fn test_zero_capacity_is_one() {
        let cache = TileCache::new(CountingStore::with_tiles(&[]), 0);
        assert_eq!(cache.capacity(), 1);
    }

    #[test]
    fn test_store_error_is_missing_and_not_cached() {
        let mut cache = TileCache::new(BrokenStore, 4);
        let id = TileId::new(0, 0, 0);

        assert!(cache.get_tile(id).is_none());
        assert!(!cache.contains(&id));
        assert_eq!(cache.stats().miss_count, 1);

        cache.clear();
        assert_eq!(cache.stats().entry_count, 0);
    }
}
