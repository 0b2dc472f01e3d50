//! Bounded cache of decoded tiles
//!
//! Maps [`TileId`]s to shared [`Tile`]s and enforces the memory budget with
//! a clock sweep over insertion order. The baseline decodes under the cache
//! lock; releasing it during decode is a permitted upgrade provided
//! duplicate misses coalesce to a single decode per id.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::state::SharedState;
use crate::tile::{Tile, TileId};

struct CacheInner {
    tiles: IndexMap<TileId, Arc<Tile>>,
    sweep: usize,
}

/// Concurrent id → tile map bounded by `max_memory_bytes`
pub struct TileCache {
    shared: Arc<SharedState>,
    inner: Mutex<CacheInner>,
}

impl TileCache {
    pub(crate) fn new(shared: Arc<SharedState>) -> Self {
        Self {
            shared,
            inner: Mutex::new(CacheInner {
                tiles: IndexMap::new(),
                sweep: 0,
            }),
        }
    }

    /// Return the tile for `id`, decoding it on first request
    ///
    /// Failed decodes are cached as invalid tiles; callers check
    /// [`Tile::valid`]. Insertion that pushes the cache over budget runs an
    /// eviction sweep before returning.
    pub fn find(&self, id: &TileId) -> Arc<Tile> {
        let mut inner = self.inner.lock();
        if let Some(tile) = inner.tiles.get(id) {
            self.shared.stats.record_tile_hit();
            tile.mark_used();
            return tile.clone();
        }
        self.shared.stats.record_tile_miss();

        let tile = Arc::new(Tile::new(id.clone()));
        self.shared.stats.add_memory(tile.size_bytes() as u64);
        inner.tiles.insert(id.clone(), tile.clone());

        let max_memory_bytes = self.shared.config.read().max_memory_bytes;
        if self.shared.stats.memory_used() > max_memory_bytes {
            self.enforce_tile_budget(&mut inner, max_memory_bytes);
        }
        tile
    }

    /// Evict idle tiles until memory is under budget
    ///
    /// Clock sweep: a used tile is spared and its bit cleared; an idle tile
    /// is evicted. Stops after a full pass with no eviction, tolerating
    /// overshoot.
    fn enforce_tile_budget(&self, inner: &mut CacheInner, max_memory_bytes: u64) {
        let mut spared_in_a_row = 0;
        while self.shared.stats.memory_used() > max_memory_bytes
            && !inner.tiles.is_empty()
            && spared_in_a_row < inner.tiles.len()
        {
            if inner.sweep >= inner.tiles.len() {
                inner.sweep = 0;
            }
            let Some((_, tile)) = inner.tiles.get_index(inner.sweep) else {
                break;
            };
            if tile.clear_used() {
                inner.sweep += 1;
                spared_in_a_row += 1;
            } else {
                // swap_remove keeps the cursor valid: the last entry moves
                // into the vacated slot.
                if let Some((_, evicted)) = inner.tiles.swap_remove_index(inner.sweep) {
                    self.shared.stats.sub_memory(evicted.size_bytes() as u64);
                }
                spared_in_a_row = 0;
            }
        }
        if self.shared.stats.memory_used() > max_memory_bytes {
            debug!(
                memory_used = self.shared.stats.memory_used(),
                max_memory_bytes, "tile budget overshoot, every tile in use"
            );
        }
    }

    /// Number of resident tiles, valid or not
    pub fn len(&self) -> usize {
        self.inner.lock().tiles.len()
    }

    /// Check if no tiles are resident
    pub fn is_empty(&self) -> bool {
        self.inner.lock().tiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, TextureError};
    use crate::file::TextureFile;
    use crate::imageio::{ImageReader, ImageSpec, ReaderFactory, TileBuffer};

    struct FlatReader {
        spec: ImageSpec,
        value: f32,
    }

    impl ImageReader for FlatReader {
        fn spec(&self) -> &ImageSpec {
            &self.spec
        }
        fn seek_subimage(&mut self, level: usize) -> Result<()> {
            if level == 0 {
                Ok(())
            } else {
                Err(TextureError::invalid_data("no such subimage"))
            }
        }
        fn current_subimage(&self) -> usize {
            0
        }
        fn read_tile(&mut self, _x: i32, _y: i32, _z: i32, dst: TileBuffer<'_>) -> Result<()> {
            if let TileBuffer::Float32(dst) = dst {
                dst.fill(self.value);
            }
            Ok(())
        }
        fn close(&mut self) {}
        fn format_name(&self) -> &str {
            "memimage"
        }
    }

    fn flat_factory(value: f32) -> Arc<ReaderFactory> {
        Arc::new(move |_: &str, _: &str| {
            Some(Box::new(FlatReader {
                spec: ImageSpec::tiled_2d(64, 64, 4, 4, 1),
                value,
            }) as Box<dyn ImageReader>)
        })
    }

    #[test]
    fn test_decode_once_per_id() {
        let shared = SharedState::new(flat_factory(0.25));
        let file = TextureFile::new(Arc::from("a.tx"), shared.clone());
        let cache = TileCache::new(shared.clone());

        let id = TileId::new(file, 0, 0, 0, 0);
        let first = cache.find(&id);
        let second = cache.find(&id);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.data()[0], 0.25);
        assert_eq!(cache.len(), 1);
        let stats = shared.stats.snapshot();
        assert_eq!(stats.tile_misses, 1);
        assert_eq!(stats.tile_hits, 1);
    }

    #[test]
    fn test_memory_budget_eviction() {
        let shared = SharedState::new(flat_factory(1.0));
        // One 4x4 single-channel float tile is 64 bytes; allow three.
        shared.config.write().max_memory_bytes = 3 * 64;
        let file = TextureFile::new(Arc::from("a.tx"), shared.clone());
        let cache = TileCache::new(shared.clone());

        for i in 0..6 {
            cache.find(&TileId::new(file.clone(), 0, i * 4, 0, 0));
        }

        assert!(shared.stats.memory_used() <= 3 * 64);
        assert!(cache.len() <= 3);
    }

    #[test]
    fn test_eviction_spares_used_tiles() {
        let shared = SharedState::new(flat_factory(1.0));
        shared.config.write().max_memory_bytes = 2 * 64;
        let file = TextureFile::new(Arc::from("a.tx"), shared.clone());
        let cache = TileCache::new(shared.clone());

        let hot = TileId::new(file.clone(), 0, 0, 0, 0);
        cache.find(&hot);
        // Each insertion sweeps; keep re-touching the hot tile so its used
        // bit is set whenever the sweep reaches it.
        for i in 1..5 {
            cache.find(&TileId::new(file.clone(), 0, i * 4, 0, 0));
            cache.find(&hot);
        }

        let stats = shared.stats.snapshot();
        assert!(stats.memory_used_bytes <= 2 * 64);
        // The hot tile never left: finding it again is a hit, not a decode.
        let misses_before = stats.tile_misses;
        cache.find(&hot);
        assert_eq!(shared.stats.snapshot().tile_misses, misses_before);
    }

    #[test]
    fn test_failed_decode_is_cached() {
        let shared = SharedState::new(Arc::new(|_: &str, _: &str| None));
        let file = TextureFile::new(Arc::from("nope.tx"), shared.clone());
        let cache = TileCache::new(shared.clone());

        let id = TileId::new(file, 0, 0, 0, 0);
        let tile = cache.find(&id);
        assert!(!tile.valid());

        // The invalid tile is indexed, so the second lookup is a hit.
        cache.find(&id);
        let stats = shared.stats.snapshot();
        assert_eq!(stats.tile_misses, 1);
        assert_eq!(stats.tile_hits, 1);
    }
}
