//! Shared engine state: configuration and cache counters
//!
//! The registry, the tile cache, and every open file see the same
//! [`SharedState`]: a read-mostly configuration block plus atomic counters.
//! Counters are updated with relaxed ordering; they steer eviction and feed
//! statistics, they are not synchronization points.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use glam::Mat4;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::imageio::ReaderFactory;

/// Default cap on simultaneously open file handles
pub const DEFAULT_MAX_OPEN_FILES: usize = 100;
/// Default tile memory budget in megabytes
pub const DEFAULT_MAX_MEMORY_MB: usize = 50;

/// Runtime-adjustable engine configuration
pub struct EngineConfig {
    /// Soft ceiling on open file handles
    pub max_open_files: usize,
    /// Soft ceiling on decoded tile bytes
    pub max_memory_bytes: u64,
    /// Search path handed to the reader factory
    pub search_path: String,
    /// Baseline world transform composed into header matrices
    pub common_to_world: Mat4,
    /// Constructor for image readers
    pub reader_factory: Arc<ReaderFactory>,
}

impl EngineConfig {
    pub(crate) fn new(reader_factory: Arc<ReaderFactory>) -> Self {
        Self {
            max_open_files: DEFAULT_MAX_OPEN_FILES,
            max_memory_bytes: (DEFAULT_MAX_MEMORY_MB as u64) << 20,
            search_path: String::new(),
            common_to_world: Mat4::IDENTITY,
            reader_factory,
        }
    }
}

/// Atomic counters shared by the registry, cache, and files
#[derive(Debug, Default)]
pub struct CacheCounters {
    open_files: AtomicUsize,
    memory_used: AtomicU64,
    peak_memory: AtomicU64,
    file_hits: AtomicUsize,
    file_misses: AtomicUsize,
    tile_hits: AtomicUsize,
    tile_misses: AtomicUsize,
}

impl CacheCounters {
    /// Number of files with an open handle right now
    pub fn open_files(&self) -> usize {
        self.open_files.load(Ordering::Relaxed)
    }

    /// Decoded tile bytes currently resident
    pub fn memory_used(&self) -> u64 {
        self.memory_used.load(Ordering::Relaxed)
    }

    pub(crate) fn incr_open_files(&self) {
        self.open_files.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn decr_open_files(&self) {
        self.open_files.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn add_memory(&self, bytes: u64) {
        let now = self.memory_used.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.peak_memory.fetch_max(now, Ordering::Relaxed);
    }

    pub(crate) fn sub_memory(&self, bytes: u64) {
        self.memory_used.fetch_sub(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_file_hit(&self) {
        self.file_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_file_miss(&self) {
        self.file_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_tile_hit(&self) {
        self.tile_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_tile_miss(&self) {
        self.tile_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a consistent-enough snapshot for reporting
    pub fn snapshot(&self) -> CacheStats {
        let tile_hits = self.tile_hits.load(Ordering::Relaxed);
        let tile_misses = self.tile_misses.load(Ordering::Relaxed);
        CacheStats {
            open_files: self.open_files.load(Ordering::Relaxed),
            memory_used_bytes: self.memory_used.load(Ordering::Relaxed),
            peak_memory_bytes: self.peak_memory.load(Ordering::Relaxed),
            file_hits: self.file_hits.load(Ordering::Relaxed),
            file_misses: self.file_misses.load(Ordering::Relaxed),
            tile_hits,
            tile_misses,
            tile_hit_rate: if tile_hits + tile_misses > 0 {
                tile_hits as f64 / (tile_hits + tile_misses) as f64
            } else {
                0.0
            },
        }
    }
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub open_files: usize,
    pub memory_used_bytes: u64,
    pub peak_memory_bytes: u64,
    pub file_hits: usize,
    pub file_misses: usize,
    pub tile_hits: usize,
    pub tile_misses: usize,
    pub tile_hit_rate: f64,
}

/// Configuration and counters shared across the engine's components
pub struct SharedState {
    pub config: RwLock<EngineConfig>,
    pub stats: CacheCounters,
}

impl SharedState {
    pub(crate) fn new(reader_factory: Arc<ReaderFactory>) -> Arc<Self> {
        Arc::new(Self {
            config: RwLock::new(EngineConfig::new(reader_factory)),
            stats: CacheCounters::default(),
        })
    }
}
