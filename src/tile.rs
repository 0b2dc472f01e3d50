//! Tiles and tile identities
//!
//! A [`TileId`] names one tile of one MIP level of one file; a [`Tile`] is
//! that tile's decoded texel block. Tiles keep their file alive through the
//! shared reference inside their id, and the id hashes the file by pointer
//! identity, which is sound because the registry interns exactly one record
//! per path.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::file::TextureFile;

/// Value key `(file, level, x0, y0, z0)` identifying one tile
#[derive(Clone)]
pub struct TileId {
    file: Arc<TextureFile>,
    level: usize,
    x: i32,
    y: i32,
    z: i32,
}

impl TileId {
    /// Create an id for the tile whose upper-left corner is `(x, y, z)`
    ///
    /// Coordinates must be tile-aligned for the file's level spec.
    pub fn new(file: Arc<TextureFile>, level: usize, x: i32, y: i32, z: i32) -> Self {
        Self { file, level, x, y, z }
    }

    /// The file this tile belongs to
    pub fn file(&self) -> &Arc<TextureFile> {
        &self.file
    }

    /// MIP level within the file
    pub fn level(&self) -> usize {
        self.level
    }

    /// Tile origin x (tile-aligned)
    pub fn x(&self) -> i32 {
        self.x
    }

    /// Tile origin y (tile-aligned)
    pub fn y(&self) -> i32 {
        self.y
    }

    /// Tile origin z (tile-aligned)
    pub fn z(&self) -> i32 {
        self.z
    }
}

impl PartialEq for TileId {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.file, &other.file)
            && self.level == other.level
            && self.x == other.x
            && self.y == other.y
            && self.z == other.z
    }
}

impl Eq for TileId {}

impl Hash for TileId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.file) as usize).hash(state);
        self.level.hash(state);
        self.x.hash(state);
        self.y.hash(state);
        self.z.hash(state);
    }
}

impl std::fmt::Debug for TileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TileId({} level {} @ ({}, {}, {}))",
            self.file.path(),
            self.level,
            self.x,
            self.y,
            self.z
        )
    }
}

/// One decoded texel block
///
/// Pixels are row-major within a tile, slice-major across z, `channels`
/// floats per texel. Immutable after construction; only the clock-sweep
/// `used` bit mutates.
pub struct Tile {
    id: TileId,
    valid: bool,
    used: AtomicBool,
    pixels: Vec<f32>,
}

impl Tile {
    /// Decode the tile named by `id` through its file's reader
    ///
    /// A failed read produces an invalid tile that still owns its
    /// allocation; the cache indexes it so repeated misses on a bad tile do
    /// not hammer the reader.
    pub(crate) fn new(id: TileId) -> Self {
        let Some(spec) = id.file().spec(id.level()).cloned() else {
            return Self {
                id,
                valid: false,
                used: AtomicBool::new(true),
                pixels: Vec::new(),
            };
        };
        let mut pixels = vec![0.0f32; spec.tile_elements()];
        let valid = match id
            .file()
            .read_tile(id.level(), id.x(), id.y(), id.z(), &mut pixels)
        {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "tile decode failed");
                false
            }
        };
        Self {
            id,
            valid,
            used: AtomicBool::new(true),
            pixels,
        }
    }

    /// The owning id
    pub fn id(&self) -> &TileId {
        &self.id
    }

    /// Whether the pixels decoded successfully
    pub fn valid(&self) -> bool {
        self.valid
    }

    /// Decoded texels, `channels` floats per pixel
    pub fn data(&self) -> &[f32] {
        &self.pixels
    }

    /// Bytes this tile counts against the memory budget
    pub fn size_bytes(&self) -> usize {
        self.pixels.len() * std::mem::size_of::<f32>()
    }

    pub(crate) fn mark_used(&self) {
        self.used.store(true, Ordering::Release);
    }

    /// Clear the used bit, reporting whether it was set (clock sweep)
    pub(crate) fn clear_used(&self) -> bool {
        self.used.swap(false, Ordering::AcqRel)
    }
}

impl std::fmt::Debug for Tile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tile")
            .field("id", &self.id)
            .field("valid", &self.valid)
            .field("size_bytes", &self.size_bytes())
            .finish()
    }
}
