//! One texture file: lazy open, one-time header parse, tile reads
//!
//! A [`TextureFile`] is created by the registry on first request and lives
//! for the registry's lifetime. Its reader handle is acquired and released
//! many times under file-budget pressure; the parsed header (per-level
//! specs, texture kind, wrap modes, matrices) is filled exactly once on the
//! first successful open and is immutable afterwards.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use glam::Mat4;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{Result, TextureError};
use crate::formats::{parse_wrapmodes, CubeLayout, TexFormat, WrapMode};
use crate::imageio::{AttrValue, ImageReader, ImageSpec, TileBuffer};
use crate::state::SharedState;

/// Header-derived metadata, parsed once on the first successful open
pub(crate) struct FileMeta {
    pub specs: Vec<ImageSpec>,
    pub texformat: TexFormat,
    pub swrap: WrapMode,
    pub twrap: WrapMode,
    pub cube_layout: CubeLayout,
    pub y_up: bool,
    pub local_matrix: Option<Mat4>,
    pub projection_matrix: Option<Mat4>,
}

/// A texture file known to the registry
pub struct TextureFile {
    path: Arc<str>,
    shared: Arc<SharedState>,
    used: AtomicBool,
    broken: AtomicBool,
    reader: Mutex<Option<Box<dyn ImageReader>>>,
    meta: OnceCell<FileMeta>,
}

impl TextureFile {
    /// Create a record for `path` and eagerly attempt the first open
    pub(crate) fn new(path: Arc<str>, shared: Arc<SharedState>) -> Arc<Self> {
        let file = Arc::new(Self {
            path,
            shared,
            used: AtomicBool::new(true),
            broken: AtomicBool::new(false),
            reader: Mutex::new(None),
            meta: OnceCell::new(),
        });
        file.open();
        file
    }

    /// Acquire a reader handle; idempotent
    ///
    /// Returns immediately when the file is already open or latched broken.
    /// The first successful open also walks the MIP pyramid and parses
    /// header attributes.
    pub fn open(&self) {
        let mut slot = self.reader.lock();
        self.open_locked(&mut slot);
    }

    fn open_locked(&self, slot: &mut Option<Box<dyn ImageReader>>) {
        if slot.is_some() || self.broken() {
            return;
        }
        let (factory, search_path, common_to_world) = {
            let config = self.shared.config.read();
            (
                config.reader_factory.clone(),
                config.search_path.clone(),
                config.common_to_world,
            )
        };
        let Some(mut reader) = factory(&self.path, &search_path) else {
            warn!(path = %self.path, "no reader for texture file");
            self.broken.store(true, Ordering::Release);
            return;
        };
        self.shared.stats.incr_open_files();
        self.mark_used();

        // Reopening a file whose header was already parsed stops here.
        if self.meta.get().is_none() {
            match Self::parse_meta(reader.as_mut(), common_to_world) {
                Ok(meta) => {
                    debug!(path = %self.path, levels = meta.specs.len(), "opened texture file");
                    let _ = self.meta.set(meta);
                }
                Err(err) => {
                    warn!(path = %self.path, %err, "texture header rejected");
                    reader.close();
                    self.shared.stats.decr_open_files();
                    self.broken.store(true, Ordering::Release);
                    return;
                }
            }
        }
        *slot = Some(reader);
    }

    /// Walk every subimage and parse header attributes from level 0
    fn parse_meta(reader: &mut dyn ImageReader, common_to_world: Mat4) -> Result<FileMeta> {
        let mut specs = vec![reader.spec().clone()];
        while reader.seek_subimage(specs.len()).is_ok() {
            let spec = reader.spec().clone();
            // Every level must share the channel count and pixel format of
            // the finest one.
            if spec.channels != specs[0].channels || spec.pixel_format != specs[0].pixel_format {
                return Err(TextureError::invalid_data(format!(
                    "subimage {} changes the channel layout",
                    specs.len()
                )));
            }
            specs.push(spec);
        }
        reader.seek_subimage(0)?;

        let spec = &specs[0];

        let mut texformat = TexFormat::Plain;
        if let Some(attr) = spec.find_attribute("textureformat") {
            if let AttrValue::Str(name) = &attr.value {
                if let Some(parsed) = TexFormat::from_name(name) {
                    texformat = parsed;
                }
            }
        }

        let (mut swrap, mut twrap) = (WrapMode::Black, WrapMode::Black);
        if let Some(attr) = spec.find_attribute("wrapmodes") {
            if let AttrValue::Str(modes) = &attr.value {
                (swrap, twrap) = parse_wrapmodes(modes);
            }
        }

        let mut cube_layout = CubeLayout::NotCube;
        let mut y_up = false;
        if texformat == TexFormat::CubeFaceEnv {
            y_up = reader.format_name() == "openexr";
            let face_w = spec.full_width.max(spec.tile_width);
            let face_h = spec.full_height.max(spec.tile_height);
            cube_layout = if spec.width == 3 * face_w && spec.height == 2 * face_h {
                CubeLayout::ThreeByTwo
            } else if spec.width == face_w && spec.height == 6 * face_h {
                CubeLayout::OneBySix
            } else {
                CubeLayout::Unknown
            };
        }

        let local_matrix = spec.find_attribute("worldtocamera").and_then(|a| match &a.value {
            AttrValue::Matrix(m) => Some(common_to_world * *m),
            _ => None,
        });
        let projection_matrix = spec.find_attribute("worldtoscreen").and_then(|a| match &a.value {
            AttrValue::Matrix(m) => Some(common_to_world * *m),
            _ => None,
        });

        Ok(FileMeta {
            specs,
            texformat,
            swrap,
            twrap,
            cube_layout,
            y_up,
            local_matrix,
            projection_matrix,
        })
    }

    /// Read the tile at `(x, y, z)` of `level` into `dst`, reopening the
    /// file if its handle was released
    pub fn read_tile(&self, level: usize, x: i32, y: i32, z: i32, dst: &mut [f32]) -> Result<()> {
        let mut slot = self.reader.lock();
        self.open_locked(&mut slot);
        let Some(reader) = slot.as_mut() else {
            return Err(TextureError::file_broken(self.path.as_ref()));
        };
        if reader.current_subimage() != level {
            reader.seek_subimage(level)?;
        }
        reader
            .read_tile(x, y, z, TileBuffer::Float32(dst))
            .map_err(|err| {
                TextureError::read_error(format!(
                    "{}: tile ({x}, {y}, {z}) at level {level}: {err}",
                    self.path
                ))
            })?;
        self.mark_used();
        Ok(())
    }

    /// Two-phase clock release: a used file is spared (its bit cleared),
    /// an idle open file is closed. Parsed metadata always survives.
    pub(crate) fn release(&self) {
        if self.used.swap(false, Ordering::AcqRel) {
            return;
        }
        // A file mid-read holds the reader lock; skip it rather than stall
        // the sweep.
        let Some(mut slot) = self.reader.try_lock() else {
            return;
        };
        if let Some(mut reader) = slot.take() {
            reader.close();
            self.shared.stats.decr_open_files();
            debug!(path = %self.path, "closed idle texture file");
        }
    }

    pub(crate) fn mark_used(&self) {
        self.used.store(true, Ordering::Release);
    }

    pub(crate) fn metadata(&self) -> Option<&FileMeta> {
        self.meta.get()
    }

    /// Interned path this file was opened from
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether an open attempt has failed; latched, never retried
    pub fn broken(&self) -> bool {
        self.broken.load(Ordering::Acquire)
    }

    /// Whether a reader handle is currently held
    pub fn opened(&self) -> bool {
        self.reader.lock().is_some()
    }

    /// Number of MIP levels, zero for broken files
    pub fn levels(&self) -> usize {
        self.meta.get().map_or(0, |m| m.specs.len())
    }

    /// Spec of one MIP level
    pub fn spec(&self, level: usize) -> Option<&ImageSpec> {
        self.meta.get().and_then(|m| m.specs.get(level))
    }

    /// Channel count shared by every level
    pub fn channels(&self) -> usize {
        self.meta.get().map_or(0, |m| m.specs[0].channels)
    }

    /// Texture kind declared by the header
    pub fn texformat(&self) -> TexFormat {
        self.meta.get().map_or(TexFormat::Plain, |m| m.texformat)
    }

    /// Wrap mode in s declared by the header
    pub fn swrap(&self) -> WrapMode {
        self.meta.get().map_or(WrapMode::Black, |m| m.swrap)
    }

    /// Wrap mode in t declared by the header
    pub fn twrap(&self) -> WrapMode {
        self.meta.get().map_or(WrapMode::Black, |m| m.twrap)
    }

    /// Cube-face packing, meaningful for cube-face environments
    pub fn cube_layout(&self) -> CubeLayout {
        self.meta.get().map_or(CubeLayout::NotCube, |m| m.cube_layout)
    }

    /// Orientation flag derived from the source encoder
    pub fn y_up(&self) -> bool {
        self.meta.get().is_some_and(|m| m.y_up)
    }

    /// `common_to_world * worldtocamera`, when the header carries one
    pub fn local_matrix(&self) -> Option<Mat4> {
        self.meta.get().and_then(|m| m.local_matrix)
    }

    /// `common_to_world * worldtoscreen`, when the header carries one
    pub fn projection_matrix(&self) -> Option<Mat4> {
        self.meta.get().and_then(|m| m.projection_matrix)
    }
}

impl Drop for TextureFile {
    fn drop(&mut self) {
        if let Some(mut reader) = self.reader.get_mut().take() {
            reader.close();
            self.shared.stats.decr_open_files();
        }
    }
}

impl std::fmt::Debug for TextureFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureFile")
            .field("path", &self.path)
            .field("broken", &self.broken())
            .field("levels", &self.levels())
            .finish_non_exhaustive()
    }
}
