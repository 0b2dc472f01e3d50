//! The lookup engine: batch entry points over the file and tile caches
//!
//! `texture` is the hot path. The division of labor is deliberate:
//! anything constant across a batch (file resolution, wrap defaulting,
//! channel clamping, fill pre-passes) happens once in `texture`; anything
//! varying per sample happens in `sample`.

use std::sync::Arc;

use glam::Mat4;
use tracing::debug;

use crate::cache::TileCache;
use crate::file::TextureFile;
use crate::formats::WrapMode;
use crate::imageio::{AttrValue, ImageSpec, ReaderFactory};
use crate::options::TextureOptions;
use crate::registry::FileRegistry;
use crate::state::{CacheStats, SharedState};
use crate::tile::TileId;
use crate::varying::VaryingRef;

/// A typed destination for one `get_texture_info` query
///
/// The variant selects the expected base type and the buffer length the
/// expected arity; a mismatch makes the query return `false`.
pub enum InfoRequest<'a> {
    Ints(&'a mut [i32]),
    Floats(&'a mut [f32]),
    Str(&'a mut String),
    Matrix(&'a mut Mat4),
}

/// Tiled, MIP-mapped texture lookup engine
///
/// Owns the file registry and tile cache; safe to share across threads.
pub struct TextureEngine {
    shared: Arc<SharedState>,
    files: FileRegistry,
    tiles: TileCache,
}

impl TextureEngine {
    /// Create an engine with no codec wired in
    ///
    /// Every file requested from such an engine latches broken, so lookups
    /// produce fill values. Install a real decoder with
    /// [`TextureEngine::with_reader_factory`].
    pub fn new() -> Self {
        Self::with_reader_factory(Arc::new(|_: &str, _: &str| None))
    }

    /// Create an engine that opens files through `factory`
    pub fn with_reader_factory(factory: Arc<ReaderFactory>) -> Self {
        let shared = SharedState::new(factory);
        Self {
            files: FileRegistry::new(shared.clone()),
            tiles: TileCache::new(shared.clone()),
            shared,
        }
    }

    /// Replace the reader factory used for subsequent opens
    pub fn set_reader_factory(&self, factory: Arc<ReaderFactory>) {
        self.shared.config.write().reader_factory = factory;
    }

    /// Set the soft ceiling on simultaneously open file handles
    pub fn set_max_open_files(&self, n: usize) {
        self.shared.config.write().max_open_files = n;
    }

    /// Set the tile memory budget in megabytes
    pub fn set_max_memory_mb(&self, mb: usize) {
        self.set_max_memory_bytes((mb as u64) << 20);
    }

    /// Set the tile memory budget in bytes
    pub fn set_max_memory_bytes(&self, bytes: u64) {
        self.shared.config.write().max_memory_bytes = bytes;
    }

    /// Set the search path handed to the reader factory
    pub fn set_search_path(&self, path: impl Into<String>) {
        self.shared.config.write().search_path = path.into();
    }

    /// Set the world-space baseline composed into header matrices
    ///
    /// Takes effect for files opened afterwards.
    pub fn set_common_to_world(&self, matrix: Mat4) {
        self.shared.config.write().common_to_world = matrix;
    }

    /// Snapshot of cache counters
    pub fn stats(&self) -> CacheStats {
        self.shared.stats.snapshot()
    }

    /// The path → file registry
    pub fn file_registry(&self) -> &FileRegistry {
        &self.files
    }

    /// The tile cache
    pub fn tile_cache(&self) -> &TileCache {
        &self.tiles
    }

    /// Filtered-lookup batch entry point
    ///
    /// For each `i` in `[first, last]` with `runflags[i]` set, fills
    /// `result[i * n_channels ..][.. n_channels]` (and `options.alpha[i]`
    /// when supplied). Never fails: missing or broken files produce the
    /// fill value, per-sample errors produce the documented sentinels.
    #[allow(clippy::too_many_arguments)]
    pub fn texture(
        &self,
        path: &str,
        options: &mut TextureOptions<'_>,
        runflags: &[bool],
        first: usize,
        last: usize,
        s: VaryingRef<'_, f32>,
        t: VaryingRef<'_, f32>,
        dsdx: VaryingRef<'_, f32>,
        dtdx: VaryingRef<'_, f32>,
        dsdy: VaryingRef<'_, f32>,
        dtdy: VaryingRef<'_, f32>,
        result: &mut [f32],
    ) {
        let file = self.files.find(path);
        let n = options.n_channels;

        if file.broken() || file.metadata().is_none() {
            debug!(path, "texture lookup on missing or broken file");
            let mut alpha = options.alpha.take();
            for i in first..=last {
                if !runflags[i] {
                    continue;
                }
                let fill = options.fill.get_or(i, 0.0);
                result[i * n..(i + 1) * n].fill(fill);
                if let Some(a) = alpha.as_deref_mut() {
                    a[i] = fill;
                }
            }
            options.alpha = alpha;
            return;
        }

        // Options that said "defer to the file" resolve here; a file that
        // itself declared default falls back to black.
        options.swrap = options.swrap.resolve(file.swrap()).resolve(WrapMode::Black);
        options.twrap = options.twrap.resolve(file.twrap()).resolve(WrapMode::Black);

        let channels = file.channels();
        options.actual_channels = channels.saturating_sub(options.first_channel).min(n);

        let mut alpha = options.alpha.take();

        // Channels the file cannot supply get the fill value up front.
        if options.actual_channels < n {
            for i in first..=last {
                if !runflags[i] {
                    continue;
                }
                let fill = options.fill.get_or(i, 0.0);
                result[i * n + options.actual_channels..(i + 1) * n].fill(fill);
            }
        }

        // Same for a requested alpha slot the file does not contain; the
        // per-sample loop then skips alpha entirely.
        if alpha.is_some() && options.first_channel + options.actual_channels >= channels {
            if let Some(a) = alpha.as_deref_mut() {
                for i in first..=last {
                    if runflags[i] {
                        a[i] = options.fill.get_or(i, 0.0);
                    }
                }
            }
            alpha = None;
        }

        // Every requested channel was beyond the file.
        if options.actual_channels < 1 {
            options.alpha = alpha;
            return;
        }

        for i in first..=last {
            if !runflags[i] {
                continue;
            }
            let out = &mut result[i * n..(i + 1) * n];
            self.sample(&file, options, i, s, t, dsdx, dtdx, dsdy, dtdy, &mut alpha, out);
        }
        options.alpha = alpha;
    }

    /// One texture lookup: nearest texel of the finest level, no wrap
    ///
    /// Sentinel contract: out-of-range coordinates write `1.0` to slot 0,
    /// a tile that failed to decode writes `0.5` to slot 0; both return
    /// without touching other channels.
    #[allow(clippy::too_many_arguments)]
    fn sample(
        &self,
        file: &Arc<TextureFile>,
        options: &TextureOptions<'_>,
        index: usize,
        s: VaryingRef<'_, f32>,
        t: VaryingRef<'_, f32>,
        dsdx: VaryingRef<'_, f32>,
        dtdx: VaryingRef<'_, f32>,
        dsdy: VaryingRef<'_, f32>,
        dtdy: VaryingRef<'_, f32>,
        alpha: &mut Option<&mut [f32]>,
        result: &mut [f32],
    ) {
        // Filter footprints are part of the sampling interface; the
        // nearest-texel baseline computes them without consuming them.
        let _ds_dx = if dsdx.is_absent() {
            0.0
        } else {
            dsdx[index] * options.swidth[index] + options.sblur[index]
        };
        let _dt_dx = if dtdx.is_absent() {
            0.0
        } else {
            dtdx[index] * options.twidth[index] + options.tblur[index]
        };
        let _ds_dy = if dsdy.is_absent() {
            0.0
        } else {
            dsdy[index] * options.swidth[index] + options.sblur[index]
        };
        let _dt_dy = if dtdy.is_absent() {
            0.0
        } else {
            dtdy[index] * options.twidth[index] + options.tblur[index]
        };

        let level = 0;
        let Some(spec) = file.spec(level) else {
            return;
        };

        // As passed in, (s, t) map the texture to [0, 1); scaling to texel
        // space and offsetting by half puts integer coordinates on texel
        // centers.
        let u = s[index] * spec.width as f32 - 0.5;
        let v = t[index] * spec.height as f32 - 0.5;
        let (sint, _sfrac) = floorfrac(u);
        let (tint, _tfrac) = floorfrac(v);

        // Wrap is not applied at this level; out-of-range lookups fall
        // through with the sentinel.
        if sint < 0 || sint >= spec.width || tint < 0 || tint >= spec.height {
            result[0] = 1.0;
            return;
        }

        // Tile dimensions are powers of two, a precondition of the format.
        let tile_s = sint & (spec.tile_width - 1);
        let tile_t = tint & (spec.tile_height - 1);
        let id = TileId::new(file.clone(), level, sint - tile_s, tint - tile_t, 0);
        let tile = self.tiles.find(&id);
        if !tile.valid() {
            result[0] = 0.5;
            return;
        }

        let offset =
            ((tile_t * spec.tile_width + tile_s) as usize) * spec.channels + options.first_channel;
        let data = &tile.data()[offset..];
        result[..options.actual_channels].copy_from_slice(&data[..options.actual_channels]);
        if let Some(a) = alpha.as_deref_mut() {
            a[index] = data[options.actual_channels];
        }
    }

    /// Query file metadata by name into a typed buffer
    ///
    /// Recognized keys: `resolution` (two ints), `texturetype` (string),
    /// `textureformat` (string), `channels` (one int or one float). Any
    /// other key searches the raw header attributes: an exact type and
    /// arity match copies the value; float data requested as ints narrows
    /// element-wise. Returns `false` on unknown file, broken file, or
    /// type/arity mismatch.
    pub fn get_texture_info(&self, path: &str, key: &str, out: &mut InfoRequest<'_>) -> bool {
        let file = self.files.find(path);
        if file.broken() {
            debug!(path, key, "texture info query on missing or broken file");
            return false;
        }
        let Some(spec) = file.spec(0) else {
            return false;
        };

        if key == "resolution" {
            if let InfoRequest::Ints(buf) = &mut *out {
                if buf.len() == 2 {
                    buf[0] = spec.width;
                    buf[1] = spec.height;
                    return true;
                }
            }
        }
        if key == "texturetype" {
            if let InfoRequest::Str(buf) = &mut *out {
                **buf = file.texformat().type_name().to_string();
                return true;
            }
        }
        if key == "textureformat" {
            if let InfoRequest::Str(buf) = &mut *out {
                **buf = file.texformat().format_name().to_string();
                return true;
            }
        }
        if key == "channels" {
            match &mut *out {
                InfoRequest::Ints(buf) if buf.len() == 1 => {
                    buf[0] = spec.channels as i32;
                    return true;
                }
                InfoRequest::Floats(buf) if buf.len() == 1 => {
                    buf[0] = spec.channels as f32;
                    return true;
                }
                _ => {}
            }
        }

        // A recognized key with the wrong shape falls through to the raw
        // attribute search, like any other name.
        Self::attribute_info(spec, key, out)
    }

    /// Generic header-attribute lookup backing `get_texture_info`
    fn attribute_info(spec: &ImageSpec, key: &str, out: &mut InfoRequest<'_>) -> bool {
        let Some(attr) = spec.find_attribute(key) else {
            debug!(key, "unknown texture attribute");
            return false;
        };
        match (&attr.value, out) {
            (AttrValue::Int(v), InfoRequest::Ints(buf)) if v.len() == buf.len() => {
                buf.copy_from_slice(v);
                true
            }
            (AttrValue::Float(v), InfoRequest::Floats(buf)) if v.len() == buf.len() => {
                buf.copy_from_slice(v);
                true
            }
            (AttrValue::Str(v), InfoRequest::Str(buf)) => {
                **buf = v.clone();
                true
            }
            (AttrValue::Matrix(m), InfoRequest::Matrix(buf)) => {
                **buf = *m;
                true
            }
            // Data stored as float narrows element-wise when ints are
            // requested.
            (AttrValue::Float(v), InfoRequest::Ints(buf)) if v.len() == buf.len() => {
                for (dst, src) in buf.iter_mut().zip(v) {
                    *dst = *src as i32;
                }
                true
            }
            _ => {
                debug!(key, "texture attribute type or arity mismatch");
                false
            }
        }
    }
}

impl Default for TextureEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Split into integer floor and fractional remainder
///
/// Floor truncates toward negative infinity, so `floorfrac(-0.3)` is
/// `(-1, 0.7)`.
fn floorfrac(x: f32) -> (i32, f32) {
    let f = x.floor();
    (f as i32, x - f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floorfrac_negative() {
        let (i, f) = floorfrac(-0.3);
        assert_eq!(i, -1);
        assert!((f - 0.7).abs() < 1e-6);
        let (i, f) = floorfrac(2.25);
        assert_eq!(i, 2);
        assert!((f - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_missing_file_fills_output() {
        let engine = TextureEngine::new();
        let mut options = TextureOptions {
            n_channels: 4,
            fill: VaryingRef::uniform(0.125),
            ..Default::default()
        };
        let runflags = [true, true];
        let s = [0.5f32, 0.5];
        let t = [0.5f32, 0.5];
        let mut result = [9.0f32; 8];

        engine.texture(
            "nope.tx",
            &mut options,
            &runflags,
            0,
            1,
            VaryingRef::varying(&s),
            VaryingRef::varying(&t),
            VaryingRef::Absent,
            VaryingRef::Absent,
            VaryingRef::Absent,
            VaryingRef::Absent,
            &mut result,
        );

        assert_eq!(result, [0.125f32; 8]);
    }

    #[test]
    fn test_missing_file_skips_disabled_samples() {
        let engine = TextureEngine::new();
        let mut options = TextureOptions {
            n_channels: 2,
            fill: VaryingRef::uniform(0.25),
            ..Default::default()
        };
        let runflags = [true, false, true];
        let s = [0.5f32; 3];
        let mut result = [9.0f32; 6];

        engine.texture(
            "nope.tx",
            &mut options,
            &runflags,
            0,
            2,
            VaryingRef::varying(&s),
            VaryingRef::varying(&s),
            VaryingRef::Absent,
            VaryingRef::Absent,
            VaryingRef::Absent,
            VaryingRef::Absent,
            &mut result,
        );

        assert_eq!(result, [0.25, 0.25, 9.0, 9.0, 0.25, 0.25]);
    }

    #[test]
    fn test_info_on_missing_file_fails() {
        let engine = TextureEngine::new();
        let mut resolution = [0i32; 2];
        assert!(!engine.get_texture_info(
            "nope.tx",
            "resolution",
            &mut InfoRequest::Ints(&mut resolution)
        ));
    }
}
