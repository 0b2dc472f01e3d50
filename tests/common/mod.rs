//! In-memory image fixtures for integration tests
//!
//! Synthesizes tiled MIP pyramids served through the `ImageReader` trait so
//! tests can exercise the engine without touching disk or a real codec.

// Each integration binary compiles this module separately and uses a
// different subset of the helpers.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use texcache::{
    AttrValue, ImageReader, ImageSpec, ReaderFactory, Result, TextureError, TileBuffer,
};

/// One MIP level: a spec plus a full-resolution texel array
#[derive(Clone)]
pub struct MemoryLevel {
    pub spec: ImageSpec,
    /// Row-major, channel-interleaved texels for the whole level
    pub texels: Vec<f32>,
}

/// A complete synthetic texture file
#[derive(Clone)]
pub struct MemoryImage {
    pub levels: Vec<MemoryLevel>,
    pub format_name: String,
    /// When set, every tile read fails; the file still opens fine
    pub fail_tile_reads: bool,
}

impl MemoryImage {
    /// Single-level image where every texel holds `values`
    pub fn constant(
        width: i32,
        height: i32,
        tile_width: i32,
        tile_height: i32,
        values: &[f32],
    ) -> Self {
        let spec = ImageSpec::tiled_2d(width, height, tile_width, tile_height, values.len());
        let mut texels = Vec::with_capacity((width * height) as usize * values.len());
        for _ in 0..width * height {
            texels.extend_from_slice(values);
        }
        Self {
            levels: vec![MemoryLevel { spec, texels }],
            format_name: "memimage".to_string(),
            fail_tile_reads: false,
        }
    }

    /// Single-level image where texel `(x, y)` channel `c` holds
    /// `(y * width + x) * 10 + c`, so every value is unique
    pub fn gradient(
        width: i32,
        height: i32,
        tile_width: i32,
        tile_height: i32,
        channels: usize,
    ) -> Self {
        let spec = ImageSpec::tiled_2d(width, height, tile_width, tile_height, channels);
        let mut texels = Vec::with_capacity((width * height) as usize * channels);
        for p in 0..width * height {
            for c in 0..channels {
                texels.push((p * 10) as f32 + c as f32);
            }
        }
        Self {
            levels: vec![MemoryLevel { spec, texels }],
            format_name: "memimage".to_string(),
            fail_tile_reads: false,
        }
    }

    /// Full MIP pyramid down to 1x1, each level constant-filled with its
    /// level index
    pub fn pyramid(width: i32, height: i32, tile: i32, channels: usize) -> Self {
        let mut levels = Vec::new();
        let (mut w, mut h) = (width, height);
        let mut index = 0;
        loop {
            let spec = ImageSpec::tiled_2d(w, h, tile.min(w), tile.min(h), channels);
            let texels = vec![index as f32; (w * h) as usize * channels];
            levels.push(MemoryLevel { spec, texels });
            if w == 1 && h == 1 {
                break;
            }
            w = (w / 2).max(1);
            h = (h / 2).max(1);
            index += 1;
        }
        Self {
            levels,
            format_name: "memimage".to_string(),
            fail_tile_reads: false,
        }
    }

    /// Attach a header attribute to level 0
    pub fn with_attribute(mut self, name: &str, value: AttrValue) -> Self {
        self.levels[0].spec.add_attribute(name, value);
        self
    }

    /// Override the full (display-window) size, e.g. the face size of a
    /// packed cube map
    pub fn with_full_size(mut self, full_width: i32, full_height: i32) -> Self {
        self.levels[0].spec.full_width = full_width;
        self.levels[0].spec.full_height = full_height;
        self
    }

    /// Override the encoder name reported by `format_name`
    pub fn with_format_name(mut self, name: &str) -> Self {
        self.format_name = name.to_string();
        self
    }

    /// Make every tile read fail while the header stays readable
    pub fn with_failing_tiles(mut self) -> Self {
        self.fail_tile_reads = true;
        self
    }
}

/// Reader over a [`MemoryImage`]
pub struct MemoryReader {
    image: Arc<MemoryImage>,
    current: usize,
}

impl MemoryReader {
    pub fn new(image: Arc<MemoryImage>) -> Self {
        Self { image, current: 0 }
    }
}

impl ImageReader for MemoryReader {
    fn spec(&self) -> &ImageSpec {
        &self.image.levels[self.current].spec
    }

    fn seek_subimage(&mut self, level: usize) -> Result<()> {
        if level < self.image.levels.len() {
            self.current = level;
            Ok(())
        } else {
            Err(TextureError::invalid_data(format!(
                "no subimage {level}"
            )))
        }
    }

    fn current_subimage(&self) -> usize {
        self.current
    }

    fn read_tile(&mut self, x: i32, y: i32, _z: i32, dst: TileBuffer<'_>) -> Result<()> {
        if self.image.fail_tile_reads {
            return Err(TextureError::read_error("injected tile failure"));
        }
        let level = &self.image.levels[self.current];
        let spec = &level.spec;
        if x % spec.tile_width != 0 || y % spec.tile_height != 0 {
            return Err(TextureError::read_error("unaligned tile origin"));
        }
        if x < 0 || x >= spec.width || y < 0 || y >= spec.height {
            return Err(TextureError::read_error("tile origin out of range"));
        }
        let TileBuffer::Float32(dst) = dst else {
            return Err(TextureError::read_error("unsupported pixel format"));
        };
        let channels = spec.channels;
        for ty in 0..spec.tile_height {
            for tx in 0..spec.tile_width {
                let out = ((ty * spec.tile_width + tx) as usize) * channels;
                let (px, py) = (x + tx, y + ty);
                if px < spec.width && py < spec.height {
                    let src = ((py * spec.width + px) as usize) * channels;
                    dst[out..out + channels].copy_from_slice(&level.texels[src..src + channels]);
                } else {
                    dst[out..out + channels].fill(0.0);
                }
            }
        }
        Ok(())
    }

    fn close(&mut self) {}

    fn format_name(&self) -> &str {
        &self.image.format_name
    }
}

/// Build a reader factory over a named set of images
pub fn factory(images: HashMap<String, Arc<MemoryImage>>) -> Arc<ReaderFactory> {
    Arc::new(move |path: &str, _search: &str| {
        images
            .get(path)
            .map(|image| Box::new(MemoryReader::new(image.clone())) as Box<dyn ImageReader>)
    })
}

/// Factory serving a single image under the given path
pub fn single_factory(path: &str, image: MemoryImage) -> Arc<ReaderFactory> {
    let mut images = HashMap::new();
    images.insert(path.to_string(), Arc::new(image));
    factory(images)
}
