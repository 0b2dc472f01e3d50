//! Image reader interface consumed by the cache
//!
//! The cache never decodes image formats itself. It drives an external
//! decoder through the narrow [`ImageReader`] trait: one opened reader per
//! file, positioned on a subimage (MIP level), serving whole tiles. Readers
//! are constructed by a [`ReaderFactory`] installed on the engine, which is
//! where an actual codec library gets wired in.

use glam::Mat4;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Canonical pixel element types a tile can be requested in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// One byte per channel
    UInt8,
    /// One IEEE float per channel (the cache's canonical format)
    #[default]
    Float32,
}

impl PixelFormat {
    /// Size of one element in bytes
    pub fn size(&self) -> usize {
        match self {
            PixelFormat::UInt8 => 1,
            PixelFormat::Float32 => 4,
        }
    }
}

/// Destination buffer for a tile read, typed by pixel format
///
/// The cache always requests [`TileBuffer::Float32`] today; the 8-bit arm
/// exists so readers can serve a native-precision fast path later without
/// an interface change.
pub enum TileBuffer<'a> {
    Float32(&'a mut [f32]),
    UInt8(&'a mut [u8]),
}

impl TileBuffer<'_> {
    /// Pixel format this buffer expects
    pub fn pixel_format(&self) -> PixelFormat {
        match self {
            TileBuffer::Float32(_) => PixelFormat::Float32,
            TileBuffer::UInt8(_) => PixelFormat::UInt8,
        }
    }

    /// Number of elements the buffer holds
    pub fn len(&self) -> usize {
        match self {
            TileBuffer::Float32(b) => b.len(),
            TileBuffer::UInt8(b) => b.len(),
        }
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Base type of a header attribute value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttrBaseType {
    Int,
    Float,
    Str,
    Matrix,
}

/// A header attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Int(Vec<i32>),
    Float(Vec<f32>),
    Str(String),
    Matrix(Mat4),
}

impl AttrValue {
    /// Base type of the stored value
    pub fn base_type(&self) -> AttrBaseType {
        match self {
            AttrValue::Int(_) => AttrBaseType::Int,
            AttrValue::Float(_) => AttrBaseType::Float,
            AttrValue::Str(_) => AttrBaseType::Str,
            AttrValue::Matrix(_) => AttrBaseType::Matrix,
        }
    }

    /// Number of elements of the base type
    pub fn value_count(&self) -> usize {
        match self {
            AttrValue::Int(v) => v.len(),
            AttrValue::Float(v) => v.len(),
            AttrValue::Str(_) => 1,
            AttrValue::Matrix(_) => 1,
        }
    }
}

/// A named header attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: AttrValue,
}

impl Attribute {
    /// Create a new attribute
    pub fn new(name: impl Into<String>, value: AttrValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Geometry and layout of one subimage (MIP level)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSpec {
    pub width: i32,
    pub height: i32,
    pub depth: i32,
    /// Resolution of one face/frame when the image packs several
    pub full_width: i32,
    pub full_height: i32,
    pub tile_width: i32,
    pub tile_height: i32,
    pub tile_depth: i32,
    pub channels: usize,
    pub pixel_format: PixelFormat,
    pub attributes: Vec<Attribute>,
}

impl ImageSpec {
    /// Create a spec for a tiled 2D image with no extra attributes
    pub fn tiled_2d(
        width: i32,
        height: i32,
        tile_width: i32,
        tile_height: i32,
        channels: usize,
    ) -> Self {
        Self {
            width,
            height,
            depth: 1,
            full_width: width,
            full_height: height,
            tile_width,
            tile_height,
            tile_depth: 1,
            channels,
            pixel_format: PixelFormat::Float32,
            attributes: Vec::new(),
        }
    }

    /// Number of pixels in one tile
    pub fn tile_pixels(&self) -> usize {
        (self.tile_width as usize) * (self.tile_height as usize) * (self.tile_depth as usize)
    }

    /// Number of elements (pixels times channels) in one tile
    pub fn tile_elements(&self) -> usize {
        self.tile_pixels() * self.channels
    }

    /// Look up a header attribute by name
    pub fn find_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Add a header attribute
    pub fn add_attribute(&mut self, name: impl Into<String>, value: AttrValue) {
        self.attributes.push(Attribute::new(name, value));
    }
}

/// An opened, seekable image file serving whole tiles
///
/// A reader is always positioned on one subimage; `read_tile` addresses
/// tiles of that subimage by their upper-left pixel corner, which must be
/// tile-aligned.
pub trait ImageReader: Send {
    /// Spec of the current subimage
    fn spec(&self) -> &ImageSpec;

    /// Position the reader on a subimage (MIP level)
    fn seek_subimage(&mut self, level: usize) -> Result<()>;

    /// Index of the current subimage
    fn current_subimage(&self) -> usize;

    /// Read the tile whose upper-left corner is `(x, y, z)` into `dst`
    fn read_tile(&mut self, x: i32, y: i32, z: i32, dst: TileBuffer<'_>) -> Result<()>;

    /// Release any resources held open; the reader is dead afterwards
    fn close(&mut self);

    /// Name of the encoding format, e.g. `"openexr"`
    fn format_name(&self) -> &str;
}

/// Constructor for readers: `(path, search_path) -> opened reader`
///
/// Returns `None` when no decoder recognizes the path; the owning file is
/// then latched broken. The engine ships with a factory that always returns
/// `None` — wiring in a real codec happens at engine construction.
pub type ReaderFactory = dyn Fn(&str, &str) -> Option<Box<dyn ImageReader>> + Send + Sync;
