//! Tiled, MIP-mapped texture lookup engine
//!
//! This crate is the core of a shading-system texture cache: it locates
//! and opens texture files on demand, keeps a bounded in-memory cache of
//! decoded texel tiles, evicts least-valuable tiles and closes
//! least-recently-used files under budget pressure, and answers batched,
//! filtered channel lookups.
//!
//! # Architecture
//!
//! Three tightly coupled subsystems:
//! - [`FileRegistry`] — process-wide path → [`TextureFile`] map bounded by
//!   a maximum-open-files limit
//! - [`TileCache`] — `(file, level, tile origin)` → [`Tile`] map bounded
//!   by a memory limit
//! - [`TextureEngine`] — the batch entry points `texture` and
//!   `get_texture_info` composed over both
//!
//! Image decoding is external: the engine drives any decoder implementing
//! the [`ImageReader`] trait, constructed through a [`ReaderFactory`]
//! installed at engine creation.
//!
//! # Example
//!
//! ```rust,no_run
//! use texcache::{TextureEngine, TextureOptions, VaryingRef};
//!
//! let engine = TextureEngine::new();
//! engine.set_max_open_files(100);
//! engine.set_max_memory_mb(50);
//!
//! let mut options = TextureOptions::default();
//! options.n_channels = 3;
//!
//! let runflags = [true];
//! let (s, t) = ([0.5f32], [0.5f32]);
//! let mut result = [0.0f32; 3];
//! engine.texture(
//!     "albedo.tx",
//!     &mut options,
//!     &runflags,
//!     0,
//!     0,
//!     VaryingRef::varying(&s),
//!     VaryingRef::varying(&t),
//!     VaryingRef::Absent,
//!     VaryingRef::Absent,
//!     VaryingRef::Absent,
//!     VaryingRef::Absent,
//!     &mut result,
//! );
//! ```

pub mod cache;
pub mod engine;
pub mod error;
pub mod file;
pub mod formats;
pub mod imageio;
pub mod options;
pub mod registry;
pub mod state;
pub mod tile;
pub mod varying;

pub use cache::TileCache;
pub use engine::{InfoRequest, TextureEngine};
pub use error::{Result, TextureError};
pub use file::TextureFile;
pub use formats::{format_wrapmodes, parse_wrapmodes, CubeLayout, TexFormat, WrapMode};
pub use imageio::{
    AttrBaseType, AttrValue, Attribute, ImageReader, ImageSpec, PixelFormat, ReaderFactory,
    TileBuffer,
};
pub use options::TextureOptions;
pub use registry::FileRegistry;
pub use state::{CacheStats, DEFAULT_MAX_MEMORY_MB, DEFAULT_MAX_OPEN_FILES};
pub use tile::{Tile, TileId};
pub use varying::VaryingRef;
