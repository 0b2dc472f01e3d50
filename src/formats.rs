//! Texture kinds, wrap modes, and cube layouts
//!
//! These enums mirror what texture headers declare. Name tables are part of
//! the on-disk contract: `textureformat` header strings and the
//! `get_texture_info` query results round-trip through them.

use serde::{Deserialize, Serialize};

/// The kind of texture a file holds, as declared by its header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TexFormat {
    /// Header carried no recognizable `textureformat`
    Unknown,
    /// Ordinary 2D color texture
    #[default]
    Plain,
    /// 3D volume texture
    Volume,
    Shadow,
    CubeFaceShadow,
    VolumeShadow,
    LatLongEnv,
    CubeFaceEnv,
}

impl TexFormat {
    /// The richer kind name, as written in `textureformat` headers
    pub fn format_name(&self) -> &'static str {
        match self {
            TexFormat::Unknown => "unknown",
            TexFormat::Plain => "Plain Texture",
            TexFormat::Volume => "Volume Texture",
            TexFormat::Shadow => "Shadow",
            TexFormat::CubeFaceShadow => "CubeFace Shadow",
            TexFormat::VolumeShadow => "Volume Shadow",
            TexFormat::LatLongEnv => "LatLong Environment",
            TexFormat::CubeFaceEnv => "CubeFace Environment",
        }
    }

    /// The coarse category name reported by `texturetype` queries
    pub fn type_name(&self) -> &'static str {
        match self {
            TexFormat::Unknown => "unknown",
            TexFormat::Plain => "Plain Texture",
            TexFormat::Volume => "Volume Texture",
            TexFormat::Shadow | TexFormat::CubeFaceShadow | TexFormat::VolumeShadow => "Shadow",
            TexFormat::LatLongEnv | TexFormat::CubeFaceEnv => "Environment",
        }
    }

    /// Parse a `textureformat` header string by exact name match
    pub fn from_name(name: &str) -> Option<Self> {
        const ALL: [TexFormat; 8] = [
            TexFormat::Unknown,
            TexFormat::Plain,
            TexFormat::Volume,
            TexFormat::Shadow,
            TexFormat::CubeFaceShadow,
            TexFormat::VolumeShadow,
            TexFormat::LatLongEnv,
            TexFormat::CubeFaceEnv,
        ];
        ALL.into_iter().find(|f| f.format_name() == name)
    }

    /// Whether this kind is an environment map
    pub fn is_environment(&self) -> bool {
        matches!(self, TexFormat::LatLongEnv | TexFormat::CubeFaceEnv)
    }

    /// Whether this kind is a shadow map
    pub fn is_shadow(&self) -> bool {
        matches!(
            self,
            TexFormat::Shadow | TexFormat::CubeFaceShadow | TexFormat::VolumeShadow
        )
    }
}

/// Policy for texture coordinates outside `[0, 1)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WrapMode {
    /// Defer to the file's declared wrap, then to `Black`
    #[default]
    Default,
    Black,
    Clamp,
    Periodic,
    Mirror,
}

impl WrapMode {
    /// The token written in `wrapmodes` headers
    pub fn name(&self) -> &'static str {
        match self {
            WrapMode::Default => "default",
            WrapMode::Black => "black",
            WrapMode::Clamp => "clamp",
            WrapMode::Periodic => "periodic",
            WrapMode::Mirror => "mirror",
        }
    }

    /// Parse one wrap token; unknown tokens map to `Default`
    pub fn from_name(name: &str) -> Self {
        match name {
            "default" => WrapMode::Default,
            "black" => WrapMode::Black,
            "clamp" => WrapMode::Clamp,
            "periodic" => WrapMode::Periodic,
            "mirror" => WrapMode::Mirror,
            _ => WrapMode::Default,
        }
    }

    /// Replace `Default` with the given fallback
    pub fn resolve(self, fallback: WrapMode) -> WrapMode {
        match self {
            WrapMode::Default => fallback,
            other => other,
        }
    }
}

/// Parse a `wrapmodes` header string into `(s, t)` wrap modes
///
/// The string splits at the first comma; with no comma the single token
/// applies to both directions.
pub fn parse_wrapmodes(wrapmodes: &str) -> (WrapMode, WrapMode) {
    match wrapmodes.split_once(',') {
        Some((s, t)) => (WrapMode::from_name(s), WrapMode::from_name(t)),
        None => {
            let both = WrapMode::from_name(wrapmodes);
            (both, both)
        }
    }
}

/// Format `(s, t)` wrap modes back into a `wrapmodes` header string
pub fn format_wrapmodes(swrap: WrapMode, twrap: WrapMode) -> String {
    format!("{},{}", swrap.name(), twrap.name())
}

/// Arrangement of the six cube faces within a single 2D image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CubeLayout {
    /// Not a cube-face image
    #[default]
    NotCube,
    /// Faces packed three across, two down
    ThreeByTwo,
    /// Faces stacked in a single column
    OneBySix,
    /// Cube-face image with an unrecognized packing
    Unknown,
}
