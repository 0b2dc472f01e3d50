//! Error types for texture lookup and caching

use thiserror::Error;

/// Result type for texture cache operations
pub type Result<T> = std::result::Result<T, TextureError>;

/// Errors that can occur while opening, reading, or querying textures
#[derive(Error, Debug)]
pub enum TextureError {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No reader could be constructed for the path
    #[error("Texture file not found: {0}")]
    FileNotFound(String),

    /// A previous open attempt failed; the file is latched broken
    #[error("Texture file is broken: {0}")]
    FileBroken(String),

    /// A tile read failed (non-latching, per-tile)
    #[error("Tile read failed: {0}")]
    ReadError(String),

    /// Header attribute not present in the file
    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    /// Attribute present but with a different type or arity
    #[error("Attribute type mismatch: {0}")]
    TypeMismatch(String),

    /// Malformed or inconsistent file contents
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl TextureError {
    /// Create a new file-not-found error
    pub fn file_not_found<S: Into<String>>(path: S) -> Self {
        Self::FileNotFound(path.into())
    }

    /// Create a new broken-file error
    pub fn file_broken<S: Into<String>>(path: S) -> Self {
        Self::FileBroken(path.into())
    }

    /// Create a new tile read error
    pub fn read_error<S: Into<String>>(msg: S) -> Self {
        Self::ReadError(msg.into())
    }

    /// Create a new unknown-attribute error
    pub fn unknown_attribute<S: Into<String>>(name: S) -> Self {
        Self::UnknownAttribute(name.into())
    }

    /// Create a new type-mismatch error
    pub fn type_mismatch<S: Into<String>>(msg: S) -> Self {
        Self::TypeMismatch(msg.into())
    }

    /// Create a new invalid-data error
    pub fn invalid_data<S: Into<String>>(msg: S) -> Self {
        Self::InvalidData(msg.into())
    }

    /// Check if this error is latched on the file (sticky)
    ///
    /// Broken-file status never clears; per-tile read errors do not
    /// poison the file and may succeed on another tile.
    pub fn is_latched(&self) -> bool {
        matches!(self, TextureError::FileBroken(_))
    }
}
