//! Compression backend trait and shared types.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend). Tests swap in a mock
//! that records calls, so the file-level decisions in
//! [`operations`](super::operations) can be exercised without encoding.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {kind} image: {reason}")]
    Decode { kind: ImageKind, reason: String },
    #[error("failed to encode {kind} image: {reason}")]
    Encode { kind: ImageKind, reason: String },
}

/// Raster formats the compressor re-encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    /// Detect from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }
}

impl std::fmt::Display for ImageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Jpeg => f.write_str("JPEG"),
            Self::Png => f.write_str("PNG"),
        }
    }
}

/// Quality setting for lossy encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Trait for compression backends.
pub trait CompressBackend: Sync {
    /// Re-encode an in-memory image. Returns the new bytes, which may be larger.
    fn recompress(
        &self,
        data: &[u8],
        kind: ImageKind,
        quality: Quality,
    ) -> Result<Vec<u8>, CompressError>;
}
