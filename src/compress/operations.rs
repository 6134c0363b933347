//! File-level compression.
//!
//! Reads one source file, asks the backend for a smaller encoding when the
//! file is a JPEG or PNG, and writes whichever result is smaller to the
//! destination. Parent directories are created as needed.

use super::backend::{CompressBackend, CompressError, ImageKind, Quality};
use std::path::Path;

/// What happened to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressOutcome {
    /// Re-encoded and written; `after < before`.
    Compressed { before: u64, after: u64 },
    /// An image whose re-encoding was not smaller; original bytes written.
    Unchanged { size: u64 },
    /// Not a compressible image; copied verbatim.
    Copied { size: u64 },
}

impl CompressOutcome {
    pub fn bytes_in(&self) -> u64 {
        match *self {
            Self::Compressed { before, .. } => before,
            Self::Unchanged { size } | Self::Copied { size } => size,
        }
    }

    pub fn bytes_out(&self) -> u64 {
        match *self {
            Self::Compressed { after, .. } => after,
            Self::Unchanged { size } | Self::Copied { size } => size,
        }
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> CompressError {
    let path = path.to_path_buf();
    move |source| CompressError::Io { path, source }
}

/// Compress `source` into `dest`.
pub fn compress_file(
    backend: &impl CompressBackend,
    source: &Path,
    dest: &Path,
    quality: Quality,
) -> Result<CompressOutcome, CompressError> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(io_err(parent))?;
    }

    let Some(kind) = ImageKind::from_path(source) else {
        let size = std::fs::copy(source, dest).map_err(io_err(source))?;
        return Ok(CompressOutcome::Copied { size });
    };

    let original = std::fs::read(source).map_err(io_err(source))?;
    let recompressed = backend.recompress(&original, kind, quality)?;

    let before = original.len() as u64;
    let after = recompressed.len() as u64;
    if after < before {
        std::fs::write(dest, &recompressed).map_err(io_err(dest))?;
        Ok(CompressOutcome::Compressed { before, after })
    } else {
        std::fs::write(dest, &original).map_err(io_err(dest))?;
        Ok(CompressOutcome::Unchanged { size: before })
    }
}
