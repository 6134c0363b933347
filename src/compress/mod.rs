//! Lossless-first asset compression, used for images, fonts and extras.
//!
//! | Input | Operation |
//! |---|---|
//! | **JPEG** | decode + re-encode at `images.jpeg_quality` |
//! | **PNG** | decode + re-encode with best deflate and adaptive filtering |
//! | anything else | copied byte for byte |
//!
//! A re-encoded file is only kept when it is strictly smaller than the
//! original, so running the compressor never grows a file.
//!
//! The module is split into:
//! - **Backend**: [`CompressBackend`] trait + [`RustBackend`]
//! - **Operations**: [`compress_file`], which decides what to do with one file

pub mod backend;
pub mod operations;
pub mod rust_backend;

pub use backend::{CompressBackend, CompressError, ImageKind, Quality};
pub use operations::{CompressOutcome, compress_file};
pub use rust_backend::RustBackend;
