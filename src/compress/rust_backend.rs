//! Pure Rust compression backend built on the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode | `image::load_from_memory_with_format` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder::new_with_quality` |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (`CompressionType::Best`, adaptive filter) |

use super::backend::{CompressBackend, CompressError, ImageKind, Quality};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageFormat};

pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn image_format(kind: ImageKind) -> ImageFormat {
    match kind {
        ImageKind::Jpeg => ImageFormat::Jpeg,
        ImageKind::Png => ImageFormat::Png,
    }
}

impl CompressBackend for RustBackend {
    fn recompress(
        &self,
        data: &[u8],
        kind: ImageKind,
        quality: Quality,
    ) -> Result<Vec<u8>, CompressError> {
        let img = image::load_from_memory_with_format(data, image_format(kind)).map_err(|e| {
            CompressError::Decode {
                kind,
                reason: e.to_string(),
            }
        })?;

        let mut out = Vec::with_capacity(data.len());
        let encoded = match kind {
            ImageKind::Jpeg => {
                // JPEG has no alpha channel; grayscale stays grayscale.
                let img = if matches!(img, DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_)) {
                    img
                } else {
                    DynamicImage::ImageRgb8(img.to_rgb8())
                };
                img.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality.value()))
            }
            ImageKind::Png => img.write_with_encoder(PngEncoder::new_with_quality(
                &mut out,
                CompressionType::Best,
                FilterType::Adaptive,
            )),
        };
        encoded.map_err(|e| CompressError::Encode {
            kind,
            reason: e.to_string(),
        })?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageEncoder, RgbImage, RgbaImage};

    fn test_jpeg(width: u32, height: u32, quality: u8) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, quality)
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .unwrap();
        out
    }

    fn test_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, _| {
            image::Rgba([(x % 4) as u8 * 60, 10, 10, 255])
        });
        let mut out = Vec::new();
        PngEncoder::new_with_quality(&mut out, CompressionType::Fast, FilterType::NoFilter)
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
            .unwrap();
        out
    }

    #[test]
    fn recompressed_jpeg_decodes_with_same_dimensions() {
        let source = test_jpeg(64, 48, 100);
        let out = RustBackend::new()
            .recompress(&source, ImageKind::Jpeg, Quality::new(60))
            .unwrap();

        let decoded = image::load_from_memory_with_format(&out, ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
        assert!(out.len() < source.len());
    }

    #[test]
    fn recompressed_png_is_lossless() {
        let source = test_png(32, 32);
        let out = RustBackend::new()
            .recompress(&source, ImageKind::Png, Quality::default())
            .unwrap();

        let before = image::load_from_memory(&source).unwrap().to_rgba8();
        let after = image::load_from_memory(&out).unwrap().to_rgba8();
        assert_eq!(before, after);
    }

    #[test]
    fn garbage_input_is_a_decode_error() {
        let err = RustBackend::new()
            .recompress(b"not an image", ImageKind::Png, Quality::default())
            .unwrap_err();
        assert!(matches!(err, CompressError::Decode { kind: ImageKind::Png, .. }));
    }
}
