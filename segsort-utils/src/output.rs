//! Encoding helpers for writing processed images back to disk.
//!
//! Encoding happens fully in memory so callers can decide how the bytes reach the
//! filesystem (the triage session writes them through a temporary sibling file).

use std::{io::Cursor, path::Path};

use anyhow::{Context, Result};
use image::{
    DynamicImage, ImageEncoder,
    codecs::{
        bmp::BmpEncoder, jpeg::JpegEncoder, png::PngEncoder, tiff::TiffEncoder,
        webp::WebPEncoder,
    },
};
use log::debug;

/// Image formats the write-back path can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormatHint {
    #[default]
    Png,
    Jpeg,
    Webp,
    Bmp,
    Tiff,
}

impl ImageFormatHint {
    /// Determine format from a filesystem extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        ext.parse().ok()
    }

    /// Determine format from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

impl std::str::FromStr for ImageFormatHint {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::Webp),
            "bmp" => Ok(Self::Bmp),
            "tif" | "tiff" => Ok(Self::Tiff),
            other => Err(format!("unknown image format '{other}'")),
        }
    }
}

/// Encode `image` into `format`, keeping its color type where the format allows it.
///
/// JPEG has no alpha channel, so images with alpha are flattened to RGB first.
pub fn encode_image(image: &DynamicImage, format: ImageFormatHint, jpeg_quality: u8) -> Result<Vec<u8>> {
    debug!(
        "Encoding {}x{} {:?} image as {:?}",
        image.width(),
        image.height(),
        image.color(),
        format
    );
    let mut buffer = Vec::new();
    match format {
        ImageFormatHint::Png => image
            .write_with_encoder(PngEncoder::new(&mut buffer))
            .context("failed to encode PNG")?,
        ImageFormatHint::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buffer, jpeg_quality.clamp(1, 100));
            if image.color().has_alpha() {
                let rgb = image.to_rgb8();
                encoder
                    .write_image(
                        rgb.as_raw(),
                        rgb.width(),
                        rgb.height(),
                        image::ExtendedColorType::Rgb8,
                    )
                    .context("failed to encode JPEG")?;
            } else {
                image
                    .write_with_encoder(encoder)
                    .context("failed to encode JPEG")?;
            }
        }
        ImageFormatHint::Webp => image
            .write_with_encoder(WebPEncoder::new_lossless(&mut buffer))
            .context("failed to encode WebP")?,
        ImageFormatHint::Bmp => image
            .write_with_encoder(BmpEncoder::new(&mut buffer))
            .context("failed to encode BMP")?,
        ImageFormatHint::Tiff => {
            let mut cursor = Cursor::new(&mut buffer);
            image
                .write_with_encoder(TiffEncoder::new(&mut cursor))
                .context("failed to encode TIFF")?;
        }
    }
    Ok(buffer)
}
