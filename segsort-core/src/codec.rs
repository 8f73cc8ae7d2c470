//! Image decoding and in-place re-encoding.

use std::{
    fs,
    path::{Path, PathBuf},
};

use image::{DynamicImage, GenericImageView};
use log::debug;
use segsort_utils::{ImageFormatHint, encode_image, load_image, timing_guard};

use crate::error::{Result, TriageError};

/// Decode the image stored at `path`.
pub fn decode(path: &Path) -> Result<DynamicImage> {
    let _guard = timing_guard("segsort_core::decode", log::Level::Debug);
    let image = load_image(path).map_err(|e| TriageError::Decode {
        path: path.to_path_buf(),
        reason: format!("{e:#}"),
    })?;
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(TriageError::Decode {
            path: path.to_path_buf(),
            reason: "image has zero width or height".into(),
        });
    }
    Ok(image)
}

/// Encode `image` as `format` and write it to `path`, replacing any existing file.
///
/// Bytes go to a hidden sibling first and are renamed into place, so a failed encode or
/// write never leaves a truncated file at `path`.
pub fn encode(
    image: &DynamicImage,
    path: &Path,
    format: ImageFormatHint,
    jpeg_quality: u8,
) -> Result<()> {
    let _guard = timing_guard("segsort_core::encode", log::Level::Debug);
    let encode_err = |reason: String| TriageError::Encode {
        path: path.to_path_buf(),
        reason,
    };

    let bytes = encode_image(image, format, jpeg_quality).map_err(|e| encode_err(format!("{e:#}")))?;
    let staging = staging_path(path).ok_or_else(|| encode_err("path has no file name".into()))?;

    if let Err(err) = fs::write(&staging, &bytes) {
        let _ = fs::remove_file(&staging);
        return Err(encode_err(format!("write {}: {err}", staging.display())));
    }
    if let Err(err) = fs::rename(&staging, path) {
        let _ = fs::remove_file(&staging);
        return Err(encode_err(format!("replace: {err}")));
    }

    debug!("Wrote {} bytes ({:?}) to {}", bytes.len(), format, path.display());
    Ok(())
}

/// Encode using the format implied by the extension of `path`.
pub fn encode_in_place(image: &DynamicImage, path: &Path, jpeg_quality: u8) -> Result<()> {
    let format = ImageFormatHint::from_path(path).ok_or_else(|| TriageError::Encode {
        path: path.to_path_buf(),
        reason: "unsupported target format".into(),
    })?;
    encode(image, path, format, jpeg_quality)
}

fn staging_path(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_string_lossy();
    Some(path.with_file_name(format!(".{name}.segsort-partial")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use tempfile::tempdir;

    #[test]
    fn decode_reports_garbage_bytes() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("broken.png");
        fs::write(&path, b"definitely not a png").expect("write");

        let err = decode(&path).expect_err("garbage should not decode");
        assert!(matches!(err, TriageError::Decode { .. }));
        assert!(err.to_string().contains("broken.png"));
    }

    #[test]
    fn decode_reports_missing_file() {
        let err = decode(Path::new("no/such/image.jpg")).expect_err("missing file");
        assert!(matches!(err, TriageError::Decode { .. }));
    }

    #[test]
    fn encode_overwrites_existing_file_without_leftovers() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("shot.png");
        RgbImage::from_pixel(6, 6, Rgb([10, 200, 30]))
            .save(&path)
            .expect("seed file");

        let mask = DynamicImage::ImageLuma8(GrayImage::from_pixel(3, 2, Luma([255])));
        encode_in_place(&mask, &path, 90).expect("encode");

        let reloaded = decode(&path).expect("reload");
        assert_eq!(reloaded.dimensions(), (3, 2));
        assert!(reloaded.to_luma8().pixels().all(|p| p.0 == [255]));

        let entries: Vec<_> = fs::read_dir(dir.path()).expect("list").collect();
        assert_eq!(entries.len(), 1, "staging file must not survive");
    }

    #[test]
    fn encode_rejects_unknown_extension() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("notes.txt");
        fs::write(&path, b"keep me").expect("seed");

        let image = DynamicImage::ImageLuma8(GrayImage::new(2, 2));
        let err = encode_in_place(&image, &path, 90).expect_err("unsupported format");
        assert!(matches!(err, TriageError::Encode { .. }));
        assert_eq!(fs::read(&path).expect("read"), b"keep me");
    }
}
