/// Common test utilities for CLI integration tests
use std::{
    fs,
    path::{Path, PathBuf},
};

use image::{Rgb, RgbImage};

pub fn find_model_path() -> Option<PathBuf> {
    let candidates = vec!["models/segmentation.onnx", "../models/segmentation.onnx"];
    candidates
        .into_iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .and_then(|p| p.canonicalize().ok())
}

/// Write small synthetic images named `names` into `dir`.
pub fn seed_images(dir: &Path, names: &[&str]) {
    fs::create_dir_all(dir).expect("create input dir");
    for (i, name) in names.iter().enumerate() {
        let img = RgbImage::from_fn(48, 36, |x, y| {
            Rgb([(x * 5) as u8, (y * 7) as u8, (i * 60) as u8])
        });
        img.save(dir.join(name)).expect("seed image");
    }
}

/// Macro to set up a scratch workspace with `input/` and `output/` directories.
///
/// Skips the test if the segmentation model is not available.
///
/// # Usage
///
/// ```ignore
/// let (model, temp_dir, input_dir, output_dir) = cli_test_setup!();
/// ```
#[macro_export]
macro_rules! cli_test_setup {
    () => {{
        let model = match $crate::common::find_model_path() {
            Some(p) => p,
            None => {
                eprintln!("Skipping test: model not found");
                return;
            }
        };

        let temp_dir = tempfile::TempDir::new().expect("create temp dir");
        let input_dir = temp_dir.path().join("input");
        let output_dir = temp_dir.path().join("output");
        std::fs::create_dir_all(&input_dir).expect("create input dir");

        (model, temp_dir, input_dir, output_dir)
    }};
}
