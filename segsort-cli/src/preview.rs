//! Preview images for the current file.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use segsort_core::SegmentationView;

/// Files written for one view.
#[derive(Debug)]
pub struct PreviewPaths {
    pub mask: PathBuf,
    pub thumbnail: PathBuf,
}

/// Write `mask.png` and `thumbnail.png` for `view` into `dir`, replacing the previous pair.
pub fn write_preview(view: &SegmentationView, dir: &Path) -> Result<PreviewPaths> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create preview directory {}", dir.display()))?;

    let mask = dir.join("mask.png");
    view.mask_image()
        .save(&mask)
        .with_context(|| format!("failed to write {}", mask.display()))?;

    let thumbnail = dir.join("thumbnail.png");
    view.thumbnail
        .save(&thumbnail)
        .with_context(|| format!("failed to write {}", thumbnail.display()))?;

    Ok(PreviewPaths { mask, thumbnail })
}

/// Remove a stale preview pair so nothing outlives the file it was made for.
pub fn clear_preview(dir: &Path) {
    for name in ["mask.png", "thumbnail.png"] {
        let _ = fs::remove_file(dir.join(name));
    }
}
