//! Mask derivation from raw segmentation output.
//!
//! The pipeline runs in two thresholding stages:
//!
//! 1. [`low_res_mask`] marks every pixel of the inference grid whose foreground probability is
//!    strictly above the threshold. The resulting composite keeps the original resampled color
//!    for every other pixel.
//! 2. [`upscale_and_binarize`] upsamples a low-resolution raster with smooth filtering to the
//!    display size and re-binarizes it: only pixels that are exactly pure white survive, every
//!    blended edge pixel becomes background.
//!
//! Stage 2 runs on the low-resolution coverage raster (kept = white, everything else black)
//! rather than on the composite, so a background pixel that happens to be white in the source
//! image cannot be mistaken for foreground.

use image::{GrayImage, Luma, Rgb, RgbImage, imageops::{self, FilterType}};
use segsort_utils::config::MaskSettings;

use crate::error::{Result, TriageError};
use crate::model::{InferenceOutput, VALUES_PER_PIXEL};
use crate::preprocess::InputSize;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// Thresholding and display geometry for mask postprocessing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostprocessConfig {
    /// Probabilities strictly greater than this are foreground.
    pub threshold: f32,
    /// Display mask resolution.
    pub display_size: (u32, u32),
    /// Reference thumbnail resolution.
    pub thumbnail_size: (u32, u32),
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            display_size: (400, 400),
            thumbnail_size: (200, 200),
        }
    }
}

impl From<&MaskSettings> for PostprocessConfig {
    fn from(settings: &MaskSettings) -> Self {
        Self {
            threshold: settings.threshold,
            display_size: (settings.display_width, settings.display_height),
            thumbnail_size: (settings.thumbnail_width, settings.thumbnail_height),
        }
    }
}

/// Per-pixel foreground likelihood at inference resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityMap {
    values: Vec<f32>,
    width: u32,
    height: u32,
}

impl ProbabilityMap {
    /// Grid width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major foreground probabilities.
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Probability at `(x, y)`, or `None` outside the grid.
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.values.get((y * self.width + x) as usize).copied()
    }
}

/// Take elements `0, 2, 4, ...` of `values`.
///
/// Pure strided selection: the result has `values.len() / 2` elements and element `k` equals
/// `values[2k]`. Odd-length input is rejected.
pub fn deinterleave(values: &[f32]) -> Result<Vec<f32>> {
    if values.len() % VALUES_PER_PIXEL != 0 {
        return Err(TriageError::Inference(format!(
            "output length {} is not a multiple of {VALUES_PER_PIXEL}",
            values.len()
        )));
    }
    Ok(values.iter().step_by(VALUES_PER_PIXEL).copied().collect())
}

/// Deinterleave the network output into a probability map over the `grid` resolution.
pub fn extract_foreground(output: &InferenceOutput, grid: InputSize) -> Result<ProbabilityMap> {
    let values = deinterleave(output.as_slice())?;
    if values.len() != grid.pixel_count() {
        return Err(TriageError::Inference(format!(
            "output covers {} pixels, expected {}x{}",
            values.len(),
            grid.width,
            grid.height
        )));
    }
    Ok(ProbabilityMap {
        values,
        width: grid.width,
        height: grid.height,
    })
}

/// Result of the first thresholding stage.
#[derive(Debug, Clone)]
pub struct LowResMask {
    composite: RgbImage,
    coverage: RgbImage,
    kept: usize,
}

impl LowResMask {
    /// Resampled source with every kept pixel overwritten by pure white.
    ///
    /// For display only; the upsampling stage reads [`LowResMask::coverage`].
    pub fn composite(&self) -> &RgbImage {
        &self.composite
    }

    /// Pure white where kept, pure black elsewhere.
    pub fn coverage(&self) -> &RgbImage {
        &self.coverage
    }

    /// Number of kept pixels.
    pub fn kept_count(&self) -> usize {
        self.kept
    }
}

/// Stage one: mark pixels with probability strictly greater than `threshold`.
pub fn low_res_mask(
    resized: &RgbImage,
    probabilities: &ProbabilityMap,
    threshold: f32,
) -> Result<LowResMask> {
    if resized.dimensions() != (probabilities.width, probabilities.height) {
        return Err(TriageError::Inference(format!(
            "probability map is {}x{} but the resampled image is {}x{}",
            probabilities.width,
            probabilities.height,
            resized.width(),
            resized.height()
        )));
    }

    let mut composite = resized.clone();
    let mut coverage = RgbImage::from_pixel(resized.width(), resized.height(), BLACK);
    let mut kept = 0;
    for ((pixel, cover), &p) in composite
        .pixels_mut()
        .zip(coverage.pixels_mut())
        .zip(&probabilities.values)
    {
        if p > threshold {
            *pixel = WHITE;
            *cover = WHITE;
            kept += 1;
        }
    }

    Ok(LowResMask {
        composite,
        coverage,
        kept,
    })
}

/// Crisp foreground mask at display resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayMask {
    kept: Vec<bool>,
    width: u32,
    height: u32,
}

impl DisplayMask {
    /// Mask width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Mask height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether `(x, y)` survived binarization. Out-of-range coordinates are not kept.
    pub fn is_kept(&self, x: u32, y: u32) -> bool {
        x < self.width
            && y < self.height
            && self.kept[(y * self.width + x) as usize]
    }

    /// Number of foreground pixels.
    pub fn kept_count(&self) -> usize {
        self.kept.iter().filter(|&&k| k).count()
    }

    /// White for kept pixels, black elsewhere.
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            if self.is_kept(x, y) { Luma([255]) } else { Luma([0]) }
        })
    }
}

/// Stage two: smooth upsample of `raster`, then keep only exactly-white pixels.
pub fn upscale_and_binarize(raster: &RgbImage, width: u32, height: u32) -> DisplayMask {
    let upscaled = if raster.dimensions() == (width, height) {
        raster.clone()
    } else {
        imageops::resize(raster, width, height, FilterType::Triangle)
    };
    DisplayMask {
        kept: upscaled.pixels().map(|p| *p == WHITE).collect(),
        width,
        height,
    }
}
