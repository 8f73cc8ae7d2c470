use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, RgbImage};
use segsort_utils::{thumbnail, timing_guard};

use crate::codec;
use crate::error::{Result, TriageError};
use crate::model::SegmentationEngine;
use crate::postprocess::{
    DisplayMask, LowResMask, PostprocessConfig, ProbabilityMap, extract_foreground, low_res_mask,
    upscale_and_binarize,
};
use crate::preprocess::{InputTensor, PreprocessConfig, preprocess_image};

/// Everything the pipeline derives for one source file.
///
/// Built wholesale for every file and never patched in place.
#[derive(Debug, Clone)]
pub struct SegmentationView {
    /// The file the view was computed from.
    pub path: PathBuf,
    /// The decoded source image.
    pub source: DynamicImage,
    /// The source resampled to the network resolution.
    pub resized: RgbImage,
    /// The normalized tensor fed to the engine.
    pub tensor: InputTensor,
    /// Foreground probabilities at network resolution.
    pub probabilities: ProbabilityMap,
    /// First-stage mask at network resolution.
    pub low_res: LowResMask,
    /// Re-binarized mask at display resolution.
    pub mask: DisplayMask,
    /// Unmodified reference copy of the source at thumbnail resolution.
    pub thumbnail: RgbImage,
}

impl SegmentationView {
    /// The display mask as an 8-bit grayscale image.
    pub fn mask_image(&self) -> GrayImage {
        self.mask.to_gray_image()
    }

    /// Buffer written back over the source file when a decision is made.
    pub fn processed_image(&self) -> DynamicImage {
        DynamicImage::ImageLuma8(self.mask_image())
    }

    /// File name of the source, for status output.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Couples a shared engine with preprocessing and postprocessing settings.
///
/// The engine is borrowed, so one loaded model serves every segmenter built from it.
#[derive(Debug)]
pub struct Segmenter<'e, E: SegmentationEngine + ?Sized> {
    engine: &'e E,
    preprocess: PreprocessConfig,
    postprocess: PostprocessConfig,
}

impl<'e, E: SegmentationEngine + ?Sized> Segmenter<'e, E> {
    /// Build a segmenter. The preprocessing resolution must match the engine's.
    pub fn new(
        engine: &'e E,
        preprocess: PreprocessConfig,
        postprocess: PostprocessConfig,
    ) -> Result<Self> {
        if preprocess.input_size != engine.input_size() {
            return Err(TriageError::Inference(format!(
                "preprocess resolution {}x{} differs from engine input {}x{}",
                preprocess.input_size.width,
                preprocess.input_size.height,
                engine.input_size().width,
                engine.input_size().height
            )));
        }
        Ok(Self {
            engine,
            preprocess,
            postprocess,
        })
    }

    pub fn preprocess_config(&self) -> &PreprocessConfig {
        &self.preprocess
    }

    pub fn postprocess_config(&self) -> &PostprocessConfig {
        &self.postprocess
    }

    /// Decode `path` and run the full pipeline on it.
    pub fn segment_path(&self, path: &Path) -> Result<SegmentationView> {
        let _guard = timing_guard("segsort_core::segment_path", log::Level::Debug);
        let source = codec::decode(path)?;
        self.segment_image(path, source)
    }

    /// Run the pipeline on an already decoded image.
    pub fn segment_image(&self, path: &Path, source: DynamicImage) -> Result<SegmentationView> {
        let prep = preprocess_image(&source, &self.preprocess)?;

        let raw = {
            let _guard = timing_guard("segsort_core::inference", log::Level::Debug);
            self.engine.run(&prep.tensor)?
        };

        let _guard = timing_guard("segsort_core::postprocess", log::Level::Debug);
        let probabilities = extract_foreground(&raw, self.preprocess.input_size)?;
        let low_res = low_res_mask(&prep.resized, &probabilities, self.postprocess.threshold)?;
        let (display_w, display_h) = self.postprocess.display_size;
        let mask = upscale_and_binarize(low_res.coverage(), display_w, display_h);
        let (thumb_w, thumb_h) = self.postprocess.thumbnail_size;
        let thumbnail = thumbnail(&source, thumb_w, thumb_h);

        log::debug!(
            "{}: {} of {} low-res pixels kept, {} display pixels kept",
            path.display(),
            low_res.kept_count(),
            self.preprocess.input_size.pixel_count(),
            mask.kept_count()
        );

        Ok(SegmentationView {
            path: path.to_path_buf(),
            source,
            resized: prep.resized,
            tensor: prep.tensor,
            probabilities,
            low_res,
            mask,
            thumbnail,
        })
    }
}
