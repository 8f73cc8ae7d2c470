//! Preprocessing utilities for preparing images for segmentation inference.
//!
//! Images are resized to the fixed network resolution, flattened into an NHWC `f32` buffer
//! with R, G, B channel order, and scaled into `[0, 1]`.

use image::{DynamicImage, GenericImageView, RgbImage, imageops::FilterType};
use segsort_utils::{
    area_resize,
    config::{InputDimensions, ResizeQuality},
    resize_image, rgb_to_nhwc,
    telemetry::timing_guard,
};

use crate::error::{Result, TriageError};

/// Network input resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSize {
    /// The width of the input tensor.
    pub width: u32,
    /// The height of the input tensor.
    pub height: u32,
}

impl InputSize {
    /// Creates a new `InputSize`.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels in the grid.
    pub const fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Tensor shape `[1, H, W, 3]`.
    pub const fn tensor_shape(&self) -> [usize; 4] {
        [1, self.height as usize, self.width as usize, 3]
    }
}

impl Default for InputSize {
    fn default() -> Self {
        Self {
            width: 224,
            height: 224,
        }
    }
}

/// Configuration for preprocessing an image before inference.
#[derive(Debug, Clone, Default)]
pub struct PreprocessConfig {
    /// The target input size for the model.
    pub input_size: InputSize,
    /// Resize filter preference.
    pub resize_quality: ResizeQuality,
}

impl From<InputDimensions> for InputSize {
    fn from(dimensions: InputDimensions) -> Self {
        InputSize::new(dimensions.width, dimensions.height)
    }
}

impl From<InputDimensions> for PreprocessConfig {
    fn from(dimensions: InputDimensions) -> Self {
        PreprocessConfig {
            input_size: dimensions.into(),
            resize_quality: dimensions.resize_quality,
        }
    }
}

/// Flat `[1, H, W, 3]` input buffer.
///
/// Built with raw 0-255 channel values; [`InputTensor::normalize`] consumes the raw tensor
/// and returns the scaled one, so raw values cannot be observed after normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    data: Vec<f32>,
    size: InputSize,
    normalized: bool,
}

impl InputTensor {
    /// Build a raw tensor from an RGB raster, row-major, R, G, B per pixel.
    pub fn from_rgb(image: &RgbImage) -> Self {
        let (width, height) = image.dimensions();
        let (data, offset) = rgb_to_nhwc(image).into_raw_vec_and_offset();
        debug_assert_eq!(offset.unwrap_or(0), 0, "expected contiguous array");
        Self {
            data,
            size: InputSize::new(width, height),
            normalized: false,
        }
    }

    /// Divide every element by 255.
    pub fn normalize(mut self) -> Self {
        if !self.normalized {
            self.data.iter_mut().for_each(|value| *value /= 255.0);
            self.normalized = true;
        }
        self
    }

    /// Whether [`InputTensor::normalize`] has been applied.
    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    /// Grid the tensor was built from.
    pub fn size(&self) -> InputSize {
        self.size
    }

    /// Tensor shape `[1, H, W, 3]`.
    pub fn shape(&self) -> [usize; 4] {
        self.size.tensor_shape()
    }

    /// Flat NHWC values.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Number of `f32` elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the tensor holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Resampled raster plus the normalized tensor built from it.
#[derive(Debug, Clone)]
pub struct PreprocessOutput {
    /// The source resized to the network resolution, alpha discarded.
    pub resized: RgbImage,
    /// The normalized tensor ready for inference.
    pub tensor: InputTensor,
    /// The original dimensions of the input image.
    pub original_size: (u32, u32),
}

/// Resize `image` to the configured network resolution.
///
/// `Quality` filters bilinearly; `Speed` averages the covered source area. Both are smooth
/// and deterministic.
pub fn resample(image: &DynamicImage, config: &PreprocessConfig) -> RgbImage {
    let _guard = timing_guard("segsort_core::resample", log::Level::Trace);
    let InputSize { width, height } = config.input_size;
    match config.resize_quality {
        ResizeQuality::Quality => resize_image(image, width, height, FilterType::Triangle),
        ResizeQuality::Speed => area_resize(image, width, height),
    }
}

/// Resize an in-memory image and build its normalized input tensor.
pub fn preprocess_image(image: &DynamicImage, config: &PreprocessConfig) -> Result<PreprocessOutput> {
    let _guard = timing_guard("segsort_core::preprocess_image", log::Level::Debug);
    let InputSize { width, height } = config.input_size;
    if width == 0 || height == 0 {
        return Err(TriageError::Inference(
            "input dimensions must be greater than zero".into(),
        ));
    }

    let original_size = image.dimensions();
    let resized = resample(image, config);
    let tensor = InputTensor::from_rgb(&resized).normalize();

    Ok(PreprocessOutput {
        resized,
        tensor,
        original_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb, Rgba, RgbaImage};

    #[test]
    fn raw_tensor_is_rgb_row_major() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([1, 2, 3]));
        img.put_pixel(1, 0, Rgb([4, 5, 6]));

        let tensor = InputTensor::from_rgb(&img);
        assert_eq!(tensor.shape(), [1, 1, 2, 3]);
        assert_eq!(tensor.as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(!tensor.is_normalized());
    }

    #[test]
    fn normalize_maps_every_byte_into_unit_range() {
        let img = ImageBuffer::from_fn(256, 1, |x, _| {
            let v = x as u8;
            Rgb([v, 255 - v, v])
        });
        let tensor = InputTensor::from_rgb(&img).normalize();

        assert!(tensor.is_normalized());
        assert!(tensor.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
        assert_eq!(tensor.as_slice()[0], 0.0);
        assert_eq!(tensor.as_slice()[1], 1.0);
        assert_eq!(tensor.as_slice()[255 * 3], 1.0);
    }

    #[test]
    fn normalize_is_applied_once() {
        let img = RgbImage::from_pixel(1, 1, Rgb([255, 255, 255]));
        let tensor = InputTensor::from_rgb(&img).normalize().normalize();
        assert_eq!(tensor.as_slice(), &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn preprocess_resizes_to_network_input() {
        let img = RgbaImage::from_pixel(40, 30, Rgba([255, 0, 0, 10]));
        let config = PreprocessConfig {
            input_size: InputSize::new(8, 8),
            ..Default::default()
        };

        let output = preprocess_image(&DynamicImage::ImageRgba8(img), &config).expect("preprocess");
        assert_eq!(output.original_size, (40, 30));
        assert_eq!(output.resized.dimensions(), (8, 8));
        assert_eq!(output.tensor.shape(), [1, 8, 8, 3]);
        assert_eq!(output.tensor.len(), 8 * 8 * 3);
        assert_eq!(&output.tensor.as_slice()[..3], &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn both_resize_modes_are_smooth() {
        let checker = RgbImage::from_fn(16, 16, |x, y| {
            if (x + y) % 2 == 0 { Rgb([255, 255, 255]) } else { Rgb([0, 0, 0]) }
        });
        let image = DynamicImage::ImageRgb8(checker);

        for quality in [ResizeQuality::Quality, ResizeQuality::Speed] {
            let config = PreprocessConfig {
                input_size: InputSize::new(4, 4),
                resize_quality: quality,
            };
            let first = resample(&image, &config);
            assert_eq!(first, resample(&image, &config), "{quality} is not deterministic");
            assert!(
                first.pixels().all(|p| p.0.iter().all(|c| (64..=192).contains(c))),
                "{quality} kept hard checker values"
            );
        }
    }

    #[test]
    fn default_input_matches_reference_model() {
        let config: PreprocessConfig = InputDimensions::default().into();
        assert_eq!(config.input_size, InputSize::new(224, 224));
        assert_eq!(config.input_size.tensor_shape(), [1, 224, 224, 3]);
    }

    #[test]
    fn zero_sized_input_is_rejected() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        let config = PreprocessConfig {
            input_size: InputSize::new(0, 4),
            ..Default::default()
        };
        assert!(preprocess_image(&img, &config).is_err());
    }
}
