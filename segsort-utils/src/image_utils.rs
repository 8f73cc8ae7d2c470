use std::path::Path;

use anyhow::{Context, Result};
use image::{
    DynamicImage, RgbImage,
    imageops::{self, FilterType},
};
use ndarray::Array4;

/// Load an image from disk into memory.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
    let path_ref = path.as_ref();
    image::open(path_ref).with_context(|| format!("failed to open image {}", path_ref.display()))
}

/// Resize an image to exactly `width`x`height` and drop any alpha channel.
///
/// # Arguments
///
/// * `image` - The image to resize.
/// * `width` - The target width.
/// * `height` - The target height.
/// * `filter` - The sampling filter to use for resizing.
pub fn resize_image(image: &DynamicImage, width: u32, height: u32, filter: FilterType) -> RgbImage {
    let rgb = image.to_rgb8();
    if rgb.dimensions() == (width, height) {
        return rgb;
    }
    imageops::resize(&rgb, width, height, filter)
}

/// Resize to exactly `width`x`height` by averaging the source pixels each target pixel covers.
///
/// Cheaper than [`resize_image`] for large downscales and still smooth.
pub fn area_resize(image: &DynamicImage, width: u32, height: u32) -> RgbImage {
    let rgb = image.to_rgb8();
    if rgb.dimensions() == (width, height) {
        return rgb;
    }
    imageops::thumbnail(&rgb, width, height)
}

/// Reference-size copy of an image, always smooth-filtered.
pub fn thumbnail(image: &DynamicImage, width: u32, height: u32) -> RgbImage {
    resize_image(image, width, height, FilterType::Triangle)
}

/// Convert an RGB image into a `[1, H, W, 3]` array with raw 0-255 values.
///
/// Channels stay in R, G, B order and pixels in row-major order, so the contiguous
/// backing storage is exactly the NHWC layout the segmentation graph reads.
pub fn rgb_to_nhwc(image: &RgbImage) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let mut array = Array4::<f32>::zeros((1, height as usize, width as usize, 3));
    for (x, y, pixel) in image.enumerate_pixels() {
        let (xi, yi) = (x as usize, y as usize);
        array[(0, yi, xi, 0)] = pixel[0] as f32;
        array[(0, yi, xi, 1)] = pixel[1] as f32;
        array[(0, yi, xi, 2)] = pixel[2] as f32;
    }
    array
}
