//! Final render path: full resolution, `f32` working planes, Gaussian
//! unsharp mask, JPEG output.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbImage};
use printframe_core::adjustments::AdjustmentParameters;

use crate::error::RenderError;
use crate::plan::{to_channel, AdjustmentPlan, SHARPEN_AMOUNT};

/// JPEG quality of persisted enhanced assets.
pub const JPEG_QUALITY: u8 = 90;

/// Decode, adjust and re-encode an image as JPEG.
///
/// Accepts any still format the `image` crate was built with (JPEG, PNG,
/// WebP). Alpha is dropped.
pub fn render_final(bytes: &[u8], params: &AdjustmentParameters) -> Result<Vec<u8>, RenderError> {
    let decoded = decode(bytes)?;
    let rgb = decoded.to_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(RenderError::Empty);
    }
    tracing::debug!(
        width = rgb.width(),
        height = rgb.height(),
        "Applying adjustments at full resolution"
    );
    let adjusted = adjust_rgb(&rgb, params);
    encode_jpeg(&adjusted, JPEG_QUALITY)
}

pub fn decode(bytes: &[u8]) -> Result<DynamicImage, RenderError> {
    image::load_from_memory(bytes).map_err(RenderError::Decode)
}

pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, RenderError> {
    let mut out = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
        encoder.encode_image(image).map_err(RenderError::Encode)?;
    }
    Ok(out)
}

/// Apply the adjustment algorithm to a raw RGB buffer.
pub fn adjust_rgb(image: &RgbImage, params: &AdjustmentParameters) -> RgbImage {
    let plan = AdjustmentPlan::new(params);
    if plan.is_identity() {
        return image.clone();
    }

    let (width, height) = image.dimensions();
    let mut planes: [Vec<f32>; 3] = std::array::from_fn(|_| Vec::with_capacity(image.len() / 3));
    for pixel in image.pixels() {
        let toned = [
            plan.apply_tone(f32::from(pixel[0])),
            plan.apply_tone(f32::from(pixel[1])),
            plan.apply_tone(f32::from(pixel[2])),
        ];
        let colored = plan.apply_color(toned);
        for (plane, value) in planes.iter_mut().zip(colored) {
            plane.push(value);
        }
    }

    if let Some(sigma) = plan.sharpen_sigma {
        let kernel = gaussian_kernel(sigma);
        for plane in planes.iter_mut() {
            let blurred = gaussian_blur(plane, width as usize, height as usize, &kernel);
            for (value, blur) in plane.iter_mut().zip(blurred) {
                *value += SHARPEN_AMOUNT * (*value - blur);
            }
        }
    }

    let mut out = RgbImage::new(width, height);
    for (i, pixel) in out.pixels_mut().enumerate() {
        pixel.0 = [
            to_channel(planes[0][i]),
            to_channel(planes[1][i]),
            to_channel(planes[2][i]),
        ];
    }
    out
}

/// Normalized 1-D Gaussian kernel of radius `ceil(3 * sigma)`.
pub fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (3.0 * sigma).ceil().max(1.0) as i32;
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / denom).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    for weight in kernel.iter_mut() {
        *weight /= sum;
    }
    kernel
}

/// Separable convolution with clamp-to-edge borders.
fn gaussian_blur(plane: &[f32], width: usize, height: usize, kernel: &[f32]) -> Vec<f32> {
    let radius = (kernel.len() / 2) as isize;
    let max_x = width as isize - 1;
    let max_y = height as isize - 1;

    let mut horizontal = vec![0.0f32; plane.len()];
    for y in 0..height {
        let row = &plane[y * width..(y + 1) * width];
        for x in 0..width {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = (x as isize + k as isize - radius).clamp(0, max_x) as usize;
                acc += row[sx] * weight;
            }
            horizontal[y * width + x] = acc;
        }
    }

    let mut out = vec![0.0f32; plane.len()];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = (y as isize + k as isize - radius).clamp(0, max_y) as usize;
                acc += horizontal[sy * width + x] * weight;
            }
            out[y * width + x] = acc;
        }
    }
    out
}

/// Mean of each channel.
pub fn channel_means(image: &RgbImage) -> [f64; 3] {
    let count = (image.width() as u64 * image.height() as u64).max(1) as f64;
    let mut sums = [0u64; 3];
    for pixel in image.pixels() {
        for (sum, value) in sums.iter_mut().zip(pixel.0) {
            *sum += u64::from(value);
        }
    }
    sums.map(|sum| sum as f64 / count)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use image::Rgb;

    use super::*;

    fn checker(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                Rgb([40, 90, 140])
            } else {
                Rgb([200, 160, 120])
            }
        })
    }

    #[test]
    fn identity_law() {
        let image = checker(32, 24);
        assert_eq!(adjust_rgb(&image, &AdjustmentParameters::default()), image);
    }

    #[test]
    fn kernel_is_normalized() {
        for sigma in [0.3f32, 1.11, 3.0] {
            let kernel = gaussian_kernel(sigma);
            let sum: f32 = kernel.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
            assert_eq!(kernel.len(), 2 * (3.0 * sigma).ceil() as usize + 1);
        }
    }

    #[test]
    fn sharpening_a_flat_image_is_a_no_op() {
        let flat = RgbImage::from_pixel(16, 16, Rgb([90, 120, 150]));
        let params = AdjustmentParameters::new(0.0, 0.0, 0.0, 0.0, 0.0, 100.0);
        assert_eq!(adjust_rgb(&flat, &params), flat);
    }

    #[test]
    fn sharpening_increases_edge_contrast() {
        let image = checker(32, 32);
        let params = AdjustmentParameters::new(0.0, 0.0, 0.0, 0.0, 0.0, 60.0);
        let out = adjust_rgb(&image, &params);
        // Dark pixel next to a bright edge gets darker.
        assert!(out.get_pixel(3, 0)[0] < image.get_pixel(3, 0)[0]);
        assert!(out.get_pixel(4, 0)[0] > image.get_pixel(4, 0)[0]);
    }

    #[test]
    fn brightness_saturates_at_white() {
        let image = RgbImage::from_pixel(4, 4, Rgb([200, 200, 200]));
        let params = AdjustmentParameters::new(100.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        assert_eq!(adjust_rgb(&image, &params).get_pixel(0, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn rejects_garbage_bytes() {
        assert_matches!(
            render_final(b"not an image", &AdjustmentParameters::default()),
            Err(RenderError::Decode(_))
        );
    }

    #[test]
    fn channel_means_of_uniform_image() {
        let image = RgbImage::from_pixel(3, 3, Rgb([10, 20, 30]));
        assert_eq!(channel_means(&image), [10.0, 20.0, 30.0]);
    }
}
