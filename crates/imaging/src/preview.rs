//! Preview render path: works in place on an 8-bit RGBA canvas buffer.
//!
//! Tone steps go through a 256-entry lookup table and sharpening uses a box
//! average of radius `max(1, round(sigma))` instead of a Gaussian, so large
//! sharpness values drift slightly from the final render.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{ImageFormat, RgbaImage};
use printframe_core::adjustments::AdjustmentParameters;

use crate::error::RenderError;
use crate::plan::{to_channel, AdjustmentPlan, SHARPEN_AMOUNT};

/// Default longest edge of the preview working copy.
pub const DEFAULT_PREVIEW_EDGE: u32 = 1280;

/// Tone curve (steps 1 and 2) for every 8-bit input value.
struct ToneLut([f32; 256]);

impl ToneLut {
    fn new(plan: &AdjustmentPlan) -> Self {
        let mut table = [0.0f32; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            *entry = plan.apply_tone(i as f32);
        }
        Self(table)
    }

    fn get(&self, value: u8) -> f32 {
        self.0[value as usize]
    }
}

/// Decode an image and downscale it so its longest edge is at most
/// `max_edge`, ready for repeated preview renders.
pub fn load_preview_source(bytes: &[u8], max_edge: u32) -> Result<RgbaImage, RenderError> {
    let decoded = image::load_from_memory(bytes).map_err(RenderError::Decode)?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(RenderError::Empty);
    }
    let longest = width.max(height);
    if longest <= max_edge {
        return Ok(rgba);
    }
    let scale = max_edge as f32 / longest as f32;
    let new_w = ((width as f32 * scale).round() as u32).max(1);
    let new_h = ((height as f32 * scale).round() as u32).max(1);
    Ok(image::imageops::resize(&rgba, new_w, new_h, FilterType::Triangle))
}

/// Render a preview into a fresh buffer, leaving the source untouched.
pub fn render_preview(source: &RgbaImage, params: &AdjustmentParameters) -> RgbaImage {
    let mut out = source.clone();
    apply_in_place(&mut out, params);
    out
}

/// Apply the adjustment algorithm in place. Alpha is preserved.
pub fn apply_in_place(buffer: &mut RgbaImage, params: &AdjustmentParameters) {
    let plan = AdjustmentPlan::new(params);
    if plan.is_identity() {
        return;
    }
    let lut = ToneLut::new(&plan);

    let Some(sigma) = plan.sharpen_sigma else {
        for pixel in buffer.pixels_mut() {
            let [r, g, b] = plan.apply_color([lut.get(pixel[0]), lut.get(pixel[1]), lut.get(pixel[2])]);
            pixel[0] = to_channel(r);
            pixel[1] = to_channel(g);
            pixel[2] = to_channel(b);
        }
        return;
    };

    let (width, height) = (buffer.width() as usize, buffer.height() as usize);
    let mut working: Vec<[f32; 3]> = buffer
        .pixels()
        .map(|p| plan.apply_color([lut.get(p[0]), lut.get(p[1]), lut.get(p[2])]))
        .collect();

    let radius = sigma.round().max(1.0) as usize;
    let averaged = box_average(&working, width, height, radius);
    for (value, avg) in working.iter_mut().zip(averaged) {
        for c in 0..3 {
            value[c] += SHARPEN_AMOUNT * (value[c] - avg[c]);
        }
    }

    for (pixel, value) in buffer.pixels_mut().zip(working) {
        pixel[0] = to_channel(value[0]);
        pixel[1] = to_channel(value[1]);
        pixel[2] = to_channel(value[2]);
    }
}

/// Separable box average with clamp-to-edge borders.
fn box_average(data: &[[f32; 3]], width: usize, height: usize, radius: usize) -> Vec<[f32; 3]> {
    let r = radius as isize;
    let taps = (2 * radius + 1) as f32;
    let max_x = width as isize - 1;
    let max_y = height as isize - 1;

    let mut horizontal = vec![[0.0f32; 3]; data.len()];
    for y in 0..height {
        for x in 0..width {
            let mut acc = [0.0f32; 3];
            for dx in -r..=r {
                let sx = (x as isize + dx).clamp(0, max_x) as usize;
                let src = data[y * width + sx];
                acc[0] += src[0];
                acc[1] += src[1];
                acc[2] += src[2];
            }
            horizontal[y * width + x] = acc.map(|v| v / taps);
        }
    }

    let mut out = vec![[0.0f32; 3]; data.len()];
    for y in 0..height {
        for x in 0..width {
            let mut acc = [0.0f32; 3];
            for dy in -r..=r {
                let sy = (y as isize + dy).clamp(0, max_y) as usize;
                let src = horizontal[sy * width + x];
                acc[0] += src[0];
                acc[1] += src[1];
                acc[2] += src[2];
            }
            out[y * width + x] = acc.map(|v| v / taps);
        }
    }
    out
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, RenderError> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .map_err(RenderError::Encode)?;
    Ok(out.into_inner())
}
