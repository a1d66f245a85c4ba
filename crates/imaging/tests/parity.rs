//! Golden parity between the final render path and the preview path.

use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use printframe_core::adjustments::AdjustmentParameters;
use printframe_imaging::{preview, render};

/// Smooth gradients with a gentle triangular ripple on blue.
fn test_scene(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let r = (x * 255 / (width - 1)) as u8;
        let g = (y * 255 / (height - 1)) as u8;
        let phase = (x + y) % 16;
        let ripple = if phase < 8 { phase } else { 16 - phase };
        let b = (108 + ripple * 5) as u8;
        Rgb([r, g, b])
    })
}

fn to_rgba(image: &RgbImage) -> RgbaImage {
    RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        let p = image.get_pixel(x, y);
        Rgba([p[0], p[1], p[2], 255])
    })
}

fn max_channel_diff(final_out: &RgbImage, preview_out: &RgbaImage) -> u8 {
    final_out
        .pixels()
        .zip(preview_out.pixels())
        .flat_map(|(a, b)| (0..3).map(move |c| a[c].abs_diff(b[c])))
        .max()
        .unwrap_or(0)
}

fn mean_abs_diff(final_out: &RgbImage, preview_out: &RgbaImage) -> f64 {
    let mut total = 0u64;
    let mut count = 0u64;
    for (a, b) in final_out.pixels().zip(preview_out.pixels()) {
        for c in 0..3 {
            total += u64::from(a[c].abs_diff(b[c]));
            count += 1;
        }
    }
    total as f64 / count as f64
}

// ---------------------------------------------------------------------------
// Without sharpening both paths agree to within one level
// ---------------------------------------------------------------------------

#[test]
fn paths_agree_without_sharpening() {
    let scene = test_scene(64, 48);
    let rgba = to_rgba(&scene);
    let cases = [
        AdjustmentParameters::new(20.0, -10.0, 0.0, 0.0, 0.0, 0.0),
        AdjustmentParameters::new(-40.0, 35.0, 25.0, -30.0, 60.0, 0.0),
        AdjustmentParameters::new(100.0, 100.0, 100.0, 100.0, 100.0, 0.0),
        AdjustmentParameters::new(-100.0, -100.0, -100.0, -100.0, -100.0, 0.0),
    ];
    for params in cases {
        let final_out = render::adjust_rgb(&scene, &params);
        let preview_out = preview::render_preview(&rgba, &params);
        let diff = max_channel_diff(&final_out, &preview_out);
        assert!(diff <= 1, "params {params:?} diverged by {diff}");
    }
}

#[test]
fn both_paths_honor_the_identity_law() {
    let scene = test_scene(20, 20);
    let rgba = to_rgba(&scene);
    let params = AdjustmentParameters::default();
    assert_eq!(render::adjust_rgb(&scene, &params), scene);
    assert_eq!(preview::render_preview(&rgba, &params), rgba);
}

// ---------------------------------------------------------------------------
// With sharpening the box approximation stays inside the documented band
// ---------------------------------------------------------------------------

#[test]
fn sharpened_paths_stay_within_band() {
    let scene = test_scene(96, 64);
    let rgba = to_rgba(&scene);
    for sharpness in [10.0, 30.0, 60.0, 100.0] {
        let params = AdjustmentParameters::new(10.0, 5.0, 10.0, 0.0, -20.0, sharpness);
        let final_out = render::adjust_rgb(&scene, &params);
        let preview_out = preview::render_preview(&rgba, &params);
        let mad = mean_abs_diff(&final_out, &preview_out);
        assert!(mad <= 6.0, "sharpness {sharpness}: mean abs diff {mad}");
    }
}

// ---------------------------------------------------------------------------
// Full encode/decode round on the final path
// ---------------------------------------------------------------------------

#[test]
fn warm_brightening_with_reduced_contrast_raises_mean_red() {
    let scene = RgbImage::from_fn(64, 64, |x, y| {
        let v = (60 + (x + y) % 80) as u8;
        Rgb([v, v / 2 + 40, 200 - v / 2])
    });
    let mut png = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(scene.clone())
        .write_to(&mut png, image::ImageFormat::Png)
        .unwrap();

    let params = AdjustmentParameters::new(20.0, -10.0, 0.0, 0.0, 30.0, 0.0);
    let jpeg = render::render_final(png.get_ref(), &params).unwrap();
    let output = render::decode(&jpeg).unwrap().to_rgb8();

    assert_eq!(output.dimensions(), scene.dimensions());
    let before = render::channel_means(&scene)[0];
    let after = render::channel_means(&output)[0];
    assert!(after > before + 5.0, "red mean {before} -> {after}");

    let tone_only = AdjustmentParameters::new(20.0, -10.0, 0.0, 0.0, 0.0, 0.0);
    let toned = render::decode(&render::render_final(png.get_ref(), &tone_only).unwrap())
        .unwrap()
        .to_rgb8();
    let [tone_red, _, tone_blue] = render::channel_means(&toned);
    let [red, _, blue] = render::channel_means(&output);
    assert!(red > tone_red + 2.0, "warmth should add red: {tone_red} -> {red}");
    assert!((blue - tone_blue).abs() < 1.5, "warmth should not move blue: {tone_blue} -> {blue}");
}

#[test]
fn preview_png_round_trip_keeps_dimensions() {
    let rgba = to_rgba(&test_scene(40, 30));
    let params = AdjustmentParameters::new(0.0, 0.0, 0.0, 0.0, 0.0, 50.0);
    let png = preview::encode_png(&preview::render_preview(&rgba, &params)).unwrap();
    let decoded = render::decode(&png).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (40, 30));
}
