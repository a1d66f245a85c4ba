//! The adjustment algorithm shared by both render paths.
//!
//! Per pixel, in this order and never reassociated:
//!
//! 1. Brightness: `x * clamp(1 + b/100, 0.5, 2.0)`
//! 2. Contrast: `a*x + (1 - a)*128` with `a = 1 + c/100`
//! 3. Saturation and vibrance: blend each channel toward Rec.601 luma by
//!    `k = clamp((1 + sat/100) * (1 + vib/200), 0, 2)`
//! 4. Temperature: warm boosts red, cool attenuates blue, up to 10%
//! 5. Sharpness: unsharp boost `x + (x - blur(x))`, blur sigma
//!    `0.3 + sharp/100 * 2.7` (the two paths use different blurs)
//! 6. Clamp to `[0, 255]`, rounding to nearest
//!
//! Each step is skipped when its control is zero.

use printframe_core::adjustments::AdjustmentParameters;

/// Rec.601 luma weights.
pub const LUMA_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

/// Contrast pivot.
pub const CONTRAST_PIVOT: f32 = 128.0;

pub const BRIGHTNESS_FACTOR_MIN: f32 = 0.5;
pub const BRIGHTNESS_FACTOR_MAX: f32 = 2.0;

pub const CHROMA_FACTOR_MAX: f32 = 2.0;

/// Maximum per-channel gain applied by the temperature control.
pub const TEMPERATURE_GAIN: f32 = 0.1;

pub const SHARPEN_SIGMA_BASE: f32 = 0.3;
pub const SHARPEN_SIGMA_RANGE: f32 = 2.7;
pub const SHARPEN_AMOUNT: f32 = 1.0;

pub fn brightness_factor(brightness: f32) -> f32 {
    (1.0 + brightness / 100.0).clamp(BRIGHTNESS_FACTOR_MIN, BRIGHTNESS_FACTOR_MAX)
}

pub fn contrast_factor(contrast: f32) -> f32 {
    1.0 + contrast / 100.0
}

pub fn chroma_factor(saturation: f32, vibrance: f32) -> f32 {
    let s = 1.0 + saturation / 100.0;
    let v = 1.0 + vibrance / 200.0;
    (s * v).clamp(0.0, CHROMA_FACTOR_MAX)
}

/// Red and blue multipliers for a temperature control value.
pub fn temperature_gains(temperature: f32) -> (f32, f32) {
    let t = temperature / 100.0;
    (1.0 + t.max(0.0) * TEMPERATURE_GAIN, 1.0 - (-t).max(0.0) * TEMPERATURE_GAIN)
}

pub fn sharpen_sigma(sharpness: f32) -> f32 {
    SHARPEN_SIGMA_BASE + (sharpness / 100.0) * SHARPEN_SIGMA_RANGE
}

/// Round and clamp a working value to an 8-bit channel.
pub fn to_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Precomputed factors for one set of parameters.
///
/// `None` means the step is skipped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdjustmentPlan {
    pub brightness: Option<f32>,
    pub contrast: Option<f32>,
    pub chroma: Option<f32>,
    pub temperature: Option<(f32, f32)>,
    pub sharpen_sigma: Option<f32>,
}

impl AdjustmentPlan {
    /// Build a plan from (clamped) parameters.
    pub fn new(params: &AdjustmentParameters) -> Self {
        let p = params.clamped();
        Self {
            brightness: (p.brightness != 0.0).then(|| brightness_factor(p.brightness)),
            contrast: (p.contrast != 0.0).then(|| contrast_factor(p.contrast)),
            chroma: (p.saturation != 0.0 || p.vibrance != 0.0)
                .then(|| chroma_factor(p.saturation, p.vibrance)),
            temperature: (p.temperature != 0.0).then(|| temperature_gains(p.temperature)),
            sharpen_sigma: (p.sharpness > 0.0).then(|| sharpen_sigma(p.sharpness)),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.brightness.is_none()
            && self.contrast.is_none()
            && self.chroma.is_none()
            && self.temperature.is_none()
            && self.sharpen_sigma.is_none()
    }

    /// Steps 1 and 2 on a single channel value.
    pub fn apply_tone(&self, mut x: f32) -> f32 {
        if let Some(factor) = self.brightness {
            x *= factor;
        }
        if let Some(a) = self.contrast {
            x = a * x + (1.0 - a) * CONTRAST_PIVOT;
        }
        x
    }

    /// Steps 3 and 4 on a pixel whose channels already went through
    /// [`apply_tone`](Self::apply_tone).
    pub fn apply_color(&self, [mut r, mut g, mut b]: [f32; 3]) -> [f32; 3] {
        if let Some(k) = self.chroma {
            let luma = LUMA_WEIGHTS[0] * r + LUMA_WEIGHTS[1] * g + LUMA_WEIGHTS[2] * b;
            r = luma + (r - luma) * k;
            g = luma + (g - luma) * k;
            b = luma + (b - luma) * k;
        }
        if let Some((red_gain, blue_gain)) = self.temperature {
            r *= red_gain;
            b *= blue_gain;
        }
        [r, g, b]
    }
}
