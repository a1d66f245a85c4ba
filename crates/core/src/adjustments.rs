//! Photographic adjustment parameters.
//!
//! The same value type is produced by the vision analysis, edited by the
//! user, rendered by the preview path and applied by the final path.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Lower bound of the signed adjustment controls.
pub const SIGNED_MIN: f32 = -100.0;
/// Upper bound of every adjustment control.
pub const CONTROL_MAX: f32 = 100.0;

/// Six photographic controls plus an optional free-text rationale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentParameters {
    #[validate(range(min = -100.0, max = 100.0))]
    pub brightness: f32,
    #[validate(range(min = -100.0, max = 100.0))]
    pub contrast: f32,
    #[validate(range(min = -100.0, max = 100.0))]
    pub saturation: f32,
    #[validate(range(min = -100.0, max = 100.0))]
    pub vibrance: f32,
    #[validate(range(min = -100.0, max = 100.0))]
    pub temperature: f32,
    #[validate(range(min = 0.0, max = 100.0))]
    pub sharpness: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl AdjustmentParameters {
    pub fn new(
        brightness: f32,
        contrast: f32,
        saturation: f32,
        vibrance: f32,
        temperature: f32,
        sharpness: f32,
    ) -> Self {
        Self {
            brightness,
            contrast,
            saturation,
            vibrance,
            temperature,
            sharpness,
            explanation: None,
        }
    }

    /// True when every control is zero, i.e. rendering is a no-op.
    pub fn is_identity(&self) -> bool {
        self.brightness == 0.0
            && self.contrast == 0.0
            && self.saturation == 0.0
            && self.vibrance == 0.0
            && self.temperature == 0.0
            && self.sharpness == 0.0
    }

    /// Copy with every control forced into its allowed range.
    ///
    /// Non-finite values collapse to zero.
    pub fn clamped(&self) -> Self {
        Self {
            brightness: clamp_control(self.brightness, SIGNED_MIN),
            contrast: clamp_control(self.contrast, SIGNED_MIN),
            saturation: clamp_control(self.saturation, SIGNED_MIN),
            vibrance: clamp_control(self.vibrance, SIGNED_MIN),
            temperature: clamp_control(self.temperature, SIGNED_MIN),
            sharpness: clamp_control(self.sharpness, 0.0),
            explanation: self.explanation.clone(),
        }
    }
}

fn clamp_control(value: f32, min: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, CONTROL_MAX)
    } else {
        0.0
    }
}
