//! The photo aggregate shared by server and client.

use serde::{Deserialize, Serialize};

use crate::adjustments::AdjustmentParameters;
use crate::error::CoreError;
use crate::status::UpscaleStatus;
use crate::types::{DbId, Timestamp, UserId};

/// Crop aspect ratio tag. Display only; `3:2` is the only print format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "3:2")]
    ThreeByTwo,
}

impl AspectRatio {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ThreeByTwo => "3:2",
        }
    }
}

impl std::str::FromStr for AspectRatio {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "3:2" => Ok(Self::ThreeByTwo),
            other => Err(CoreError::Validation(format!(
                "Unsupported aspect ratio '{other}', expected '3:2'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: DbId,
    pub user_id: UserId,
    pub original_path: String,
    pub cropped_path: Option<String>,
    pub enhanced_path: Option<String>,
    pub upscaled_path: Option<String>,
    pub upscale_status: Option<UpscaleStatus>,
    pub ai_recommendations: Option<AdjustmentParameters>,
    pub aspect_ratio: Option<AspectRatio>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Photo {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }

    /// The upscaled key to enhance from, if the photo is ready for it.
    ///
    /// Enhancement requires a completed upscale with a non-empty result.
    pub fn enhancement_source(&self) -> Result<&str, CoreError> {
        match (self.upscale_status, self.upscaled_path.as_deref()) {
            (Some(UpscaleStatus::Completed), Some(path)) if !path.is_empty() => Ok(path),
            (status, _) => Err(CoreError::Precondition(format!(
                "Photo {} must finish upscaling before enhancements can be applied (upscale status: {})",
                self.id,
                status.map(UpscaleStatus::as_str).unwrap_or("none"),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn photo(status: Option<UpscaleStatus>, upscaled: Option<&str>) -> Photo {
        let now = chrono::Utc::now();
        Photo {
            id: 7,
            user_id: "u1".into(),
            original_path: "u1/1.jpg".into(),
            cropped_path: None,
            enhanced_path: None,
            upscaled_path: upscaled.map(str::to_string),
            upscale_status: status,
            ai_recommendations: None,
            aspect_ratio: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn enhancement_requires_completed_upscale() {
        assert_eq!(
            photo(Some(UpscaleStatus::Completed), Some("u1/topaz_enhanced_1.jpg"))
                .enhancement_source()
                .unwrap(),
            "u1/topaz_enhanced_1.jpg"
        );
        assert_matches!(
            photo(Some(UpscaleStatus::Processing), None).enhancement_source(),
            Err(CoreError::Precondition(_))
        );
        assert_matches!(
            photo(Some(UpscaleStatus::Completed), Some("")).enhancement_source(),
            Err(CoreError::Precondition(_))
        );
        assert_matches!(photo(None, None).enhancement_source(), Err(CoreError::Precondition(_)));
    }

    #[test]
    fn aspect_ratio_wire_form() {
        assert_eq!(
            serde_json::to_string(&AspectRatio::ThreeByTwo).unwrap(),
            "\"3:2\""
        );
        assert_eq!("3:2".parse::<AspectRatio>().unwrap(), AspectRatio::ThreeByTwo);
        assert_matches!("16:9".parse::<AspectRatio>(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(photo(Some(UpscaleStatus::Pending), None)).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["upscaleStatus"], "pending");
        assert!(json["upscaledPath"].is_null());
    }
}
