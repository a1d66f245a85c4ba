//! User-scoped asset keys.
//!
//! Every stored asset lives under `{userId}/...`. Callers may hand us a bare
//! key or a full storage URL (public, signed or authenticated form, any
//! host); [`normalize_asset_key`] reduces both to the store-relative key.

use crate::types::Timestamp;

/// Storage API path prefix preceding the access mode segment.
const STORAGE_API_PREFIX: [&str; 3] = ["storage", "v1", "object"];

/// Access mode segments that may follow the storage API prefix.
const ACCESS_MODES: [&str; 3] = ["public", "sign", "authenticated"];

/// Upload extensions accepted for original photos.
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssetKeyError {
    #[error("Asset path is empty")]
    Empty,

    #[error("Could not extract an asset key from '{0}'")]
    Unresolvable(String),

    #[error("Asset key '{key}' is not owned by user '{user_id}'")]
    NotOwned { key: String, user_id: String },

    #[error("Unsupported file extension '{0}'")]
    UnsupportedExtension(String),
}

/// Derived asset categories, each stored as `{userId}/{category}_{ts}.jpg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetCategory {
    Cropped,
    TopazEnhanced,
    Enhanced,
}

impl AssetCategory {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Cropped => "cropped",
            Self::TopazEnhanced => "topaz_enhanced",
            Self::Enhanced => "enhanced",
        }
    }
}

/// Key for a derived asset: `{userId}/{category}_{millis}.jpg`.
pub fn category_key(user_id: &str, category: AssetCategory, at: Timestamp) -> String {
    format!("{user_id}/{}_{}.jpg", category.prefix(), at.timestamp_millis())
}

/// Key for an uploaded original: `{userId}/{millis}.{ext}`.
///
/// The extension is taken from the upload file name, lowercased, and must be
/// one of [`ALLOWED_EXTENSIONS`].
pub fn original_key(user_id: &str, file_name: &str, at: Timestamp) -> Result<String, AssetKeyError> {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(AssetKeyError::UnsupportedExtension(ext));
    }
    Ok(format!("{user_id}/{}.{ext}", at.timestamp_millis()))
}

/// Reduce a bare key or a storage URL to a store-relative key.
///
/// URLs lose scheme, host, query, the storage API prefix with its access
/// mode, and the bucket segment. The remainder is percent-decoded. A key
/// must have at least an owner segment and a file segment and may not
/// contain empty or `..` segments.
pub fn normalize_asset_key(input: &str, bucket: &str) -> Result<String, AssetKeyError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AssetKeyError::Empty);
    }

    let mut segments: Vec<String> = match url::Url::parse(trimmed) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {
            let mut segments: Vec<String> = parsed
                .path_segments()
                .map(|s| s.map(str::to_string).collect())
                .unwrap_or_default();
            strip_storage_prefix(&mut segments);
            segments
        }
        Ok(_) => return Err(AssetKeyError::Unresolvable(trimmed.to_string())),
        Err(_) => {
            let path = trimmed.split(['?', '#']).next().unwrap_or_default();
            path.trim_start_matches('/').split('/').map(str::to_string).collect()
        }
    };

    if segments.len() > 2 && segments.first().map(String::as_str) == Some(bucket) {
        segments.remove(0);
    }

    let mut decoded = Vec::with_capacity(segments.len());
    for segment in &segments {
        let value = urlencoding::decode(segment)
            .map_err(|_| AssetKeyError::Unresolvable(trimmed.to_string()))?;
        if value.is_empty() || value == ".." || value == "." || value.contains('/') {
            return Err(AssetKeyError::Unresolvable(trimmed.to_string()));
        }
        decoded.push(value);
    }

    if decoded.len() < 2 {
        return Err(AssetKeyError::Unresolvable(trimmed.to_string()));
    }

    Ok(decoded.join("/"))
}

fn strip_storage_prefix(segments: &mut Vec<String>) {
    let has_prefix = segments.len() >= STORAGE_API_PREFIX.len()
        && segments
            .iter()
            .zip(STORAGE_API_PREFIX.iter())
            .all(|(segment, expected)| segment == expected);
    if !has_prefix {
        return;
    }
    segments.drain(..STORAGE_API_PREFIX.len());
    if segments
        .first()
        .is_some_and(|mode| ACCESS_MODES.contains(&mode.as_str()))
    {
        segments.remove(0);
    }
}

/// First segment of a normalized key.
pub fn owner_of(key: &str) -> Option<&str> {
    key.split('/').next().filter(|owner| !owner.is_empty())
}

/// Check that a normalized key belongs to `user_id`.
pub fn ensure_owned(key: &str, user_id: &str) -> Result<(), AssetKeyError> {
    if owner_of(key) == Some(user_id) {
        Ok(())
    } else {
        Err(AssetKeyError::NotOwned {
            key: key.to_string(),
            user_id: user_id.to_string(),
        })
    }
}

/// Normalize and check ownership in one go.
pub fn resolve_owned_key(input: &str, bucket: &str, user_id: &str) -> Result<String, AssetKeyError> {
    let key = normalize_asset_key(input, bucket)?;
    ensure_owned(&key, user_id)?;
    Ok(key)
}

/// Content type guessed from the key's extension.
pub fn content_type_for_key(key: &str) -> &'static str {
    let ext = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    use super::*;

    const BUCKET: &str = "photos";

    #[test]
    fn bare_key_passes_through() {
        assert_eq!(
            normalize_asset_key("u1/cropped_1000.jpg", BUCKET).unwrap(),
            "u1/cropped_1000.jpg"
        );
    }

    #[test]
    fn url_forms_normalize_to_the_same_key() {
        let forms = [
            "u1/cropped%201000.jpg",
            "/photos/u1/cropped%201000.jpg",
            "https://abc.example.co/storage/v1/object/public/photos/u1/cropped%201000.jpg",
            "https://abc.example.co/storage/v1/object/sign/photos/u1/cropped%201000.jpg?token=xyz",
            "http://localhost:54321/storage/v1/object/authenticated/photos/u1/cropped%201000.jpg",
            "https://photos.s3.amazonaws.com/u1/cropped%201000.jpg",
            "https://s3.eu-west-1.amazonaws.com/photos/u1/cropped%201000.jpg",
        ];
        for form in forms {
            assert_eq!(
                normalize_asset_key(form, BUCKET).unwrap(),
                "u1/cropped 1000.jpg",
                "form: {form}"
            );
        }
    }

    #[test]
    fn rejects_unresolvable_input() {
        assert_matches!(normalize_asset_key("   ", BUCKET), Err(AssetKeyError::Empty));
        assert_matches!(
            normalize_asset_key("justafile.jpg", BUCKET),
            Err(AssetKeyError::Unresolvable(_))
        );
        assert_matches!(
            normalize_asset_key("u1/../u2/x.jpg", BUCKET),
            Err(AssetKeyError::Unresolvable(_))
        );
        assert_matches!(
            normalize_asset_key("u1//x.jpg", BUCKET),
            Err(AssetKeyError::Unresolvable(_))
        );
        assert_matches!(
            normalize_asset_key("ftp://host/u1/x.jpg", BUCKET),
            Err(AssetKeyError::Unresolvable(_))
        );
        assert_matches!(
            normalize_asset_key("u1/a%2Fb.jpg", BUCKET),
            Err(AssetKeyError::Unresolvable(_))
        );
    }

    #[test]
    fn ownership_is_the_first_segment() {
        assert!(ensure_owned("u1/x.jpg", "u1").is_ok());
        assert_matches!(
            ensure_owned("u2/x.jpg", "u1"),
            Err(AssetKeyError::NotOwned { .. })
        );
        assert_matches!(
            resolve_owned_key("https://h/storage/v1/object/public/photos/u2/x.jpg", BUCKET, "u1"),
            Err(AssetKeyError::NotOwned { .. })
        );
        assert_eq!(owner_of("u1/x.jpg"), Some("u1"));
    }

    #[test]
    fn generated_keys() {
        let at = chrono::Utc.timestamp_millis_opt(1000).unwrap();
        assert_eq!(
            category_key("u1", AssetCategory::Cropped, at),
            "u1/cropped_1000.jpg"
        );
        assert_eq!(
            category_key("u1", AssetCategory::TopazEnhanced, at),
            "u1/topaz_enhanced_1000.jpg"
        );
        assert_eq!(original_key("u1", "Holiday.JPEG", at).unwrap(), "u1/1000.jpeg");
        assert_matches!(
            original_key("u1", "notes.txt", at),
            Err(AssetKeyError::UnsupportedExtension(ext)) if ext == "txt"
        );
        assert_matches!(
            original_key("u1", "noext", at),
            Err(AssetKeyError::UnsupportedExtension(_))
        );
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for_key("u1/a.JPG"), "image/jpeg");
        assert_eq!(content_type_for_key("u1/a.png"), "image/png");
        assert_eq!(content_type_for_key("u1/a"), "application/octet-stream");
    }
}
