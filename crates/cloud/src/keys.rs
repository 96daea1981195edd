//! Object-key derivation for the upload pipeline.
//!
//! Every key is `{prefix}/{uuid}_{name}`; the processing stages swap the
//! extension and the classification stage adds a `_classified` suffix.

use serde::{Deserialize, Serialize};

pub const TIFF_UPLOAD_PREFIX: &str = "tiff-uploads";
pub const PNG_EXPORT_PREFIX: &str = "png-export";
pub const SEGMENT_UPLOAD_PREFIX: &str = "segment-upload";

/// Remote object keys for one upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectKeys {
    /// Where the original file is uploaded.
    pub tiff_key: String,
    /// Reprojected PNG written by the conversion stage.
    pub png_export_key: String,
    /// Classified PNG written by the segmentation stage.
    pub segment_upload_key: String,
    /// TIFF rendition of the classified output.
    pub segment_tiff_key: String,
}

impl ObjectKeys {
    pub fn derive(uuid: &str, file_name: &str) -> Self {
        let stem = file_stem(file_name);
        Self {
            tiff_key: format!("{TIFF_UPLOAD_PREFIX}/{uuid}_{file_name}"),
            png_export_key: format!("{PNG_EXPORT_PREFIX}/{uuid}_{stem}.png"),
            segment_upload_key: format!("{SEGMENT_UPLOAD_PREFIX}/{uuid}_{stem}_classified.png"),
            segment_tiff_key: format!("{SEGMENT_UPLOAD_PREFIX}/{uuid}_{stem}_classified.tif"),
        }
    }
}

/// File name without its last extension. Dotfiles keep their name.
pub fn file_stem(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => file_name,
    }
}

/// Human label for an object key: directory and `{uuid}_` prefix removed.
pub fn display_name(key: &str, uuid: &str) -> String {
    let base = key.rsplit('/').next().unwrap_or(key);
    base.strip_prefix(uuid)
        .and_then(|rest| rest.strip_prefix('_'))
        .unwrap_or(base)
        .to_string()
}

/// Last path segment of a URL, without query string. Used to name
/// downloads and URL-referenced uploads.
pub fn file_name_from_url(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next()?;
    let path = match without_query.split_once("://") {
        Some((_, rest)) => rest.split_once('/').map(|(_, p)| p).unwrap_or(""),
        None => without_query,
    };
    let name = path.rsplit('/').next()?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_stage_keys() {
        let keys = ObjectKeys::derive("U", "photo.tif");
        assert_eq!(keys.tiff_key, "tiff-uploads/U_photo.tif");
        assert_eq!(keys.png_export_key, "png-export/U_photo.png");
        assert_eq!(keys.segment_upload_key, "segment-upload/U_photo_classified.png");
        assert_eq!(keys.segment_tiff_key, "segment-upload/U_photo_classified.tif");
    }

    #[test]
    fn stem_handles_odd_names() {
        assert_eq!(file_stem("a.b.tiff"), "a.b");
        assert_eq!(file_stem("noext"), "noext");
        assert_eq!(file_stem(".hidden"), ".hidden");
    }

    #[test]
    fn display_name_strips_uuid() {
        assert_eq!(display_name("tiff-uploads/U_area.tif", "U"), "area.tif");
        assert_eq!(display_name("other/area.tif", "U"), "area.tif");
    }

    #[test]
    fn url_file_names() {
        assert_eq!(
            file_name_from_url("https://host/data/scene.tif?X-Amz-Signature=abc").as_deref(),
            Some("scene.tif")
        );
        assert_eq!(file_name_from_url("https://host/"), None);
    }
}
