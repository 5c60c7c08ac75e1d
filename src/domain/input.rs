use image::ImageFormat;
use serde::{Deserialize, Serialize};

use super::errors::{DomainResult, InspectError};

/// Extensions the upload tab accepts.
pub const UPLOAD_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSource {
    Camera,
    Upload,
}

/// The single image an inspection runs on.
#[derive(Debug, Clone)]
pub struct InspectionImage {
    pub bytes: Vec<u8>,
    pub filename: Option<String>,
    pub source: ImageSource,
    pub format: Option<ImageFormat>,
}

impl InspectionImage {
    /// Upload surface: the filename extension must be on the allowlist.
    pub fn from_upload(filename: &str, bytes: Vec<u8>) -> DomainResult<Self> {
        let format = upload_format(filename)?;
        if bytes.is_empty() {
            return Err(InspectError::InvalidInput(format!("{filename} is empty")));
        }
        Ok(Self {
            bytes,
            filename: Some(filename.to_string()),
            source: ImageSource::Upload,
            format: Some(format),
        })
    }

    /// Camera surface: whatever the browser captured, labelled by magic bytes if possible.
    pub fn from_camera(filename: Option<String>, bytes: Vec<u8>) -> DomainResult<Self> {
        if bytes.is_empty() {
            return Err(InspectError::InvalidInput("camera capture is empty".into()));
        }
        let format = image::guess_format(&bytes).ok();
        Ok(Self { bytes, filename, source: ImageSource::Camera, format })
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.map(|f| f.to_mime_type()).unwrap_or("image/jpeg")
    }
}

fn upload_format(filename: &str) -> DomainResult<ImageFormat> {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if !UPLOAD_EXTENSIONS.contains(&ext.as_str()) {
        return Err(InspectError::UnsupportedFormat(format!(
            "{filename} (allowed: {})",
            UPLOAD_EXTENSIONS.join(", ")
        )));
    }
    ImageFormat::from_extension(&ext)
        .ok_or_else(|| InspectError::UnsupportedFormat(filename.to_string()))
}

/// Upload wins when both surfaces produced an image in the same submission.
pub fn select_image(
    camera: Option<InspectionImage>,
    upload: Option<InspectionImage>,
) -> Option<InspectionImage> {
    upload.or(camera)
}
