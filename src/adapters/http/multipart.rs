use axum::extract::Multipart;

use crate::domain::{
    errors::{DomainResult, InspectError},
    input::{select_image, InspectionImage},
};

pub const CAMERA_FIELD: &str = "camera";
pub const UPLOAD_FIELD: &str = "upload";

/// Reads the inspection form. Empty file inputs count as absent.
///
/// The upload extension is checked here, before anything leaves the process.
pub async fn read_image(mut form: Multipart) -> DomainResult<Option<InspectionImage>> {
    let mut camera = None;
    let mut upload = None;

    while let Some(field) = form.next_field().await.map_err(bad_form)? {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        if name != CAMERA_FIELD && name != UPLOAD_FIELD {
            continue;
        }
        let bytes = field.bytes().await.map_err(bad_form)?;
        if bytes.is_empty() {
            continue;
        }

        if name == UPLOAD_FIELD {
            let filename = filename.unwrap_or_default();
            upload = Some(InspectionImage::from_upload(&filename, bytes.to_vec())?);
        } else {
            camera = Some(InspectionImage::from_camera(filename, bytes.to_vec())?);
        }
    }

    Ok(select_image(camera, upload))
}

fn bad_form(e: axum::extract::multipart::MultipartError) -> InspectError {
    InspectError::InvalidInput(format!("could not read form: {}", e.body_text()))
}
