//! Image uploads
//!
//! POST /api/uploads - multipart field `file` → public URL. Used for mission
//! evidence photos and setup package images.

use axum::extract::{Multipart, State};
use axum::routing::post;
use axum::{Extension, Router};
use serde::Serialize;

use shared::error::{ApiResponse, AppError, ErrorCode};

use super::ApiResult;
use crate::auth::Identity;
use crate::state::AppState;

/// Maximum file size (5MB)
const MAX_FILE_SIZE: usize = 5 * 1024 * 1024;

/// Supported image formats
const SUPPORTED_FORMATS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif"];

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
    pub original_name: String,
    pub size: usize,
}

/// Validated image read from a multipart body
pub(crate) struct ImageFile {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

fn check_image(data: &[u8], filename: &str) -> Result<String, AppError> {
    if data.is_empty() {
        return Err(AppError::new(ErrorCode::EmptyFile));
    }
    if data.len() > MAX_FILE_SIZE {
        return Err(AppError::new(ErrorCode::FileTooLarge).with_detail("max_bytes", MAX_FILE_SIZE));
    }

    let ext = std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !SUPPORTED_FORMATS.contains(&ext.as_str()) {
        return Err(AppError::new(ErrorCode::UnsupportedFileFormat)
            .with_detail("supported", SUPPORTED_FORMATS.join(", ")));
    }
    Ok(mime_guess::from_path(filename)
        .first_or_octet_stream()
        .essence_str()
        .to_owned())
}

/// Pull the `file` field out of a multipart request
pub(crate) async fn read_image(mut multipart: Multipart) -> Result<ImageFile, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("Invalid multipart request: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_owned)
            .ok_or_else(|| AppError::new(ErrorCode::NoFileProvided))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::validation(format!("Multipart error: {e}")))?
            .to_vec();
        let content_type = check_image(&bytes, &filename)?;
        return Ok(ImageFile {
            bytes,
            filename,
            content_type,
        });
    }
    Err(AppError::new(ErrorCode::NoFileProvided))
}

/// Store an image and return its public URL
pub(crate) async fn store_image(state: &AppState, image: ImageFile) -> Result<String, AppError> {
    state
        .storage
        .upload(image.bytes, &image.filename, &image.content_type)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, filename = %image.filename, "Image upload failed");
            AppError::new(ErrorCode::FileStorageFailed)
        })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/uploads", post(upload))
}

/// POST /api/uploads
pub async fn upload(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    multipart: Multipart,
) -> ApiResult<UploadResponse> {
    let image = read_image(multipart).await?;
    let original_name = image.filename.clone();
    let size = image.bytes.len();
    let url = store_image(&state, image).await?;

    tracing::info!(user_id = %caller.user_id, size, url = %url, "Image uploaded");
    Ok(ApiResponse::success(UploadResponse {
        url,
        original_name,
        size,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_image_rules() {
        assert_eq!(check_image(b"png-bytes", "Tank.PNG").unwrap(), "image/png");
        assert_eq!(
            check_image(b"", "a.jpg").unwrap_err().code,
            ErrorCode::EmptyFile
        );
        assert_eq!(
            check_image(b"MZ", "setup.exe").unwrap_err().code,
            ErrorCode::UnsupportedFileFormat
        );
        let big = vec![0u8; MAX_FILE_SIZE + 1];
        assert_eq!(
            check_image(&big, "big.jpg").unwrap_err().code,
            ErrorCode::FileTooLarge
        );
    }
}
