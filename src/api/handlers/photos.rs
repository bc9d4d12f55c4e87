use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::response::{ApiError, AppQuery, MessageBody};
use crate::media;
use crate::object_store::ObjectStoreError;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoListResponse {
    pub number_of_photos: usize,
    pub photos: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub pathname: String,
}

#[derive(Debug, Deserialize)]
pub struct ListPhotosParams {
    #[serde(default)]
    pub prefix: String,
}

struct UploadedFile {
    file_name: String,
    content_type: Option<String>,
    data: Bytes,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn list_photos(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<ListPhotosParams>,
) -> Result<Json<PhotoListResponse>, ApiError> {
    let photos = state
        .object_store
        .list(&params.prefix)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list photos");
            ApiError::internal(e.to_string())
        })?;

    Ok(Json(PhotoListResponse {
        number_of_photos: photos.len(),
        photos,
    }))
}

pub async fn get_photo(
    State(state): State<Arc<AppState>>,
    Path(photo_name): Path<String>,
) -> Result<Response, ApiError> {
    let object = state
        .object_store
        .get(&photo_name)
        .await
        .map_err(|e| {
            tracing::warn!(photo = %photo_name, error = %e, "Failed to read photo");
            match e {
                ObjectStoreError::Read(_) => ApiError::bad_request("Error Reading File Data"),
                _ => ApiError::bad_request("Error Reading File"),
            }
        })?;

    let content_type =
        media::resolve_content_type(object.content_type.as_deref(), &photo_name, &object.data);

    let mut response = (StatusCode::OK, object.data).into_response();
    if let Ok(value) = content_type.parse() {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }

    Ok(response)
}

pub async fn upload_photo(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload: Option<UploadedFile> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, "Invalid multipart data"))?
    {
        if field.name() != Some("file") || upload.is_some() {
            continue;
        }

        let file_name =
            media::base_file_name(field.file_name().unwrap_or_default()).to_string();
        let content_type = field.content_type().map(|s| s.to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, "Failed to read file"))?;

        if data.len() as u64 > state.config.max_upload_size {
            return Err(ApiError::payload_too_large(format!(
                "File exceeds maximum upload size of {} bytes",
                state.config.max_upload_size
            )));
        }

        upload = Some(UploadedFile {
            file_name,
            content_type,
            data,
        });
    }

    let upload = upload.ok_or_else(|| ApiError::bad_request("file field is required"))?;

    let content_type = upload
        .content_type
        .filter(|ct| media::is_image(ct))
        .ok_or_else(|| ApiError::bad_request("Invalid Content-Type"))?;

    let key = media::object_key(&upload.file_name, &uuid::Uuid::new_v4());

    state
        .object_store
        .put(&key, upload.data, &content_type)
        .await
        .map_err(|e| {
            tracing::error!(photo = %key, error = %e, "Failed to store photo");
            ApiError::internal(e.to_string())
        })?;

    let pathname = media::escaped_pathname(&state.config.storage.bucket, &key);

    tracing::debug!(photo = %key, content_type = %content_type, "Uploaded photo");

    Ok(Json(UploadResponse {
        message: "file uploaded successfully".to_string(),
        pathname,
    }))
}

pub async fn delete_photo(
    State(state): State<Arc<AppState>>,
    Path(photo_name): Path<String>,
) -> Result<Json<MessageBody>, ApiError> {
    state
        .object_store
        .delete(&photo_name)
        .await
        .map_err(|e| {
            tracing::warn!(photo = %photo_name, error = %e, "Failed to delete photo");
            ApiError::internal(e.to_string())
        })?;

    tracing::debug!(photo = %photo_name, "Deleted photo");
    Ok(MessageBody::json("file deleted successfully"))
}

// ============================================================================
// Helpers
// ============================================================================

fn multipart_error(e: MultipartError, context: &str) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::payload_too_large(e.body_text());
    }
    ApiError::bad_request(format!("{context}: {}", e.body_text()))
}
