use axum::{
    Extension, Json,
    body::{Body, Bytes},
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use tokio_util::io::ReaderStream;
use tracing::{error, info, warn};

use fieldlog_db::models::{PhotoRow, format_timestamp};
use fieldlog_storage::{StorageError, validate_name};
use fieldlog_types::api::{Claims, UploadResponse};

use crate::state::{AppState, blocking};

/// 20 MB upload limit for photos
pub const MAX_PHOTO_SIZE: usize = 20 * 1024 * 1024;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

fn storage_status(e: StorageError) -> StatusCode {
    match e {
        StorageError::InvalidName(_) => StatusCode::BAD_REQUEST,
        StorageError::AlreadyExists(_) => StatusCode::CONFLICT,
        StorageError::NotFound(_) => StatusCode::NOT_FOUND,
        StorageError::Io(e) => {
            error!("Photo storage I/O error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// PUT /storage/photos/{name}: raw image bytes; the object is write-once.
pub async fn upload_photo(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Result<impl IntoResponse, StatusCode> {
    validate_name(&name).map_err(storage_status)?;
    if bytes.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    if bytes.len() > MAX_PHOTO_SIZE {
        return Err(StatusCode::PAYLOAD_TOO_LARGE);
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    let stored = state.storage.put(&name, &bytes).await.map_err(storage_status)?;

    let row = PhotoRow {
        name: name.clone(),
        owner_id: claims.sub.to_string(),
        content_type,
        size: stored.size as i64,
        sha256: stored.sha256.clone(),
        created_at: format_timestamp(Utc::now()),
    };
    if let Err(status) = blocking(&state, move |db| db.insert_photo(&row)).await {
        // Keep disk and index consistent.
        if let Err(e) = state.storage.delete(&name).await {
            warn!("Could not remove orphaned photo {}: {}", name, e);
        }
        return Err(status);
    }

    info!(photo = %name, size = stored.size, user_id = %claims.sub, "Photo uploaded");
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            url: state.photo_url(&name),
            name,
            size: stored.size,
            sha256: stored.sha256,
        }),
    ))
}

/// GET /storage/photos/{name}: public, streamed from disk.
pub async fn download_photo(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    validate_name(&name).map_err(storage_status)?;

    let lookup = name.clone();
    let row = blocking(&state, move |db| db.get_photo(&lookup))
        .await?
        .ok_or(StatusCode::NOT_FOUND)?;

    let file = state.storage.open(&name).await.map_err(storage_status)?;
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        [
            (header::CONTENT_TYPE, row.content_type),
            (header::CONTENT_LENGTH, row.size.to_string()),
        ],
        body,
    ))
}

/// DELETE /storage/photos/{name}: only the uploader may delete.
pub async fn delete_photo(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    validate_name(&name).map_err(storage_status)?;

    let lookup = name.clone();
    let row = blocking(&state, move |db| db.get_photo(&lookup))
        .await?
        .ok_or(StatusCode::NOT_FOUND)?;
    if row.owner_id != claims.sub.to_string() {
        return Err(StatusCode::FORBIDDEN);
    }

    let owner = row.owner_id;
    let key = name.clone();
    blocking(&state, move |db| db.delete_photo(&owner, &key)).await?;
    state.storage.delete(&name).await.map_err(storage_status)?;

    info!(photo = %name, "Photo deleted");
    Ok(StatusCode::NO_CONTENT)
}
