use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use fieldlog_db::Database;
use fieldlog_db::models::CaptureRow;
use fieldlog_types::api::{Claims, UpdateStatusRequest};
use fieldlog_types::models::{Capture, NewCapture};

use crate::state::{AppState, blocking};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub user_id: Option<Uuid>,
}

pub(crate) fn load_captures(db: &Database, user_id: &str) -> anyhow::Result<Vec<Capture>> {
    db.list_captures(user_id)?
        .into_iter()
        .map(CaptureRow::into_capture)
        .collect()
}

/// Rows are always scoped to the caller. A `user_id` predicate naming
/// anyone else is refused outright.
pub async fn list_captures(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    if query.user_id.is_some_and(|id| id != claims.sub) {
        warn!(caller = %claims.sub, "Refused listing another user's captures");
        return Err(StatusCode::FORBIDDEN);
    }

    let uid = claims.sub.to_string();
    let captures = blocking(&state, move |db| load_captures(db, &uid)).await?;
    Ok(Json(captures))
}

pub async fn create_capture(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NewCapture>,
) -> Result<impl IntoResponse, StatusCode> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let now = Utc::now();
    let capture = Capture {
        id: Uuid::new_v4(),
        user_id: claims.sub,
        title: title.to_string(),
        description: req.description.filter(|d| !d.trim().is_empty()),
        data: req.data,
        status: req.status,
        created_at: now,
        updated_at: now,
    };

    let stored = capture.clone();
    blocking(&state, move |db| db.insert_capture(&stored)).await?;

    info!(capture_id = %capture.id, user_id = %claims.sub, "Capture created");
    Ok((StatusCode::CREATED, Json(capture)))
}

pub async fn get_capture(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let capture = fetch_owned(&state, claims.sub, id).await?;
    Ok(Json(capture))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let uid = claims.sub.to_string();
    let cid = id.to_string();
    let updated = blocking(&state, move |db| {
        db.update_capture_status(&uid, &cid, req.status, Utc::now())
    })
    .await?;
    if !updated {
        return Err(StatusCode::NOT_FOUND);
    }

    info!(capture_id = %id, status = %req.status, "Capture status changed");
    let capture = fetch_owned(&state, claims.sub, id).await?;
    Ok(Json(capture))
}

pub async fn delete_capture(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let uid = claims.sub.to_string();
    let cid = id.to_string();
    let deleted = blocking(&state, move |db| db.delete_capture(&uid, &cid)).await?;
    if !deleted {
        return Err(StatusCode::NOT_FOUND);
    }

    info!(capture_id = %id, "Capture deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_owned(state: &AppState, owner: Uuid, id: Uuid) -> Result<Capture, StatusCode> {
    let uid = owner.to_string();
    let cid = id.to_string();
    blocking(state, move |db| db.get_capture(&uid, &cid)?.map(CaptureRow::into_capture).transpose())
        .await?
        .ok_or(StatusCode::NOT_FOUND)
}
