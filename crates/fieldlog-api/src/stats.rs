use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;

use fieldlog_core::aggregate::{TimeWindow, summarize};
use fieldlog_types::api::Claims;

use crate::captures::load_captures;
use crate::state::{AppState, blocking};

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub days: Option<u32>,
}

/// GET /captures/stats?days=N: statistics over the caller's captures.
pub async fn capture_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let window = match query.days {
        Some(days) => TimeWindow::try_from(days).map_err(|_| StatusCode::BAD_REQUEST)?,
        None => TimeWindow::default(),
    };

    let uid = claims.sub.to_string();
    let captures = blocking(&state, move |db| load_captures(db, &uid)).await?;
    Ok(Json(summarize(&captures, window, Utc::now())))
}
