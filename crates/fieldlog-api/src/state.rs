use std::sync::Arc;

use axum::http::StatusCode;
use tracing::error;

use fieldlog_db::Database;
use fieldlog_storage::Storage;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub storage: Storage,
    pub jwt_secret: String,
    /// Base used when building public photo URLs, without trailing slash.
    pub public_base_url: String,
}

impl AppStateInner {
    pub fn new(db: Database, storage: Storage, jwt_secret: String, public_base_url: &str) -> Self {
        Self {
            db,
            storage,
            jwt_secret,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn photo_url(&self, name: &str) -> String {
        format!("{}/storage/photos/{}", self.public_base_url, name)
    }
}

/// Run a database call off the async runtime. Any failure is logged and
/// reported as 500.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, StatusCode>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("Database error: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}
