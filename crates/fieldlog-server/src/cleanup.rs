use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use fieldlog_api::AppState;
use fieldlog_db::Database;

/// Background task that removes orphaned photos.
///
/// A photo is orphaned once it is older than `grace` and no capture of its
/// owner references it, typically because the submission that uploaded it
/// never completed.
pub async fn run_cleanup_loop(state: AppState, interval: Duration, grace: chrono::Duration) {
    let mut interval = tokio::time::interval(interval);

    loop {
        interval.tick().await;

        match cleanup_orphans(&state, grace).await {
            Ok(count) => {
                if count > 0 {
                    info!("Cleanup: removed {} orphaned photos", count);
                }
            }
            Err(e) => {
                warn!("Cleanup error: {:#}", e);
            }
        }
    }
}

/// Returns how many photos were actually removed. Photos whose file could
/// not be deleted stay indexed and are retried on the next pass.
pub async fn cleanup_orphans(state: &AppState, grace: chrono::Duration) -> anyhow::Result<usize> {
    let cutoff = Utc::now() - grace;
    let orphans = with_db(state, move |db| db.unreferenced_photos(cutoff)).await?;

    let mut removed = 0;
    for photo in orphans {
        if let Err(e) = state.storage.delete(&photo.name).await {
            warn!("Could not delete orphaned photo {}: {}", photo.name, e);
            continue;
        }
        with_db(state, move |db| db.forget_photo(&photo.name)).await?;
        removed += 1;
    }

    Ok(removed)
}

async fn with_db<F, T>(state: &AppState, f: F) -> anyhow::Result<T>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db)).await?
}
