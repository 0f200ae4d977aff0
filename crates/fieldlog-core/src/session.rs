//! Signed-in shell: owns the backend and the three capture components and
//! switches between them.

use std::time::Duration;

use chrono::{DateTime, Utc};
use fieldlog_types::models::{Capture, User};
use tracing::{debug, info};
use uuid::Uuid;

use crate::aggregate::{StatsPanel, TimeWindow};
use crate::entry::{CaptureEntry, EntryError};
use crate::listing::CaptureListing;
use crate::store::{Authenticator, ObjectStore, RecordStore, StoreError};

const DEFAULT_RETURN_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum View {
    #[default]
    Capture,
    List,
    Stats,
}

pub struct Shell<B> {
    backend: B,
    user: User,
    view: View,
    entry: CaptureEntry,
    listing: CaptureListing,
    stats: StatsPanel,
    return_delay: Duration,
    clock: fn() -> DateTime<Utc>,
}

impl<B> Shell<B>
where
    B: RecordStore + ObjectStore + Authenticator,
{
    /// Open the shell for the backend's signed-in user.
    pub fn new(backend: B) -> Result<Self, StoreError> {
        let user = backend.current_user().ok_or(StoreError::Unauthorized)?;
        info!(user_id = %user.id, "Session opened");
        Ok(Self {
            backend,
            user,
            view: View::default(),
            entry: CaptureEntry::new(),
            listing: CaptureListing::new(),
            stats: StatsPanel::new(),
            return_delay: DEFAULT_RETURN_DELAY,
            clock: Utc::now,
        })
    }

    pub fn with_return_delay(mut self, delay: Duration) -> Self {
        self.return_delay = delay;
        self
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn entry(&self) -> &CaptureEntry {
        &self.entry
    }

    pub fn entry_mut(&mut self) -> &mut CaptureEntry {
        &mut self.entry
    }

    pub fn listing(&self) -> &CaptureListing {
        &self.listing
    }

    pub fn listing_mut(&mut self) -> &mut CaptureListing {
        &mut self.listing
    }

    pub fn stats(&self) -> &StatsPanel {
        &self.stats
    }

    /// Activate `view`, loading whatever data it shows.
    pub async fn navigate(&mut self, view: View) {
        debug!(?view, "Navigating");
        self.view = view;
        match view {
            View::Capture => {}
            View::List => self.listing.refresh(&self.backend, self.user.id).await,
            View::Stats => {
                let window = self.stats.window();
                self.refresh_stats(window).await;
            }
        }
    }

    /// Submit the entry form. On success the shell returns to the listing
    /// after the return delay; on failure it stays on the form.
    pub async fn submit_capture(&mut self) -> Result<Capture, EntryError> {
        let now = (self.clock)();
        let capture = self.entry.submit(&self.backend, &self.backend, now).await?;
        if !self.return_delay.is_zero() {
            tokio::time::sleep(self.return_delay).await;
        }
        self.navigate(View::List).await;
        Ok(capture)
    }

    pub async fn set_window(&mut self, window: TimeWindow) {
        self.refresh_stats(window).await;
    }

    /// Delete a capture from the listing once `confirm` approves it.
    pub async fn delete_capture<F>(&mut self, id: Uuid, confirm: F) -> bool
    where
        F: FnOnce(&Capture) -> bool,
    {
        self.listing.delete(&self.backend, self.user.id, id, confirm).await
    }

    /// Sign out and drop all component state. The backend is handed back
    /// so a new session can be opened on it.
    pub async fn sign_out(self) -> Result<B, StoreError> {
        self.backend.sign_out().await?;
        info!(user_id = %self.user.id, "Signed out");
        Ok(self.backend)
    }

    async fn refresh_stats(&mut self, window: TimeWindow) {
        let now = (self.clock)();
        self.stats.refresh(&self.backend, self.user.id, window, now).await;
    }
}
