//! Capture listing: fetch, client-side filtering, detail selection, delete.

use std::str::FromStr;

use tracing::{error, info};
use uuid::Uuid;

use fieldlog_types::models::{Capture, CaptureStatus, UnknownStatus};

use crate::store::RecordStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Only(CaptureStatus),
}

impl StatusFilter {
    pub fn matches(self, status: CaptureStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => wanted == status,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(StatusFilter::All);
        }
        s.parse().map(StatusFilter::Only)
    }
}

/// Search text and status selector, combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingFilter {
    pub search: String,
    pub status: StatusFilter,
}

impl ListingFilter {
    /// Case-insensitive substring match on title or location, plus the
    /// status selector. An empty search matches everything.
    pub fn matches(&self, capture: &Capture) -> bool {
        if !self.status.matches(capture.status) {
            return false;
        }
        let needle = self.search.to_lowercase();
        needle.is_empty()
            || capture.title.to_lowercase().contains(&needle)
            || capture.data.location.to_lowercase().contains(&needle)
    }
}

#[derive(Debug, Default)]
pub struct CaptureListing {
    captures: Vec<Capture>,
    filter: ListingFilter,
    selected: Option<Uuid>,
    loading: bool,
}

impl CaptureListing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn captures(&self) -> &[Capture] {
        &self.captures
    }

    pub fn filter(&self) -> &ListingFilter {
        &self.filter
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.filter.search = search.into();
    }

    pub fn set_status(&mut self, status: StatusFilter) {
        self.filter.status = status;
    }

    /// Captures passing the current filter, newest first.
    pub fn visible(&self) -> Vec<&Capture> {
        self.captures.iter().filter(|c| self.filter.matches(c)).collect()
    }

    /// Select a capture for the detail view. Unknown ids clear the selection.
    pub fn select(&mut self, id: Uuid) -> Option<&Capture> {
        self.selected = self.captures.iter().any(|c| c.id == id).then_some(id);
        self.selected()
    }

    pub fn selected(&self) -> Option<&Capture> {
        let id = self.selected?;
        self.captures.iter().find(|c| c.id == id)
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Reload every capture of `owner`. On failure the error is logged and
    /// the previous contents stay in place.
    pub async fn refresh<R: RecordStore>(&mut self, store: &R, owner: Uuid) {
        self.loading = true;
        match store.list(owner).await {
            Ok(mut captures) => {
                captures.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                self.captures = captures;
                if self.selected().is_none() {
                    self.selected = None;
                }
            }
            Err(e) => error!(error = %e, "Failed to load captures"),
        }
        self.loading = false;
    }

    /// Delete a capture after `confirm` approves it, then reload.
    /// Returns true if the capture was deleted.
    pub async fn delete<R, F>(&mut self, store: &R, owner: Uuid, id: Uuid, confirm: F) -> bool
    where
        R: RecordStore,
        F: FnOnce(&Capture) -> bool,
    {
        let Some(capture) = self.captures.iter().find(|c| c.id == id) else {
            return false;
        };
        if !confirm(capture) {
            return false;
        }

        if let Err(e) = store.delete(id).await {
            error!(capture_id = %id, error = %e, "Failed to delete capture");
            return false;
        }
        info!(capture_id = %id, "Capture deleted");

        if self.selected == Some(id) {
            self.selected = None;
        }
        self.refresh(store, owner).await;
        true
    }
}
