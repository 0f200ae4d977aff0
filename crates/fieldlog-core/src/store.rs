//! Collaborator contracts for the capture components.
//!
//! Every call is implicitly scoped to the signed-in user by the
//! implementation (bearer token, row ownership). The only explicit owner
//! predicate is the one `list` takes.

use std::future::Future;

use fieldlog_types::models::{Capture, CaptureStatus, NewCapture, User};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("you are not signed in")]
    Unauthorized,
    #[error("you do not have access to this record")]
    Forbidden,
    #[error("record not found")]
    NotFound,
    #[error("an object with that name already exists")]
    Conflict,
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("network error: {0}")]
    Transport(String),
}

/// Persistence for capture records.
pub trait RecordStore: Sync {
    fn insert(&self, capture: NewCapture) -> impl Future<Output = Result<Capture, StoreError>> + Send;

    /// All captures whose owner is `owner`, newest first.
    fn list(&self, owner: Uuid) -> impl Future<Output = Result<Vec<Capture>, StoreError>> + Send;

    fn update_status(
        &self,
        id: Uuid,
        status: CaptureStatus,
    ) -> impl Future<Output = Result<Capture, StoreError>> + Send;

    fn delete(&self, id: Uuid) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Binary object storage for photos.
pub trait ObjectStore: Sync {
    fn upload(
        &self,
        name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Publicly reachable URL of a previously uploaded object.
    fn public_url(&self, name: &str) -> String;

    fn remove(&self, name: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// The signed-in identity.
pub trait Authenticator: Sync {
    fn current_user(&self) -> Option<User>;

    fn sign_out(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}
