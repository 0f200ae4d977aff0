//! In-memory backend for component tests.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::Utc;
use fieldlog_types::models::{Capture, CaptureStatus, NewCapture, User};
use uuid::Uuid;

use crate::store::{Authenticator, ObjectStore, RecordStore, StoreError};

pub(crate) struct MemoryBackend {
    pub user: User,
    pub captures: Mutex<Vec<Capture>>,
    pub objects: Mutex<BTreeMap<String, Vec<u8>>>,
    /// Upload number (0-based) that should fail, if any.
    pub fail_upload_at: Mutex<Option<usize>>,
    pub uploads_seen: AtomicUsize,
    pub fail_insert: AtomicBool,
    pub fail_list: AtomicBool,
    pub signed_in: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            user: User {
                id: Uuid::new_v4(),
                email: "observer@example.com".into(),
                display_name: "Observer".into(),
                created_at: Utc::now(),
            },
            captures: Mutex::new(Vec::new()),
            objects: Mutex::new(BTreeMap::new()),
            fail_upload_at: Mutex::new(None),
            uploads_seen: AtomicUsize::new(0),
            fail_insert: AtomicBool::new(false),
            fail_list: AtomicBool::new(false),
            signed_in: AtomicBool::new(true),
        }
    }

    pub fn seed(&self, capture: Capture) {
        self.captures.lock().unwrap().push(capture);
    }

    pub fn object_names(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

impl RecordStore for MemoryBackend {
    async fn insert(&self, capture: NewCapture) -> Result<Capture, StoreError> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("connection reset".into()));
        }
        let now = Utc::now();
        let stored = Capture {
            id: Uuid::new_v4(),
            user_id: self.user.id,
            title: capture.title,
            description: capture.description,
            data: capture.data,
            status: capture.status,
            created_at: now,
            updated_at: now,
        };
        self.captures.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn list(&self, owner: Uuid) -> Result<Vec<Capture>, StoreError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("connection reset".into()));
        }
        let mut rows: Vec<Capture> =
            self.captures.lock().unwrap().iter().filter(|c| c.user_id == owner).cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn update_status(&self, id: Uuid, status: CaptureStatus) -> Result<Capture, StoreError> {
        let mut captures = self.captures.lock().unwrap();
        let capture = captures.iter_mut().find(|c| c.id == id).ok_or(StoreError::NotFound)?;
        capture.status = status;
        capture.updated_at = Utc::now();
        Ok(capture.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut captures = self.captures.lock().unwrap();
        let before = captures.len();
        captures.retain(|c| c.id != id);
        if captures.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

impl ObjectStore for MemoryBackend {
    async fn upload(&self, name: &str, _content_type: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let n = self.uploads_seen.fetch_add(1, Ordering::SeqCst);
        if *self.fail_upload_at.lock().unwrap() == Some(n) {
            return Err(StoreError::Transport("upload interrupted".into()));
        }
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(name) {
            return Err(StoreError::Conflict);
        }
        objects.insert(name.to_string(), bytes);
        Ok(())
    }

    fn public_url(&self, name: &str) -> String {
        format!("http://photos.test/storage/photos/{name}")
    }

    async fn remove(&self, name: &str) -> Result<(), StoreError> {
        self.objects.lock().unwrap().remove(name);
        Ok(())
    }
}

impl Authenticator for MemoryBackend {
    fn current_user(&self) -> Option<User> {
        self.signed_in.load(Ordering::SeqCst).then(|| self.user.clone())
    }

    async fn sign_out(&self) -> Result<(), StoreError> {
        self.signed_in.store(false, Ordering::SeqCst);
        Ok(())
    }
}
