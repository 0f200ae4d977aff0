//! Flat-file object storage for capture photos.

use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

const MAX_NAME_LEN: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid object name: {0:?}")]
    InvalidName(String),
    #[error("object already exists: {0}")]
    AlreadyExists(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Size and content digest of a freshly written object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub size: u64,
    pub sha256: String,
}

/// Object names are single path segments: ASCII letters, digits, `.`, `_`
/// and `-`, not starting with a dot.
pub fn validate_name(name: &str) -> Result<(), StorageError> {
    let ok = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if ok {
        Ok(())
    } else {
        Err(StorageError::InvalidName(name.to_string()))
    }
}

/// Manages on-disk object storage.
///
/// Each object is stored as a single flat file at `{dir}/{name}`. Objects
/// are write-once: uploading an existing name is refused rather than
/// overwritten. Bytes are staged in a dot-prefixed partial file and linked
/// into place only once fully written, so a failed upload never claims its
/// name.
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub async fn new(dir: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(&dir).await?;
        info!("Photo storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    /// Path to the file for a given object.
    pub fn object_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        validate_name(name)?;
        Ok(self.dir.join(name))
    }

    pub async fn put(&self, name: &str, data: &[u8]) -> Result<StoredObject, StorageError> {
        let path = self.object_path(name)?;
        // Dot-prefixed, so never a valid object name.
        let partial = self.dir.join(format!(".{name}.{}.part", Uuid::new_v4()));

        let result = commit(&partial, &path, data).await;
        match fs::remove_file(&partial).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove partial upload {}: {}", partial.display(), e),
        }
        match result {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        let mut hasher = Sha256::new();
        hasher.update(data);

        Ok(StoredObject {
            size: data.len() as u64,
            sha256: hex::encode(hasher.finalize()),
        })
    }

    /// Open an object for streaming reads.
    pub async fn open(&self, name: &str) -> Result<fs::File, StorageError> {
        let path = self.object_path(name)?;
        fs::File::open(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(name.to_string()),
            _ => StorageError::Io(e),
        })
    }

    /// Delete an object. Already-missing objects are not an error.
    pub async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let path = self.object_path(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted photo object {}", name);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Photo object {} already gone", name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Write `data` to `partial`, then hard-link it to `path`. Linking fails
/// with `AlreadyExists` if the name is taken, which keeps objects write-once
/// under concurrent uploads.
async fn commit(partial: &Path, path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new().write(true).create_new(true).open(partial).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);
    fs::hard_link(partial, path).await
}
