//! Object storage
//!
//! The [`ObjectStore`] trait is the seam between the pipeline and durable
//! storage; handlers and services only ever see the trait object. The
//! filesystem implementation keeps each object as a payload file named by
//! its storage key plus a `<key>.json` metadata sidecar.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::errors::StorageError;
use crate::models::{ObjectMeta, StoredObject};

/// Durable object storage for image payloads
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Persist `body` under `key`, returning the metadata assigned at
    /// write time. Writing an existing key overwrites it.
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<ObjectMeta, StorageError>;

    /// Load the object stored under `key`, or `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StorageError>;
}

/// Compute the integrity tag for a payload: lowercase hex SHA-256.
pub fn compute_etag(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

/// Filesystem-backed object store
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| StorageError::io(root.display().to_string(), e))?;
        Ok(Self { root })
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn sidecar_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

/// Reject keys that could name anything outside the storage root.
fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key.len() <= 255
        && !key.starts_with('.')
        && !key.contains(['/', '\\'])
        && !key.contains("..");
    if valid {
        Ok(())
    } else {
        Err(StorageError::invalid_key(key))
    }
}

/// Content type from a key's extension, for objects missing a sidecar.
fn content_type_for_key(key: &str) -> &'static str {
    let extension = Path::new(key)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");

    match extension.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "bmp" => "image/bmp",
        "tiff" | "tif" => "image/tiff",
        _ => "application/octet-stream",
    }
}

fn rebuilt_meta(key: &str, body: &[u8]) -> ObjectMeta {
    ObjectMeta {
        content_type: content_type_for_key(key).to_string(),
        etag: compute_etag(body),
        size: body.len() as u64,
        stored_at: Utc::now(),
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<ObjectMeta, StorageError> {
        validate_key(key)?;

        let meta = ObjectMeta {
            content_type: content_type.to_string(),
            etag: compute_etag(&body),
            size: body.len() as u64,
            stored_at: Utc::now(),
        };
        let sidecar = serde_json::to_vec_pretty(&meta)
            .map_err(|e| StorageError::metadata(key, e.to_string()))?;

        fs::write(self.object_path(key), &body)
            .await
            .map_err(|e| StorageError::io(key, e))?;
        fs::write(self.sidecar_path(key), &sidecar)
            .await
            .map_err(|e| StorageError::io(key, e))?;

        debug!(
            "stored object {} ({} bytes, {}, etag {})",
            key, meta.size, meta.content_type, meta.etag
        );
        Ok(meta)
    }

    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StorageError> {
        validate_key(key)?;

        let body = match fs::read(self.object_path(key)).await {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(key, e)),
        };

        let meta = match fs::read(self.sidecar_path(key)).await {
            Ok(raw) => match serde_json::from_slice::<ObjectMeta>(&raw) {
                Ok(meta) => meta,
                Err(e) => {
                    warn!("unreadable metadata sidecar for {}: {}", key, e);
                    rebuilt_meta(key, &body)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => rebuilt_meta(key, &body),
            Err(e) => return Err(StorageError::io(key, e)),
        };

        Ok(Some(StoredObject {
            key: key.to_string(),
            body,
            meta,
        }))
    }
}
