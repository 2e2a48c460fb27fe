//! Core data types shared by the ingestion and retrieval paths

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata assigned by the object store at write time
///
/// Persisted as the JSON sidecar next to every payload file, and echoed
/// back to upload callers and image consumers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObjectMeta {
    /// MIME type attached to the payload at ingestion
    pub content_type: String,
    /// Integrity tag: lowercase hex SHA-256 of the payload bytes
    pub etag: String,
    /// Payload size in bytes
    pub size: u64,
    /// Write timestamp
    pub stored_at: DateTime<Utc>,
}

/// A stored object as returned by the object store
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// Storage key (`<id>.<extension>`)
    pub key: String,
    /// Payload bytes
    pub body: Bytes,
    /// Write-time metadata
    pub meta: ObjectMeta,
}

/// Per-item ingestion result
///
/// Keyed in the response map by the caller-supplied identifier: the source
/// URL in URL-list mode, the declared filename in multipart mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadResultEntry {
    /// Public URL the stored image is served from
    pub path: String,
    /// Integrity tag assigned at write time
    pub etag: String,
    /// MIME type the image was stored with
    pub content_type: String,
}

/// A buffered multipart file part awaiting ingestion
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Filename declared in the part's Content-Disposition
    pub file_name: String,
    /// MIME type declared on the part
    pub content_type: String,
    /// Part payload
    pub data: Bytes,
}
