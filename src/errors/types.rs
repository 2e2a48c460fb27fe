//! Error type definitions for the image-vault application
//!
//! A small hierarchical error system: `AppError` is the request-level
//! taxonomy that the web layer maps onto HTTP statuses, `StorageError`
//! covers the object-store backend.

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or mismatched upload credential
    #[error("Unauthorized")]
    Unauthorized,

    /// Upload request with a content type that selects no ingestion mode
    #[error("Invalid content type")]
    InvalidContentType,

    /// Multipart upload containing a part that is not declared as an image
    #[error("Invalid file type")]
    InvalidFileType,

    /// Malformed request body or multipart payload
    #[error("{message}")]
    BadRequest { message: String },

    /// Retrieval of a storage key with no stored object behind it
    #[error("Object Not Found")]
    NotFound,

    /// A remote image fetch failed (transport error or non-success status)
    #[error("Failed to fetch '{url}': {message}")]
    UpstreamFetch { url: String, message: String },

    /// Object store errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Object store specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Keys that name no storable path (empty, traversal, separators)
    #[error("Invalid object key: '{key}'")]
    InvalidKey { key: String },

    /// Filesystem failures while reading or writing an object
    #[error("I/O error for '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Metadata sidecar could not be encoded or the backend misbehaved
    #[error("Metadata error for '{key}': {message}")]
    Metadata { key: String, message: String },
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a bad request error with a custom message
    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Create an upstream fetch error for a given source URL
    pub fn upstream_fetch<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::UpstreamFetch {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl StorageError {
    pub fn invalid_key<S: Into<String>>(key: S) -> Self {
        Self::InvalidKey { key: key.into() }
    }

    pub fn io<S: Into<String>>(key: S, source: std::io::Error) -> Self {
        Self::Io {
            key: key.into(),
            source,
        }
    }

    pub fn metadata<K: Into<String>, M: Into<String>>(key: K, message: M) -> Self {
        Self::Metadata {
            key: key.into(),
            message: message.into(),
        }
    }
}
