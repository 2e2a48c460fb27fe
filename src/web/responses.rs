//! Error to HTTP response mapping
//!
//! Failure bodies on this service's wire contract are plain text: the
//! fixed phrases for validation and not-found outcomes, the underlying
//! failure message for upstream and storage errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::errors::{AppError, StorageError};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::InvalidContentType => {
                (StatusCode::BAD_REQUEST, "Invalid content type".to_string())
            }
            AppError::InvalidFileType => {
                (StatusCode::BAD_REQUEST, "Invalid file type".to_string())
            }
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message.clone()),
            AppError::NotFound => (StatusCode::NOT_FOUND, "Object Not Found".to_string()),
            AppError::UpstreamFetch { .. } => (StatusCode::BAD_GATEWAY, self.to_string()),
            // A key that names no storable path can never hold an object
            AppError::Storage(StorageError::InvalidKey { .. }) => {
                (StatusCode::NOT_FOUND, "Object Not Found".to_string())
            }
            AppError::Storage(e) => {
                error!("storage failure: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::Internal { message } => {
                error!("internal error: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StorageError;

    fn status_of(error: AppError) -> StatusCode {
        error.into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_of(AppError::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(AppError::InvalidContentType),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(AppError::InvalidFileType), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(AppError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(AppError::upstream_fetch("http://x", "timed out")),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(AppError::Storage(StorageError::invalid_key("a/b"))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(AppError::Storage(StorageError::io(
                "a.png",
                std::io::Error::other("disk gone")
            ))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
