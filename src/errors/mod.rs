//! Error handling for the image-vault application

pub mod types;

pub use types::{AppError, StorageError};

/// Convenience result alias used throughout the application
pub type AppResult<T> = Result<T, AppError>;
