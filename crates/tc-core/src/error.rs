//! # AppError
//!
//! Centralized error handling for the archive.
//! Maps storage, upstream and configuration failures to actionable error types.

use thiserror::Error;

/// The primary error type for all tc-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (e.g., Post)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Invalid caller input (e.g., page number of zero)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Missing or malformed settings (e.g., no board id)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The source site failed or answered with something unreadable
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Infrastructure failure (e.g., SQLite locked, migration failed)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn post_not_found(id: i64) -> Self {
        AppError::NotFound("Post".to_string(), id.to_string())
    }
}

/// A specialized Result type for archive logic.
pub type Result<T> = std::result::Result<T, AppError>;
