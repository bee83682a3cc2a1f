//! Error types for Clipper.
//!
//! A single error enum covers configuration, I/O, datastore, build and
//! serialization failures. Parse failures in the time-expression grammar are
//! deliberately absent: they degrade to "unknown" values instead of errors.

use thiserror::Error;

/// Unified error type for Clipper.
///
/// Fallible functions return `Result<T, AppError>`. Messages carry the
/// channel, video or comment identifiers needed to diagnose the failure.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Datastore read/write errors
    #[error("Database error: {0}")]
    Database(String),

    /// Channel build and publish errors
    #[error("Build error: {0}")]
    Build(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
