//! Application view error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum AppError {
    #[error("file not found: {path}")]
    FileNotFound { path: String },

    #[error("invalid JSON in {path}: {message}")]
    InvalidJson { path: String, message: String },

    #[error("invalid glob pattern {pattern}: {message}")]
    InvalidPattern { pattern: String, message: String },
}
