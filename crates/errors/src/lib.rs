#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Error types for the kiln build planner
//!
//! This crate provides fine-grained error types organized by domain.
//! All error types implement Clone for easier handling.

pub mod app;
pub mod graph;
pub mod plan;
pub mod provider;

// Re-export all error types at the root
pub use app::AppError;
pub use graph::GraphError;
pub use plan::PlanError;
pub use provider::ProviderError;

use thiserror::Error;

/// Generic error type for cross-crate boundaries
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    #[error("app error: {0}")]
    App(#[from] AppError),

    #[error("plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("I/O error: {message}")]
    Io {
        message: String,
        path: Option<String>,
    },
}

impl Error {
    /// Create an internal error with a message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an Io error with an associated path
    pub fn io_with_path(err: &std::io::Error, path: impl Into<String>) -> Self {
        Self::Io {
            message: err.to_string(),
            path: Some(path.into()),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            path: None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {err}"))
    }
}

/// Result type alias for kiln operations
pub type Result<T> = std::result::Result<T, Error>;
