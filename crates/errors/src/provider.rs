//! Provider error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ProviderError {
    #[error("provider {provider} failed to plan: {message}")]
    PlanFailed { provider: String, message: String },

    #[error("no provider detected for the application")]
    NoProviderDetected,
}
