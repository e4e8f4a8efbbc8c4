//! Build graph error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum GraphError {
    #[error("cycle detected: {step}")]
    CycleDetected { step: String },

    #[error("dependency violation: {step} waiting for unprocessed parent {parent}")]
    DependencyViolation { step: String, parent: String },

    #[error("parent {parent} of {step} has no state")]
    MissingParentState { parent: String, step: String },
}
