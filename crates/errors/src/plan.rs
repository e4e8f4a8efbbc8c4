//! Build plan error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum PlanError {
    #[error("duplicate step name: {name}")]
    DuplicateStepName { name: String },
}
