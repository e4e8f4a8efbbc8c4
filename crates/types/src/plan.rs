//! The immutable build plan produced by a planning pass

use crate::metadata::Metadata;
use crate::step::{Input, Step};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Description of the final deployable image
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deploy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_cmd: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<Input>,
}

impl Deploy {
    /// Create an empty deploy descriptor
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Immutable description of an image build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPlan {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,

    #[serde(default, skip_serializing_if = "deploy_is_empty")]
    pub deploy: Deploy,

    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

fn deploy_is_empty(deploy: &Deploy) -> bool {
    deploy.start_cmd.is_none() && deploy.variables.is_empty() && deploy.inputs.is_empty()
}

impl BuildPlan {
    /// Create an empty build plan
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a step by name
    #[must_use]
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|step| step.name == name)
    }
}
