//! Plan-level metadata collected during generation

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A metadata value, either a string or a flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    String(String),
    Bool(bool),
}

/// String/bool map describing how the plan was produced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata {
    values: BTreeMap<String, MetadataValue>,
}

impl Metadata {
    /// Create empty metadata
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a string value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values
            .insert(name.into(), MetadataValue::String(value.into()));
    }

    /// Set a boolean value
    pub fn set_bool(&mut self, name: impl Into<String>, value: bool) {
        self.values.insert(name.into(), MetadataValue::Bool(value));
    }

    /// Get a string value
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(MetadataValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Get a boolean value
    #[must_use]
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(MetadataValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Check whether any values have been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
