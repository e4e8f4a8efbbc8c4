#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Runtime toolchain version selection for kiln
//!
//! The resolver tracks which runtime packages a build needs and the version
//! each was last pinned to, together with where that pin came from. There is
//! no constraint solving; version selection is last-write-wins.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a runtime toolchain entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRef {
    /// Package name (e.g. "node", "python")
    pub name: String,
    /// Pinned version
    pub version: String,
    /// Where the pinned version came from (a file path, an env var name, "default")
    pub source: String,
}

impl PackageRef {
    /// Create a new package ref
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            source: source.into(),
        }
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} ({})", self.name, self.version, self.source)
    }
}

/// Accumulator of runtime-toolchain version selections
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    packages: IndexMap<String, PackageRef>,
}

impl Resolver {
    /// Create an empty resolver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the existing entry for `name` unchanged, or insert one pinned
    /// to `default_version` with "default" provenance
    pub fn default_version(&mut self, name: &str, default_version: &str) -> PackageRef {
        self.packages
            .entry(name.to_string())
            .or_insert_with(|| PackageRef::new(name, default_version, "default"))
            .clone()
    }

    /// Overwrite the pinned version and provenance for the entry identified
    /// by `pkg.name`, inserting it if absent. Last writer wins.
    pub fn version(&mut self, pkg: &PackageRef, version: &str, source: &str) {
        self.packages.insert(
            pkg.name.clone(),
            PackageRef::new(pkg.name.clone(), version, source),
        );
    }

    /// Look up the current pin for a package
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PackageRef> {
        self.packages.get(name)
    }

    /// All pinned packages in insertion order
    #[must_use]
    pub fn packages(&self) -> Vec<PackageRef> {
        self.packages.values().cloned().collect()
    }
}
