//! Step definitions for the build plan

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single filesystem-mutating operation within a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Command {
    /// Copy a subtree from the local build context into the app directory
    Copy { src: String },
    /// Run a shell command
    Exec { cmd: String },
    /// Prepend a directory to the PATH
    Path { dir: String },
}

impl Command {
    /// Create a copy command
    pub fn copy(src: impl Into<String>) -> Self {
        Self::Copy { src: src.into() }
    }

    /// Create an exec command
    pub fn exec(cmd: impl Into<String>) -> Self {
        Self::Exec { cmd: cmd.into() }
    }

    /// Create a path-prepend command
    pub fn path(dir: impl Into<String>) -> Self {
        Self::Path { dir: dir.into() }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Copy { src } => write!(f, "COPY {src}"),
            Self::Exec { cmd } => write!(f, "RUN {cmd}"),
            Self::Path { dir } => write!(f, "PATH {dir}"),
        }
    }
}

/// Source filesystem that a step builds upon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Input {
    /// The filesystem produced by another step, optionally filtered
    Step {
        name: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        include: Vec<String>,
    },
    /// The local build context
    Local { path: String },
    /// A container image reference
    Image { reference: String },
}

impl Input {
    /// Create an input referencing another step's filesystem
    pub fn step(name: impl Into<String>) -> Self {
        Self::Step {
            name: name.into(),
            include: Vec::new(),
        }
    }

    /// Create a step input filtered to the given paths
    pub fn step_with_include(name: impl Into<String>, include: Vec<String>) -> Self {
        Self::Step {
            name: name.into(),
            include,
        }
    }

    /// Create an input from the local build context
    pub fn local(path: impl Into<String>) -> Self {
        Self::Local { path: path.into() }
    }

    /// Create an input from a container image
    pub fn image(reference: impl Into<String>) -> Self {
        Self::Image {
            reference: reference.into(),
        }
    }
}

/// A persistent cache directory mounted during execs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMount {
    pub id: String,
    pub path: String,
}

impl CacheMount {
    /// Create a new cache mount
    pub fn new(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }
}

/// Finalized unit of work within a build plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<Command>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<Input>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub caches: Vec<CacheMount>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starting_image: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl Step {
    /// Create a new empty step with the given name
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commands: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            variables: BTreeMap::new(),
            secrets: Vec::new(),
            caches: Vec::new(),
            starting_image: None,
            depends_on: Vec::new(),
        }
    }

    /// Directories this step prepends to the PATH, in declared order
    #[must_use]
    pub fn path_dirs(&self) -> Vec<String> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                Command::Path { dir } => Some(dir.clone()),
                _ => None,
            })
            .collect()
    }
}
