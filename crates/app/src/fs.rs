//! Read-only view over the application source tree

use globset::{Glob, GlobSet, GlobSetBuilder};
use kiln_errors::{AppError, Error, Result};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directories that never participate in detection
const SKIP_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    ".venv",
    "venv",
    "__pycache__",
    "target",
];

/// Read-only snapshot of an application source tree
#[derive(Debug, Clone)]
pub struct App {
    root: PathBuf,
    files: Vec<String>,
}

impl App {
    /// Scan the tree rooted at `root`, recording relative file paths
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be walked.
    pub fn scan(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let mut files = Vec::new();

        let walker = WalkDir::new(&root).into_iter().filter_entry(|entry| {
            entry.depth() == 0
                || !entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| SKIP_DIRS.contains(&name))
        });

        for entry in walker {
            let entry = entry.map_err(|e| Error::internal(format!("walk failed: {e}")))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(&root) {
                files.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }

        files.sort();
        Ok(Self { root, files })
    }

    /// The scanned root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether any file in the tree matches the doublestar glob `pattern`
    #[must_use]
    pub fn has_match(&self, pattern: &str) -> bool {
        match Self::compile(pattern) {
            Ok(set) => self.files.iter().any(|file| set.is_match(file)),
            Err(err) => {
                tracing::warn!("ignoring invalid glob {pattern}: {err}");
                false
            }
        }
    }

    /// All files matching the glob `pattern`, sorted
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidPattern` if the glob does not compile.
    pub fn find_files(&self, pattern: &str) -> Result<Vec<String>> {
        let set = Self::compile(pattern)?;
        Ok(self
            .files
            .iter()
            .filter(|file| set.is_match(file))
            .cloned()
            .collect())
    }

    /// Files matching `pattern` whose contents match `regex`
    ///
    /// Unreadable files are skipped.
    #[must_use]
    pub fn find_files_with_content(&self, pattern: &str, regex: &Regex) -> Vec<String> {
        let Ok(matches) = self.find_files(pattern) else {
            return Vec::new();
        };

        matches
            .into_iter()
            .filter(|file| {
                std::fs::read_to_string(self.root.join(file))
                    .map(|contents| regex.is_match(&contents))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Read a file relative to the root
    ///
    /// # Errors
    ///
    /// Returns `AppError::FileNotFound` for missing files and an `Io` error
    /// for anything else that fails.
    pub fn read_file(&self, path: &str) -> Result<String> {
        let full = self.root.join(path);
        std::fs::read_to_string(&full).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                AppError::FileNotFound {
                    path: path.to_string(),
                }
                .into()
            } else {
                Error::io_with_path(&err, path)
            }
        })
    }

    /// Read and deserialize a JSON file relative to the root
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidJson` if the contents do not deserialize.
    pub fn read_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let contents = self.read_file(path)?;
        serde_json::from_str(&contents).map_err(|err| {
            AppError::InvalidJson {
                path: path.to_string(),
                message: err.to_string(),
            }
            .into()
        })
    }

    fn compile(pattern: &str) -> Result<GlobSet> {
        let glob = Glob::new(pattern).map_err(|err| AppError::InvalidPattern {
            pattern: pattern.to_string(),
            message: err.to_string(),
        })?;
        let mut builder = GlobSetBuilder::new();
        builder.add(glob);
        builder.build().map_err(|err| {
            AppError::InvalidPattern {
                pattern: pattern.to_string(),
                message: err.to_string(),
            }
            .into()
        })
    }
}
