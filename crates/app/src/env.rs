//! Snapshot of the user environment

use std::collections::BTreeMap;

/// Prefix that lets users namespace configuration away from app variables
const CONFIG_PREFIX: &str = "KILN_";

/// Immutable snapshot of environment variables
#[derive(Debug, Clone, Default)]
pub struct Environ {
    vars: BTreeMap<String, String>,
}

impl Environ {
    /// Snapshot the current process environment
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Build a view from explicit pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Raw variable lookup
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Look up a configuration variable, preferring the `KILN_` namespace
    ///
    /// Returns the value together with the variable name it was read from,
    /// so callers can attach provenance. Empty values count as unset.
    #[must_use]
    pub fn get_config_variable(&self, name: &str) -> Option<(String, String)> {
        let prefixed = format!("{CONFIG_PREFIX}{name}");
        for candidate in [prefixed.as_str(), name] {
            if let Some(value) = self.get(candidate) {
                if !value.is_empty() {
                    return Some((value.to_string(), candidate.to_string()));
                }
            }
        }
        None
    }
}
