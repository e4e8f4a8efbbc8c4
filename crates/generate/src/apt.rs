//! Apt package installation step

use kiln_types::{CacheMount, Command, Input, Step};

/// Builds a step that installs apt packages over its inputs
#[derive(Debug, Clone)]
pub struct AptStepBuilder {
    display_name: String,
    packages: Vec<String>,
    inputs: Vec<Input>,
    caches: Vec<CacheMount>,
}

impl AptStepBuilder {
    /// Create a builder with the given display name and apt cache mounts
    #[must_use]
    pub fn new(display_name: String, caches: Vec<CacheMount>) -> Self {
        Self {
            display_name,
            packages: Vec::new(),
            inputs: Vec::new(),
            caches,
        }
    }

    /// The step name this builder will produce
    #[must_use]
    pub fn name(&self) -> &str {
        &self.display_name
    }

    /// Add an apt package
    pub fn add_package(&mut self, name: impl Into<String>) -> &mut Self {
        self.packages.push(name.into());
        self
    }

    /// Add several apt packages
    pub fn add_packages(&mut self, names: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.packages.extend(names.into_iter().map(Into::into));
        self
    }

    /// Append an input
    pub fn add_input(&mut self, input: Input) -> &mut Self {
        self.inputs.push(input);
        self
    }

    /// Whether any packages have been requested
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Project into the apt installation step
    #[must_use]
    pub fn build(&self) -> Step {
        let mut step = Step::new(self.display_name.clone());
        step.inputs = self.inputs.clone();
        step.caches = self.caches.clone();

        if !self.packages.is_empty() {
            let mut packages = self.packages.clone();
            packages.sort();
            packages.dedup();
            step.commands.push(Command::exec(format!(
                "apt-get update && apt-get install -y --no-install-recommends {}",
                packages.join(" ")
            )));
        }

        step
    }
}
