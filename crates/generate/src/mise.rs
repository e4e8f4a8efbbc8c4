//! Runtime toolchain installation step

use crate::step_builder::BuildOptions;
use crate::MISE_IMAGE;
use kiln_resolver::{PackageRef, Resolver};
use kiln_types::{CacheMount, Command, Input, Step};
use std::cell::RefCell;
use std::rc::Rc;

/// Where mise keeps its data inside the build filesystem
pub const MISE_DATA_DIR: &str = "/mise";

/// Builds the step that installs every resolved runtime package
///
/// There is a single mise step per context; providers register the packages
/// they need on it and pin versions through the shared resolver.
#[derive(Debug, Clone)]
pub struct MiseStepBuilder {
    display_name: String,
    resolver: Rc<RefCell<Resolver>>,
    packages: Vec<PackageRef>,
    supporting_apt_packages: Vec<String>,
    cache: CacheMount,
}

impl MiseStepBuilder {
    /// Create the mise step builder
    #[must_use]
    pub fn new(display_name: String, resolver: Rc<RefCell<Resolver>>, cache: CacheMount) -> Self {
        Self {
            display_name,
            resolver,
            packages: Vec::new(),
            supporting_apt_packages: Vec::new(),
            cache,
        }
    }

    /// The step name this builder will produce
    #[must_use]
    pub fn name(&self) -> &str {
        &self.display_name
    }

    /// Register a package with a default version
    ///
    /// Returns the existing ref unchanged when the package was already
    /// registered on this step.
    pub fn default_package(&mut self, name: &str, default_version: &str) -> PackageRef {
        if let Some(existing) = self.packages.iter().find(|pkg| pkg.name == name) {
            return existing.clone();
        }

        let pkg = self
            .resolver
            .borrow_mut()
            .default_version(name, default_version);
        self.packages.push(pkg.clone());
        pkg
    }

    /// Pin a registered package to a version from the given source
    pub fn version(&mut self, pkg: &PackageRef, version: &str, source: &str) {
        self.resolver.borrow_mut().version(pkg, version, source);
    }

    /// Record an apt package needed only while installing toolchains
    pub fn add_supporting_apt_package(&mut self, name: impl Into<String>) {
        self.supporting_apt_packages.push(name.into());
    }

    /// Paths downstream steps should include to pick up the toolchains
    #[must_use]
    pub fn output_paths(&self) -> Vec<String> {
        vec![
            format!("{MISE_DATA_DIR}/shims"),
            format!("{MISE_DATA_DIR}/installs"),
        ]
    }

    /// Project into the toolchain installation step
    #[must_use]
    pub fn build(&self, options: &BuildOptions<'_>) -> Step {
        let mut step = Step::new(self.display_name.clone());
        step.inputs = vec![Input::image(MISE_IMAGE)];
        step.variables.insert(
            "MISE_DATA_DIR".to_string(),
            MISE_DATA_DIR.to_string(),
        );
        step.variables.insert(
            "MISE_CACHE_DIR".to_string(),
            format!("{MISE_DATA_DIR}/cache"),
        );
        step.caches = vec![self.cache.clone()];

        if !self.supporting_apt_packages.is_empty() {
            let mut packages = self.supporting_apt_packages.clone();
            packages.sort();
            packages.dedup();
            step.commands.push(Command::exec(format!(
                "apt-get update && apt-get install -y --no-install-recommends {}",
                packages.join(" ")
            )));
        }

        for registered in &self.packages {
            // The resolver holds the final pin; the registered ref only
            // names the package.
            let pinned = options
                .resolved_package(&registered.name)
                .cloned()
                .unwrap_or_else(|| registered.clone());
            step.commands.push(Command::exec(format!(
                "mise use -g {}@{}",
                pinned.name, pinned.version
            )));
        }

        step.commands
            .push(Command::path(format!("{MISE_DATA_DIR}/shims")));
        step.outputs = self.output_paths();
        step
    }
}
