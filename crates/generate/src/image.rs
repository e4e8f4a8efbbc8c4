//! Starting-image step

use crate::step_builder::BuildOptions;
use kiln_resolver::{PackageRef, Resolver};
use kiln_types::Step;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Callback that picks the starting image once versions are resolved
pub type ResolveStepImage = Box<dyn Fn(&BuildOptions<'_>) -> String>;

/// Builds a step whose filesystem is a container image chosen at build time
pub struct ImageStepBuilder {
    display_name: String,
    resolver: Rc<RefCell<Resolver>>,
    packages: Vec<PackageRef>,
    outputs: Vec<String>,
    resolve: ResolveStepImage,
}

impl ImageStepBuilder {
    /// Create a builder with the given display name and resolve callback
    #[must_use]
    pub fn new(
        display_name: String,
        resolver: Rc<RefCell<Resolver>>,
        resolve: ResolveStepImage,
    ) -> Self {
        Self {
            display_name,
            resolver,
            packages: Vec::new(),
            outputs: Vec::new(),
            resolve,
        }
    }

    /// The step name this builder will produce
    #[must_use]
    pub fn name(&self) -> &str {
        &self.display_name
    }

    /// Register a package with a default version
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

    /// Declare an exported path
    pub fn add_output(&mut self, path: impl Into<String>) -> &mut Self {
        self.outputs.push(path.into());
        self
    }

    /// Project into a step rooted at the resolved image
    #[must_use]
    pub fn build(&self, options: &BuildOptions<'_>) -> Step {
        let mut step = Step::new(self.display_name.clone());
        step.starting_image = Some((self.resolve)(options));
        step.outputs = self.outputs.clone();
        step
    }
}

impl fmt::Debug for ImageStepBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageStepBuilder")
            .field("display_name", &self.display_name)
            .field("packages", &self.packages)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}
