//! Per-build container of step builders and planning state

use crate::apt::AptStepBuilder;
use crate::caches::CachePool;
use crate::image::{ImageStepBuilder, ResolveStepImage};
use crate::logger::Logger;
use crate::mise::MiseStepBuilder;
use crate::step_builder::{BuildOptions, CommandStepBuilder, StepBuilder};
use crate::RUNTIME_IMAGE;
use kiln_app::{App, Environ};
use kiln_errors::{PlanError, Result};
use kiln_resolver::{PackageRef, Resolver};
use kiln_types::{BuildPlan, CacheMount, Deploy, Input, Metadata};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

const APT_CACHE_DIR: &str = "/var/cache/apt";
const APT_LISTS_DIR: &str = "/var/lib/apt/lists";

/// Everything a planning pass produces
#[derive(Debug, Clone)]
pub struct BuildResult {
    /// The finalized plan
    pub plan: BuildPlan,
    /// Name of the provider that planned the build
    pub provider: String,
    /// Resolved runtime packages in resolver insertion order
    pub packages: Vec<PackageRef>,
    /// User-facing planning messages
    pub logs: Vec<String>,
}

/// Mediates provider contributions for one plan-generation pass
pub struct GenerateContext<'a> {
    /// Application source tree view
    pub app: &'a App,
    /// User environment view
    pub env: &'a Environ,
    /// Plan-level metadata
    pub metadata: Metadata,
    /// Planning-pass logger
    pub logger: Logger,
    /// Deploy descriptor filled in by the provider
    pub deploy: Deploy,
    caches: CachePool,
    resolver: Rc<RefCell<Resolver>>,
    steps: Vec<StepBuilder>,
    mise_index: Option<usize>,
    step_prefix: String,
}

impl<'a> GenerateContext<'a> {
    /// Create a context over an application and environment view
    #[must_use]
    pub fn new(app: &'a App, env: &'a Environ) -> Self {
        Self {
            app,
            env,
            metadata: Metadata::new(),
            logger: Logger::new(),
            deploy: Deploy::new(),
            caches: CachePool::new(),
            resolver: Rc::new(RefCell::new(Resolver::new())),
            steps: Vec::new(),
            mise_index: None,
            step_prefix: String::new(),
        }
    }

    /// Prefix every subsequently created step name
    pub fn set_step_prefix(&mut self, prefix: impl Into<String>) {
        self.step_prefix = prefix.into();
    }

    /// Apply the configured step-name policy; pure
    #[must_use]
    pub fn step_name(&self, name: &str) -> String {
        format!("{}{name}", self.step_prefix)
    }

    /// Intern a cache mount in the shared pool
    pub fn add_cache(&mut self, id: &str, path: &str) -> CacheMount {
        self.caches.add(id, path)
    }

    /// The input every deploy filesystem starts from
    #[must_use]
    pub fn default_runtime_input(&self) -> Input {
        Input::image(RUNTIME_IMAGE)
    }

    /// Resolved runtime packages in resolver insertion order
    #[must_use]
    pub fn resolved_packages(&self) -> Vec<PackageRef> {
        self.resolver.borrow().packages()
    }

    /// The single mise step builder, created on first use
    pub fn mise_step_builder(&mut self) -> &mut MiseStepBuilder {
        let index = match self.mise_index {
            Some(index) => index,
            None => {
                let cache = self.caches.add("mise", "/mise/cache");
                let builder = MiseStepBuilder::new(
                    self.step_name("packages"),
                    Rc::clone(&self.resolver),
                    cache,
                );
                let index = self.steps.len();
                self.steps.push(StepBuilder::Mise(builder));
                self.mise_index = Some(index);
                index
            }
        };

        match &mut self.steps[index] {
            StepBuilder::Mise(builder) => builder,
            _ => unreachable!("mise index always points at the mise builder"),
        }
    }

    /// Append a command step builder and return it
    pub fn new_command_step(&mut self, name: &str) -> &mut CommandStepBuilder {
        let builder = CommandStepBuilder::new(self.step_name(name));
        self.steps.push(StepBuilder::Command(builder));
        match self.steps.last_mut() {
            Some(StepBuilder::Command(builder)) => builder,
            _ => unreachable!("just appended a command builder"),
        }
    }

    /// Append an apt step builder and return it
    pub fn new_apt_step(&mut self, name: &str) -> &mut AptStepBuilder {
        let caches = vec![
            self.caches.add("apt", APT_CACHE_DIR),
            self.caches.add("apt-lists", APT_LISTS_DIR),
        ];
        let builder = AptStepBuilder::new(self.step_name(name), caches);
        self.steps.push(StepBuilder::Apt(builder));
        match self.steps.last_mut() {
            Some(StepBuilder::Apt(builder)) => builder,
            _ => unreachable!("just appended an apt builder"),
        }
    }

    /// Append an image step builder and return it
    pub fn new_image_step(
        &mut self,
        name: &str,
        resolve: impl Fn(&BuildOptions<'_>) -> String + 'static,
    ) -> &mut ImageStepBuilder {
        let builder = ImageStepBuilder::new(
            self.step_name(name),
            Rc::clone(&self.resolver),
            Box::new(resolve) as ResolveStepImage,
        );
        self.steps.push(StepBuilder::Image(builder));
        match self.steps.last_mut() {
            Some(StepBuilder::Image(builder)) => builder,
            _ => unreachable!("just appended an image builder"),
        }
    }

    /// Finalize every builder, in insertion order, into a build plan
    ///
    /// # Errors
    ///
    /// Returns `PlanError::DuplicateStepName` when two builders share a
    /// display name.
    pub fn finalize(self, provider: &str) -> Result<BuildResult> {
        let Self {
            metadata,
            logger,
            deploy,
            resolver,
            steps,
            ..
        } = self;

        let resolver = resolver.borrow();
        let options = BuildOptions::new(&resolver);

        let mut plan = BuildPlan::new();
        let mut seen = HashSet::new();
        for builder in &steps {
            let step = builder.build(&options);
            if !seen.insert(step.name.clone()) {
                return Err(PlanError::DuplicateStepName { name: step.name }.into());
            }
            plan.steps.push(step);
        }

        plan.deploy = deploy;
        plan.metadata = metadata;

        Ok(BuildResult {
            plan,
            provider: provider.to_string(),
            packages: resolver.packages(),
            logs: logger.messages().to_vec(),
        })
    }
}
