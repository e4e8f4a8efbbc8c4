//! The closed family of step builders

use crate::apt::AptStepBuilder;
use crate::image::ImageStepBuilder;
use crate::mise::MiseStepBuilder;
use kiln_resolver::{PackageRef, Resolver};
use kiln_types::{CacheMount, Command, Input, Step};
use std::collections::BTreeMap;

/// Context handed to builders when they project into finalized steps
pub struct BuildOptions<'a> {
    resolver: &'a Resolver,
}

impl<'a> BuildOptions<'a> {
    /// Create build options over a resolver view
    #[must_use]
    pub fn new(resolver: &'a Resolver) -> Self {
        Self { resolver }
    }

    /// The pinned version for a package, if one was registered
    #[must_use]
    pub fn resolved_package(&self, name: &str) -> Option<&PackageRef> {
        self.resolver.get(name)
    }
}

/// A step builder of any flavor
///
/// The set of flavors is closed; every flavor projects into a plain `Step`.
pub enum StepBuilder {
    Command(CommandStepBuilder),
    Mise(MiseStepBuilder),
    Apt(AptStepBuilder),
    Image(ImageStepBuilder),
}

impl StepBuilder {
    /// The display name this builder's step will carry
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self {
            Self::Command(builder) => builder.name(),
            Self::Mise(builder) => builder.name(),
            Self::Apt(builder) => builder.name(),
            Self::Image(builder) => builder.name(),
        }
    }

    /// Project this builder into its finalized step
    #[must_use]
    pub fn build(&self, options: &BuildOptions<'_>) -> Step {
        match self {
            Self::Command(builder) => builder.build(),
            Self::Mise(builder) => builder.build(options),
            Self::Apt(builder) => builder.build(),
            Self::Image(builder) => builder.build(options),
        }
    }
}

/// Accumulates commands, inputs, env vars, secrets, caches and outputs
#[derive(Debug, Clone)]
pub struct CommandStepBuilder {
    display_name: String,
    commands: Vec<Command>,
    inputs: Vec<Input>,
    variables: BTreeMap<String, String>,
    secrets: Vec<String>,
    caches: Vec<CacheMount>,
    outputs: Vec<String>,
    depends_on: Vec<String>,
}

impl CommandStepBuilder {
    /// Create a builder with the given display name
    #[must_use]
    pub fn new(display_name: String) -> Self {
        Self {
            display_name,
            commands: Vec::new(),
            inputs: Vec::new(),
            variables: BTreeMap::new(),
            secrets: Vec::new(),
            caches: Vec::new(),
            outputs: Vec::new(),
            depends_on: Vec::new(),
        }
    }

    /// The step name this builder will produce
    #[must_use]
    pub fn name(&self) -> &str {
        &self.display_name
    }

    /// Append a command; duplicates are preserved verbatim
    pub fn add_command(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }

    /// Append several commands in order
    pub fn add_commands(&mut self, commands: impl IntoIterator<Item = Command>) -> &mut Self {
        self.commands.extend(commands);
        self
    }

    /// Append an input
    pub fn add_input(&mut self, input: Input) -> &mut Self {
        self.inputs.push(input);
        self
    }

    /// Set an environment variable
    pub fn add_env_var(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Set several environment variables
    pub fn add_env_vars<I, K, V>(&mut self, vars: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in vars {
            self.variables.insert(name.into(), value.into());
        }
        self
    }

    /// Prepend directories to the PATH
    pub fn add_paths(&mut self, dirs: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        for dir in dirs {
            self.commands.push(Command::path(dir));
        }
        self
    }

    /// Expose secrets whose names start with any of the given prefixes
    pub fn use_secrets_with_prefixes(
        &mut self,
        prefixes: impl IntoIterator<Item = impl Into<String>>,
    ) -> &mut Self {
        self.secrets.extend(prefixes.into_iter().map(Into::into));
        self
    }

    /// Attach a cache mount
    pub fn add_cache(&mut self, cache: CacheMount) -> &mut Self {
        self.caches.push(cache);
        self
    }

    /// Declare an exported path
    pub fn add_output(&mut self, path: impl Into<String>) -> &mut Self {
        self.outputs.push(path.into());
        self
    }

    /// Declare a dependency on another step by name
    pub fn depend_on(&mut self, step_name: impl Into<String>) -> &mut Self {
        self.depends_on.push(step_name.into());
        self
    }

    /// Project the accumulated state into a step
    #[must_use]
    pub fn build(&self) -> Step {
        let mut step = Step::new(self.display_name.clone());
        step.commands = self.commands.clone();
        step.inputs = self.inputs.clone();
        step.variables = self.variables.clone();
        step.secrets = self.secrets.clone();
        step.caches = self.caches.clone();
        step.outputs = self.outputs.clone();
        step.depends_on = self.depends_on.clone();
        step
    }
}
