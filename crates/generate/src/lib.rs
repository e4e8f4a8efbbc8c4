#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Plan generation context and step builders for kiln
//!
//! Providers contribute work to a `GenerateContext`: they create step
//! builders, accumulate commands, caches, env vars and version constraints,
//! and the context finalizes everything into an immutable `BuildPlan`.

mod apt;
mod caches;
mod context;
mod image;
mod logger;
mod mise;
mod step_builder;

pub use apt::AptStepBuilder;
pub use caches::CachePool;
pub use context::{BuildResult, GenerateContext};
pub use image::ImageStepBuilder;
pub use logger::Logger;
pub use mise::MiseStepBuilder;
pub use step_builder::{BuildOptions, CommandStepBuilder, StepBuilder};

/// Base image for the final runtime layers
pub const RUNTIME_IMAGE: &str = "debian:bookworm-slim";

/// Image carrying the mise toolchain installer
pub const MISE_IMAGE: &str = "jdx/mise:latest";
