#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Language providers for kiln
//!
//! A provider is a detector/planner pair for one language ecosystem.
//! Providers are tried in registration order; the first one whose detection
//! succeeds plans the whole build.

mod node;
mod python;

pub use node::NodeProvider;
pub use python::PythonProvider;

use kiln_app::{App, Environ};
use kiln_errors::{ProviderError, Result};
use kiln_generate::{BuildResult, GenerateContext};

/// A detector/planner pair for one language ecosystem
pub trait Provider {
    /// Registry name of this provider
    fn name(&self) -> &'static str;

    /// Whether this provider recognizes the application
    ///
    /// # Errors
    ///
    /// Detection errors are treated as a decline by the registry.
    fn detect(&self, ctx: &GenerateContext<'_>) -> Result<bool>;

    /// Contribute steps, deploy configuration and metadata to the context
    ///
    /// # Errors
    ///
    /// Any error aborts planning; the registry attaches the provider name.
    fn plan(&self, ctx: &mut GenerateContext<'_>) -> Result<()>;
}

/// All providers in detection order
#[must_use]
pub fn registry() -> Vec<Box<dyn Provider>> {
    vec![Box::new(NodeProvider), Box::new(PythonProvider)]
}

/// Name of the first provider that detects the application
///
/// # Errors
///
/// Currently infallible; kept fallible for parity with planning entry points.
pub fn detect_provider(app: &App, env: &Environ) -> Result<Option<String>> {
    let ctx = GenerateContext::new(app, env);
    Ok(select(&ctx, &registry()).map(|provider| provider.name().to_string()))
}

/// Generate a build plan for the application
///
/// # Errors
///
/// Returns `ProviderError::NoProviderDetected` when nothing matches and
/// `ProviderError::PlanFailed` when the selected provider fails to plan.
pub fn generate_build_plan(app: &App, env: &Environ) -> Result<BuildResult> {
    let mut ctx = GenerateContext::new(app, env);
    let providers = registry();

    let Some(provider) = select(&ctx, &providers) else {
        return Err(ProviderError::NoProviderDetected.into());
    };

    provider.plan(&mut ctx).map_err(|err| ProviderError::PlanFailed {
        provider: provider.name().to_string(),
        message: err.to_string(),
    })?;

    ctx.finalize(provider.name())
}

fn select<'p>(
    ctx: &GenerateContext<'_>,
    providers: &'p [Box<dyn Provider>],
) -> Option<&'p dyn Provider> {
    for provider in providers {
        match provider.detect(ctx) {
            Ok(true) => return Some(provider.as_ref()),
            Ok(false) => {}
            Err(err) => {
                // Detection failure only means this provider declines
                tracing::warn!(provider = provider.name(), "detect failed: {err}");
            }
        }
    }
    None
}
