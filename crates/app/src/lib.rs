#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Application source tree and user environment views for kiln
//!
//! Providers never touch the filesystem or the process environment directly;
//! they go through the `App` and `Environ` snapshots taken at the start of a
//! planning pass, which keeps plan generation deterministic and testable.

mod env;
mod fs;

pub use env::Environ;
pub use fs::App;
