#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Build graph compilation for kiln
//!
//! Turns a declarative `BuildPlan` into a DAG of filesystem states: nodes are
//! topologically ordered, parent states are merged where multiple inputs
//! meet, path and environment metadata propagate along edges, and the final
//! merged state carries the union of exported paths and variables.

mod graph;
mod lower;

pub use graph::{BuildGraph, BuildGraphOutput};
