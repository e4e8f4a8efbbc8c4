//! Lowering of plan steps into IR primitives

use crate::graph::BuildGraph;
use kiln_llb::State;
use kiln_types::{Command, Input, Step};
use std::collections::{BTreeMap, HashSet};

/// Name of the local source context
const LOCAL_CONTEXT: &str = "context";

/// Where application sources live inside the build filesystem
const APP_DIR: &str = "/app";

/// Lower a step onto its incoming state
///
/// Deterministic given identical inputs. Primitives are issued in a fixed
/// order: starting image, inputs, env vars, then commands with the step's
/// cache mounts and secret prefixes attached to every exec, and finally the
/// declared outputs.
pub(crate) fn lower_step(
    graph: &BuildGraph<'_>,
    step: &Step,
    base: &State,
    env_in: &BTreeMap<String, String>,
    paths_in: &[String],
) -> State {
    // A starting image replaces the incoming state entirely
    let mut state = match &step.starting_image {
        Some(image) => State::image(image.clone()),
        None => base.clone(),
    };

    for input in &step.inputs {
        state = apply_input(graph, step, state, input);
    }

    // Merged filesystems do not carry their sources' metadata, so the env
    // and path context is replayed onto the state here
    let mut env = env_in.clone();
    for (key, value) in &step.variables {
        env.insert(key.clone(), value.clone());
    }
    for (key, value) in &env {
        state = state.set_env(key.clone(), value.clone());
    }

    let mut seen_paths = HashSet::new();
    for dir in paths_in {
        if seen_paths.insert(dir.clone()) {
            state = state.prepend_path(dir.clone());
        }
    }

    let local = State::local(LOCAL_CONTEXT);
    for command in &step.commands {
        state = match command {
            Command::Copy { src } => state.copy(&local, src.clone(), copy_destination(src)),
            Command::Exec { cmd } => state.run(cmd.clone(), &step.caches, &step.secrets),
            Command::Path { dir } => {
                if seen_paths.insert(dir.clone()) {
                    state.prepend_path(dir.clone())
                } else {
                    state
                }
            }
        };
    }

    if step.outputs.is_empty() {
        state
    } else {
        state.with_outputs(step.outputs.clone())
    }
}

fn apply_input(graph: &BuildGraph<'_>, step: &Step, state: State, input: &Input) -> State {
    match input {
        Input::Step { name, include } => {
            // Unknown or unprocessed references are external, same policy
            // as unknown depends_on names
            let Some(source) = graph.state_of(name) else {
                return state;
            };
            if include.is_empty() {
                State::merge(
                    &[state, source.clone()],
                    format!("merge {} into {}", name, step.name),
                )
            } else {
                include.iter().fold(state, |acc, path| {
                    acc.copy(source, path.clone(), path.clone())
                })
            }
        }
        Input::Local { path } => {
            let local = State::local(LOCAL_CONTEXT);
            state.copy(&local, path.clone(), copy_destination(path))
        }
        Input::Image { reference } => State::merge(
            &[state, State::image(reference.clone())],
            format!("merge {} into {}", reference, step.name),
        ),
    }
}

/// Destination under the app dir for a context-relative source path
fn copy_destination(src: &str) -> String {
    let trimmed = src.trim_start_matches("./");
    if trimmed == "." || trimmed.is_empty() {
        APP_DIR.to_string()
    } else {
        format!("{APP_DIR}/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_destination() {
        assert_eq!(copy_destination("."), "/app");
        assert_eq!(copy_destination("./"), "/app");
        assert_eq!(copy_destination("package.json"), "/app/package.json");
        assert_eq!(copy_destination("./src"), "/app/src");
    }
}
