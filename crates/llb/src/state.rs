//! Persistent build-IR states

use kiln_types::CacheMount;
use std::sync::Arc;

/// Opaque handle to a partially-constructed filesystem
#[derive(Debug, Clone)]
pub struct State {
    node: Arc<Node>,
}

#[derive(Debug)]
enum Node {
    Scratch,
    Image {
        reference: String,
    },
    Local {
        name: String,
    },
    Copy {
        base: State,
        from: State,
        src: String,
        dst: String,
    },
    Run {
        base: State,
        cmd: String,
        mounts: Vec<CacheMount>,
        secrets: Vec<String>,
    },
    Env {
        base: State,
        key: String,
        value: String,
    },
    Path {
        base: State,
        dir: String,
    },
    Outputs {
        base: State,
        paths: Vec<String>,
    },
    Merge {
        states: Vec<State>,
        name: String,
    },
}

impl State {
    fn from_node(node: Node) -> Self {
        Self {
            node: Arc::new(node),
        }
    }

    /// An empty filesystem
    #[must_use]
    pub fn scratch() -> Self {
        Self::from_node(Node::Scratch)
    }

    /// A filesystem rooted at a container image
    #[must_use]
    pub fn image(reference: impl Into<String>) -> Self {
        Self::from_node(Node::Image {
            reference: reference.into(),
        })
    }

    /// A named local source context
    #[must_use]
    pub fn local(name: impl Into<String>) -> Self {
        Self::from_node(Node::Local { name: name.into() })
    }

    /// Layer `src` from another state onto this one at `dst`
    #[must_use]
    pub fn copy(&self, from: &State, src: impl Into<String>, dst: impl Into<String>) -> Self {
        Self::from_node(Node::Copy {
            base: self.clone(),
            from: from.clone(),
            src: src.into(),
            dst: dst.into(),
        })
    }

    /// Add a shell invocation with the given cache mounts and secret prefixes
    #[must_use]
    pub fn run(&self, cmd: impl Into<String>, mounts: &[CacheMount], secrets: &[String]) -> Self {
        Self::from_node(Node::Run {
            base: self.clone(),
            cmd: cmd.into(),
            mounts: mounts.to_vec(),
            secrets: secrets.to_vec(),
        })
    }

    /// Set an environment variable
    #[must_use]
    pub fn set_env(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::from_node(Node::Env {
            base: self.clone(),
            key: key.into(),
            value: value.into(),
        })
    }

    /// Prepend a directory to the PATH
    #[must_use]
    pub fn prepend_path(&self, dir: impl Into<String>) -> Self {
        Self::from_node(Node::Path {
            base: self.clone(),
            dir: dir.into(),
        })
    }

    /// Record the paths this state exports
    #[must_use]
    pub fn with_outputs(&self, paths: Vec<String>) -> Self {
        Self::from_node(Node::Outputs {
            base: self.clone(),
            paths,
        })
    }

    /// Layer several independent states into one
    #[must_use]
    pub fn merge(states: &[State], name: impl Into<String>) -> Self {
        Self::from_node(Node::Merge {
            states: states.to_vec(),
            name: name.into(),
        })
    }

    /// The merge name, when this state is a merge
    #[must_use]
    pub fn merge_name(&self) -> Option<&str> {
        match &*self.node {
            Node::Merge { name, .. } => Some(name),
            _ => None,
        }
    }

    /// The image reference, when this state is rooted directly at an image
    #[must_use]
    pub fn image_reference(&self) -> Option<&str> {
        match &*self.node {
            Node::Image { reference } => Some(reference),
            _ => None,
        }
    }

    /// Whether two handles point at the same underlying state
    #[must_use]
    pub fn ptr_eq(&self, other: &State) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    /// Deterministic textual rendering of the whole op chain
    #[must_use]
    pub fn dump(&self) -> Vec<String> {
        let mut lines = Vec::new();
        self.render(0, &mut lines);
        lines
    }

    fn push(lines: &mut Vec<String>, depth: usize, text: String) {
        lines.push(format!("{}{}", "  ".repeat(depth), text));
    }

    fn render(&self, depth: usize, lines: &mut Vec<String>) {
        match &*self.node {
            Node::Scratch => Self::push(lines, depth, "scratch".to_string()),
            Node::Image { reference } => Self::push(lines, depth, format!("image {reference}")),
            Node::Local { name } => Self::push(lines, depth, format!("local {name}")),
            Node::Copy {
                base,
                from,
                src,
                dst,
            } => {
                base.render(depth, lines);
                Self::push(lines, depth, format!("copy {src} -> {dst} from {}", from.label()));
            }
            Node::Run {
                base,
                cmd,
                mounts,
                secrets,
            } => {
                base.render(depth, lines);
                let mut line = format!("run {cmd}");
                for mount in mounts {
                    line.push_str(&format!(" [cache {} at {}]", mount.id, mount.path));
                }
                for secret in secrets {
                    line.push_str(&format!(" [secret {secret}*]"));
                }
                Self::push(lines, depth, line);
            }
            Node::Env { base, key, value } => {
                base.render(depth, lines);
                Self::push(lines, depth, format!("env {key}={value}"));
            }
            Node::Path { base, dir } => {
                base.render(depth, lines);
                Self::push(lines, depth, format!("path {dir}"));
            }
            Node::Outputs { base, paths } => {
                base.render(depth, lines);
                Self::push(lines, depth, format!("outputs {}", paths.join(" ")));
            }
            Node::Merge { states, name } => {
                Self::push(lines, depth, format!("merge \"{name}\""));
                for state in states {
                    state.render(depth + 1, lines);
                }
            }
        }
    }

    /// Short label naming this state's root operation
    fn label(&self) -> String {
        match &*self.node {
            Node::Scratch => "scratch".to_string(),
            Node::Image { reference } => format!("image {reference}"),
            Node::Local { name } => format!("local {name}"),
            Node::Copy { base, .. }
            | Node::Run { base, .. }
            | Node::Env { base, .. }
            | Node::Path { base, .. }
            | Node::Outputs { base, .. } => base.label(),
            Node::Merge { name, .. } => format!("merge \"{name}\""),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states_are_persistent() {
        let base = State::image("debian:bookworm-slim");
        let with_env = base.set_env("CI", "true");
        let with_run = with_env.run("echo hello", &[], &[]);

        // Extending a state leaves the original chain untouched
        assert_eq!(base.dump(), vec!["image debian:bookworm-slim"]);
        assert_eq!(with_env.dump().len(), 2);
        assert_eq!(with_run.dump().len(), 3);
    }

    #[test]
    fn test_merge_name_is_exposed() {
        let a = State::image("alpine");
        let b = State::scratch();
        let merged = State::merge(&[a, b], "merging steps: a, b");

        assert_eq!(merged.merge_name(), Some("merging steps: a, b"));
    }

    #[test]
    fn test_dump_is_deterministic() {
        let build = |_: ()| {
            let base = State::image("alpine");
            let ctx = State::local("context");
            base.copy(&ctx, ".", "/app")
                .run(
                    "npm ci",
                    &[CacheMount::new("npm", "/root/.npm")],
                    &["NPM".to_string()],
                )
                .prepend_path("/app/node_modules/.bin")
        };

        assert_eq!(build(()).dump(), build(()).dump());
    }

    #[test]
    fn test_ptr_eq_shares_structure() {
        let base = State::scratch();
        let child = base.set_env("A", "1");
        let clone = child.clone();

        assert!(child.ptr_eq(&clone));
        assert!(!child.ptr_eq(&base));
    }
}
