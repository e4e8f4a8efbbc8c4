//! The build graph and its processing order

use crate::lower;
use kiln_errors::{GraphError, Result};
use kiln_llb::State;
use kiln_types::{BuildPlan, Step};
use std::collections::{BTreeMap, HashMap};

pub(crate) type NodeId = usize;

/// A step plus its runtime processing state
pub(crate) struct Node<'a> {
    pub step: &'a Step,
    pub parents: Vec<NodeId>,
    pub children: Vec<NodeId>,
    pub processed: bool,
    pub in_progress: bool,
    pub state: Option<State>,
    pub input_env: BTreeMap<String, String>,
    pub input_paths: Vec<String>,
    pub output_env: BTreeMap<String, String>,
    pub output_paths: Vec<String>,
}

impl<'a> Node<'a> {
    fn new(step: &'a Step) -> Self {
        Self {
            step,
            parents: Vec::new(),
            children: Vec::new(),
            processed: false,
            in_progress: false,
            state: None,
            input_env: BTreeMap::new(),
            input_paths: Vec::new(),
            output_env: BTreeMap::new(),
            output_paths: Vec::new(),
        }
    }
}

/// Result of compiling a plan down to the build IR
#[derive(Debug, Clone)]
pub struct BuildGraphOutput {
    /// Final merged filesystem state
    pub state: State,
    /// Concatenated PATH entries of every leaf, duplicates preserved
    pub path_list: Vec<String>,
    /// Union of every leaf's exported variables, later leaf wins
    pub env_vars: BTreeMap<String, String>,
}

/// DAG of build steps over an opaque base state
pub struct BuildGraph<'a> {
    nodes: Vec<Node<'a>>,
    base_state: State,
}

impl<'a> BuildGraph<'a> {
    /// Build the graph for a plan
    ///
    /// Nodes are stored in plan-step order, which fixes the leaf iteration
    /// order. Dependency names that do not name a step in the plan are
    /// treated as external references and ignored.
    #[must_use]
    pub fn new(plan: &'a BuildPlan, base_state: State) -> Self {
        let mut nodes: Vec<Node<'a>> = plan.steps.iter().map(Node::new).collect();

        let index: HashMap<&str, NodeId> = nodes
            .iter()
            .enumerate()
            .map(|(id, node)| (node.step.name.as_str(), id))
            .collect();

        for id in 0..nodes.len() {
            for dep_name in &nodes[id].step.depends_on {
                if let Some(&parent) = index.get(dep_name.as_str()) {
                    nodes[id].parents.push(parent);
                    nodes[parent].children.push(id);
                }
            }
        }

        Self { nodes, base_state }
    }

    /// Compile the graph into the build IR
    ///
    /// # Errors
    ///
    /// Fails with `GraphError::CycleDetected` on cyclic plans and with
    /// `GraphError::DependencyViolation` / `GraphError::MissingParentState`
    /// when internal processing invariants break.
    pub fn generate(&mut self) -> Result<BuildGraphOutput> {
        let order = self.processing_order()?;

        for id in order {
            self.process_node(id)?;
        }

        // Collect leaf states in node-storage order
        let mut leaf_states = Vec::new();
        let mut leaf_names = Vec::new();
        let mut path_list = Vec::new();
        let mut env_vars = BTreeMap::new();

        for node in &self.nodes {
            if !node.children.is_empty() {
                continue;
            }
            if let Some(state) = &node.state {
                leaf_states.push(state.clone());
                leaf_names.push(node.step.name.clone());
                path_list.extend(node.output_paths.iter().cloned());
                for (key, value) in &node.output_env {
                    env_vars.insert(key.clone(), value.clone());
                }
            }
        }

        let state = match leaf_states.as_slice() {
            [] => self.base_state.clone(),
            [only] => only.clone(),
            _ => State::merge(
                &leaf_states,
                format!("merging steps: {}", leaf_names.join(", ")),
            ),
        };

        Ok(BuildGraphOutput {
            state,
            path_list,
            env_vars,
        })
    }

    /// Step names in processing order, parents before children
    ///
    /// # Errors
    ///
    /// Fails with `GraphError::CycleDetected` on cyclic plans.
    pub fn step_order(&self) -> Result<Vec<&str>> {
        Ok(self
            .processing_order()?
            .into_iter()
            .map(|id| self.nodes[id].step.name.as_str())
            .collect())
    }

    /// The state produced for a named step, if it has been processed
    pub(crate) fn state_of(&self, name: &str) -> Option<&State> {
        self.nodes
            .iter()
            .find(|node| node.step.name == name)
            .and_then(|node| node.state.as_ref())
    }

    fn process_node(&mut self, id: NodeId) -> Result<()> {
        if self.nodes[id].processed {
            return Ok(());
        }

        // Make sure all parents are processed before touching this node
        let parents = self.nodes[id].parents.clone();
        for &parent in &parents {
            if self.nodes[parent].processed {
                continue;
            }

            // Re-entering an in-progress node means the traversal handed us
            // a child before its parent
            if self.nodes[id].in_progress {
                return Err(GraphError::DependencyViolation {
                    step: self.nodes[id].step.name.clone(),
                    parent: self.nodes[parent].step.name.clone(),
                }
                .into());
            }

            self.nodes[id].in_progress = true;
            let outcome = self.process_node(parent);
            self.nodes[id].in_progress = false;
            outcome?;
        }

        let (current_state, current_env, current_paths) = self.incoming(id, &parents)?;

        self.nodes[id].input_env = current_env.clone();
        self.nodes[id].input_paths = current_paths.clone();

        let step = self.nodes[id].step;
        let state = lower::lower_step(self, step, &current_state, &current_env, &current_paths);

        let mut output_env = current_env;
        for (key, value) in &step.variables {
            output_env.insert(key.clone(), value.clone());
        }
        let mut output_paths = current_paths;
        output_paths.extend(step.path_dirs());

        let node = &mut self.nodes[id];
        node.state = Some(state);
        node.output_env = output_env;
        node.output_paths = output_paths;
        node.processed = true;

        tracing::debug!(step = %node.step.name, "processed build step");
        Ok(())
    }

    /// Compute the state, env vars and path list flowing into a node
    fn incoming(
        &self,
        id: NodeId,
        parents: &[NodeId],
    ) -> Result<(State, BTreeMap<String, String>, Vec<String>)> {
        match parents {
            [] => Ok((self.base_state.clone(), BTreeMap::new(), Vec::new())),
            [parent] => {
                let parent = &self.nodes[*parent];
                let state = parent.state.clone().ok_or_else(|| {
                    GraphError::MissingParentState {
                        parent: parent.step.name.clone(),
                        step: self.nodes[id].step.name.clone(),
                    }
                })?;
                Ok((state, parent.output_env.clone(), parent.output_paths.clone()))
            }
            _ => {
                let mut states = Vec::with_capacity(parents.len());
                let mut names = Vec::with_capacity(parents.len());
                let mut env = BTreeMap::new();
                let mut paths = Vec::new();

                for &parent_id in parents {
                    let parent = &self.nodes[parent_id];
                    let state = parent.state.clone().ok_or_else(|| {
                        GraphError::MissingParentState {
                            parent: parent.step.name.clone(),
                            step: self.nodes[id].step.name.clone(),
                        }
                    })?;

                    // Later parents override earlier ones on key collisions
                    for (key, value) in &parent.output_env {
                        env.insert(key.clone(), value.clone());
                    }
                    paths.extend(parent.output_paths.iter().cloned());

                    states.push(state);
                    names.push(parent.step.name.clone());
                }

                let merged = State::merge(
                    &states,
                    format!("merging steps: {}", names.join(", ")),
                );
                Ok((merged, env, paths))
            }
        }
    }

    /// Topological order with parents before children
    fn processing_order(&self) -> Result<Vec<NodeId>> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut visited = vec![false; self.nodes.len()];
        let mut on_stack = vec![false; self.nodes.len()];

        // Start with leaf nodes, recursing through parents
        for (id, node) in self.nodes.iter().enumerate() {
            if node.children.is_empty() {
                self.visit(id, &mut visited, &mut on_stack, &mut order)?;
            }
        }

        // Pick up any remaining nodes (disconnected subgraphs)
        for id in 0..self.nodes.len() {
            if !visited[id] {
                self.visit(id, &mut visited, &mut on_stack, &mut order)?;
            }
        }

        // Post-order lists children first; parents must come first
        order.reverse();
        Ok(order)
    }

    fn visit(
        &self,
        id: NodeId,
        visited: &mut [bool],
        on_stack: &mut [bool],
        order: &mut Vec<NodeId>,
    ) -> Result<()> {
        if on_stack[id] {
            return Err(GraphError::CycleDetected {
                step: self.nodes[id].step.name.clone(),
            }
            .into());
        }
        if visited[id] {
            return Ok(());
        }

        on_stack[id] = true;
        for &parent in &self.nodes[id].parents {
            self.visit(parent, visited, on_stack, order)?;
        }
        on_stack[id] = false;

        visited[id] = true;
        order.push(id);
        Ok(())
    }
}
