//! Integration tests for the build graph compiler

#[cfg(test)]
mod tests {
    use kiln_errors::{Error, GraphError};
    use kiln_graph::BuildGraph;
    use kiln_llb::State;
    use kiln_types::{BuildPlan, Command, Input, Step};
    use proptest::prelude::*;

    fn step(name: &str, deps: &[&str]) -> Step {
        let mut step = Step::new(name);
        step.depends_on = deps.iter().map(ToString::to_string).collect();
        step
    }

    fn plan(steps: Vec<Step>) -> BuildPlan {
        let mut plan = BuildPlan::new();
        plan.steps = steps;
        plan
    }

    fn base() -> State {
        State::image("debian:bookworm-slim")
    }

    #[test]
    fn test_empty_plan_returns_base_state() {
        let plan = plan(vec![]);
        let base = base();
        let mut graph = BuildGraph::new(&plan, base.clone());

        let output = graph.generate().unwrap();
        assert!(output.state.ptr_eq(&base));
        assert!(output.path_list.is_empty());
        assert!(output.env_vars.is_empty());
    }

    #[test]
    fn test_linear_chain_has_no_top_level_merge() {
        let mut c = step("c", &["b"]);
        c.commands.push(Command::exec("true"));

        let plan = plan(vec![step("a", &[]), step("b", &["a"]), c]);
        let mut graph = BuildGraph::new(&plan, base());

        assert_eq!(graph.step_order().unwrap(), vec!["a", "b", "c"]);

        let output = graph.generate().unwrap();
        // Only C is a leaf; its state comes back without an extra merge
        assert!(output.state.merge_name().is_none());
    }

    #[test]
    fn test_diamond_merges_parents_in_order() {
        let mut b = step("b", &["a"]);
        b.variables.insert("X".to_string(), "1".to_string());
        let mut c = step("c", &["a"]);
        c.variables.insert("X".to_string(), "2".to_string());

        let plan = plan(vec![step("a", &[]), b, c, step("d", &["b", "c"])]);
        let mut graph = BuildGraph::new(&plan, base());

        let order = graph.step_order().unwrap();
        assert_eq!(order.first(), Some(&"a"));
        assert_eq!(order.last(), Some(&"d"));

        let output = graph.generate().unwrap();

        // D's incoming state is the named merge of both parents
        let dump = output.state.dump().join("\n");
        assert!(dump.contains("merge \"merging steps: b, c\""));

        // The later parent wins the env collision
        assert_eq!(output.env_vars.get("X").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_disconnected_leaves_are_merged() {
        let mut l1 = step("l1", &[]);
        l1.variables.insert("A".to_string(), "1".to_string());
        l1.commands.push(Command::path("/l1/bin"));
        let mut l2 = step("l2", &[]);
        l2.variables.insert("A".to_string(), "2".to_string());
        l2.commands.push(Command::path("/l2/bin"));

        let plan = plan(vec![l1, l2]);
        let mut graph = BuildGraph::new(&plan, base());
        let output = graph.generate().unwrap();

        assert_eq!(output.state.merge_name(), Some("merging steps: l1, l2"));
        assert_eq!(output.path_list, vec!["/l1/bin", "/l2/bin"]);
        // Later leaf wins on collision
        assert_eq!(output.env_vars.get("A").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_cycle_is_detected() {
        let plan = plan(vec![step("a", &["b"]), step("b", &["a"])]);
        let mut graph = BuildGraph::new(&plan, base());

        match graph.generate() {
            Err(Error::Graph(GraphError::CycleDetected { step })) => {
                assert!(step == "a" || step == "b");
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_dependency_is_treated_as_root() {
        let plan = plan(vec![step("b", &["z"])]);
        let mut graph = BuildGraph::new(&plan, base());

        let output = graph.generate().unwrap();
        assert!(output.state.merge_name().is_none());
    }

    #[test]
    fn test_single_parent_passes_outputs_through() {
        let mut a = step("a", &[]);
        a.variables.insert("FOO".to_string(), "bar".to_string());
        a.commands.push(Command::path("/a/bin"));

        let plan = plan(vec![a, step("b", &["a"])]);
        let mut graph = BuildGraph::new(&plan, base());
        let output = graph.generate().unwrap();

        // B declares nothing of its own, so the leaf outputs are A's
        assert_eq!(output.env_vars.get("FOO").map(String::as_str), Some("bar"));
        assert_eq!(output.path_list, vec!["/a/bin"]);
    }

    #[test]
    fn test_generate_is_deterministic() {
        let build = || {
            let mut install = step("install", &["packages"]);
            install.commands.push(Command::copy("."));
            install.commands.push(Command::exec("npm ci"));
            let mut packages = step("packages", &[]);
            packages.commands.push(Command::exec("mise use -g node@23"));
            packages.commands.push(Command::path("/mise/shims"));
            let mut build_step = step("build", &["install"]);
            build_step.commands.push(Command::exec("npm run build"));

            let plan = plan(vec![packages, install, build_step]);
            let mut graph = BuildGraph::new(&plan, base());
            graph.generate().unwrap()
        };

        let first = build();
        let second = build();
        assert_eq!(first.state.dump(), second.state.dump());
        assert_eq!(first.path_list, second.path_list);
        assert_eq!(first.env_vars, second.env_vars);
    }

    #[test]
    fn test_step_input_copies_include_paths() {
        let mut producer = step("producer", &[]);
        producer.commands.push(Command::exec("make artifacts"));
        producer.outputs.push("/artifacts".to_string());

        let mut consumer = step("consumer", &["producer"]);
        consumer.inputs.push(Input::step_with_include(
            "producer",
            vec!["/artifacts".to_string()],
        ));

        let plan = plan(vec![producer, consumer]);
        let mut graph = BuildGraph::new(&plan, base());
        let output = graph.generate().unwrap();

        let dump = output.state.dump().join("\n");
        assert!(dump.contains("copy /artifacts -> /artifacts"));
    }

    #[test]
    fn test_image_input_is_merged_in() {
        let mut consumer = step("consumer", &[]);
        consumer.inputs.push(Input::image("alpine"));

        let plan = plan(vec![consumer]);
        let mut graph = BuildGraph::new(&plan, base());
        let output = graph.generate().unwrap();

        let dump = output.state.dump().join("\n");
        assert!(dump.contains("merge \"merge alpine into consumer\""));
    }

    #[test]
    fn test_starting_image_replaces_base() {
        let mut runtime = step("runtime", &[]);
        runtime.starting_image = Some("python:3.12-slim".to_string());

        let plan = plan(vec![runtime]);
        let mut graph = BuildGraph::new(&plan, base());
        let output = graph.generate().unwrap();

        assert_eq!(output.state.image_reference(), Some("python:3.12-slim"));
    }

    proptest! {
        /// Every edge (parent, child) keeps the parent earlier in the order
        #[test]
        fn prop_order_respects_edges(deps in prop::collection::vec(
            prop::collection::vec(0usize..16, 0..3),
            1..8,
        )) {
            let steps: Vec<Step> = deps
                .iter()
                .enumerate()
                .map(|(i, picks)| {
                    let names: Vec<String> = picks
                        .iter()
                        .filter(|_| i > 0)
                        .map(|pick| format!("s{}", pick % i))
                        .collect();
                    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
                    step(&format!("s{i}"), &refs)
                })
                .collect();

            let plan = plan(steps);
            let graph = BuildGraph::new(&plan, State::scratch());
            let order = graph.step_order().unwrap();

            for (i, picks) in deps.iter().enumerate() {
                if i == 0 {
                    continue;
                }
                let child = format!("s{i}");
                let child_pos = order.iter().position(|n| **n == child).unwrap();
                for pick in picks {
                    let parent = format!("s{}", pick % i);
                    if parent == child {
                        continue;
                    }
                    let parent_pos = order.iter().position(|n| **n == parent).unwrap();
                    prop_assert!(parent_pos < child_pos);
                }
            }
        }
    }
}
