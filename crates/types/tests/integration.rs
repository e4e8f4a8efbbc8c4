//! Integration tests for the plan model

#[cfg(test)]
mod tests {
    use kiln_types::{BuildPlan, CacheMount, Command, Deploy, Input, Metadata, Step};

    #[test]
    fn test_step_serializes_camel_case() {
        let mut step = Step::new("install");
        step.starting_image = Some("debian:bookworm-slim".to_string());
        step.depends_on = vec!["packages".to_string()];

        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["name"], "install");
        assert_eq!(json["startingImage"], "debian:bookworm-slim");
        assert_eq!(json["dependsOn"][0], "packages");
    }

    #[test]
    fn test_commands_are_tagged() {
        let commands = vec![
            Command::copy("."),
            Command::exec("npm ci"),
            Command::path("/app/node_modules/.bin"),
        ];

        let json = serde_json::to_value(&commands).unwrap();
        assert_eq!(json[0]["type"], "copy");
        assert_eq!(json[1]["type"], "exec");
        assert_eq!(json[2]["type"], "path");
    }

    #[test]
    fn test_step_input_include_is_optional() {
        let bare = serde_json::to_value(Input::step("install")).unwrap();
        assert!(bare.get("include").is_none());

        let filtered = serde_json::to_value(Input::step_with_include(
            "install",
            vec!["/app".to_string()],
        ))
        .unwrap();
        assert_eq!(filtered["include"][0], "/app");
    }

    #[test]
    fn test_metadata_values_are_untagged() {
        let mut metadata = Metadata::new();
        metadata.set("packageManager", "npm");
        metadata.set_bool("django", true);

        let json = serde_json::to_string(&metadata).unwrap();
        assert_eq!(json, r#"{"django":true,"packageManager":"npm"}"#);

        let back: Metadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get("packageManager"), Some("npm"));
        assert_eq!(back.get_bool("django"), Some(true));
    }

    #[test]
    fn test_plan_round_trips() {
        let mut step = Step::new("install");
        step.commands.push(Command::exec("pip install -r requirements.txt"));
        step.caches.push(CacheMount::new("pip", "/opt/pip-cache"));
        step.variables
            .insert("PIP_DEFAULT_TIMEOUT".to_string(), "100".to_string());

        let mut deploy = Deploy::new();
        deploy.start_cmd = Some("python main.py".to_string());
        deploy.inputs.push(Input::image("debian:bookworm-slim"));

        let mut plan = BuildPlan::new();
        plan.steps.push(step);
        plan.deploy = deploy;
        plan.metadata.set("provider", "python");

        let json = serde_json::to_string(&plan).unwrap();
        let back: BuildPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan);
    }

    #[test]
    fn test_serialization_is_stable() {
        let mut step = Step::new("setup");
        step.variables.insert("B".to_string(), "2".to_string());
        step.variables.insert("A".to_string(), "1".to_string());

        let mut plan = BuildPlan::new();
        plan.steps.push(step);

        let first = serde_json::to_string(&plan).unwrap();
        let second = serde_json::to_string(&plan).unwrap();
        assert_eq!(first, second);
        // BTreeMap-backed maps serialize in key order
        assert!(first.find("\"A\"").unwrap() < first.find("\"B\"").unwrap());
    }
}
