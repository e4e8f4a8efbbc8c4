//! Integration tests for provider planning over fixture app trees

#[cfg(test)]
mod tests {
    use kiln_app::{App, Environ};
    use kiln_errors::{Error, ProviderError};
    use kiln_providers::{detect_provider, generate_build_plan};
    use kiln_types::{Command, Step};
    use std::fs;

    fn fixture(files: &[(&str, &str)]) -> (tempfile::TempDir, App) {
        let dir = tempfile::tempdir().unwrap();
        for (path, contents) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, contents).unwrap();
        }
        let app = App::scan(dir.path()).unwrap();
        (dir, app)
    }

    fn exec_commands(step: &Step) -> Vec<&str> {
        step.commands
            .iter()
            .filter_map(|cmd| match cmd {
                Command::Exec { cmd } => Some(cmd.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_node_npm_app() {
        let (_dir, app) = fixture(&[
            (
                "package.json",
                r#"{
                    "name": "demo",
                    "scripts": {"start": "node server.js", "build": "tsc"},
                    "engines": {"node": "20"}
                }"#,
            ),
            ("package-lock.json", "{}"),
            ("server.js", ""),
        ]);
        let env = Environ::default();

        let result = generate_build_plan(&app, &env).unwrap();
        assert_eq!(result.provider, "node");

        let names: Vec<&str> = result.plan.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["packages", "install", "build"]);

        // engines.node overrides the default pin
        assert_eq!(result.packages[0].name, "node");
        assert_eq!(result.packages[0].version, "20");
        assert_eq!(result.packages[0].source, "package.json > engines > node");

        let packages = result.plan.step("packages").unwrap();
        assert!(exec_commands(packages).contains(&"mise use -g node@20"));

        let install = result.plan.step("install").unwrap();
        assert_eq!(install.depends_on, vec!["packages"]);
        assert!(exec_commands(install).contains(&"npm ci"));

        let build = result.plan.step("build").unwrap();
        assert_eq!(build.depends_on, vec!["install"]);
        assert!(exec_commands(build).contains(&"npm run build"));

        assert_eq!(result.plan.deploy.start_cmd.as_deref(), Some("npm run start"));
        assert_eq!(result.plan.metadata.get("nodePackageManager"), Some("npm"));
    }

    #[test]
    fn test_node_env_version_override() {
        let (_dir, app) = fixture(&[("package.json", "{}")]);
        let env = Environ::from_pairs([("NODE_VERSION", "22")]);

        let result = generate_build_plan(&app, &env).unwrap();
        assert_eq!(result.packages[0].version, "22");
        assert_eq!(result.packages[0].source, "NODE_VERSION");
    }

    #[test]
    fn test_node_corepack_app() {
        let (_dir, app) = fixture(&[
            (
                "package.json",
                r#"{"packageManager": "pnpm@9.0.0", "main": "index.js"}"#,
            ),
            ("pnpm-lock.yaml", ""),
            ("index.js", ""),
        ]);
        let env = Environ::default();

        let result = generate_build_plan(&app, &env).unwrap();
        let names: Vec<&str> = result.plan.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["packages", "corepack", "install"]);

        let install = result.plan.step("install").unwrap();
        assert_eq!(install.depends_on, vec!["packages", "corepack"]);
        assert!(exec_commands(install).contains(&"pnpm install --frozen-lockfile"));

        // pnpm itself is a mise package
        assert!(result.packages.iter().any(|pkg| pkg.name == "pnpm"));

        assert_eq!(result.plan.deploy.start_cmd.as_deref(), Some("node index.js"));
    }

    #[test]
    fn test_bun_app_skips_node() {
        let (_dir, app) = fixture(&[
            ("package.json", r#"{"main": "index.ts"}"#),
            ("bun.lockb", ""),
            ("index.ts", ""),
        ]);
        let env = Environ::default();

        let result = generate_build_plan(&app, &env).unwrap();
        assert!(result.packages.iter().any(|pkg| pkg.name == "bun"));
        assert!(!result.packages.iter().any(|pkg| pkg.name == "node"));
        assert_eq!(result.plan.deploy.start_cmd.as_deref(), Some("bun index.ts"));
    }

    #[test]
    fn test_python_pip_app() {
        let (_dir, app) = fixture(&[
            ("main.py", "print('hi')"),
            ("requirements.txt", "flask==3.0"),
            (".python-version", "3.12\n"),
        ]);
        let env = Environ::default();

        let result = generate_build_plan(&app, &env).unwrap();
        assert_eq!(result.provider, "python");

        assert_eq!(result.packages[0].name, "python");
        assert_eq!(result.packages[0].version, "3.12");
        assert_eq!(result.packages[0].source, ".python-version");

        let install = result.plan.step("install").unwrap();
        assert!(exec_commands(install)
            .iter()
            .any(|cmd| cmd.starts_with("pip install --target=")));
        assert!(install.secrets.contains(&"PIP".to_string()));
        assert!(install.caches.iter().any(|cache| cache.id == "pip"));

        assert_eq!(
            result.plan.deploy.start_cmd.as_deref(),
            Some("python main.py")
        );
        assert_eq!(
            result.plan.metadata.get("pythonPackageManager"),
            Some("pip")
        );
        assert!(result.plan.step("runtime-deps").is_some());
    }

    #[test]
    fn test_python_uv_app() {
        let (_dir, app) = fixture(&[
            ("pyproject.toml", "[project]\nname = \"demo\""),
            ("uv.lock", ""),
        ]);
        let env = Environ::default();

        let result = generate_build_plan(&app, &env).unwrap();
        let install = result.plan.step("install").unwrap();
        assert!(exec_commands(install).contains(&"pipx install uv"));
        assert!(result.packages.iter().any(|pkg| pkg.name == "pipx"));
        assert_eq!(
            result.plan.metadata.get("pythonPackageManager"),
            Some("uv")
        );
        assert!(result.logs.iter().any(|line| line == "Using uv"));
    }

    #[test]
    fn test_python_poetry_app() {
        let (_dir, app) = fixture(&[
            ("pyproject.toml", "[tool.poetry]\nname = \"demo\""),
            ("poetry.lock", ""),
        ]);
        let env = Environ::default();

        let result = generate_build_plan(&app, &env).unwrap();
        let install = result.plan.step("install").unwrap();
        assert!(exec_commands(install).contains(&"pipx install poetry"));
        assert_eq!(
            install.variables.get("VIRTUAL_ENV").map(String::as_str),
            Some("/app/.venv")
        );
        assert_eq!(
            result.plan.metadata.get("pythonPackageManager"),
            Some("poetry")
        );
    }

    #[test]
    fn test_python_postgres_gets_runtime_libs() {
        let (_dir, app) = fixture(&[
            ("main.py", ""),
            ("requirements.txt", "psycopg2-binary==2.9"),
        ]);
        let env = Environ::default();

        let result = generate_build_plan(&app, &env).unwrap();
        let runtime_deps = result.plan.step("runtime-deps").unwrap();
        assert!(exec_commands(runtime_deps)
            .iter()
            .any(|cmd| cmd.contains("libpq5")));
    }

    #[test]
    fn test_pipfile_version_is_parsed() {
        let (_dir, app) = fixture(&[(
            "Pipfile",
            "[requires]\npython_version = \"3.11\"\n",
        )]);
        let env = Environ::default();

        let result = generate_build_plan(&app, &env).unwrap();
        assert_eq!(result.packages[0].version, "3.11");
        assert_eq!(result.packages[0].source, "Pipfile");
        assert_eq!(
            result.plan.metadata.get("pythonPackageManager"),
            Some("pipenv")
        );
    }

    #[test]
    fn test_node_wins_over_python() {
        let (_dir, app) = fixture(&[("package.json", "{}"), ("main.py", "")]);
        let env = Environ::default();

        assert_eq!(
            detect_provider(&app, &env).unwrap().as_deref(),
            Some("node")
        );
    }

    #[test]
    fn test_no_provider_detected() {
        let (_dir, app) = fixture(&[("README.md", "hello")]);
        let env = Environ::default();

        match generate_build_plan(&app, &env) {
            Err(Error::Provider(ProviderError::NoProviderDetected)) => {}
            other => panic!("expected no-provider error, got {other:?}"),
        }
    }

    #[test]
    fn test_plan_lowers_to_ir() {
        let (_dir, app) = fixture(&[
            (
                "package.json",
                r#"{"scripts": {"start": "node server.js"}}"#,
            ),
            ("package-lock.json", "{}"),
        ]);
        let env = Environ::default();

        let result = generate_build_plan(&app, &env).unwrap();
        let base = kiln_llb::State::image("debian:bookworm-slim");
        let mut graph = kiln_graph::BuildGraph::new(&result.plan, base);
        let output = graph.generate().unwrap();

        // The install step prepends the shims and bin dirs along the chain
        assert!(output.path_list.contains(&"/mise/shims".to_string()));
        assert!(output
            .path_list
            .contains(&"/app/node_modules/.bin".to_string()));
        assert!(!output.state.dump().is_empty());

        // Two planning passes produce identical IR
        let result2 = generate_build_plan(&app, &env).unwrap();
        let mut graph2 = kiln_graph::BuildGraph::new(
            &result2.plan,
            kiln_llb::State::image("debian:bookworm-slim"),
        );
        assert_eq!(
            graph2.generate().unwrap().state.dump(),
            output.state.dump()
        );
    }
}
