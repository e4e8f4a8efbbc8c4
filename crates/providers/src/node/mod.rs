//! Node.js provider

mod package_manager;

pub use package_manager::PackageManager;

use crate::Provider;
use kiln_errors::Result;
use kiln_generate::GenerateContext;
use kiln_types::{Command, Input};
use serde::Deserialize;
use std::collections::BTreeMap;

const DEFAULT_NODE_VERSION: &str = "23";
const DEFAULT_BUN_VERSION: &str = "latest";

/// Relevant parts of an application's package.json
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PackageJson {
    pub name: Option<String>,
    pub main: Option<String>,
    pub package_manager: Option<String>,
    pub scripts: BTreeMap<String, String>,
    pub engines: BTreeMap<String, String>,
    pub dependencies: BTreeMap<String, String>,
    pub dev_dependencies: BTreeMap<String, String>,
}

/// Provider for Node.js applications
pub struct NodeProvider;

impl Provider for NodeProvider {
    fn name(&self) -> &'static str {
        "node"
    }

    fn detect(&self, ctx: &GenerateContext<'_>) -> Result<bool> {
        Ok(ctx.app.has_match("package.json"))
    }

    fn plan(&self, ctx: &mut GenerateContext<'_>) -> Result<()> {
        let package_json = Self::read_package_json(ctx)?;
        let package_manager = PackageManager::detect(ctx.app);
        ctx.metadata
            .set("nodePackageManager", package_manager.name());

        let mise_name = Self::plan_packages(ctx, &package_json, package_manager);
        let mise_outputs = ctx.mise_step_builder().output_paths();

        let corepack_name = if package_json.package_manager.is_some() {
            Some(Self::plan_corepack(ctx, &mise_name))
        } else {
            None
        };

        let install_name = Self::plan_install(
            ctx,
            package_manager,
            &mise_name,
            corepack_name.as_deref(),
        );

        let build_name = Self::plan_build(ctx, &package_json, package_manager, &install_name);
        let app_step = build_name.unwrap_or(install_name);

        ctx.deploy.start_cmd = Self::start_command(ctx, &package_json, package_manager);
        ctx.deploy.variables = Self::node_env_vars();
        ctx.deploy.inputs = vec![
            ctx.default_runtime_input(),
            Input::step_with_include(mise_name, mise_outputs),
            Input::step_with_include(app_step, vec!["/app".to_string()]),
        ];

        Ok(())
    }
}

impl NodeProvider {
    fn read_package_json(ctx: &GenerateContext<'_>) -> Result<PackageJson> {
        if ctx.app.has_match("package.json") {
            ctx.app.read_json("package.json")
        } else {
            Ok(PackageJson::default())
        }
    }

    /// Register node, bun and the package manager itself with mise
    fn plan_packages(
        ctx: &mut GenerateContext<'_>,
        package_json: &PackageJson,
        package_manager: PackageManager,
    ) -> String {
        let env = ctx.env;
        let env_node = env.get_config_variable("NODE_VERSION");
        let env_bun = env.get_config_variable("BUN_VERSION");
        let engine_node = package_json.engines.get("node").cloned();

        let packages = ctx.mise_step_builder();

        let needs_node =
            package_manager != PackageManager::Bun || engine_node.is_some();
        if needs_node {
            let node = packages.default_package("node", DEFAULT_NODE_VERSION);
            if let Some((version, var_name)) = env_node {
                packages.version(&node, &version, &var_name);
            }
            if let Some(engine) = engine_node {
                packages.version(&node, &engine, "package.json > engines > node");
            }
        }

        if package_manager == PackageManager::Bun {
            let bun = packages.default_package("bun", DEFAULT_BUN_VERSION);
            if let Some((version, var_name)) = env_bun {
                packages.version(&bun, &version, &var_name);
            }
        }

        match package_manager {
            PackageManager::Pnpm => {
                packages.default_package("pnpm", "latest");
            }
            PackageManager::Yarn1 => {
                packages.default_package("yarn", "1");
            }
            PackageManager::Yarn2 => {
                packages.default_package("yarn", "latest");
            }
            PackageManager::Npm | PackageManager::Bun => {}
        }

        packages.name().to_string()
    }

    /// Corepack activation for apps pinning their manager in package.json
    fn plan_corepack(ctx: &mut GenerateContext<'_>, mise_name: &str) -> String {
        let corepack = ctx.new_command_step("corepack");
        corepack.depend_on(mise_name);
        corepack.add_commands([
            Command::copy("package.json"),
            Command::exec("npm install -g corepack"),
            Command::exec("corepack enable"),
            Command::exec("corepack prepare --activate"),
        ]);
        corepack.name().to_string()
    }

    fn plan_install(
        ctx: &mut GenerateContext<'_>,
        package_manager: PackageManager,
        mise_name: &str,
        corepack_name: Option<&str>,
    ) -> String {
        let app = ctx.app;
        let lockfile = package_manager
            .lockfile()
            .filter(|lockfile| app.has_match(lockfile));
        let cache = package_manager.cache();
        let cache = ctx.add_cache(&cache.id, &cache.path);

        let install = ctx.new_command_step("install");
        install.depend_on(mise_name);
        if let Some(corepack) = corepack_name {
            install.depend_on(corepack);
        }

        install.add_env_vars(Self::node_env_vars());
        install.add_paths(["/app/node_modules/.bin"]);
        install.add_cache(cache);
        install.add_command(Command::copy("package.json"));
        if let Some(lockfile) = lockfile {
            install.add_command(Command::copy(lockfile));
        }
        install.add_command(Command::exec(package_manager.install_deps()));
        install.add_output("/app/node_modules");

        install.name().to_string()
    }

    fn plan_build(
        ctx: &mut GenerateContext<'_>,
        package_json: &PackageJson,
        package_manager: PackageManager,
        install_name: &str,
    ) -> Option<String> {
        package_json.scripts.get("build")?;

        let build = ctx.new_command_step("build");
        build.depend_on(install_name);
        build.add_commands([
            Command::copy("."),
            Command::exec(package_manager.run_cmd("build")),
        ]);
        Some(build.name().to_string())
    }

    fn start_command(
        ctx: &GenerateContext<'_>,
        package_json: &PackageJson,
        package_manager: PackageManager,
    ) -> Option<String> {
        if package_json.scripts.contains_key("start") {
            return Some(package_manager.run_cmd("start"));
        }
        if let Some(main) = &package_json.main {
            return Some(package_manager.run_script_command(main));
        }
        if let Ok(files) = ctx.app.find_files("{index.js,index.ts}") {
            if let Some(file) = files.first() {
                return Some(package_manager.run_script_command(file));
            }
        }
        None
    }

    fn node_env_vars() -> BTreeMap<String, String> {
        [
            ("NODE_ENV", "production"),
            ("NPM_CONFIG_PRODUCTION", "false"),
            ("YARN_PRODUCTION", "false"),
            ("CI", "true"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }
}
