//! Python provider

use crate::Provider;
use kiln_errors::Result;
use kiln_generate::GenerateContext;
use kiln_types::{Command, Input};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

const DEFAULT_PYTHON_VERSION: &str = "3.13.2";
const UV_CACHE_DIR: &str = "/opt/uv-cache";
const PIP_CACHE_DIR: &str = "/opt/pip-cache";
const PACKAGES_DIR: &str = "/opt/python-packages";
const VENV_PATH: &str = "/app/.venv";
const LOCAL_BIN_PATH: &str = "/root/.local/bin";

static PIPFILE_VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(python_version|python_full_version)\s*=\s*['"]([0-9.]*)"?"#)
        .expect("valid regex")
});

static DJANGO_POSTGRES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"django\.db\.backends\.postgresql").expect("valid regex")
});

/// Python dependencies that need apt packages at runtime
const RUNTIME_DEP_REQUIREMENTS: &[(&str, &[&str])] = &[
    ("pdf2image", &["poppler-utils"]),
    ("pydub", &["ffmpeg"]),
];

/// How dependencies are installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PythonPackageManager {
    Pip,
    Uv,
    Poetry,
    Pdm,
    Pipenv,
    /// Bare scripts without a dependency manifest
    None,
}

impl PythonPackageManager {
    fn name(self) -> &'static str {
        match self {
            Self::Pip => "pip",
            Self::Uv => "uv",
            Self::Poetry => "poetry",
            Self::Pdm => "pdm",
            Self::Pipenv => "pipenv",
            Self::None => "none",
        }
    }
}

/// Provider for Python applications
pub struct PythonProvider;

impl Provider for PythonProvider {
    fn name(&self) -> &'static str {
        "python"
    }

    fn detect(&self, ctx: &GenerateContext<'_>) -> Result<bool> {
        let app = ctx.app;
        Ok(app.has_match("main.py")
            || app.has_match("requirements.txt")
            || app.has_match("pyproject.toml")
            || app.has_match("Pipfile"))
    }

    fn plan(&self, ctx: &mut GenerateContext<'_>) -> Result<()> {
        Self::plan_mise_packages(ctx);

        let mise_name = ctx.mise_step_builder().name().to_string();
        let mise_outputs = ctx.mise_step_builder().output_paths();

        let package_manager = Self::package_manager(ctx);
        Self::add_metadata(ctx, package_manager);

        let install_name = Self::plan_install(ctx, package_manager, &mise_name);

        let build = ctx.new_command_step("build");
        build.depend_on(&install_name);
        build.add_command(Command::copy("."));
        let build_name = build.name().to_string();

        let runtime_deps_name = Self::plan_runtime_deps(ctx);

        ctx.deploy.start_cmd = Self::start_command(ctx);
        ctx.deploy.variables = Self::python_env_vars();
        ctx.deploy.inputs = vec![
            Input::step(runtime_deps_name),
            Input::step_with_include(mise_name, mise_outputs),
            Input::step_with_include(build_name, vec!["/app".to_string()]),
        ];

        Ok(())
    }
}

impl PythonProvider {
    /// Register python (and pipx for manager-driven installs) with mise
    fn plan_mise_packages(ctx: &mut GenerateContext<'_>) {
        let app = ctx.app;
        let env_version = ctx.env.get_config_variable("PYTHON_VERSION");
        let version_file = app
            .read_file(".python-version")
            .ok()
            .map(|contents| contents.trim().to_string());
        let runtime_file = app
            .read_file("runtime.txt")
            .ok()
            .map(|contents| contents.trim().to_string());
        let pipfile_version = Self::pipfile_python_version(ctx);
        let needs_pipx = Self::has_poetry(ctx)
            || Self::has_uv(ctx)
            || Self::has_pdm(ctx)
            || Self::has_pipfile(ctx);

        let packages = ctx.mise_step_builder();
        let python = packages.default_package("python", DEFAULT_PYTHON_VERSION);

        if let Some((version, var_name)) = env_version {
            packages.version(&python, &version, &var_name);
        }
        if let Some(version) = version_file {
            packages.version(&python, &version, ".python-version");
        }
        if let Some(version) = runtime_file {
            packages.version(&python, &version, "runtime.txt");
        }
        if let Some(version) = pipfile_version {
            packages.version(&python, &version, "Pipfile");
        }

        if needs_pipx {
            packages.default_package("pipx", "latest");
        }

        packages.add_supporting_apt_package("python3-dev");
        packages.add_supporting_apt_package("libpq-dev");
    }

    fn package_manager(ctx: &GenerateContext<'_>) -> PythonPackageManager {
        if Self::has_requirements(ctx) {
            PythonPackageManager::Pip
        } else if Self::has_pyproject(ctx) && Self::has_uv(ctx) {
            PythonPackageManager::Uv
        } else if Self::has_pyproject(ctx) && Self::has_poetry(ctx) {
            PythonPackageManager::Poetry
        } else if Self::has_pyproject(ctx) && Self::has_pdm(ctx) {
            PythonPackageManager::Pdm
        } else if Self::has_pipfile(ctx) {
            PythonPackageManager::Pipenv
        } else {
            PythonPackageManager::None
        }
    }

    #[allow(clippy::too_many_lines)]
    fn plan_install(
        ctx: &mut GenerateContext<'_>,
        package_manager: PythonPackageManager,
        mise_name: &str,
    ) -> String {
        if package_manager != PythonPackageManager::None {
            ctx.logger
                .log(format!("Using {}", package_manager.name()));
        }

        let has_pipfile_lock = ctx.app.has_match("Pipfile.lock");
        let pip_cache = ctx.add_cache("pip", PIP_CACHE_DIR);
        let uv_cache = ctx.add_cache("uv", UV_CACHE_DIR);

        let install = ctx.new_command_step("install");
        install.depend_on(mise_name);
        install.add_env_vars(Self::python_env_vars());
        install.use_secrets_with_prefixes(["PYTHON", "PIP", "PIPX", "UV", "PDM", "POETRY"]);

        match package_manager {
            PythonPackageManager::Pip => {
                install.add_cache(pip_cache);
                install.add_env_vars([
                    ("PIP_CACHE_DIR", PIP_CACHE_DIR),
                    ("PYTHONPATH", PACKAGES_DIR),
                ]);
                install.add_commands([
                    Command::copy("requirements.txt"),
                    Command::exec(format!(
                        "pip install --target={PACKAGES_DIR} -r requirements.txt"
                    )),
                ]);
                install.add_output(PACKAGES_DIR);
            }
            PythonPackageManager::Uv => {
                install.add_cache(uv_cache);
                install.add_env_vars([
                    ("UV_COMPILE_BYTECODE", "1"),
                    ("UV_LINK_MODE", "copy"),
                    ("UV_CACHE_DIR", UV_CACHE_DIR),
                    ("UV_PYTHON_DOWNLOADS", "never"),
                ]);
                install.add_commands([
                    Command::exec("pipx install uv"),
                    Command::path(LOCAL_BIN_PATH),
                    Command::copy("pyproject.toml"),
                    Command::copy("uv.lock"),
                    Command::exec("uv sync --locked --no-dev --no-install-project"),
                    Command::copy("."),
                    Command::exec("uv sync --locked --no-dev --no-editable"),
                    Command::path(format!("{VENV_PATH}/bin")),
                ]);
                install.add_output(VENV_PATH);
            }
            PythonPackageManager::Poetry => {
                install.add_env_var("VIRTUAL_ENV", VENV_PATH);
                install.add_commands([
                    Command::exec("pipx install poetry"),
                    Command::path(LOCAL_BIN_PATH),
                    Command::exec("poetry config virtualenvs.in-project true"),
                    Command::copy("pyproject.toml"),
                    Command::copy("poetry.lock"),
                    Command::exec("poetry install --no-interaction --no-ansi --only main --no-root"),
                    Command::copy("."),
                    Command::path(format!("{VENV_PATH}/bin")),
                ]);
                install.add_output(VENV_PATH);
            }
            PythonPackageManager::Pdm => {
                install.add_env_var("PDM_CHECK_UPDATE", "false");
                install.add_commands([
                    Command::exec("pipx install pdm"),
                    Command::path(LOCAL_BIN_PATH),
                    Command::copy("."),
                    Command::exec("pdm install --check --prod --no-editable"),
                    Command::path(format!("{VENV_PATH}/bin")),
                ]);
                install.add_output(VENV_PATH);
            }
            PythonPackageManager::Pipenv => {
                install.add_env_vars([
                    ("PIPENV_CHECK_UPDATE", "false"),
                    ("PIPENV_VENV_IN_PROJECT", "1"),
                    ("PIPENV_IGNORE_VIRTUALENVS", "1"),
                ]);
                install.add_commands([
                    Command::exec("pipx install pipenv"),
                    Command::path(LOCAL_BIN_PATH),
                    Command::path(format!("{VENV_PATH}/bin")),
                ]);
                if has_pipfile_lock {
                    install.add_commands([
                        Command::copy("Pipfile"),
                        Command::copy("Pipfile.lock"),
                        Command::exec("pipenv install --deploy --ignore-pipfile"),
                    ]);
                } else {
                    install.add_commands([
                        Command::copy("Pipfile"),
                        Command::exec("pipenv install --skip-lock"),
                    ]);
                }
                install.add_output(VENV_PATH);
            }
            PythonPackageManager::None => {}
        }

        install.name().to_string()
    }

    /// Apt step carrying runtime libraries the dependencies need
    fn plan_runtime_deps(ctx: &mut GenerateContext<'_>) -> String {
        let mut packages: Vec<String> = Vec::new();
        for (dep, required) in RUNTIME_DEP_REQUIREMENTS {
            if Self::uses_dep(ctx, dep) {
                packages.extend(required.iter().map(ToString::to_string));
            }
        }
        if Self::uses_postgres(ctx) {
            packages.push("libpq5".to_string());
        }

        if !packages.is_empty() {
            ctx.logger
                .log(format!("Installing apt packages: {}", packages.join(" ")));
        }

        let runtime_input = ctx.default_runtime_input();
        let apt_step = ctx.new_apt_step("runtime-deps");
        apt_step.add_input(runtime_input);
        apt_step.add_packages(packages);
        apt_step.name().to_string()
    }

    fn start_command(ctx: &GenerateContext<'_>) -> Option<String> {
        if Self::is_django(ctx) {
            if let Some(command) = Self::django_start_command(ctx) {
                return Some(command);
            }
        }

        if ctx.app.has_match("main.py") {
            return Some("python main.py".to_string());
        }

        None
    }

    fn django_start_command(ctx: &GenerateContext<'_>) -> Option<String> {
        let wsgi_files = ctx.app.find_files("**/wsgi.py").ok()?;
        let wsgi = wsgi_files.first()?;
        let module = wsgi.trim_end_matches("/wsgi.py").replace('/', ".");
        Some(format!(
            "python manage.py migrate && gunicorn {module}.wsgi:application"
        ))
    }

    fn add_metadata(ctx: &mut GenerateContext<'_>, package_manager: PythonPackageManager) {
        let has_requirements = Self::has_requirements(ctx);
        let has_pyproject = Self::has_pyproject(ctx);
        let has_pipfile = Self::has_pipfile(ctx);
        let is_django = Self::is_django(ctx);

        ctx.metadata
            .set("pythonPackageManager", package_manager.name());
        ctx.metadata
            .set_bool("pythonHasRequirementsTxt", has_requirements);
        ctx.metadata.set_bool("pythonHasPyproject", has_pyproject);
        ctx.metadata.set_bool("pythonHasPipfile", has_pipfile);
        ctx.metadata.set_bool("pythonDjango", is_django);
    }

    fn python_env_vars() -> BTreeMap<String, String> {
        [
            ("PYTHONFAULTHANDLER", "1"),
            ("PYTHONUNBUFFERED", "1"),
            ("PYTHONHASHSEED", "random"),
            ("PYTHONDONTWRITEBYTECODE", "1"),
            ("PIP_DISABLE_PIP_VERSION_CHECK", "1"),
            ("PIP_DEFAULT_TIMEOUT", "100"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn pipfile_python_version(ctx: &GenerateContext<'_>) -> Option<String> {
        let pipfile = ctx.app.read_file("Pipfile").ok()?;
        let captures = PIPFILE_VERSION_RE.captures(&pipfile)?;
        let version = captures.get(2)?.as_str();
        if version.is_empty() {
            None
        } else {
            Some(version.to_string())
        }
    }

    /// Whether any dependency manifest mentions `dep`
    fn uses_dep(ctx: &GenerateContext<'_>, dep: &str) -> bool {
        ["requirements.txt", "pyproject.toml", "Pipfile"]
            .iter()
            .any(|file| {
                ctx.app.read_file(file).is_ok_and(|contents| {
                    contents.to_lowercase().contains(&dep.to_lowercase())
                })
            })
    }

    fn uses_postgres(ctx: &GenerateContext<'_>) -> bool {
        let django_postgres = !ctx
            .app
            .find_files_with_content("**/*.py", &DJANGO_POSTGRES_RE)
            .is_empty();
        Self::uses_dep(ctx, "psycopg2") || django_postgres
    }

    fn is_django(ctx: &GenerateContext<'_>) -> bool {
        ctx.app.has_match("manage.py") && Self::uses_dep(ctx, "django")
    }

    fn has_requirements(ctx: &GenerateContext<'_>) -> bool {
        ctx.app.has_match("requirements.txt")
    }

    fn has_pyproject(ctx: &GenerateContext<'_>) -> bool {
        ctx.app.has_match("pyproject.toml")
    }

    fn has_pipfile(ctx: &GenerateContext<'_>) -> bool {
        ctx.app.has_match("Pipfile")
    }

    fn has_poetry(ctx: &GenerateContext<'_>) -> bool {
        ctx.app.has_match("poetry.lock")
    }

    fn has_pdm(ctx: &GenerateContext<'_>) -> bool {
        ctx.app.has_match("pdm.lock")
    }

    fn has_uv(ctx: &GenerateContext<'_>) -> bool {
        ctx.app.has_match("uv.lock")
    }
}
