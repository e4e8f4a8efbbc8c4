//! Node package manager detection and command tables

use kiln_app::App;
use kiln_types::CacheMount;

/// The package manager driving installs for a Node application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Npm,
    Pnpm,
    Bun,
    Yarn1,
    Yarn2,
}

impl PackageManager {
    /// Pick the package manager from the lockfiles present in the app
    #[must_use]
    pub fn detect(app: &App) -> Self {
        if app.has_match("pnpm-lock.yaml") {
            Self::Pnpm
        } else if app.has_match("bun.lockb") || app.has_match("bun.lock") {
            Self::Bun
        } else if app.has_match(".yarnrc.yml") || app.has_match(".yarnrc.yaml") {
            Self::Yarn2
        } else if app.has_match("yarn.lock") {
            Self::Yarn1
        } else {
            Self::Npm
        }
    }

    /// Binary name
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Pnpm => "pnpm",
            Self::Bun => "bun",
            Self::Yarn1 | Self::Yarn2 => "yarn",
        }
    }

    /// Lockfile consulted before installing, if the manager has one
    #[must_use]
    pub fn lockfile(self) -> Option<&'static str> {
        match self {
            Self::Npm => Some("package-lock.json"),
            Self::Pnpm => Some("pnpm-lock.yaml"),
            Self::Bun => Some("bun.lockb"),
            Self::Yarn1 | Self::Yarn2 => Some("yarn.lock"),
        }
    }

    /// Frozen-lockfile install command
    #[must_use]
    pub fn install_deps(self) -> &'static str {
        match self {
            Self::Npm => "npm ci",
            Self::Pnpm => "pnpm install --frozen-lockfile",
            Self::Bun => "bun i --no-save",
            Self::Yarn1 => "yarn install --frozen-lockfile",
            Self::Yarn2 => "yarn install --check-cache",
        }
    }

    /// Run a package.json script
    #[must_use]
    pub fn run_cmd(self, script: &str) -> String {
        format!("{} run {script}", self.name())
    }

    /// Run a script file directly
    #[must_use]
    pub fn run_script_command(self, script: &str) -> String {
        match self {
            Self::Bun => format!("bun {script}"),
            _ => format!("node {script}"),
        }
    }

    /// The dependency cache this manager populates during installs
    #[must_use]
    pub fn cache(self) -> CacheMount {
        match self {
            Self::Npm => CacheMount::new("npm", "/root/.npm"),
            Self::Pnpm => CacheMount::new("pnpm", "/root/.local/share/pnpm/store"),
            Self::Bun => CacheMount::new("bun", "/root/.bun/install/cache"),
            Self::Yarn1 | Self::Yarn2 => {
                CacheMount::new("yarn", "/usr/local/share/.cache/yarn")
            }
        }
    }
}
