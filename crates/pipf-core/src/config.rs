use crate::CoreError;
use pipf_runtime::EnvSpec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const BACKEND_ENV: &str = "PIPF_BACKEND";
pub const VENV_DIR_ENV: &str = "PIPF_VENV_DIR";

/// User settings from `~/.config/pipf/config.json`. Every field is
/// optional in the file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Virtualenv location, relative to the project directory unless
    /// absolute.
    pub venv_dir: PathBuf,
    pub backend: String,
    pub pip_compile: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            venv_dir: PathBuf::from("venv"),
            backend: "venv".to_owned(),
            pip_compile: "pip-compile".to_owned(),
            python: None,
        }
    }
}

impl Settings {
    /// Load from the default location; defaults when `HOME` is unset or
    /// the file does not exist.
    pub fn load_default() -> Result<Self, CoreError> {
        match default_config_path() {
            Ok(path) => Self::load(&path),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| CoreError::Config(format!("{}: {e}", path.display())))
    }

    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');
        pipf_schema::write_atomic(path, content.as_bytes())?;
        Ok(())
    }

    /// Apply `PIPF_BACKEND` and `PIPF_VENV_DIR` from the process
    /// environment.
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_env_from(|name| std::env::var(name).ok())
    }

    #[must_use]
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(backend) = lookup(BACKEND_ENV).filter(|v| !v.is_empty()) {
            self.backend = backend;
        }
        if let Some(dir) = lookup(VENV_DIR_ENV).filter(|v| !v.is_empty()) {
            self.venv_dir = PathBuf::from(dir);
        }
        self
    }

    pub fn env_spec(&self, project_dir: &Path) -> EnvSpec {
        let mut spec = EnvSpec::new(project_dir, &self.venv_dir);
        spec.python.clone_from(&self.python);
        spec.pip_compile.clone_from(&self.pip_compile);
        spec
    }
}

pub fn default_config_path() -> Result<PathBuf, CoreError> {
    let home = std::env::var("HOME").map_err(|_| CoreError::Config("HOME not set".to_owned()))?;
    Ok(PathBuf::from(home).join(".config/pipf/config.json"))
}
