use crate::backend::{EnvSpec, Environment};
use crate::freeze::parse_freeze;
use crate::process::{run_exit_code, run_output, run_status};
use crate::RuntimeError;
use pipf_schema::PackageKey;
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

/// A virtualenv managed through its own `pip`.
pub struct VenvEnvironment {
    venv_dir: PathBuf,
    python: Option<String>,
}

impl VenvEnvironment {
    pub fn new(spec: &EnvSpec) -> Self {
        Self {
            venv_dir: spec.venv_dir.clone(),
            python: spec.python.clone(),
        }
    }

    pub fn venv_dir(&self) -> &Path {
        &self.venv_dir
    }

    pub fn bin_dir(&self) -> PathBuf {
        if cfg!(windows) {
            self.venv_dir.join("Scripts")
        } else {
            self.venv_dir.join("bin")
        }
    }

    fn interpreter_for(&self, python_version: &str) -> String {
        self.python
            .clone()
            .unwrap_or_else(|| format!("python{python_version}"))
    }

    fn pip(&self) -> Result<Command, RuntimeError> {
        if !self.exists() {
            return Err(RuntimeError::EnvironmentMissing(self.venv_dir.clone()));
        }
        let mut cmd = Command::new(self.bin_dir().join("pip"));
        cmd.arg("--disable-pip-version-check");
        Ok(cmd)
    }

    /// `command` as found in the venv's bin directory, falling back to PATH.
    fn program(&self, command: &str) -> OsString {
        let local = self.bin_dir().join(command);
        if local.is_file() {
            local.into_os_string()
        } else {
            OsString::from(command)
        }
    }

    /// Environment variables that activate the venv for a child process.
    fn activate(&self, cmd: &mut Command) {
        let mut paths = vec![self.bin_dir()];
        if let Some(existing) = std::env::var_os("PATH") {
            paths.extend(std::env::split_paths(&existing));
        }
        if let Ok(path) = std::env::join_paths(paths) {
            cmd.env("PATH", path);
        }
        cmd.env("VIRTUAL_ENV", &self.venv_dir);
        cmd.env_remove("PYTHONHOME");
    }
}

/// `major.minor` of an interpreter, from its `--version` output.
pub fn interpreter_version(python: &str) -> Option<String> {
    let output = Command::new(python).arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    // Python 2 prints the version to stderr.
    let text = [output.stdout, output.stderr].concat();
    parse_version_banner(&String::from_utf8_lossy(&text))
}

fn parse_version_banner(banner: &str) -> Option<String> {
    let version = banner.split_whitespace().nth(1)?;
    let mut parts = version.split('.');
    let major = parts.next().filter(|p| p.chars().all(|c| c.is_ascii_digit()))?;
    let minor = parts.next().filter(|p| p.chars().all(|c| c.is_ascii_digit()))?;
    Some(format!("{major}.{minor}"))
}

impl Environment for VenvEnvironment {
    fn name(&self) -> &'static str {
        "venv"
    }

    fn exists(&self) -> bool {
        self.venv_dir.is_dir()
    }

    fn create(&self, python_version: &str) -> Result<(), RuntimeError> {
        let interpreter = self.interpreter_for(python_version);
        info!(
            "creating virtualenv in {} with {interpreter}",
            self.venv_dir.display()
        );
        let mut cmd = Command::new(&interpreter);
        cmd.args(["-m", "venv"]).arg(&self.venv_dir);
        run_status(&mut cmd)
    }

    fn installed_keys(&self) -> Result<BTreeSet<PackageKey>, RuntimeError> {
        let mut cmd = self.pip()?;
        cmd.arg("freeze");
        Ok(parse_freeze(&run_output(&mut cmd)?))
    }

    fn install(&self, requirements_file: &Path) -> Result<(), RuntimeError> {
        let mut cmd = self.pip()?;
        cmd.args(["install", "--require-hashes", "-r"])
            .arg(requirements_file);
        run_status(&mut cmd)
    }

    fn uninstall(&self, packages: &[PackageKey]) -> Result<(), RuntimeError> {
        if packages.is_empty() {
            return Ok(());
        }
        let mut cmd = self.pip()?;
        cmd.args(["uninstall", "-y"])
            .args(packages.iter().map(PackageKey::as_str));
        run_status(&mut cmd)
    }

    fn list(&self) -> Result<(), RuntimeError> {
        let mut cmd = self.pip()?;
        cmd.arg("list");
        run_status(&mut cmd)
    }

    fn run(&self, command: &str, args: &[String]) -> Result<i32, RuntimeError> {
        if !self.exists() {
            return Err(RuntimeError::EnvironmentMissing(self.venv_dir.clone()));
        }
        let mut cmd = Command::new(self.program(command));
        cmd.args(args);
        self.activate(&mut cmd);
        run_exit_code(&mut cmd)
    }

    fn shell(&self) -> Result<i32, RuntimeError> {
        if !self.exists() {
            return Err(RuntimeError::EnvironmentMissing(self.venv_dir.clone()));
        }
        let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_owned());
        let mut cmd = Command::new(shell);
        self.activate(&mut cmd);
        run_exit_code(&mut cmd)
    }
}
