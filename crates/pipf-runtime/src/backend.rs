use crate::RuntimeError;
use pipf_schema::{PackageKey, Pins, Requirement, ResolvedPackage};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Where the project environment lives and which tools drive it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvSpec {
    pub project_dir: PathBuf,
    pub venv_dir: PathBuf,
    /// Interpreter used to create the venv. `None` means
    /// `python{requires.python_version}`.
    pub python: Option<String>,
    pub pip_compile: String,
}

impl EnvSpec {
    pub fn new(project_dir: &Path, venv_dir: &Path) -> Self {
        Self {
            project_dir: project_dir.to_path_buf(),
            venv_dir: if venv_dir.is_absolute() {
                venv_dir.to_path_buf()
            } else {
                project_dir.join(venv_dir)
            },
            python: None,
            pip_compile: "pip-compile".to_owned(),
        }
    }
}

/// Input to one resolution run.
#[derive(Debug, Clone, Copy)]
pub struct ResolveRequest<'a> {
    pub constraints: &'a [Requirement],
    /// Existing pins the resolver should keep where they still satisfy
    /// the constraints.
    pub seed: &'a Pins,
    pub index_urls: &'a [String],
}

pub trait Resolver: Send + Sync {
    fn name(&self) -> &str;

    /// Resolve constraints to exact versions, transitive dependencies
    /// included, preferring the seed pins.
    fn resolve(&self, request: &ResolveRequest<'_>) -> Result<Vec<ResolvedPackage>, RuntimeError>;

    /// Artifact hashes for packages returned by `resolve`.
    fn resolve_hashes(
        &self,
        packages: &[ResolvedPackage],
    ) -> Result<BTreeMap<ResolvedPackage, Vec<String>>, RuntimeError>;
}

pub trait Environment: Send + Sync {
    fn name(&self) -> &str;

    fn exists(&self) -> bool;

    fn create(&self, python_version: &str) -> Result<(), RuntimeError>;

    /// Keys of the distributions currently installed.
    fn installed_keys(&self) -> Result<BTreeSet<PackageKey>, RuntimeError>;

    /// Install from a hash-checked requirements file.
    fn install(&self, requirements_file: &Path) -> Result<(), RuntimeError>;

    fn uninstall(&self, packages: &[PackageKey]) -> Result<(), RuntimeError>;

    /// Print the installed distributions to stdout.
    fn list(&self) -> Result<(), RuntimeError>;

    /// Run a command inside the environment and return its exit code.
    fn run(&self, command: &str, args: &[String]) -> Result<i32, RuntimeError>;

    /// Start an interactive shell inside the environment.
    fn shell(&self) -> Result<i32, RuntimeError>;
}

/// The resolver and environment a command operates through.
pub struct Backend {
    pub resolver: Box<dyn Resolver>,
    pub environment: Box<dyn Environment>,
}

pub fn select_backend(name: &str, spec: &EnvSpec) -> Result<Backend, RuntimeError> {
    match name {
        "venv" => Ok(Backend {
            resolver: Box::new(crate::piptools::PipCompileResolver::new(&spec.pip_compile)),
            environment: Box::new(crate::venv::VenvEnvironment::new(spec)),
        }),
        "mock" => Ok(Backend {
            resolver: Box::new(crate::mock::MockResolver::new()),
            environment: Box::new(crate::mock::MockEnvironment::new()),
        }),
        other => Err(RuntimeError::BackendUnavailable(other.to_owned())),
    }
}
