//! Lock file synchronization engine for pipf.
//!
//! This crate ties the schema layer and the runtime backends together: the
//! pin diff (`diff`), the resolution orchestrator that re-locks a project
//! while carrying prior pins forward (`resolve`), the environment
//! synchronizer that applies a diff with hash-checked installs (`sync`),
//! user settings (`config`), and `Engine`, which runs each command's
//! resolve, diff, sync and persist pipeline.

pub mod config;
pub mod diff;
pub mod engine;
pub mod resolve;
pub mod sync;

pub use config::{default_config_path, Settings};
pub use diff::{diff, PackageDiff};
pub use engine::{Engine, InstallOptions, Outcome};
pub use pipf_runtime::{install_signal_handler, interrupt_requested};
pub use resolve::{resolve, seed_pins, update_lockfile, UpdateOptions};
pub use sync::{apply, install_all};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("manifest error: {0}")]
    Manifest(#[from] pipf_schema::ManifestError),
    #[error("lock error: {0}")]
    Lock(#[from] pipf_schema::LockError),
    #[error("runtime error: {0}")]
    Runtime(#[from] pipf_runtime::RuntimeError),
    #[error("development pins conflict with production pins: {}", .0.join(", "))]
    Conflict(Vec<String>),
    #[error("could not get Python version from Pipfile")]
    MissingPythonVersion,
    #[error("no lock file at {}", .0.display())]
    MissingLockfile(PathBuf),
    #[error("Pipfile.lock is out of date with Pipfile; run `pipf lock`")]
    StaleLockfile,
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Errors caused by project or user configuration rather than by the
    /// resolver or installer.
    pub fn is_config_error(&self) -> bool {
        use pipf_schema::{LockError, ManifestError};
        match self {
            Self::Manifest(
                ManifestError::NotFound(_)
                | ManifestError::AlreadyExists(_)
                | ManifestError::InvalidRequirement(_),
            )
            | Self::Lock(LockError::Manifest(
                ManifestError::NotFound(_) | ManifestError::AlreadyExists(_),
            ))
            | Self::MissingPythonVersion
            | Self::MissingLockfile(_)
            | Self::StaleLockfile
            | Self::Config(_) => true,
            _ => false,
        }
    }

    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::Runtime(pipf_runtime::RuntimeError::Interrupted))
    }

    /// Exit status of a failed installer or resolver subprocess.
    pub fn subprocess_exit_code(&self) -> Option<i32> {
        match self {
            Self::Runtime(e) => e.exit_code(),
            _ => None,
        }
    }
}
