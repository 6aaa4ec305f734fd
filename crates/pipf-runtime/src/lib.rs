//! Resolver and environment backends for pipf.
//!
//! This crate is the execution layer: the `Resolver` trait turning Pipfile
//! constraints into exact versions and hashes, the `Environment` trait for
//! the project virtualenv, their real implementations (`pip-compile` and a
//! `venv` driven through pip), deterministic in-memory mocks for tests,
//! subprocess handling, interrupt signalling, and prerequisite checks.

pub mod backend;
pub mod freeze;
pub mod interrupt;
pub mod mock;
pub mod piptools;
pub mod prereq;
mod process;
pub mod venv;

pub use backend::{select_backend, Backend, EnvSpec, Environment, ResolveRequest, Resolver};
pub use interrupt::{install_signal_handler, interrupt_requested};
pub use mock::{MockEnvironment, MockFailure, MockRelease, MockResolver};
pub use piptools::PipCompileResolver;
pub use prereq::{check_prereqs, format_missing, MissingPrereq};
pub use venv::{interpreter_version, VenvEnvironment};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("backend '{0}' is not available on this system")]
    BackendUnavailable(String),
    #[error("failed to start '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("'{command}' failed ({})", exit_label(*.code))]
    CommandFailed { command: String, code: Option<i32> },
    #[error("interrupted")]
    Interrupted,
    #[error("could not resolve dependencies: {0}")]
    Unresolvable(String),
    #[error("unexpected resolver output: {0}")]
    ResolverOutput(String),
    #[error("virtualenv not found at {}", .0.display())]
    EnvironmentMissing(std::path::PathBuf),
    #[error("mock state poisoned: {0}")]
    Poisoned(String),
}

impl RuntimeError {
    /// Exit code of the failed subprocess, if it exited normally.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::CommandFailed { code, .. } => *code,
            _ => None,
        }
    }
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_owned(),
    }
}
