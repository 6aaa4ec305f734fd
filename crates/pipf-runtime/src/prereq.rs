use crate::backend::EnvSpec;
use std::fmt;
use std::process::Command;

/// A missing prerequisite with actionable install instructions.
#[derive(Debug)]
pub struct MissingPrereq {
    pub name: String,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

fn command_exists(name: &str) -> bool {
    if name.contains(std::path::MAIN_SEPARATOR) {
        return std::path::Path::new(name).is_file();
    }
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Check the external tools a backend shells out to.
/// An empty list means all prerequisites are met; the mock backend has none.
pub fn check_prereqs(backend: &str, spec: &EnvSpec) -> Vec<MissingPrereq> {
    let mut missing = Vec::new();
    if backend != "venv" {
        return missing;
    }

    let python = spec.python.as_deref().unwrap_or("python3");
    if !command_exists(python) {
        missing.push(MissingPrereq {
            name: python.to_owned(),
            purpose: "creating the project virtualenv",
            install_hint: "apt install python3 python3-venv | dnf install python3 | brew install python",
        });
    }

    if !command_exists(&spec.pip_compile) {
        missing.push(MissingPrereq {
            name: spec.pip_compile.clone(),
            purpose: "resolving and hashing locked versions",
            install_hint: "pipx install pip-tools | pip install --user pip-tools",
        });
    }

    missing
}

/// Format a list of missing prerequisites into a user-friendly error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\npipf needs these tools to resolve and install packages.");
    msg
}
