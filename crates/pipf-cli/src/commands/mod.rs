pub mod add;
pub mod completions;
pub mod init;
pub mod install;
pub mod list;
pub mod lock;
pub mod remove;
pub mod run;
pub mod shell;
pub mod update;

use indicatif::{ProgressBar, ProgressStyle};
use pipf_core::{CoreError, Outcome};
use pipf_schema::{ManifestError, Requirement};
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;

/// Why a command stopped: the exit code and, unless the user interrupted,
/// a message for stderr.
#[derive(Debug)]
pub struct Failure {
    pub code: u8,
    pub message: Option<String>,
}

pub type CommandResult = Result<u8, Failure>;

impl From<CoreError> for Failure {
    fn from(err: CoreError) -> Self {
        exit_for(&err)
    }
}

impl From<ManifestError> for Failure {
    fn from(err: ManifestError) -> Self {
        exit_for(&CoreError::Manifest(err))
    }
}

impl From<String> for Failure {
    fn from(message: String) -> Self {
        Self {
            code: EXIT_FAILURE,
            message: Some(message),
        }
    }
}

/// The one place errors become exit codes.
///
/// Interrupts end quietly with success. Configuration problems exit 2. A
/// failed installer passes its own exit status through; anything else
/// exits 1.
pub fn exit_for(err: &CoreError) -> Failure {
    if err.is_interrupt() {
        return Failure {
            code: EXIT_SUCCESS,
            message: None,
        };
    }
    let code = if err.is_config_error() {
        EXIT_CONFIG_ERROR
    } else {
        err.subprocess_exit_code()
            .and_then(|c| u8::try_from(c).ok())
            .filter(|c| *c != EXIT_SUCCESS)
            .unwrap_or(EXIT_FAILURE)
    };
    Failure {
        code,
        message: Some(err.to_string()),
    }
}

pub fn parse_requirements(packages: &[String]) -> Result<Vec<Requirement>, Failure> {
    packages
        .iter()
        .map(|p| Requirement::parse(p).map_err(Failure::from))
        .collect()
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    if let Ok(style) = ProgressStyle::with_template("{msg}") {
        pb.set_style(style);
    }
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    if let Ok(style) = ProgressStyle::with_template("{msg}") {
        pb.set_style(style);
    }
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn colorize_change(sign: char, text: &str) -> String {
    use console::Style;
    let line = format!("  {sign} {text}");
    match sign {
        '+' => Style::new().green().apply_to(line).to_string(),
        '-' => Style::new().red().apply_to(line).to_string(),
        _ => line,
    }
}

/// Print what a pipeline run changed, as JSON or as `+`/`-` lines.
pub fn print_outcome(outcome: &Outcome, json: bool) -> Result<(), String> {
    if json {
        println!("{}", json_pretty(outcome)?);
        return Ok(());
    }
    if outcome.environment_created {
        println!("created virtualenv");
    }
    for (key, pin) in &outcome.diff.updated {
        println!("{}", colorize_change('+', &format!("{key}{}", pin.version)));
    }
    for key in outcome.diff.removed.keys() {
        println!("{}", colorize_change('-', key.as_str()));
    }
    if outcome.lockfile_written {
        println!("updated Pipfile.lock");
    } else {
        println!("Pipfile.lock unchanged");
    }
    Ok(())
}
