use crate::interrupt::{interrupt_flag, ForegroundChild};
use crate::RuntimeError;
use std::process::{Command, ExitStatus, Output};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Program and arguments, for logs and error messages.
pub(crate) fn describe(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(cmd.get_args().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}

fn spawn_error(cmd: &Command, source: std::io::Error) -> RuntimeError {
    RuntimeError::Spawn {
        command: cmd.get_program().to_string_lossy().into_owned(),
        source,
    }
}

/// A pending interrupt stops the next command from starting.
fn before_spawn(cmd: &Command, interrupted: &AtomicBool) -> Result<(), RuntimeError> {
    if interrupted.load(Ordering::SeqCst) {
        debug!("interrupt pending, not running {}", describe(cmd));
        return Err(RuntimeError::Interrupted);
    }
    debug!("running {}", describe(cmd));
    Ok(())
}

fn check(cmd: &Command, status: ExitStatus, interrupted: &AtomicBool) -> Result<(), RuntimeError> {
    if interrupted.load(Ordering::SeqCst) {
        return Err(RuntimeError::Interrupted);
    }
    if status.success() {
        Ok(())
    } else {
        Err(RuntimeError::CommandFailed {
            command: describe(cmd),
            code: status.code(),
        })
    }
}

/// Run with inherited stdio; a non-zero exit is an error.
pub(crate) fn run_status(cmd: &mut Command) -> Result<(), RuntimeError> {
    run_status_with(cmd, interrupt_flag())
}

fn run_status_with(cmd: &mut Command, interrupted: &AtomicBool) -> Result<(), RuntimeError> {
    before_spawn(cmd, interrupted)?;
    let status = cmd.status().map_err(|e| spawn_error(cmd, e))?;
    check(cmd, status, interrupted)
}

/// Run with captured stdout and inherited stderr; returns stdout.
pub(crate) fn run_output(cmd: &mut Command) -> Result<String, RuntimeError> {
    run_output_with(cmd, interrupt_flag())
}

fn run_output_with(cmd: &mut Command, interrupted: &AtomicBool) -> Result<String, RuntimeError> {
    before_spawn(cmd, interrupted)?;
    let Output { status, stdout, .. } = cmd
        .stderr(std::process::Stdio::inherit())
        .output()
        .map_err(|e| spawn_error(cmd, e))?;
    check(cmd, status, interrupted)?;
    Ok(String::from_utf8_lossy(&stdout).into_owned())
}

/// Run interactively and hand back the exit code instead of failing on it.
///
/// The child owns Ctrl-C while it runs; its exit code is returned even if
/// it was interrupted. A child killed by a signal reports 128 + signal.
pub(crate) fn run_exit_code(cmd: &mut Command) -> Result<i32, RuntimeError> {
    run_exit_code_with(cmd, interrupt_flag())
}

fn run_exit_code_with(cmd: &mut Command, interrupted: &AtomicBool) -> Result<i32, RuntimeError> {
    before_spawn(cmd, interrupted)?;
    let _foreground = ForegroundChild::enter();
    let status = cmd.status().map_err(|e| spawn_error(cmd, e))?;
    Ok(exit_code(status))
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
