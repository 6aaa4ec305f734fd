use super::{CommandResult, EXIT_FAILURE};
use pipf_core::Engine;
use pipf_schema::Project;

/// Run a command inside the project virtualenv; its exit status becomes
/// ours.
pub fn run(engine: &Engine, project: &Project, command: &[String]) -> CommandResult {
    let Some((program, args)) = command.split_first() else {
        return Err("no command given".to_owned().into());
    };
    let code = engine.run(project, program, args)?;
    Ok(u8::try_from(code).unwrap_or(EXIT_FAILURE))
}
