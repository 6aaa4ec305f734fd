use super::{CommandResult, EXIT_FAILURE};
use pipf_core::Engine;
use pipf_schema::Project;

pub fn run(engine: &Engine, project: &Project) -> CommandResult {
    let code = engine.shell(project)?;
    Ok(u8::try_from(code).unwrap_or(EXIT_FAILURE))
}
