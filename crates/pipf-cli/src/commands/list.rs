use super::{CommandResult, EXIT_SUCCESS};
use pipf_core::Engine;
use pipf_schema::Project;

pub fn run(engine: &Engine, project: &Project) -> CommandResult {
    engine.list(project)?;
    Ok(EXIT_SUCCESS)
}
