use super::{print_outcome, CommandResult, EXIT_SUCCESS};
use pipf_core::{Engine, InstallOptions};
use pipf_schema::Project;

pub fn run(
    engine: &Engine,
    project: &mut Project,
    options: InstallOptions,
    json: bool,
) -> CommandResult {
    let outcome = engine.install(project, options)?;
    print_outcome(&outcome, json)?;
    Ok(EXIT_SUCCESS)
}
