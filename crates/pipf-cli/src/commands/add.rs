use super::{parse_requirements, print_outcome, CommandResult, EXIT_SUCCESS};
use pipf_core::Engine;
use pipf_schema::Project;

pub fn run(
    engine: &Engine,
    project: &mut Project,
    packages: &[String],
    dev: bool,
    json: bool,
) -> CommandResult {
    let requirements = parse_requirements(packages)?;
    let outcome = engine.add(project, &requirements, dev)?;
    print_outcome(&outcome, json)?;
    Ok(EXIT_SUCCESS)
}
