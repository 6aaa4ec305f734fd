use super::{parse_requirements, print_outcome, CommandResult, EXIT_SUCCESS};
use pipf_core::Engine;
use pipf_schema::{PackageKey, Project};

/// Re-resolve the named packages, or everything when none are named.
/// Arguments are requirement strings; only the package name is used.
pub fn run(
    engine: &Engine,
    project: &mut Project,
    packages: &[String],
    json: bool,
) -> CommandResult {
    let keys: Vec<PackageKey> = parse_requirements(packages)?
        .iter()
        .map(pipf_schema::Requirement::key)
        .collect();
    let outcome = engine.update(project, &keys)?;
    print_outcome(&outcome, json)?;
    Ok(EXIT_SUCCESS)
}
