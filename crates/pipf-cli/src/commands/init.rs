use super::{json_pretty, CommandResult, EXIT_SUCCESS};
use pipf_runtime::interpreter_version;
use pipf_schema::Project;
use std::path::Path;

/// Used when no version is given and the interpreter cannot be queried.
const FALLBACK_PYTHON_VERSION: &str = "3";

pub fn run(
    dir: &Path,
    python_version: Option<&str>,
    interpreter: Option<&str>,
    json: bool,
) -> CommandResult {
    let version = match python_version {
        Some(v) => v.trim().to_owned(),
        None => interpreter_version(interpreter.unwrap_or("python3"))
            .unwrap_or_else(|| FALLBACK_PYTHON_VERSION.to_owned()),
    };

    let project = Project::create(dir, &version)?;
    project.persist()?;

    if json {
        let payload = serde_json::json!({
            "status": "created",
            "path": project.manifest_path(),
            "python_version": version,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "created {} (Python {version})",
            project.manifest_path().display()
        );
    }
    Ok(EXIT_SUCCESS)
}
