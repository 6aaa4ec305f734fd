use super::{print_outcome, spin_fail, spin_ok, spinner, CommandResult, EXIT_SUCCESS};
use pipf_core::Engine;
use pipf_schema::Project;

pub fn run(engine: &Engine, project: &mut Project, json: bool) -> CommandResult {
    let pb = if json {
        None
    } else {
        Some(spinner("locking..."))
    };
    let outcome = match engine.lock(project) {
        Ok(outcome) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, "resolved");
            }
            outcome
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "resolution failed");
            }
            return Err(e.into());
        }
    };
    print_outcome(&outcome, json)?;
    Ok(EXIT_SUCCESS)
}
