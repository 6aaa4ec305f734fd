//! Parsing of `pip freeze` output.

use pipf_schema::{PackageKey, Requirement};
use std::collections::BTreeSet;
use tracing::debug;

/// Package keys listed in `pip freeze` output.
///
/// Editable installs are recognised by their `#egg=` fragment; editable
/// lines without one, comments, and unparseable lines are skipped.
pub fn parse_freeze(output: &str) -> BTreeSet<PackageKey> {
    let mut keys = BTreeSet::new();
    for line in output.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with("-e") || line.starts_with("--editable") {
            match line.split_once("#egg=") {
                Some((_, egg)) => {
                    let name = egg.split('&').next().unwrap_or(egg);
                    keys.insert(PackageKey::new(name));
                }
                None => debug!("skipping editable install without egg name: {line}"),
            }
            continue;
        }
        match Requirement::parse(line) {
            Ok(req) => {
                keys.insert(req.key());
            }
            Err(e) => debug!("skipping freeze line: {e}"),
        }
    }
    keys
}
