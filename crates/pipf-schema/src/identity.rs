use crate::manifest::{Manifest, ManifestError, PackageSpec, Requires};
use crate::types::PackageKey;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Serialize)]
struct ResolutionInputs<'a> {
    requires: &'a Requires,
    packages: &'a BTreeMap<PackageKey, PackageSpec>,
    dev_packages: &'a BTreeMap<PackageKey, PackageSpec>,
}

/// Digest of the manifest fields that feed resolution.
///
/// Sources and unknown top-level keys are excluded, so editing `[scripts]`
/// does not make an existing lock file stale. Stored in the lock file's
/// `_meta.manifest_digest` and compared by `install --locked`.
pub fn manifest_digest(manifest: &Manifest) -> Result<String, ManifestError> {
    let canonical = serde_json::to_string(&ResolutionInputs {
        requires: &manifest.requires,
        packages: &manifest.packages,
        dev_packages: &manifest.dev_packages,
    })?;
    Ok(blake3::hash(canonical.as_bytes()).to_hex().to_string())
}
