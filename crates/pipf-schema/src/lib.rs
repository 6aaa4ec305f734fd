//! Pipfile parsing, lock file model, and project loading for pipf.
//!
//! This crate defines the schema layer: the TOML manifest (`Manifest`), the
//! JSON lock file (`LockFile`) and its pins, normalized package keys
//! (`PackageKey`), PEP 508-style requirement strings (`Requirement`), the
//! manifest digest recorded in lock metadata, and `Project`, which ties a
//! manifest and its lock file to their on-disk locations.

mod atomic;
pub mod identity;
pub mod lock;
pub mod manifest;
pub mod project;
pub mod requirement;
pub mod types;

pub use atomic::write_atomic;
pub use identity::manifest_digest;
pub use lock::{LockError, LockFile, Pin, Pins, ResolvedPackage};
pub use manifest::{
    parse_manifest_file, parse_manifest_str, DetailedSpec, Manifest, ManifestError, PackageSpec,
    Requires, Source,
};
pub use project::{find_manifest, Project, LOCKFILE_NAME, MANIFEST_NAME};
pub use requirement::Requirement;
pub use types::PackageKey;
