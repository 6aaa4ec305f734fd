use crate::atomic::write_atomic;
use crate::manifest::ManifestError;
use crate::requirement::Requirement;
use crate::types::PackageKey;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use thiserror::Error;

const MANIFEST_DIGEST_KEY: &str = "manifest_digest";

#[derive(Debug, Error)]
pub enum LockError {
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("lock file I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("lock file parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Locked packages of one group, keyed and ordered by package key.
pub type Pins = BTreeMap<PackageKey, Pin>;

/// An exact version plus the artifact hashes pip may accept for it.
#[derive(Debug, Clone, Serialize, Deserialize, Eq)]
pub struct Pin {
    /// Exact specifier, e.g. `==2.2.1`.
    pub version: String,
    #[serde(default)]
    pub hashes: Vec<String>,
}

/// Hash order is not significant.
impl PartialEq for Pin {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version && self.hash_set() == other.hash_set()
    }
}

impl Pin {
    pub fn new(version: impl Into<String>, hashes: Vec<String>) -> Self {
        Self {
            version: version.into(),
            hashes,
        }
    }

    /// Pin to an exact version, adding the `==` operator when missing.
    pub fn exact(version: &str, hashes: Vec<String>) -> Self {
        let version = version.trim();
        if version.starts_with("==") {
            Self::new(version, hashes)
        } else {
            Self::new(format!("=={version}"), hashes)
        }
    }

    /// The bare version number without the `==` operator.
    pub fn exact_version(&self) -> &str {
        self.version
            .strip_prefix("===")
            .or_else(|| self.version.strip_prefix("=="))
            .unwrap_or(&self.version)
    }

    pub fn hash_set(&self) -> BTreeSet<&str> {
        self.hashes.iter().map(String::as_str).collect()
    }

    pub fn requirement(&self, key: &PackageKey) -> Requirement {
        Requirement::new(key.as_str(), self.version.as_str())
    }

    /// One line of a hash-checked requirements file.
    pub fn requirement_line(&self, key: &PackageKey) -> String {
        let mut line = self.requirement(key).to_string();
        for hash in &self.hashes {
            line.push_str(" --hash=");
            line.push_str(hash);
        }
        line
    }
}

/// A package as returned by the resolver, before hashes are attached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResolvedPackage {
    pub name: String,
    pub version: String,
}

impl ResolvedPackage {
    pub fn key(&self) -> PackageKey {
        PackageKey::new(&self.name)
    }

    pub fn into_pin(self, hashes: Vec<String>) -> (PackageKey, Pin) {
        let key = self.key();
        (key, Pin::exact(&self.version, hashes))
    }
}

/// The Pipfile.lock document.
///
/// `meta` is opaque apart from the manifest digest pipf records in it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LockFile {
    #[serde(rename = "_meta", default)]
    pub meta: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub default: Pins,
    #[serde(default)]
    pub develop: Pins,
}

impl LockFile {
    pub fn group(&self, dev: bool) -> &Pins {
        if dev {
            &self.develop
        } else {
            &self.default
        }
    }

    /// Merged view of the locked packages. Production pins override
    /// development pins on key collision.
    pub fn locked_packages(&self, prod_only: bool) -> Pins {
        let mut packages = Pins::new();
        if !prod_only {
            packages.extend(self.develop.iter().map(|(k, p)| (k.clone(), p.clone())));
        }
        packages.extend(self.default.iter().map(|(k, p)| (k.clone(), p.clone())));
        packages
    }

    pub fn manifest_digest(&self) -> Option<&str> {
        self.meta
            .get(MANIFEST_DIGEST_KEY)
            .and_then(serde_json::Value::as_str)
    }

    pub fn set_manifest_digest(&mut self, digest: String) {
        self.meta.insert(
            MANIFEST_DIGEST_KEY.to_owned(),
            serde_json::Value::String(digest),
        );
    }

    pub fn to_json_string(&self) -> Result<String, LockError> {
        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');
        Ok(content)
    }

    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), LockError> {
        let path = path.as_ref();
        let content = self.to_json_string()?;
        write_atomic(path, content.as_bytes())?;
        Ok(())
    }

    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, LockError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
