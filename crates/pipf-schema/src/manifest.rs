use crate::requirement::Requirement;
use crate::types::PackageKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_INDEX_URL: &str = "https://pypi.org/simple";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse manifest: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("failed to serialize manifest: {0}")]
    SerializeToml(#[from] toml::ser::Error),
    #[error("failed to encode manifest: {0}")]
    Canonical(#[from] serde_json::Error),
    #[error("no Pipfile found in {} or any parent directory", .0.display())]
    NotFound(PathBuf),
    #[error("Pipfile already exists: {}", .0.display())]
    AlreadyExists(PathBuf),
    #[error("invalid requirement: '{0}'")]
    InvalidRequirement(String),
}

/// In-memory Pipfile.
///
/// Keys this model does not know about are carried in `other` and written
/// back unchanged.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Manifest {
    #[serde(default, rename = "source", skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub requires: Requires,
    #[serde(default)]
    pub packages: BTreeMap<PackageKey, PackageSpec>,
    #[serde(default, rename = "dev-packages")]
    pub dev_packages: BTreeMap<PackageKey, PackageSpec>,
    #[serde(flatten)]
    pub other: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Source {
    #[serde(default)]
    pub name: String,
    pub url: String,
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,
}

impl Default for Source {
    fn default() -> Self {
        Self {
            name: "pypi".to_owned(),
            url: DEFAULT_INDEX_URL.to_owned(),
            verify_ssl: true,
        }
    }
}

fn default_verify_ssl() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Requires {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_version: Option<String>,
    #[serde(flatten)]
    pub other: BTreeMap<String, toml::Value>,
}

/// A manifest entry: either `"*"`/`">=2.0"` or a table with a `version` key.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum PackageSpec {
    Version(String),
    Detailed(DetailedSpec),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DetailedSpec {
    #[serde(default = "any_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extras: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashes: Option<Vec<String>>,
    #[serde(flatten)]
    pub other: BTreeMap<String, toml::Value>,
}

fn any_version() -> String {
    "*".to_owned()
}

impl PackageSpec {
    /// Build the entry written for a requirement given on the command line.
    /// Plain constraints stay in the short string form.
    pub fn from_requirement(req: &Requirement) -> Self {
        if req.extras.is_empty() && req.markers.is_none() {
            return Self::Version(req.version_or_any().to_owned());
        }
        Self::Detailed(DetailedSpec {
            version: req.version_or_any().to_owned(),
            extras: req.extras.clone(),
            markers: req.markers.clone(),
            hashes: None,
            other: BTreeMap::new(),
        })
    }

    pub fn version(&self) -> &str {
        match self {
            Self::Version(v) => v,
            Self::Detailed(d) => &d.version,
        }
    }

    pub fn markers(&self) -> Option<&str> {
        match self {
            Self::Version(_) => None,
            Self::Detailed(d) => d.markers.as_deref(),
        }
    }

    pub fn to_requirement(&self, key: &PackageKey) -> Requirement {
        let mut req = Requirement::new(key.as_str(), self.version().trim());
        if let Self::Detailed(d) = self {
            req.extras.clone_from(&d.extras);
        }
        req.with_markers(self.markers().map(str::to_owned))
    }
}

impl Manifest {
    /// A fresh manifest for `init`: the PyPI source and a Python version.
    pub fn new(python_version: &str) -> Self {
        Self {
            sources: vec![Source::default()],
            requires: Requires {
                python_version: Some(python_version.to_owned()),
                other: BTreeMap::new(),
            },
            ..Self::default()
        }
    }

    pub fn group(&self, dev: bool) -> &BTreeMap<PackageKey, PackageSpec> {
        if dev {
            &self.dev_packages
        } else {
            &self.packages
        }
    }

    pub fn group_mut(&mut self, dev: bool) -> &mut BTreeMap<PackageKey, PackageSpec> {
        if dev {
            &mut self.dev_packages
        } else {
            &mut self.packages
        }
    }

    pub fn python_version(&self) -> Option<&str> {
        self.requires
            .python_version
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Constraints of one group, in key order.
    pub fn requirements(&self, dev: bool) -> Vec<Requirement> {
        self.group(dev)
            .iter()
            .map(|(key, spec)| spec.to_requirement(key))
            .collect()
    }

    /// Index URLs in declaration order; the first one is the primary index.
    pub fn index_urls(&self) -> Vec<String> {
        self.sources
            .iter()
            .map(|s| s.url.trim().to_owned())
            .filter(|url| !url.is_empty())
            .collect()
    }

    pub fn to_toml_string(&self) -> Result<String, ManifestError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

pub fn parse_manifest_str(input: &str) -> Result<Manifest, ManifestError> {
    Ok(toml::from_str(input)?)
}

pub fn parse_manifest_file(path: impl AsRef<Path>) -> Result<Manifest, ManifestError> {
    let content = fs::read_to_string(path)?;
    parse_manifest_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_manifest() {
        let input = r#"
[[source]]
name = "pypi"
url = "https://pypi.org/simple"
verify_ssl = true

[requires]
python_version = "3.11"

[packages]
Django = ">=2.0"
requests = { version = "*", extras = ["socks"] }
pywin32 = { version = "*", markers = "sys_platform == 'win32'" }

[dev-packages]
pytest = "*"
"#;
        let manifest = parse_manifest_str(input).expect("should parse");
        assert_eq!(manifest.python_version(), Some("3.11"));
        assert_eq!(manifest.packages.len(), 3);
        assert_eq!(manifest.packages[&PackageKey::new("django")].version(), ">=2.0");
        assert_eq!(
            manifest.packages[&PackageKey::new("pywin32")].markers(),
            Some("sys_platform == 'win32'")
        );
        assert_eq!(manifest.dev_packages.len(), 1);
        assert_eq!(manifest.index_urls(), vec!["https://pypi.org/simple"]);
    }

    #[test]
    fn parses_empty_manifest() {
        let manifest = parse_manifest_str("").expect("should parse");
        assert!(manifest.packages.is_empty());
        assert!(manifest.python_version().is_none());
    }

    #[test]
    fn rejects_invalid_toml() {
        assert!(parse_manifest_str("[packages\nfoo = ").is_err());
    }

    #[test]
    fn unknown_keys_survive_rewrite() {
        let input = r#"
[requires]
python_version = "3.9"
python_full_version = "3.9.18"

[packages]
flask = { version = "*", editable = true }

[scripts]
serve = "flask run"
"#;
        let manifest = parse_manifest_str(input).unwrap();
        let rewritten = parse_manifest_str(&manifest.to_toml_string().unwrap()).unwrap();
        assert_eq!(manifest, rewritten);
        assert!(rewritten.other.contains_key("scripts"));
        assert!(rewritten.requires.other.contains_key("python_full_version"));
        match &rewritten.packages[&PackageKey::new("flask")] {
            PackageSpec::Detailed(d) => assert!(d.other.contains_key("editable")),
            PackageSpec::Version(_) => panic!("expected detailed spec"),
        }
    }

    #[test]
    fn requirements_render_constraints_and_markers() {
        let manifest = parse_manifest_str(
            r#"
[packages]
six = "*"
colorama = { version = ">=0.4", markers = "os_name == 'nt'" }
"#,
        )
        .unwrap();
        let reqs: Vec<String> = manifest
            .requirements(false)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(reqs, vec!["colorama>=0.4; os_name == 'nt'", "six"]);
    }

    #[test]
    fn spec_from_plain_requirement_is_short_form() {
        let req = Requirement::parse("requests").unwrap();
        assert_eq!(
            PackageSpec::from_requirement(&req),
            PackageSpec::Version("*".to_owned())
        );

        let req = Requirement::parse("attrs>=21; python_version >= '3.7'").unwrap();
        match PackageSpec::from_requirement(&req) {
            PackageSpec::Detailed(d) => {
                assert_eq!(d.version, ">=21");
                assert_eq!(d.markers.as_deref(), Some("python_version >= '3.7'"));
            }
            PackageSpec::Version(_) => panic!("expected detailed spec"),
        }
    }

    #[test]
    fn new_manifest_has_default_source() {
        let manifest = Manifest::new("3.12");
        assert_eq!(manifest.sources, vec![Source::default()]);
        let text = manifest.to_toml_string().unwrap();
        assert!(text.contains("python_version = \"3.12\""));
        assert!(text.contains("[[source]]"));
    }
}
