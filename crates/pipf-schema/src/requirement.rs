use crate::manifest::ManifestError;
use crate::types::PackageKey;
use std::fmt;

/// A single requirement line: `name[extras] specifier ; markers`.
///
/// Only the structure pip needs to round-trip is parsed; the specifier and
/// marker expressions are kept as opaque strings and validated by the
/// resolver and installer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: String,
    pub extras: Vec<String>,
    /// Version specifier such as `>=2.0,<3`. Empty means any version.
    pub specifier: String,
    pub markers: Option<String>,
}

impl Requirement {
    pub fn new(name: impl Into<String>, specifier: impl Into<String>) -> Self {
        let specifier = specifier.into();
        Self {
            name: name.into(),
            extras: Vec::new(),
            specifier: if specifier.trim() == "*" {
                String::new()
            } else {
                specifier
            },
            markers: None,
        }
    }

    pub fn parse(input: &str) -> Result<Self, ManifestError> {
        let invalid = || ManifestError::InvalidRequirement(input.to_owned());

        let (head, markers) = match input.split_once(';') {
            Some((head, markers)) => {
                let markers = markers.trim();
                (head, (!markers.is_empty()).then(|| markers.to_owned()))
            }
            None => (input, None),
        };
        let head = head.trim();

        let name_len = head
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
            .unwrap_or(head.len());
        if name_len == 0 {
            return Err(invalid());
        }
        let name = head[..name_len].to_owned();
        let mut rest = head[name_len..].trim_start();

        let mut extras = Vec::new();
        if let Some(after) = rest.strip_prefix('[') {
            let (inner, tail) = after.split_once(']').ok_or_else(invalid)?;
            extras = inner
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_owned)
                .collect();
            rest = tail.trim_start();
        }

        let specifier = if rest.starts_with('@') {
            // Direct reference (`name @ url`), kept verbatim.
            rest.trim().to_owned()
        } else {
            let spec: String = rest
                .trim_start_matches('(')
                .trim_end_matches(')')
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            if spec == "*" {
                String::new()
            } else {
                spec
            }
        };

        Ok(Self {
            name,
            extras,
            specifier,
            markers,
        })
    }

    pub fn key(&self) -> PackageKey {
        PackageKey::new(&self.name)
    }

    /// The specifier as written in a Pipfile: `*` when unconstrained.
    pub fn version_or_any(&self) -> &str {
        if self.specifier.is_empty() {
            "*"
        } else {
            &self.specifier
        }
    }

    #[must_use]
    pub fn with_markers(mut self, markers: Option<String>) -> Self {
        self.markers = markers;
        self
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.extras.is_empty() {
            write!(f, "[{}]", self.extras.join(","))?;
        }
        if self.specifier.starts_with('@') {
            write!(f, " {}", self.specifier)?;
        } else {
            f.write_str(&self.specifier)?;
        }
        if let Some(markers) = &self.markers {
            write!(f, "; {markers}")?;
        }
        Ok(())
    }
}
