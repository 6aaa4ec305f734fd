//! Normalized package key.
//!
//! Package names are compared case-insensitively, with any run of `-`, `_`
//! and `.` treated as a single `-`. Every map keyed by package uses [`PackageKey`], and
//! deserializing a key normalizes it, so `Django_Extensions` and
//! `django-extensions` land on the same entry.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::ops::Deref;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PackageKey(String);

impl PackageKey {
    /// Normalize a raw package name into a key.
    pub fn new(name: &str) -> Self {
        let mut key = String::with_capacity(name.len());
        let mut in_separator = false;
        for c in name.trim().chars() {
            if matches!(c, '-' | '_' | '.') {
                if !in_separator {
                    key.push('-');
                }
                in_separator = true;
            } else {
                key.extend(c.to_lowercase());
                in_separator = false;
            }
        }
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for PackageKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::new(&raw))
    }
}

impl Deref for PackageKey {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PackageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for PackageKey {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for PackageKey {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<&str> for PackageKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PackageKey {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}
