use pipf_schema::{PackageKey, Pins};
use serde::Serialize;

/// Pins that changed between two lock states.
///
/// `updated` holds the new pin of every key that is new or changed;
/// `removed` holds the old pin of every key that disappeared.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PackageDiff {
    pub updated: Pins,
    pub removed: Pins,
}

impl PackageDiff {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.removed.is_empty()
    }

    pub fn removed_keys(&self) -> Vec<PackageKey> {
        self.removed.keys().cloned().collect()
    }
}

/// Compare a snapshot taken before resolution with one taken after.
/// Pins compare by version and hash set.
pub fn diff(before: &Pins, after: &Pins) -> PackageDiff {
    let updated = after
        .iter()
        .filter(|(key, pin)| before.get(*key) != Some(*pin))
        .map(|(key, pin)| (key.clone(), pin.clone()))
        .collect();
    let removed = before
        .iter()
        .filter(|(key, _)| !after.contains_key(*key))
        .map(|(key, pin)| (key.clone(), pin.clone()))
        .collect();
    PackageDiff { updated, removed }
}
