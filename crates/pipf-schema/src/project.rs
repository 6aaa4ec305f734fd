use crate::atomic::write_atomic;
use crate::lock::{LockError, LockFile, Pins};
use crate::manifest::{parse_manifest_str, Manifest, ManifestError, PackageSpec};
use crate::requirement::Requirement;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const MANIFEST_NAME: &str = "Pipfile";
pub const LOCKFILE_NAME: &str = "Pipfile.lock";

/// A Pipfile and its lock file, loaded from disk.
///
/// Malformed files are treated as absent: a Pipfile or Pipfile.lock that
/// fails to parse is replaced by the empty default and a warning is logged.
/// The lock file is only written back when its content changed.
#[derive(Debug, Clone)]
pub struct Project {
    manifest_path: PathBuf,
    lockfile_path: PathBuf,
    pub manifest: Manifest,
    pub lockfile: LockFile,
    lockfile_on_disk: Option<LockFile>,
}

impl Project {
    /// Find the nearest Pipfile at or above `start_dir` and load it.
    pub fn load(start_dir: &Path) -> Result<Self, LockError> {
        let manifest_path = find_manifest(start_dir)?;
        Self::open(manifest_path)
    }

    /// Load the Pipfile at `manifest_path` and the lock file next to it.
    pub fn open(manifest_path: PathBuf) -> Result<Self, LockError> {
        let lockfile_path = lockfile_path_for(&manifest_path);

        let manifest = if manifest_path.is_file() {
            let content = fs::read_to_string(&manifest_path).map_err(ManifestError::Io)?;
            parse_manifest_str(&content).unwrap_or_else(|e| {
                warn!("ignoring malformed {}: {e}", manifest_path.display());
                Manifest::default()
            })
        } else {
            Manifest::default()
        };

        let lockfile_on_disk = if lockfile_path.is_file() {
            let content = fs::read_to_string(&lockfile_path)?;
            match serde_json::from_str::<LockFile>(&content) {
                Ok(lock) => Some(lock),
                Err(e) => {
                    warn!("ignoring malformed {}: {e}", lockfile_path.display());
                    None
                }
            }
        } else {
            None
        };
        debug!(
            "loaded {} ({} packages, {} dev-packages, lock file {})",
            manifest_path.display(),
            manifest.packages.len(),
            manifest.dev_packages.len(),
            if lockfile_on_disk.is_some() {
                "present"
            } else {
                "absent"
            }
        );

        Ok(Self {
            manifest_path,
            lockfile_path,
            manifest,
            lockfile: lockfile_on_disk.clone().unwrap_or_default(),
            lockfile_on_disk,
        })
    }

    /// A new, unsaved project in `dir`. Fails if a Pipfile already exists.
    pub fn create(dir: &Path, python_version: &str) -> Result<Self, ManifestError> {
        let manifest_path = dir.join(MANIFEST_NAME);
        if manifest_path.exists() {
            return Err(ManifestError::AlreadyExists(manifest_path));
        }
        Ok(Self {
            lockfile_path: lockfile_path_for(&manifest_path),
            manifest_path,
            manifest: Manifest::new(python_version),
            lockfile: LockFile::default(),
            lockfile_on_disk: None,
        })
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    pub fn lockfile_path(&self) -> &Path {
        &self.lockfile_path
    }

    pub fn project_dir(&self) -> &Path {
        self.manifest_path.parent().unwrap_or(Path::new("."))
    }

    pub fn has_lockfile(&self) -> bool {
        self.lockfile_on_disk.is_some()
    }

    pub fn locked_packages(&self, prod_only: bool) -> Pins {
        self.lockfile.locked_packages(prod_only)
    }

    /// Add or replace entries in one manifest group. The lock file is
    /// untouched.
    pub fn add(&mut self, requirements: &[Requirement], dev: bool) {
        let group = self.manifest.group_mut(dev);
        for req in requirements {
            group.insert(req.key(), PackageSpec::from_requirement(req));
        }
    }

    /// Drop entries from one manifest group; absent keys are ignored.
    pub fn remove(&mut self, requirements: &[Requirement], dev: bool) {
        let group = self.manifest.group_mut(dev);
        for req in requirements {
            group.remove(&req.key());
        }
    }

    pub fn persist(&self) -> Result<(), ManifestError> {
        let content = self.manifest.to_toml_string()?;
        write_atomic(&self.manifest_path, content.as_bytes())?;
        Ok(())
    }

    /// Write the lock file if it differs from what is on disk.
    /// Returns whether a write happened.
    pub fn persist_lockfile(&mut self) -> Result<bool, LockError> {
        if self.lockfile_on_disk.as_ref() == Some(&self.lockfile) {
            debug!("lock file unchanged, not writing");
            return Ok(false);
        }
        self.lockfile.write_to_file(&self.lockfile_path)?;
        self.lockfile_on_disk = Some(self.lockfile.clone());
        Ok(true)
    }
}

/// Search `start_dir` and each ancestor for a Pipfile.
pub fn find_manifest(start_dir: &Path) -> Result<PathBuf, ManifestError> {
    start_dir
        .ancestors()
        .map(|dir| dir.join(MANIFEST_NAME))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| ManifestError::NotFound(start_dir.to_path_buf()))
}

fn lockfile_path_for(manifest_path: &Path) -> PathBuf {
    manifest_path
        .parent()
        .unwrap_or(Path::new("."))
        .join(LOCKFILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::Pin;
    use crate::types::PackageKey;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn finds_manifest_in_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), MANIFEST_NAME, "[packages]\nsix = \"*\"\n");
        let nested = dir.path().join("src/app");
        fs::create_dir_all(&nested).unwrap();

        let project = Project::load(&nested).unwrap();
        assert_eq!(project.manifest_path(), dir.path().join(MANIFEST_NAME));
        assert_eq!(project.lockfile_path(), dir.path().join(LOCKFILE_NAME));
        assert_eq!(project.manifest.packages.len(), 1);
    }

    #[test]
    fn nearest_manifest_wins() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), MANIFEST_NAME, "[packages]\nouter = \"*\"\n");
        let inner = dir.path().join("inner");
        fs::create_dir_all(&inner).unwrap();
        write(&inner, MANIFEST_NAME, "[packages]\ninner = \"*\"\n");

        let project = Project::load(&inner).unwrap();
        assert!(project
            .manifest
            .packages
            .contains_key(&PackageKey::new("inner")));
    }

    #[test]
    fn missing_manifest_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_manifest(dir.path()).unwrap_err();
        assert!(matches!(err, ManifestError::NotFound(_)));
    }

    #[test]
    fn malformed_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), MANIFEST_NAME, "[packages\nnot toml");
        write(dir.path(), LOCKFILE_NAME, "{ not json");

        let project = Project::load(dir.path()).unwrap();
        assert!(project.manifest.packages.is_empty());
        assert!(project.lockfile.default.is_empty());
        assert!(!project.has_lockfile());
    }

    #[test]
    fn add_and_remove_touch_only_the_manifest() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), MANIFEST_NAME, "");
        let mut project = Project::load(dir.path()).unwrap();

        let reqs = vec![
            Requirement::parse("Requests>=2").unwrap(),
            Requirement::parse("pytest").unwrap(),
        ];
        project.add(&reqs, true);
        assert_eq!(project.manifest.dev_packages.len(), 2);
        assert_eq!(
            project.manifest.dev_packages[&PackageKey::new("requests")].version(),
            ">=2"
        );
        assert!(project.manifest.packages.is_empty());
        assert!(project.lockfile.develop.is_empty());

        project.remove(&[Requirement::parse("REQUESTS").unwrap()], true);
        assert_eq!(project.manifest.dev_packages.len(), 1);

        // Removing from the other group or removing twice is a no-op.
        project.remove(&[Requirement::parse("pytest").unwrap()], false);
        assert_eq!(project.manifest.dev_packages.len(), 1);
    }

    #[test]
    fn persist_lockfile_skips_unchanged_content() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), MANIFEST_NAME, "");
        let mut project = Project::load(dir.path()).unwrap();

        // No lock file on disk yet, so the first persist writes one.
        assert!(project.persist_lockfile().unwrap());
        assert!(!project.persist_lockfile().unwrap());

        project
            .lockfile
            .default
            .insert(PackageKey::new("six"), Pin::exact("1.16.0", Vec::new()));
        assert!(project.persist_lockfile().unwrap());

        let bytes = fs::read(project.lockfile_path()).unwrap();
        let mut reloaded = Project::load(dir.path()).unwrap();
        assert!(!reloaded.persist_lockfile().unwrap());
        assert_eq!(fs::read(reloaded.lockfile_path()).unwrap(), bytes);
    }

    #[cfg(unix)]
    #[test]
    fn persisting_keeps_manifest_mode() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), MANIFEST_NAME, "[packages]\n");
        let manifest_path = dir.path().join(MANIFEST_NAME);
        fs::set_permissions(&manifest_path, fs::Permissions::from_mode(0o644)).unwrap();

        let mut project = Project::load(dir.path()).unwrap();
        project.add(&[Requirement::parse("six").unwrap()], false);
        project.persist().unwrap();
        project.persist_lockfile().unwrap();

        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&manifest_path), 0o644);
        assert_eq!(mode(project.lockfile_path()) & 0o044, 0o044);
    }

    #[test]
    fn create_refuses_existing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::create(dir.path(), "3.11").unwrap();
        project.persist().unwrap();
        assert!(matches!(
            Project::create(dir.path(), "3.11"),
            Err(ManifestError::AlreadyExists(_))
        ));

        let loaded = Project::load(dir.path()).unwrap();
        assert_eq!(loaded.manifest.python_version(), Some("3.11"));
    }
}
