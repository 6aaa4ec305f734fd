use crate::config::Settings;
use crate::diff::{diff, PackageDiff};
use crate::resolve::{update_lockfile, UpdateOptions};
use crate::sync::{apply, install_all};
use crate::CoreError;
use pipf_runtime::{select_backend, Environment, Resolver, RuntimeError};
use pipf_schema::{manifest_digest, PackageKey, Project, Requirement};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

/// Runs each command's pipeline against one resolver and one environment.
///
/// Every mutating operation follows the same order: snapshot the merged
/// lock, re-resolve in memory, snapshot again, sync the environment with
/// the difference, and only then write the lock file. A failure at any
/// step leaves the lock file on disk as it was.
pub struct Engine {
    resolver: Box<dyn Resolver>,
    environment: Box<dyn Environment>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Install only the `default` group.
    pub prod_only: bool,
    /// Re-resolve from scratch instead of keeping existing pins.
    pub upgrade: bool,
    /// Install exactly what is locked; fail if the lock is missing or stale.
    pub locked: bool,
}

/// What a pipeline run changed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Outcome {
    pub diff: PackageDiff,
    pub environment_created: bool,
    pub manifest_written: bool,
    pub lockfile_written: bool,
}

impl Engine {
    pub fn new(settings: &Settings, project_dir: &Path) -> Result<Self, CoreError> {
        let backend = select_backend(&settings.backend, &settings.env_spec(project_dir))
            .map_err(|e| match e {
                RuntimeError::BackendUnavailable(name) => CoreError::Config(format!(
                    "unknown backend '{name}' (expected venv or mock)"
                )),
                other => other.into(),
            })?;
        Ok(Self::with_backend(backend.resolver, backend.environment))
    }

    pub fn with_backend(resolver: Box<dyn Resolver>, environment: Box<dyn Environment>) -> Self {
        Self {
            resolver,
            environment,
        }
    }

    pub fn backend_name(&self) -> &str {
        self.environment.name()
    }

    /// Create the virtualenv if it does not exist yet. Returns whether it
    /// was created.
    pub fn ensure_environment(&self, project: &Project) -> Result<bool, CoreError> {
        if self.environment.exists() {
            return Ok(false);
        }
        let python_version = project
            .manifest
            .python_version()
            .ok_or(CoreError::MissingPythonVersion)?;
        info!("creating environment for Python {python_version}");
        self.environment.create(python_version)?;
        Ok(true)
    }

    pub fn install(
        &self,
        project: &mut Project,
        options: InstallOptions,
    ) -> Result<Outcome, CoreError> {
        let before = project.locked_packages(false);
        if options.locked {
            check_lock_current(project)?;
        } else {
            let update = if options.upgrade {
                UpdateOptions::upgrade()
            } else {
                UpdateOptions::default()
            };
            update_lockfile(project, self.resolver.as_ref(), &update)?;
        }
        let changes = diff(&before, &project.locked_packages(false));

        let environment_created = self.ensure_environment(project)?;
        install_all(
            self.environment.as_ref(),
            &project.locked_packages(options.prod_only),
            &project.manifest.index_urls(),
        )?;
        let lockfile_written = project.persist_lockfile()?;

        Ok(Outcome {
            diff: changes,
            environment_created,
            manifest_written: false,
            lockfile_written,
        })
    }

    /// Add requirements to one manifest group. Only the added packages
    /// (and whatever they pull in) may move; every other pin is kept.
    pub fn add(
        &self,
        project: &mut Project,
        requirements: &[Requirement],
        dev: bool,
    ) -> Result<Outcome, CoreError> {
        project.add(requirements, dev);
        let targets: Vec<PackageKey> = requirements.iter().map(Requirement::key).collect();
        self.edit(project, &UpdateOptions::targeting(&targets))
    }

    pub fn remove(
        &self,
        project: &mut Project,
        requirements: &[Requirement],
        dev: bool,
    ) -> Result<Outcome, CoreError> {
        project.remove(requirements, dev);
        self.edit(project, &UpdateOptions::default())
    }

    /// Re-resolve `keys` only, or everything when `keys` is empty.
    pub fn update(&self, project: &mut Project, keys: &[PackageKey]) -> Result<Outcome, CoreError> {
        let options = if keys.is_empty() {
            UpdateOptions::upgrade()
        } else {
            UpdateOptions::targeting(keys)
        };
        self.sync_pipeline(project, &options, false)
    }

    /// Re-resolve and write the lock file without touching the environment.
    pub fn lock(&self, project: &mut Project) -> Result<Outcome, CoreError> {
        let before = project.locked_packages(false);
        update_lockfile(project, self.resolver.as_ref(), &UpdateOptions::default())?;
        let changes = diff(&before, &project.locked_packages(false));
        let lockfile_written = project.persist_lockfile()?;
        Ok(Outcome {
            diff: changes,
            lockfile_written,
            ..Outcome::default()
        })
    }

    pub fn list(&self, project: &Project) -> Result<(), CoreError> {
        self.ensure_environment(project)?;
        self.environment.list()?;
        Ok(())
    }

    pub fn run(&self, project: &Project, command: &str, args: &[String]) -> Result<i32, CoreError> {
        self.ensure_environment(project)?;
        Ok(self.environment.run(command, args)?)
    }

    pub fn shell(&self, project: &Project) -> Result<i32, CoreError> {
        self.ensure_environment(project)?;
        Ok(self.environment.shell()?)
    }

    fn edit(&self, project: &mut Project, options: &UpdateOptions) -> Result<Outcome, CoreError> {
        self.sync_pipeline(project, options, true)
    }

    fn sync_pipeline(
        &self,
        project: &mut Project,
        options: &UpdateOptions,
        persist_manifest: bool,
    ) -> Result<Outcome, CoreError> {
        let before = project.locked_packages(false);
        update_lockfile(project, self.resolver.as_ref(), options)?;
        if persist_manifest {
            project.persist()?;
        }
        let after = project.locked_packages(false);
        let changes = diff(&before, &after);
        debug!(
            "{} packages to install, {} to remove",
            changes.updated.len(),
            changes.removed.len()
        );

        let environment_created = self.ensure_environment(project)?;
        apply(
            self.environment.as_ref(),
            &changes,
            &project.manifest.index_urls(),
        )?;
        let lockfile_written = project.persist_lockfile()?;

        Ok(Outcome {
            diff: changes,
            environment_created,
            manifest_written: persist_manifest,
            lockfile_written,
        })
    }
}

fn check_lock_current(project: &Project) -> Result<(), CoreError> {
    if !project.has_lockfile() {
        return Err(CoreError::MissingLockfile(project.lockfile_path().to_path_buf()));
    }
    let current = manifest_digest(&project.manifest)?;
    if project.lockfile.manifest_digest() != Some(current.as_str()) {
        return Err(CoreError::StaleLockfile);
    }
    Ok(())
}
