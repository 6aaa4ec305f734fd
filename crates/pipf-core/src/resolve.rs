use crate::CoreError;
use pipf_runtime::{ResolveRequest, Resolver, RuntimeError};
use pipf_schema::{manifest_digest, PackageKey, Pins, Project, Requirement};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// How much of the existing lock a re-lock may move.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Ignore every existing pin.
    pub upgrade: bool,
    /// Packages whose existing pins are dropped from the seed.
    pub update: BTreeSet<PackageKey>,
}

impl UpdateOptions {
    pub fn upgrade() -> Self {
        Self {
            upgrade: true,
            update: BTreeSet::new(),
        }
    }

    pub fn targeting<'a>(keys: impl IntoIterator<Item = &'a PackageKey>) -> Self {
        Self {
            upgrade: false,
            update: keys.into_iter().cloned().collect(),
        }
    }
}

/// Prior pins handed to the resolver for one group.
pub fn seed_pins(group: &Pins, options: &UpdateOptions) -> Pins {
    if options.upgrade {
        return Pins::new();
    }
    group
        .iter()
        .filter(|(key, _)| !options.update.contains(*key))
        .map(|(key, pin)| (key.clone(), pin.clone()))
        .collect()
}

/// Resolve `constraints` to hashed pins, preferring `prev_pins`.
pub fn resolve(
    resolver: &dyn Resolver,
    constraints: &[Requirement],
    prev_pins: &Pins,
    index_urls: &[String],
) -> Result<Pins, CoreError> {
    if constraints.is_empty() {
        return Ok(Pins::new());
    }
    let resolved = resolver.resolve(&ResolveRequest {
        constraints,
        seed: prev_pins,
        index_urls,
    })?;
    let mut hashes = resolver.resolve_hashes(&resolved)?;

    let mut pins = Pins::new();
    for package in resolved {
        // An unhashed pin could never pass `--require-hashes`.
        let package_hashes = hashes
            .remove(&package)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                RuntimeError::ResolverOutput(format!(
                    "no hashes for {}=={}",
                    package.name, package.version
                ))
            })?;
        let (key, pin) = package.into_pin(package_hashes);
        pins.insert(key, pin);
    }
    debug!(
        "{} constraints resolved to {} pins ({} seeded)",
        constraints.len(),
        pins.len(),
        prev_pins.len()
    );
    Ok(pins)
}

/// Re-lock both groups of `project` in memory.
///
/// Production is resolved first. Its pins then seed the development pass,
/// overriding older development pins, so shared dependencies stay at the
/// production version. If the development pass still ends up with a
/// different version of a production package, nothing is changed and
/// `CoreError::Conflict` is returned.
pub fn update_lockfile(
    project: &mut Project,
    resolver: &dyn Resolver,
    options: &UpdateOptions,
) -> Result<(), CoreError> {
    let index_urls = project.manifest.index_urls();

    info!("resolving packages");
    let prod_seed = seed_pins(&project.lockfile.default, options);
    let default = resolve(
        resolver,
        &project.manifest.requirements(false),
        &prod_seed,
        &index_urls,
    )?;

    info!("resolving dev-packages");
    let mut dev_seed = seed_pins(&project.lockfile.develop, options);
    dev_seed.extend(default.iter().map(|(k, p)| (k.clone(), p.clone())));
    let develop = resolve(
        resolver,
        &project.manifest.requirements(true),
        &dev_seed,
        &index_urls,
    )?;

    check_group_consistency(&default, &develop)?;

    let digest = manifest_digest(&project.manifest)?;
    project.lockfile.default = default;
    project.lockfile.develop = develop;
    project.lockfile.set_manifest_digest(digest);
    Ok(())
}

fn check_group_consistency(default: &Pins, develop: &Pins) -> Result<(), CoreError> {
    let conflicts: Vec<String> = develop
        .iter()
        .filter_map(|(key, dev_pin)| {
            let prod_pin = default.get(key)?;
            (prod_pin.exact_version() != dev_pin.exact_version()).then(|| {
                format!(
                    "{key} (packages {}, dev-packages {})",
                    prod_pin.version, dev_pin.version
                )
            })
        })
        .collect();
    if conflicts.is_empty() {
        Ok(())
    } else {
        Err(CoreError::Conflict(conflicts))
    }
}
