use crate::diff::PackageDiff;
use crate::CoreError;
use pipf_runtime::Environment;
use pipf_schema::{PackageKey, Pins};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const REQUIREMENTS_NAME: &str = "requirements.txt";

/// Bring the environment in line with a diff: uninstall removed packages
/// that are actually installed, then install updated pins.
pub fn apply(
    environment: &dyn Environment,
    diff: &PackageDiff,
    index_urls: &[String],
) -> Result<(), CoreError> {
    if !diff.removed.is_empty() {
        let installed = environment.installed_keys()?;
        let present: Vec<PackageKey> = diff
            .removed
            .keys()
            .filter(|key| installed.contains(*key))
            .cloned()
            .collect();
        if present.is_empty() {
            debug!("nothing to uninstall, removed packages are not installed");
        } else {
            info!("uninstalling {}", join_keys(&present));
            environment.uninstall(&present)?;
        }
    }

    if !diff.updated.is_empty() {
        install_all(environment, &diff.updated, index_urls)?;
    }
    Ok(())
}

/// Install `pins` in one hash-checked pass.
pub fn install_all(
    environment: &dyn Environment,
    pins: &Pins,
    index_urls: &[String],
) -> Result<(), CoreError> {
    if pins.is_empty() {
        return Ok(());
    }
    let dir = tempfile::tempdir()?;
    let requirements = write_requirements(dir.path(), pins, index_urls)?;
    info!(
        "installing {}",
        join_keys(&pins.keys().cloned().collect::<Vec<_>>())
    );
    environment.install(&requirements)?;
    Ok(())
}

/// Write a `--require-hashes` requirements file into `dir`.
pub fn write_requirements(
    dir: &Path,
    pins: &Pins,
    index_urls: &[String],
) -> Result<PathBuf, std::io::Error> {
    let mut content = String::new();
    let mut urls = index_urls.iter();
    if let Some(primary) = urls.next() {
        let _ = writeln!(content, "--index-url {primary}");
    }
    for extra in urls {
        let _ = writeln!(content, "--extra-index-url {extra}");
    }
    for (key, pin) in pins {
        let _ = writeln!(content, "{}", pin.requirement_line(key));
    }
    let path = dir.join(REQUIREMENTS_NAME);
    std::fs::write(&path, content)?;
    Ok(path)
}

fn join_keys(keys: &[PackageKey]) -> String {
    keys.iter()
        .map(PackageKey::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipf_runtime::{MockEnvironment, MockFailure, RuntimeError};
    use pipf_schema::Pin;

    fn pin(version: &str, hash: &str) -> Pin {
        Pin::exact(version, vec![hash.to_owned()])
    }

    #[test]
    fn requirements_file_has_index_and_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let mut pins = Pins::new();
        pins.insert(PackageKey::new("six"), pin("1.16.0", "sha256:aa"));
        let urls = vec![
            "https://pypi.org/simple".to_owned(),
            "https://mirror.example.invalid/simple".to_owned(),
        ];
        let path = write_requirements(dir.path(), &pins, &urls).unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(
            content,
            "--index-url https://pypi.org/simple\n\
             --extra-index-url https://mirror.example.invalid/simple\n\
             six==1.16.0 --hash=sha256:aa\n"
        );
    }

    #[test]
    fn empty_diff_touches_nothing() {
        let env = MockEnvironment::new().with_installed(&[("six", "1.16.0")]);
        apply(&env, &PackageDiff::default(), &[]).unwrap();
        assert!(env.install_calls().is_empty());
        assert!(env.uninstall_calls().is_empty());
    }

    #[test]
    fn removes_then_installs() {
        let env = MockEnvironment::new().with_installed(&[("six", "1.16.0"), ("pytz", "2019.1")]);
        let mut diff = PackageDiff::default();
        diff.removed
            .insert(PackageKey::new("six"), pin("1.16.0", "sha256:aa"));
        diff.updated
            .insert(PackageKey::new("pytz"), pin("2024.1", "sha256:bb"));

        apply(&env, &diff, &[]).unwrap();
        assert_eq!(env.uninstall_calls(), vec![vec![PackageKey::new("six")]]);
        assert_eq!(
            env.install_calls(),
            vec![vec!["pytz==2024.1 --hash=sha256:bb".to_owned()]]
        );
        assert_eq!(env.installed()[&PackageKey::new("pytz")], "2024.1");
    }

    #[test]
    fn removing_uninstalled_package_is_noop() {
        let env = MockEnvironment::new().with_installed(&[("pytz", "2024.1")]);
        let mut diff = PackageDiff::default();
        diff.removed
            .insert(PackageKey::new("six"), pin("1.16.0", "sha256:aa"));

        apply(&env, &diff, &[]).unwrap();
        assert!(env.uninstall_calls().is_empty());
        assert_eq!(env.installed().len(), 1);
    }

    #[test]
    fn removal_matches_dotted_freeze_names() {
        let installed =
            pipf_runtime::freeze::parse_freeze("zope.interface==6.0\npytz==2024.1\n");
        assert!(installed.contains(&PackageKey::new("zope-interface")));

        let env = MockEnvironment::new().with_installed(&[("zope.interface", "6.0")]);
        let mut diff = PackageDiff::default();
        diff.removed
            .insert(PackageKey::new("zope-interface"), pin("6.0", "sha256:cc"));

        apply(&env, &diff, &[]).unwrap();
        assert_eq!(
            env.uninstall_calls(),
            vec![vec![PackageKey::new("zope-interface")]]
        );
        assert!(env.installed().is_empty());
    }

    #[test]
    fn installer_failure_propagates_exit_code() {
        let env = MockEnvironment::new().with_installed(&[]);
        env.fail_next_install(MockFailure::Exit(3));
        let mut pins = Pins::new();
        pins.insert(PackageKey::new("six"), pin("1.16.0", "sha256:aa"));

        let err = install_all(&env, &pins, &[]).unwrap_err();
        assert_eq!(err.subprocess_exit_code(), Some(3));
        assert!(matches!(
            err,
            CoreError::Runtime(RuntimeError::CommandFailed { .. })
        ));
    }
}
