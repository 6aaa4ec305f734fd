use pipf_core::{CoreError, Engine, InstallOptions};
use pipf_runtime::mock::mock_hash;
use pipf_runtime::{MockEnvironment, MockFailure, MockResolver};
use pipf_schema::{LockFile, PackageKey, Pin, Project, Requirement};
use std::fs;
use std::path::Path;

fn catalog() -> MockResolver {
    MockResolver::new()
        .with_release("django", "2.1", &["pytz", "sqlparse"])
        .with_release("django", "2.2", &["pytz", "sqlparse"])
        .with_release("django", "3.0", &["pytz", "sqlparse", "asgiref"])
        .with_release("pytz", "2019.1", &[])
        .with_release("pytz", "2024.1", &[])
        .with_release("sqlparse", "0.4.4", &[])
        .with_release("asgiref", "3.8.1", &[])
        .with_release("requests", "2.31.0", &["idna"])
        .with_release("idna", "3.7", &[])
        .with_release("pytest", "8.0.0", &[])
}

fn mock_pin(name: &str, version: &str) -> (PackageKey, Pin) {
    (
        PackageKey::new(name),
        Pin::exact(version, vec![mock_hash(name, version)]),
    )
}

fn write_project(dir: &Path, manifest: &str, default: &[(&str, &str)]) {
    fs::write(dir.join("Pipfile"), manifest).unwrap();
    if !default.is_empty() {
        let mut lock = LockFile::default();
        lock.default = default.iter().map(|(n, v)| mock_pin(n, v)).collect();
        lock.write_to_file(dir.join("Pipfile.lock")).unwrap();
    }
}

fn engine_with(resolver: MockResolver, env: &MockEnvironment) -> Engine {
    Engine::with_backend(Box::new(resolver), Box::new(env.clone()))
}

fn keys(pins: &pipf_schema::Pins) -> Vec<&str> {
    pins.keys().map(PackageKey::as_str).collect()
}

const DJANGO_PROJECT: &str = r#"
[requires]
python_version = "3.11"

[packages]
django = ">=2.0"
"#;

const DJANGO_LOCK: &[(&str, &str)] = &[("django", "2.2"), ("pytz", "2019.1"), ("sqlparse", "0.4.4")];

fn installed_django() -> MockEnvironment {
    MockEnvironment::new().with_installed(DJANGO_LOCK)
}

#[test]
fn add_dev_package_keeps_production_pins() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), DJANGO_PROJECT, DJANGO_LOCK);
    let env = installed_django();
    let engine = engine_with(catalog(), &env);

    let mut project = Project::load(dir.path()).unwrap();
    let outcome = engine
        .add(&mut project, &[Requirement::parse("requests").unwrap()], true)
        .unwrap();

    assert_eq!(keys(&outcome.diff.updated), vec!["idna", "requests"]);
    assert!(outcome.diff.removed.is_empty());
    assert!(outcome.manifest_written);
    assert!(outcome.lockfile_written);

    let lock = LockFile::read_from_file(dir.path().join("Pipfile.lock")).unwrap();
    assert_eq!(lock.default[&PackageKey::new("django")].exact_version(), "2.2");
    assert_eq!(lock.default[&PackageKey::new("pytz")].exact_version(), "2019.1");
    assert_eq!(keys(&lock.develop), vec!["idna", "requests"]);

    // Only the new packages went through the installer.
    let installs = env.install_calls();
    assert_eq!(installs.len(), 1);
    assert_eq!(installs[0].len(), 2);
    assert!(installs[0][1].starts_with("requests==2.31.0 --hash="));
    assert!(env.uninstall_calls().is_empty());

    let reloaded = Project::load(dir.path()).unwrap();
    assert!(reloaded
        .manifest
        .dev_packages
        .contains_key(&PackageKey::new("requests")));
}

#[test]
fn add_production_package_is_targeted() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), DJANGO_PROJECT, DJANGO_LOCK);
    let env = installed_django();
    let engine = engine_with(catalog(), &env);

    let mut project = Project::load(dir.path()).unwrap();
    // Re-adding django with a new constraint lets django move, but pytz
    // stays at its pinned version.
    let outcome = engine
        .add(&mut project, &[Requirement::parse("Django>=3").unwrap()], false)
        .unwrap();

    assert_eq!(keys(&outcome.diff.updated), vec!["asgiref", "django"]);
    assert_eq!(
        project.lockfile.default[&PackageKey::new("pytz")].exact_version(),
        "2019.1"
    );
    assert_eq!(env.installed()[&PackageKey::new("django")], "3.0");
}

#[test]
fn remove_package_not_installed_is_clean() {
    let dir = tempfile::tempdir().unwrap();
    write_project(
        dir.path(),
        "[requires]\npython_version = \"3.11\"\n[packages]\npytest = \"*\"\n",
        &[("pytest", "8.0.0")],
    );
    // The environment exists but pytest was never installed into it.
    let env = MockEnvironment::new().with_installed(&[]);
    let engine = engine_with(catalog(), &env);

    let mut project = Project::load(dir.path()).unwrap();
    let outcome = engine
        .remove(&mut project, &[Requirement::parse("pytest").unwrap()], false)
        .unwrap();

    assert_eq!(keys(&outcome.diff.removed), vec!["pytest"]);
    assert!(env.uninstall_calls().is_empty());
    assert!(env.install_calls().is_empty());
    let lock = LockFile::read_from_file(dir.path().join("Pipfile.lock")).unwrap();
    assert!(lock.default.is_empty());
}

#[test]
fn remove_uninstalls_orphaned_dependencies() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), DJANGO_PROJECT, DJANGO_LOCK);
    let env = installed_django();
    let engine = engine_with(catalog(), &env);

    let mut project = Project::load(dir.path()).unwrap();
    engine
        .remove(&mut project, &[Requirement::parse("DJANGO").unwrap()], false)
        .unwrap();

    assert_eq!(env.uninstall_calls().len(), 1);
    assert_eq!(env.uninstall_calls()[0].len(), 3);
    assert!(env.installed().is_empty());
}

#[test]
fn repeated_install_does_not_rewrite_lock() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), DJANGO_PROJECT, &[]);
    let env = MockEnvironment::new();
    let engine = engine_with(catalog(), &env);

    let mut project = Project::load(dir.path()).unwrap();
    let first = engine
        .install(&mut project, InstallOptions::default())
        .unwrap();
    assert!(first.lockfile_written);
    let path = dir.path().join("Pipfile.lock");
    let bytes = fs::read(&path).unwrap();
    let modified = fs::metadata(&path).unwrap().modified().unwrap();

    let mut project = Project::load(dir.path()).unwrap();
    let second = engine
        .install(&mut project, InstallOptions::default())
        .unwrap();
    assert!(!second.lockfile_written);
    assert!(second.diff.is_empty());
    assert_eq!(fs::read(&path).unwrap(), bytes);
    assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), modified);
}

#[test]
fn update_all_upgrades_and_targeted_update_is_narrow() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), DJANGO_PROJECT, DJANGO_LOCK);
    let env = installed_django();
    let engine = engine_with(catalog(), &env);

    let mut project = Project::load(dir.path()).unwrap();
    let outcome = engine
        .update(&mut project, &[PackageKey::new("pytz")])
        .unwrap();
    assert_eq!(keys(&outcome.diff.updated), vec!["pytz"]);
    assert!(!outcome.manifest_written);

    let outcome = engine.update(&mut project, &[]).unwrap();
    assert_eq!(keys(&outcome.diff.updated), vec!["asgiref", "django"]);
    assert_eq!(env.installed()[&PackageKey::new("django")], "3.0");
}

#[test]
fn installer_failure_keeps_lock_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), DJANGO_PROJECT, DJANGO_LOCK);
    let env = installed_django();
    env.fail_next_install(MockFailure::Exit(4));
    let engine = engine_with(catalog(), &env);
    let lock_path = dir.path().join("Pipfile.lock");
    let before = fs::read(&lock_path).unwrap();

    let mut project = Project::load(dir.path()).unwrap();
    let err = engine
        .add(&mut project, &[Requirement::parse("requests").unwrap()], false)
        .unwrap_err();

    assert_eq!(err.subprocess_exit_code(), Some(4));
    assert!(!err.is_config_error());
    assert_eq!(fs::read(&lock_path).unwrap(), before);
}

#[test]
fn interrupted_sync_skips_lock_write() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), DJANGO_PROJECT, DJANGO_LOCK);
    let env = installed_django();
    env.fail_next_install(MockFailure::Interrupt);
    let engine = engine_with(catalog(), &env);
    let lock_path = dir.path().join("Pipfile.lock");
    let before = fs::read(&lock_path).unwrap();

    let mut project = Project::load(dir.path()).unwrap();
    let err = engine
        .add(&mut project, &[Requirement::parse("requests").unwrap()], true)
        .unwrap_err();

    assert!(err.is_interrupt());
    assert_eq!(fs::read(&lock_path).unwrap(), before);
    // The manifest edit itself was already saved.
    let reloaded = Project::load(dir.path()).unwrap();
    assert_eq!(reloaded.manifest.dev_packages.len(), 1);
}

#[test]
fn unresolvable_add_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), DJANGO_PROJECT, DJANGO_LOCK);
    let manifest_before = fs::read(dir.path().join("Pipfile")).unwrap();
    let lock_before = fs::read(dir.path().join("Pipfile.lock")).unwrap();
    let env = installed_django();
    let engine = engine_with(catalog(), &env);

    let mut project = Project::load(dir.path()).unwrap();
    let err = engine
        .add(&mut project, &[Requirement::parse("django>=9").unwrap()], false)
        .unwrap_err();

    assert!(matches!(err, CoreError::Runtime(_)));
    assert_eq!(fs::read(dir.path().join("Pipfile")).unwrap(), manifest_before);
    assert_eq!(fs::read(dir.path().join("Pipfile.lock")).unwrap(), lock_before);
    assert!(env.install_calls().is_empty());
}

#[test]
fn dev_conflict_is_reported_before_any_write() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), DJANGO_PROJECT, DJANGO_LOCK);
    let lock_before = fs::read(dir.path().join("Pipfile.lock")).unwrap();
    let env = installed_django();
    let engine = engine_with(catalog(), &env);

    let mut project = Project::load(dir.path()).unwrap();
    let err = engine
        .add(&mut project, &[Requirement::parse("django<2.2").unwrap()], true)
        .unwrap_err();

    assert!(matches!(err, CoreError::Conflict(_)));
    assert_eq!(fs::read(dir.path().join("Pipfile.lock")).unwrap(), lock_before);
}
