use crate::backend::{Environment, ResolveRequest, Resolver};
use crate::RuntimeError;
use pipf_schema::{PackageKey, Requirement, ResolvedPackage};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Version reported for packages missing from the mock catalog.
pub const UNKNOWN_VERSION: &str = "0.0.0-mock";

/// One release in the mock package index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockRelease {
    pub version: String,
    /// Requirement strings of this release's dependencies.
    pub requires: Vec<String>,
}

/// What a resolve call was asked to do, as `name==version` / requirement
/// strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordedResolve {
    pub constraints: Vec<String>,
    pub seed: Vec<String>,
}

/// Deterministic in-memory resolver.
///
/// Resolves against a small catalog: a seed pin is kept when it satisfies
/// every constraint on its package, otherwise the newest matching release
/// wins. There is no backtracking. Hashes are derived from the pin with
/// blake3, so they are stable across runs.
#[derive(Debug, Clone, Default)]
pub struct MockResolver {
    catalog: BTreeMap<PackageKey, Vec<MockRelease>>,
    calls: Arc<Mutex<Vec<RecordedResolve>>>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_release(mut self, name: &str, version: &str, requires: &[&str]) -> Self {
        self.catalog
            .entry(PackageKey::new(name))
            .or_default()
            .push(MockRelease {
                version: version.to_owned(),
                requires: requires.iter().map(ToString::to_string).collect(),
            });
        self
    }

    pub fn calls(&self) -> Vec<RecordedResolve> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn pick(
        &self,
        key: &PackageKey,
        specifiers: &[String],
        seed: Option<&str>,
    ) -> Result<(String, Vec<String>), RuntimeError> {
        let matches_all = |v: &str| specifiers.iter().all(|s| satisfies(v, s));

        let Some(releases) = self.catalog.get(key) else {
            let version = seed
                .filter(|v| matches_all(v))
                .map(str::to_owned)
                .or_else(|| {
                    specifiers
                        .iter()
                        .find_map(|s| s.strip_prefix("=="))
                        .map(str::to_owned)
                })
                .unwrap_or_else(|| UNKNOWN_VERSION.to_owned());
            return Ok((version, Vec::new()));
        };

        if let Some(seeded) = seed.filter(|v| matches_all(v)) {
            if let Some(release) = releases.iter().find(|r| r.version == seeded) {
                return Ok((release.version.clone(), release.requires.clone()));
            }
        }

        releases
            .iter()
            .filter(|r| matches_all(&r.version))
            .max_by(|a, b| compare_versions(&a.version, &b.version))
            .map(|r| (r.version.clone(), r.requires.clone()))
            .ok_or_else(|| {
                RuntimeError::Unresolvable(format!(
                    "no release of {key} matches {}",
                    specifiers.join(",")
                ))
            })
    }
}

impl Resolver for MockResolver {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn resolve(&self, request: &ResolveRequest<'_>) -> Result<Vec<ResolvedPackage>, RuntimeError> {
        self.calls
            .lock()
            .map_err(|e| RuntimeError::Poisoned(e.to_string()))?
            .push(RecordedResolve {
                constraints: request.constraints.iter().map(ToString::to_string).collect(),
                seed: request
                    .seed
                    .iter()
                    .map(|(k, p)| p.requirement(k).to_string())
                    .collect(),
            });

        let mut specifiers: BTreeMap<PackageKey, Vec<String>> = BTreeMap::new();
        let mut chosen: BTreeMap<PackageKey, String> = BTreeMap::new();
        let mut queue: VecDeque<Requirement> = request.constraints.iter().cloned().collect();

        while let Some(req) = queue.pop_front() {
            let key = req.key();
            let specs = specifiers.entry(key.clone()).or_default();
            if !req.specifier.is_empty() {
                specs.push(req.specifier.clone());
            }

            if let Some(version) = chosen.get(&key) {
                if !satisfies(version, &req.specifier) {
                    return Err(RuntimeError::Unresolvable(format!(
                        "{key}=={version} conflicts with {req}"
                    )));
                }
                continue;
            }

            let seed = request.seed.get(&key).map(pipf_schema::Pin::exact_version);
            let (version, requires) = self.pick(&key, specs, seed)?;
            for dep in &requires {
                let dep = Requirement::parse(dep)
                    .map_err(|e| RuntimeError::ResolverOutput(e.to_string()))?;
                queue.push_back(dep);
            }
            chosen.insert(key, version);
        }

        Ok(chosen
            .into_iter()
            .map(|(key, version)| ResolvedPackage {
                name: key.into_inner(),
                version,
            })
            .collect())
    }

    fn resolve_hashes(
        &self,
        packages: &[ResolvedPackage],
    ) -> Result<BTreeMap<ResolvedPackage, Vec<String>>, RuntimeError> {
        Ok(packages
            .iter()
            .map(|p| (p.clone(), vec![mock_hash(&p.name, &p.version)]))
            .collect())
    }
}

pub fn mock_hash(name: &str, version: &str) -> String {
    let digest = blake3::hash(format!("{}=={version}", PackageKey::new(name)).as_bytes());
    format!("sha256:{}", digest.to_hex())
}

/// A scripted failure for the next `install` on a `MockEnvironment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Exit(i32),
    Interrupt,
}

#[derive(Debug, Default)]
struct MockEnvState {
    python_version: Option<String>,
    installed: BTreeMap<PackageKey, String>,
    installs: Vec<Vec<String>>,
    uninstalls: Vec<Vec<PackageKey>>,
    runs: Vec<Vec<String>>,
    fail_install: Option<MockFailure>,
}

/// In-memory environment recording every call. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockEnvironment {
    state: Arc<Mutex<MockEnvState>>,
}

impl MockEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MockEnvState>, RuntimeError> {
        self.state
            .lock()
            .map_err(|e| RuntimeError::Poisoned(e.to_string()))
    }

    fn snapshot(&self) -> MutexGuard<'_, MockEnvState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// An environment that already exists with `packages` installed.
    #[must_use]
    pub fn with_installed(self, packages: &[(&str, &str)]) -> Self {
        {
            let mut state = self.snapshot();
            state.python_version.get_or_insert_with(|| "3".to_owned());
            for (name, version) in packages {
                state
                    .installed
                    .insert(PackageKey::new(name), (*version).to_owned());
            }
        }
        self
    }

    pub fn fail_next_install(&self, failure: MockFailure) {
        self.snapshot().fail_install = Some(failure);
    }

    pub fn python_version(&self) -> Option<String> {
        self.snapshot().python_version.clone()
    }

    pub fn installed(&self) -> BTreeMap<PackageKey, String> {
        self.snapshot().installed.clone()
    }

    /// Requirement lines of each `install` call, hashes included.
    pub fn install_calls(&self) -> Vec<Vec<String>> {
        self.snapshot().installs.clone()
    }

    pub fn uninstall_calls(&self) -> Vec<Vec<PackageKey>> {
        self.snapshot().uninstalls.clone()
    }

    pub fn run_calls(&self) -> Vec<Vec<String>> {
        self.snapshot().runs.clone()
    }
}

impl Environment for MockEnvironment {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn exists(&self) -> bool {
        self.snapshot().python_version.is_some()
    }

    fn create(&self, python_version: &str) -> Result<(), RuntimeError> {
        self.state()?.python_version = Some(python_version.to_owned());
        Ok(())
    }

    fn installed_keys(&self) -> Result<BTreeSet<PackageKey>, RuntimeError> {
        Ok(self.state()?.installed.keys().cloned().collect())
    }

    fn install(&self, requirements_file: &Path) -> Result<(), RuntimeError> {
        let content = std::fs::read_to_string(requirements_file)?;
        let mut state = self.state()?;

        let lines: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('-') && !l.starts_with('#'))
            .map(str::to_owned)
            .collect();
        state.installs.push(lines.clone());

        match state.fail_install.take() {
            Some(MockFailure::Exit(code)) => {
                return Err(RuntimeError::CommandFailed {
                    command: "pip install".to_owned(),
                    code: Some(code),
                })
            }
            Some(MockFailure::Interrupt) => return Err(RuntimeError::Interrupted),
            None => {}
        }

        for line in &lines {
            let head = line.split(" --hash=").next().unwrap_or(line);
            let req = Requirement::parse(head)
                .map_err(|e| RuntimeError::ResolverOutput(e.to_string()))?;
            let version = req.specifier.trim_start_matches('=').to_owned();
            state.installed.insert(req.key(), version);
        }
        Ok(())
    }

    fn uninstall(&self, packages: &[PackageKey]) -> Result<(), RuntimeError> {
        if packages.is_empty() {
            return Ok(());
        }
        let mut state = self.state()?;
        for key in packages {
            state.installed.remove(key);
        }
        state.uninstalls.push(packages.to_vec());
        Ok(())
    }

    fn list(&self) -> Result<(), RuntimeError> {
        for (key, version) in &self.state()?.installed {
            println!("{key}=={version}");
        }
        Ok(())
    }

    fn run(&self, command: &str, args: &[String]) -> Result<i32, RuntimeError> {
        let mut call = vec![command.to_owned()];
        call.extend(args.iter().cloned());
        self.state()?.runs.push(call);
        Ok(0)
    }

    fn shell(&self) -> Result<i32, RuntimeError> {
        self.state()?.runs.push(vec!["$SHELL".to_owned()]);
        Ok(0)
    }
}

/// Compare dotted versions numerically segment by segment; non-numeric
/// segments compare as text. Missing segments count as zero.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (l, r) => {
                let l = l.unwrap_or("0");
                let r = r.unwrap_or("0");
                let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    _ => l.cmp(r),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Whether `version` satisfies a comma-separated specifier such as
/// `>=1.4,<2` or `==2.*`. An empty specifier or a direct reference matches
/// anything.
pub fn satisfies(version: &str, specifier: &str) -> bool {
    let specifier = specifier.trim();
    if specifier.is_empty() || specifier == "*" || specifier.starts_with('@') {
        return true;
    }
    specifier
        .split(',')
        .map(str::trim)
        .filter(|clause| !clause.is_empty())
        .all(|clause| clause_matches(version, clause))
}

fn clause_matches(version: &str, clause: &str) -> bool {
    const OPERATORS: [&str; 8] = ["===", "~=", "==", "!=", "<=", ">=", "<", ">"];
    let Some(op) = OPERATORS.iter().find(|op| clause.starts_with(**op)) else {
        return false;
    };
    let target = clause[op.len()..].trim();

    if let Some(prefix) = target.strip_suffix(".*") {
        let matched = version == prefix || version.starts_with(&format!("{prefix}."));
        return match *op {
            "==" => matched,
            "!=" => !matched,
            _ => false,
        };
    }

    let ord = compare_versions(version, target);
    match *op {
        "===" => version == target,
        "==" => ord == Ordering::Equal,
        "!=" => ord != Ordering::Equal,
        "<=" => ord != Ordering::Greater,
        ">=" => ord != Ordering::Less,
        "<" => ord == Ordering::Less,
        ">" => ord == Ordering::Greater,
        "~=" => {
            let parts: Vec<&str> = target.split('.').collect();
            if parts.len() < 2 {
                return false;
            }
            let prefix = parts[..parts.len() - 1].join(".");
            ord != Ordering::Less
                && (version == prefix || version.starts_with(&format!("{prefix}.")))
        }
        _ => false,
    }
}
