use crate::backend::{ResolveRequest, Resolver};
use crate::process::run_output;
use crate::RuntimeError;
use pipf_schema::{Requirement, ResolvedPackage};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::process::Command;
use std::sync::Mutex;
use tracing::{debug, warn};

const INPUT_NAME: &str = "requirements.in";
const OUTPUT_NAME: &str = "requirements.txt";

/// Resolver backed by pip-tools' `pip-compile`.
///
/// Seed pins are written into the output file before compiling; pip-compile
/// keeps existing output pins that still satisfy the inputs, which is what
/// makes incremental updates minimal. Hashes come from the same run and are
/// cached for `resolve_hashes`.
pub struct PipCompileResolver {
    program: String,
    hashes: Mutex<BTreeMap<ResolvedPackage, Vec<String>>>,
}

impl PipCompileResolver {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_owned(),
            hashes: Mutex::new(BTreeMap::new()),
        }
    }

    fn command(&self, request: &ResolveRequest<'_>, dir: &std::path::Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args([
            "--quiet",
            "--generate-hashes",
            "--no-header",
            "--no-annotate",
            "--no-emit-index-url",
        ]);
        let mut urls = request.index_urls.iter();
        if let Some(primary) = urls.next() {
            cmd.arg("--index-url").arg(primary);
        }
        for extra in urls {
            cmd.arg("--extra-index-url").arg(extra);
        }
        cmd.arg("--output-file")
            .arg(dir.join(OUTPUT_NAME))
            .arg(dir.join(INPUT_NAME));
        cmd
    }
}

impl Resolver for PipCompileResolver {
    fn name(&self) -> &'static str {
        "pip-compile"
    }

    fn resolve(&self, request: &ResolveRequest<'_>) -> Result<Vec<ResolvedPackage>, RuntimeError> {
        if request.constraints.is_empty() {
            return Ok(Vec::new());
        }
        let dir = tempfile::tempdir()?;

        let mut input = String::new();
        for req in request.constraints {
            let _ = writeln!(input, "{req}");
        }
        fs::write(dir.path().join(INPUT_NAME), input)?;

        if !request.seed.is_empty() {
            let mut seed = String::new();
            for (key, pin) in request.seed {
                let _ = writeln!(seed, "{}", pin.requirement(key));
            }
            fs::write(dir.path().join(OUTPUT_NAME), seed)?;
        }
        debug!(
            "compiling {} constraints with {} seed pins",
            request.constraints.len(),
            request.seed.len()
        );

        let mut cmd = self.command(request, dir.path());
        run_output(&mut cmd).map_err(|e| match e {
            RuntimeError::CommandFailed { command, code } => RuntimeError::Unresolvable(format!(
                "{command} exited with {}",
                code.map_or_else(|| "a signal".to_owned(), |c| c.to_string())
            )),
            other => other,
        })?;

        let compiled = fs::read_to_string(dir.path().join(OUTPUT_NAME))?;
        let entries = parse_compiled(&compiled)?;

        let mut cache = self
            .hashes
            .lock()
            .map_err(|e| RuntimeError::Poisoned(e.to_string()))?;
        let mut packages = Vec::with_capacity(entries.len());
        for (package, hashes) in entries {
            cache.insert(package.clone(), hashes);
            packages.push(package);
        }
        Ok(packages)
    }

    fn resolve_hashes(
        &self,
        packages: &[ResolvedPackage],
    ) -> Result<BTreeMap<ResolvedPackage, Vec<String>>, RuntimeError> {
        let cache = self
            .hashes
            .lock()
            .map_err(|e| RuntimeError::Poisoned(e.to_string()))?;
        packages
            .iter()
            .map(|p| {
                cache
                    .get(p)
                    .map(|h| (p.clone(), h.clone()))
                    .ok_or_else(|| {
                        RuntimeError::ResolverOutput(format!(
                            "no hashes for {}=={}",
                            p.name, p.version
                        ))
                    })
            })
            .collect()
    }
}

/// Parse a hash-annotated requirements file as written by pip-compile.
///
/// Backslash continuations are joined, comments and option lines dropped.
/// Every remaining entry must be an exact `==` pin.
pub fn parse_compiled(content: &str) -> Result<Vec<(ResolvedPackage, Vec<String>)>, RuntimeError> {
    let mut entries = Vec::new();
    for line in logical_lines(content) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('-') {
            warn!("ignoring resolver output option: {line}");
            continue;
        }

        let (head, options) = match line.find(" --") {
            Some(idx) => line.split_at(idx),
            None => (line, ""),
        };
        let hashes: Vec<String> = options
            .split_whitespace()
            .filter_map(|tok| tok.strip_prefix("--hash="))
            .map(str::to_owned)
            .collect();

        let req = Requirement::parse(head)
            .map_err(|e| RuntimeError::ResolverOutput(e.to_string()))?;
        let version = req
            .specifier
            .strip_prefix("===")
            .or_else(|| req.specifier.strip_prefix("=="))
            .filter(|v| !v.is_empty() && !v.contains(','))
            .ok_or_else(|| RuntimeError::ResolverOutput(format!("not an exact pin: {head}")))?;

        entries.push((
            ResolvedPackage {
                name: req.name.clone(),
                version: version.to_owned(),
            },
            hashes,
        ));
    }
    Ok(entries)
}

fn logical_lines(content: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for raw in content.lines() {
        let without_comment = match raw.find(" #") {
            Some(idx) => &raw[..idx],
            None => raw,
        };
        match without_comment.trim_end().strip_suffix('\\') {
            Some(part) => {
                current.push_str(part);
                current.push(' ');
            }
            None => {
                current.push_str(without_comment);
                lines.push(std::mem::take(&mut current));
            }
        }
    }
    if !current.trim().is_empty() {
        lines.push(current);
    }
    lines
}
