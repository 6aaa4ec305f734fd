mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{Failure, EXIT_FAILURE};
use pipf_core::{install_signal_handler, Engine, InstallOptions, Settings};
use pipf_schema::Project;
use std::path::Path;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "pipf",
    version,
    about = "Manage a Pipfile, its lock file, and the project virtualenv"
)]
struct Cli {
    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    /// Resolver and environment backend (venv or mock).
    #[arg(long, global = true)]
    backend: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a Pipfile in the current directory.
    Init {
        /// Python version to require (defaults to the installed python3).
        #[arg(short, long)]
        python_version: Option<String>,
    },
    /// Lock and install every package in the Pipfile.
    Install {
        /// Install only [packages], not [dev-packages].
        #[arg(long, default_value_t = false)]
        prod: bool,
        /// Ignore existing pins and re-resolve everything.
        #[arg(long, default_value_t = false, conflicts_with = "locked")]
        upgrade: bool,
        /// Install exactly what Pipfile.lock pins; fail if it is missing or stale.
        #[arg(long, default_value_t = false)]
        locked: bool,
    },
    /// Add packages to the Pipfile and install them.
    Add {
        /// Requirements such as `requests` or `django>=2.2`.
        #[arg(required = true)]
        packages: Vec<String>,
        /// Add to [dev-packages].
        #[arg(short = 'D', long, default_value_t = false)]
        dev: bool,
    },
    /// Remove packages from the Pipfile and uninstall them.
    Remove {
        #[arg(required = true)]
        packages: Vec<String>,
        /// Remove from [dev-packages].
        #[arg(short = 'D', long, default_value_t = false)]
        dev: bool,
    },
    /// Re-resolve the named packages, or all packages when none are named.
    Update { packages: Vec<String> },
    /// Write Pipfile.lock without touching the virtualenv.
    Lock,
    /// List packages installed in the virtualenv.
    List,
    /// Run a command inside the virtualenv.
    Run {
        /// Command and arguments to run.
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Start a shell with the virtualenv activated.
    Shell,
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("PIPF_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    install_signal_handler();

    match dispatch(cli) {
        Ok(code) => ExitCode::from(code),
        Err(Failure { code, message }) => {
            if let Some(msg) = message {
                eprintln!("error: {msg}");
            }
            ExitCode::from(code)
        }
    }
}

fn dispatch(cli: Cli) -> commands::CommandResult {
    let json = cli.json;
    let mut settings = Settings::load_default()?.with_env();
    if let Some(backend) = cli.backend {
        settings.backend = backend;
    }
    let cwd = std::env::current_dir().map_err(|e| format!("current directory: {e}"))?;

    match cli.command {
        Commands::Init { python_version } => {
            return commands::init::run(
                &cwd,
                python_version.as_deref(),
                settings.python.as_deref(),
                json,
            )
        }
        Commands::Completions { shell } => return commands::completions::run::<Cli>(shell),
        _ => {}
    }

    let mut project = Project::load(&cwd).map_err(pipf_core::CoreError::from)?;
    check_prereqs(&settings, project.project_dir())?;
    let engine = Engine::new(&settings, project.project_dir())?;

    match cli.command {
        Commands::Install {
            prod,
            upgrade,
            locked,
        } => commands::install::run(
            &engine,
            &mut project,
            InstallOptions {
                prod_only: prod,
                upgrade,
                locked,
            },
            json,
        ),
        Commands::Add { packages, dev } => {
            commands::add::run(&engine, &mut project, &packages, dev, json)
        }
        Commands::Remove { packages, dev } => {
            commands::remove::run(&engine, &mut project, &packages, dev, json)
        }
        Commands::Update { packages } => {
            commands::update::run(&engine, &mut project, &packages, json)
        }
        Commands::Lock => commands::lock::run(&engine, &mut project, json),
        Commands::List => commands::list::run(&engine, &project),
        Commands::Run { command } => commands::run::run(&engine, &project, &command),
        Commands::Shell => commands::shell::run(&engine, &project),
        Commands::Init { .. } | Commands::Completions { .. } => Ok(commands::EXIT_SUCCESS),
    }
}

fn check_prereqs(settings: &Settings, project_dir: &Path) -> Result<(), Failure> {
    if std::env::var("PIPF_SKIP_PREREQS").as_deref() == Ok("1") {
        return Ok(());
    }
    let missing = pipf_runtime::check_prereqs(&settings.backend, &settings.env_spec(project_dir));
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Failure {
            code: EXIT_FAILURE,
            message: Some(pipf_runtime::format_missing(&missing)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn run_keeps_hyphenated_arguments() {
        let cli = Cli::try_parse_from(["pipf", "run", "pytest", "-x", "--lf"]).unwrap();
        match cli.command {
            Commands::Run { command } => assert_eq!(command, vec!["pytest", "-x", "--lf"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn add_dev_flag_and_global_options() {
        let cli =
            Cli::try_parse_from(["pipf", "add", "-D", "pytest", "--json", "--backend", "mock"])
                .unwrap();
        assert!(cli.json);
        assert_eq!(cli.backend.as_deref(), Some("mock"));
        match cli.command {
            Commands::Add { packages, dev } => {
                assert!(dev);
                assert_eq!(packages, vec!["pytest"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn upgrade_conflicts_with_locked() {
        assert!(Cli::try_parse_from(["pipf", "install", "--upgrade", "--locked"]).is_err());
    }

    #[test]
    fn exit_codes_are_distinct() {
        assert_ne!(commands::EXIT_SUCCESS, EXIT_FAILURE);
        assert_ne!(EXIT_FAILURE, commands::EXIT_CONFIG_ERROR);
    }
}
