//! Chartwright CLI - Turns upstream Kubernetes release manifests into Helm charts

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use chartwright_core::config::{DEFAULT_CONFIG_FILES, TOKEN_ENV};
use chartwright_core::{Config, ConfigOverrides, Mode};

mod commands;
mod error;
mod exit_codes;
mod logging;
mod orchestrator;
mod util;

use error::{CliError, Result};

#[derive(Parser)]
#[command(name = "chartwright")]
#[command(author = "Chartwright Contributors")]
#[command(version)]
#[command(about = "Turns upstream Kubernetes release manifests into reviewed, published Helm charts", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file(s), merged in order [default: config.yaml, .local/config.yaml]
    #[arg(short, long = "config", global = true)]
    config: Vec<PathBuf>,

    /// Operation to run when no subcommand is given (update or publish)
    #[arg(long, global = true)]
    mode: Option<Mode>,

    /// Skip git, pull request and registry operations
    #[arg(long, global = true)]
    offline: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// GitHub token, takes precedence over pr.authToken and GITHUB_TOKEN
    #[arg(long, global = true)]
    auth_token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Regenerate charts from the latest upstream releases and open pull requests
    Update,

    /// Package every chart and push it to the OCI registry
    Publish,

    /// Lint a chart directory
    Lint {
        /// Chart path
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Kubernetes version to check API versions against [default: helm.lintK8s]
        #[arg(long)]
        kube_version: Option<String>,

        /// Fail on warnings too
        #[arg(long)]
        strict: bool,
    },

    /// Package a chart directory into a .tgz archive
    Package {
        /// Chart path
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output directory [default: helm.targetDir]
        #[arg(short, long)]
        destination: Option<PathBuf>,
    },
}

fn main() {
    miette::set_panic_hook();

    let cli = Cli::parse();

    let code = match run(cli) {
        Ok(()) => exit_codes::SUCCESS,
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            code
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<()> {
    let mut config = if cli.config.is_empty() {
        Config::load_layered(DEFAULT_CONFIG_FILES)?
    } else {
        Config::load_files(&cli.config)?
    };
    config.apply_overrides(ConfigOverrides {
        mode: cli.mode,
        offline: cli.offline,
        log_level: cli.log_level,
        auth_token: cli.auth_token,
    });
    config.apply_token_fallback(std::env::var(TOKEN_ENV).ok());

    logging::init(config.log.level.as_deref());

    let command = match cli.command {
        Some(command) => command,
        None => match config.mode()? {
            Mode::Update => Commands::Update,
            Mode::Publish => Commands::Publish,
        },
    };

    match command {
        Commands::Update => runtime()?.block_on(commands::update::run(config)),
        Commands::Publish => runtime()?.block_on(commands::publish::run(&config)),
        Commands::Lint {
            path,
            kube_version,
            strict,
        } => commands::lint::run(
            &path,
            kube_version.as_deref().unwrap_or(&config.helm.lint_k8s),
            strict,
        ),
        Commands::Package { path, destination } => commands::package::run(
            &path,
            destination.as_deref().unwrap_or(&config.helm.target_dir),
        ),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::internal(format!("failed to start async runtime: {e}")))
}
