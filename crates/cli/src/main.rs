//! Autosync CLI - autosync command

use clap::Parser;
use cli_lib::config::{self, Overrides};
use cli_lib::{logging, runner};
use std::path::PathBuf;
use std::process::ExitCode;

/// Autosync - commit and push a working tree whenever it settles
#[derive(Parser)]
#[command(name = "autosync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory to watch (default: current directory)
    #[arg(long)]
    path: Option<PathBuf>,

    /// Remote to push to (default: origin)
    #[arg(long)]
    remote: Option<String>,

    /// Branch to push (default: the checked-out branch)
    #[arg(long)]
    branch: Option<String>,

    /// Extra ignore pattern, repeatable
    #[arg(long = "ignore", value_name = "PATTERN")]
    ignore: Vec<String>,

    /// Quiet interval in seconds before syncing (default: 2)
    #[arg(long, value_name = "SECONDS")]
    debounce: Option<f64>,

    /// Commit locally but never push
    #[arg(long)]
    no_push: bool,

    /// Commit message template, must contain {ts}
    #[arg(short, long)]
    message: Option<String>,

    /// Do not read .gitignore
    #[arg(long)]
    no_gitignore: bool,

    /// Config file to use instead of <path>/.autosync.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Run a single sync attempt and exit
    #[arg(long)]
    once: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            path: self.path.clone(),
            remote: self.remote.clone(),
            branch: self.branch.clone(),
            ignore: self.ignore.clone(),
            debounce_secs: self.debounce,
            no_push: self.no_push,
            message: self.message.clone(),
            no_gitignore: self.no_gitignore,
            config_file: self.config.clone(),
            log_file: self.log_file.clone(),
        }
    }
}

const EXIT_STARTUP: u8 = 2;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guard = match logging::init(cli.verbose, cli.quiet, cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(EXIT_STARTUP);
        }
    };

    // Installed before any slow startup work so an early Ctrl-C is not lost
    let shutdown = match runner::shutdown_signal() {
        Ok(shutdown) => shutdown,
        Err(e) => {
            tracing::error!("Failed to install signal handlers: {}", e);
            return ExitCode::from(EXIT_STARTUP);
        }
    };

    let user_config = config::user_config_path();
    let config = match config::resolve(cli.overrides(), user_config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{:#}", e);
            return ExitCode::from(EXIT_STARTUP);
        }
    };

    match runner::run(config, cli.once, shutdown).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
