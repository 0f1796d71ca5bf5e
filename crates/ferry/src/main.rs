//! Ferry - resumable transfer of event rows into GA4 Measurement Protocol
//!
//! # Usage
//!
//! ```bash
//! # Transfer everything after the committed cursor
//! ferry run --config ferry.toml
//! ferry run --config ferry.toml --dry-run
//!
//! # Check configuration (and optionally the source schema)
//! ferry validate --config ferry.toml --check-source
//!
//! # Inspect or move the committed cursor
//! ferry cursor show --config ferry.toml
//! ferry cursor reset --config ferry.toml --yes
//! ```

mod cmd;
mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ferry_config::{Config, LogConfig};

/// Ferry - move event rows into an analytics collector
#[derive(Parser, Debug)]
#[command(name = "ferry")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "ferry.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the pipeline from the committed cursor until drained
    Run(cmd::run::RunArgs),

    /// Validate configuration and credentials
    Validate(cmd::validate::ValidateArgs),

    /// Inspect or change the committed cursor
    Cursor(cmd::cursor::CursorArgs),
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_config = load_log_config(&cli.config);
    let log_level = resolve_log_level(cli.log_level.as_deref(), &log_config);
    logging::init_logging(&log_level, &log_config)?;

    match cli.command {
        Command::Run(args) => cmd::run::run(&cli.config, args).await,
        Command::Validate(args) => cmd::validate::run(&cli.config, args).await,
        Command::Cursor(args) => cmd::cursor::run(&cli.config, args),
    }
}

/// Logging section of the config file, or defaults when it cannot be read
///
/// Config errors are reported by the command itself once logging is up.
fn load_log_config(path: &Path) -> LogConfig {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|contents| toml_log_section(&contents))
        .unwrap_or_default()
}

fn toml_log_section(contents: &str) -> Option<LogConfig> {
    // Parse without validation: logging must come up even for a broken config
    Config::parse_unvalidated(contents)
        .ok()
        .map(|config| config.log)
}

/// Resolve log level: CLI flag > config file > default "info"
fn resolve_log_level(cli_level: Option<&str>, log: &LogConfig) -> String {
    if let Some(level) = cli_level {
        return level.to_string();
    }
    log.level.as_str().to_string()
}
