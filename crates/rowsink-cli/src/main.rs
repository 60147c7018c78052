//! rowsink CLI - batched bulk-write client for table storage.

use anyhow::Result;
use clap::{Parser, Subcommand};
use rowsink_core::config::LogFormat;
use rowsink_core::Config;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Exit codes for CLI operations.
///
/// Following Unix conventions:
/// - 0: Success
/// - 1-127: Application errors
#[repr(i32)]
#[derive(Debug, Clone, Copy)]
pub enum ExitCode {
    /// Successful execution
    Success = 0,
    /// Configuration error (invalid config file, missing required fields)
    ConfigError = 1,
    /// Backend error (connection, throttling, rejected bulk write)
    BackendError = 2,
    /// Buffer error (dedup key spec does not match the submitted rows)
    BufferError = 3,
    /// IO error (input file unreadable)
    IoError = 4,
    /// Input data error (malformed mutation records)
    InputError = 5,
    /// General runtime error
    RuntimeError = 10,
}

impl ExitCode {
    /// Map an error to an exit code by inspecting its domain.
    fn from_error(error: &anyhow::Error) -> Self {
        match error.downcast_ref::<rowsink_core::Error>() {
            Some(rowsink_core::Error::Config(_)) => ExitCode::ConfigError,
            Some(rowsink_core::Error::Backend(_)) => ExitCode::BackendError,
            Some(rowsink_core::Error::Buffer(_)) => ExitCode::BufferError,
            Some(rowsink_core::Error::Io(_)) => ExitCode::IoError,
            Some(rowsink_core::Error::Serialization(_)) => ExitCode::InputError,
            None => {
                if error.downcast_ref::<toml::de::Error>().is_some() {
                    ExitCode::ConfigError
                } else if error.downcast_ref::<std::io::Error>().is_some() {
                    ExitCode::IoError
                } else {
                    ExitCode::RuntimeError
                }
            }
        }
    }
}

mod commands;

#[derive(Parser)]
#[command(name = "rowsink")]
#[command(about = "Batched bulk-write client for table storage", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream newline-delimited JSON mutations through a write buffer
    Apply {
        /// Input file with one mutation record per line
        #[arg(short, long)]
        input: PathBuf,

        /// Override the target table
        #[arg(long)]
        table: Option<String>,

        /// Override the flush amount
        #[arg(long)]
        flush_amount: Option<usize>,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() {
    let exit_code = run_cli().await;
    std::process::exit(exit_code as i32);
}

/// Main CLI execution logic with proper error handling.
async fn run_cli() -> ExitCode {
    let cli = Cli::parse();

    // Try to load config for log settings (optional - falls back to JSON/info)
    let monitoring = cli
        .config
        .as_ref()
        .and_then(|path| std::fs::read_to_string(path).ok())
        .and_then(|content| toml::from_str::<Config>(&content).ok())
        .map(|config| config.monitoring)
        .unwrap_or_default();

    // Initialize logging
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match cli.verbose {
            0 => EnvFilter::new(monitoring.log_level.as_filter()),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    match monitoring.log_format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .init();
        }
    }

    let result = execute_command(cli).await;

    match result {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ExitCode::from_error(&e)
        }
    }
}

/// Execute the CLI command.
async fn execute_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Apply {
            input,
            table,
            flush_amount,
        } => {
            let config = load_config(&cli.config)?;
            commands::apply::run(config, input, table, flush_amount).await?;
        }

        Commands::Validate => {
            let config = load_config(&cli.config)?;
            config.validate()?;
            println!("Configuration is valid");
        }
    }

    Ok(())
}

fn load_config(path: &Option<PathBuf>) -> Result<Config> {
    let path = path.clone().unwrap_or_else(|| PathBuf::from("config.toml"));

    let content = std::fs::read_to_string(&path)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
}
