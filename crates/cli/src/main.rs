//! pinchat CLI, the main entry point.
//!
//! Commands:
//! - `serve` : Start the HTTP server
//! - `usage` : Show recent daily request counts and PIN lockout state
//! - `doctor`: Check configuration, ledger, and adapter reachability

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "pinchat",
    about = "pinchat: a PIN-protected chat relay",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Path to a TOML config file
        #[arg(short, long, env = "PINCHAT_CONFIG")]
        config: Option<PathBuf>,

        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show recent usage from the ledger
    Usage {
        /// Path to a TOML config file
        #[arg(short, long, env = "PINCHAT_CONFIG")]
        config: Option<PathBuf>,

        /// Number of most recent days to list
        #[arg(short, long, default_value_t = 7)]
        days: usize,
    },

    /// Diagnose configuration and connectivity
    Doctor {
        /// Path to a TOML config file
        #[arg(short, long, env = "PINCHAT_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    match cli.command {
        Commands::Serve { config, port } => commands::serve::run(config, port).await?,
        Commands::Usage { config, days } => commands::usage::run(config, days)?,
        Commands::Doctor { config } => commands::doctor::run(config).await?,
    }

    Ok(())
}
