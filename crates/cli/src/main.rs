//! Clipper CLI
//!
//! Main entry point for the clipper command-line tool.
//! Builds per-channel highlight clip lists from stored comments and live chat.

mod commands;

use clap::{Parser, Subcommand};
use clipper_core::{config::AppConfig, logging, AppResult};
use commands::{BuildCommand, ParseCommand, ShowCommand};
use std::path::PathBuf;

/// Clipper - highlight clips from comment timestamps and live chat
#[derive(Parser, Debug)]
#[command(name = "clipper")]
#[command(about = "Highlight clips from comment timestamps and live chat", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "CLIPPER_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "CLIPPER_CONFIG")]
    config: Option<PathBuf>,

    /// Path to the SQLite datastore
    #[arg(long, global = true, env = "CLIPPER_DATABASE")]
    database: Option<PathBuf>,

    /// Output directory for artifacts
    #[arg(long, global = true, env = "CLIPPER_BUILD_DIR")]
    build_dir: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build and publish clip lists for all tracked channels
    Build(BuildCommand),

    /// Extract time ranges from a piece of text
    Parse(ParseCommand),

    /// Show channel page publish state
    Show(ShowCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load base configuration from the config file and environment
    let config = AppConfig::load(cli.workspace, cli.config)?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.database,
        cli.build_dir,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("Clipper CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Database: {:?}", config.database_path);
    tracing::debug!("Build dir: {:?}", config.build_dir);

    let command_name = match &cli.command {
        Commands::Build(_) => "build",
        Commands::Parse(_) => "parse",
        Commands::Show(_) => "show",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Build(cmd) => cmd.execute(&config).await,
        Commands::Parse(cmd) => cmd.execute(&config).await,
        Commands::Show(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
