//! Grounded CLI
//!
//! Main entry point for the grounded command-line tool.
//! Ingests a forum and documentation corpus, embeds it, and answers
//! questions with cited sources over the command line or HTTP.

mod commands;
mod server;

use clap::{Parser, Subcommand};
use commands::{AskCommand, EmbedCommand, IngestCommand, ServeCommand, StatsCommand};
use grounded_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// Grounded - cited answers from a local forum and documentation corpus
#[derive(Parser, Debug)]
#[command(name = "grounded")]
#[command(about = "Cited answers from a local forum and documentation corpus", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "GROUNDED_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "GROUNDED_CONFIG")]
    config: Option<PathBuf>,

    /// Path to the corpus database
    #[arg(long, global = true, env = "GROUNDED_DATABASE")]
    database: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// Chat model used for answers
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Provider for embeddings and generation (openai, mock)
    #[arg(short, long, global = true, env = "GROUNDED_PROVIDER")]
    provider: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP question answering server
    Serve(ServeCommand),

    /// Load thread exports and documentation pages into the store
    Ingest(IngestCommand),

    /// Compute embeddings for chunks that have none
    Embed(EmbedCommand),

    /// Answer a single question
    Ask(AskCommand),

    /// Show corpus statistics
    Stats(StatsCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let config = AppConfig::load(cli.workspace, cli.config)?;

    let config = config.with_overrides(
        cli.database,
        cli.api_base,
        cli.model,
        cli.provider,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.json_logs)?;

    tracing::info!("Grounded CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Database: {:?}", config.database_path());
    tracing::debug!(
        "Providers: embedding={}, generation={}",
        config.embedding.provider,
        config.generation.provider
    );

    config.ensure_grounded_dir()?;

    let command_name = match &cli.command {
        Commands::Serve(_) => "serve",
        Commands::Ingest(_) => "ingest",
        Commands::Embed(_) => "embed",
        Commands::Ask(_) => "ask",
        Commands::Stats(_) => "stats",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Serve(cmd) => cmd.execute(config).await,
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Embed(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
