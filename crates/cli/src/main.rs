//! factrag CLI
//!
//! Main entry point for the factrag command-line tool and HTTP service.
//! Indexes short facts and answers questions grounded in them.

mod commands;
mod server;

use clap::{Parser, Subcommand};
use commands::{ChatCommand, IndexCommand, ServeCommand, StatsCommand};
use factrag_core::{config::AppConfig, logging};
use std::path::PathBuf;
use tracing::Instrument;

/// factrag - answer questions from a fact index
#[derive(Parser, Debug)]
#[command(name = "factrag")]
#[command(about = "Retrieval-augmented answers over indexed facts", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "FACTRAG_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "FACTRAG_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider (ollama, openai)
    #[arg(short, long, global = true, env = "FACTRAG_LLM_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "FACTRAG_LLM_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API
    Serve(ServeCommand),

    /// Index facts and documents
    Index(IndexCommand),

    /// Ask a question answered from the indexed facts
    Chat(ChatCommand),

    /// Show fact store and vector index statistics
    Stats(StatsCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Workspace and config file must be known before the file is read
    let config = AppConfig::load_from(cli.workspace.clone(), cli.config.clone())?.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("factrag starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("LLM: {} ({})", config.llm.provider, config.llm.effective_model());
    tracing::debug!(
        "Vector backend: {} / {}",
        config.vector.backend,
        config.vector.collection
    );

    let command_name = match &cli.command {
        Commands::Serve(_) => "serve",
        Commands::Index(_) => "index",
        Commands::Chat(_) => "chat",
        Commands::Stats(_) => "stats",
    };
    let span = tracing::info_span!("command", name = command_name);

    let result = async {
        match cli.command {
            Commands::Serve(cmd) => cmd.execute(&config).await,
            Commands::Index(cmd) => cmd.execute(&config).await.map_err(anyhow::Error::from),
            Commands::Chat(cmd) => cmd.execute(&config).await.map_err(anyhow::Error::from),
            Commands::Stats(cmd) => cmd.execute(&config).await.map_err(anyhow::Error::from),
        }
    }
    .instrument(span)
    .await;

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {:#}", e),
    }

    result
}
