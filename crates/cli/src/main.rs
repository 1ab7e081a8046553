//! ChatKit CLI: the main entry point.
//!
//! Commands:
//! - `replay`: Assemble a recorded SSE capture and print the transcript
//! - `chat`: Stream one live turn from the configured backend
//! - `config`: Show, locate, validate or initialize the config file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "chatkit",
    about = "ChatKit: streaming agent answer assembler",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded SSE capture through the assembler
    Replay {
        /// File holding the raw response body
        file: PathBuf,

        /// Wire protocol of the capture (defaults to the configured backend)
        #[arg(short, long)]
        backend: Option<String>,

        /// Feed the capture in chunks of this many bytes
        #[arg(long, default_value_t = 4096)]
        chunk_size: usize,

        /// Print the transcript as JSON
        #[arg(long)]
        json: bool,
    },

    /// Send one message to the configured backend and stream the answer
    Chat {
        /// The message to send
        message: String,

        /// Title of the application context attached to the message
        #[arg(long)]
        context_title: Option<String>,

        /// JSON data of the application context
        #[arg(long, requires = "context_title")]
        context_data: Option<String>,

        /// Continue an existing conversation
        #[arg(long)]
        conversation: Option<String>,

        /// Regenerate the assistant message with this id
        #[arg(long)]
        regenerate: Option<String>,

        /// Print the transcript as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Load and validate the configuration
    Validate,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Replay {
            file,
            backend,
            chunk_size,
            json,
        } => commands::replay::run(&file, backend.as_deref(), chunk_size, json).await?,
        Commands::Chat {
            message,
            context_title,
            context_data,
            conversation,
            regenerate,
            json,
        } => {
            let options = commands::chat::ChatOptions {
                message,
                context_title,
                context_data,
                conversation,
                regenerate,
                json,
            };
            commands::chat::run(options).await?
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
            ConfigAction::Init { force } => commands::config_cmd::init(force).await?,
        },
    }

    Ok(())
}
