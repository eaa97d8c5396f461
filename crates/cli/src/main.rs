//! ANMI CLI — the main entry point.
//!
//! Commands:
//! - `chat`        — Ask questions (single message or interactive)
//! - `ingest`      — Clean the source guides and upload them to the index
//! - `ingest-json` — Upload a curated JSON knowledge base
//! - `config`      — Show the effective configuration or write a default one

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "anmi",
    about = "ANMI — Asistente Nutricional Materno Infantil",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.anmi/config.toml)
    #[arg(short, long, global = true, env = "ANMI_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Session key; a fresh one is generated when omitted
        #[arg(short, long)]
        session: Option<String>,

        /// Print the answer word by word as it is generated
        #[arg(long)]
        stream: bool,

        /// Answer from a local passage file instead of the hosted index
        #[arg(long)]
        corpus: Option<PathBuf>,
    },

    /// Clean the source guides and upload them to the index
    Ingest {
        /// Folder with the extracted guides (overrides ingest.source_dir)
        #[arg(long)]
        source: Option<PathBuf>,

        /// Write passages to a local JSON file instead of uploading
        #[arg(long)]
        dry_run: bool,

        /// Dry-run output file (overrides ingest.output_file)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Upload a curated JSON knowledge base
    IngestJson {
        /// JSON array of {title, keywords, content} items
        #[arg(short, long)]
        file: PathBuf,

        /// Write passages to a local JSON file instead of uploading
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the effective configuration
    Config {
        /// Write a default config file instead
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Chat {
            message,
            session,
            stream,
            corpus,
        } => {
            let options = commands::chat::ChatOptions {
                message,
                session,
                stream,
                corpus,
            };
            commands::chat::run(config_path, options).await?
        }
        Commands::Ingest {
            source,
            dry_run,
            output,
        } => commands::ingest::run_folder(config_path, source, dry_run, output).await?,
        Commands::IngestJson { file, dry_run } => {
            commands::ingest::run_curated(config_path, &file, dry_run).await?
        }
        Commands::Config { init } => {
            if init {
                commands::config_cmd::init(config_path).await?
            } else {
                commands::config_cmd::show(config_path).await?
            }
        }
    }

    Ok(())
}
