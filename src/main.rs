//! # MemoryVault CLI (`vault`)
//!
//! ## Usage
//!
//! ```bash
//! vault --config ./config/vault.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vault init` | Create the SQLite database and run schema migrations |
//! | `vault serve` | Start the HTTP API |
//! | `vault ingest <file> --owner <id>` | Upload and index a local file |
//! | `vault search "<query>" --owner <id>` | Similarity search over an owner's chunks |
//! | `vault chat "<question>" --owner <id>` | Answer a question from an owner's documents |
//! | `vault documents --owner <id>` | List an owner's documents, newest first |
//! | `vault models` | List Gemini models that support `generateContent` |
//! | `vault token --owner <id>` | Mint a bearer token signed with the configured secret |
//!
//! Secrets (`GOOGLE_API_KEY`, `OPENAI_API_KEY`, `PINECONE_API_KEY`,
//! `SUPABASE_JWT_SECRET`) are read from the environment; a `.env` file in
//! the working directory is loaded first if present. Log verbosity follows
//! `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use memory_vault::{commands, config, migrate, server};

/// MemoryVault: upload documents, then ask questions answered only from
/// your own documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/vault.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "vault",
    about = "MemoryVault: a retrieval-augmented document assistant",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/vault.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Upload a local file for an owner and index it.
    Ingest {
        /// File to ingest.
        file: PathBuf,

        /// Owner id the document belongs to.
        #[arg(long)]
        owner: String,

        /// MIME type; guessed from the file extension when omitted.
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Similarity search over an owner's indexed chunks.
    Search {
        query: String,

        #[arg(long)]
        owner: String,

        /// Maximum number of results (defaults to `[retrieval].top_k`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Answer a question from an owner's documents.
    Chat {
        query: String,

        #[arg(long)]
        owner: String,
    },

    /// List an owner's documents, newest first.
    Documents {
        #[arg(long)]
        owner: String,
    },

    /// List Gemini models that support `generateContent`.
    Models,

    /// Mint a bearer token for local testing.
    Token {
        #[arg(long)]
        owner: String,

        /// Lifetime in seconds.
        #[arg(long, default_value_t = 3600)]
        ttl: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Ingest {
            file,
            owner,
            content_type,
        } => {
            commands::run_ingest(&cfg, &file, &owner, content_type).await?;
        }
        Commands::Search {
            query,
            owner,
            limit,
        } => {
            commands::run_search(&cfg, &query, &owner, limit).await?;
        }
        Commands::Chat { query, owner } => {
            commands::run_chat(&cfg, &query, &owner).await?;
        }
        Commands::Documents { owner } => {
            commands::run_documents(&cfg, &owner).await?;
        }
        Commands::Models => {
            commands::run_models(&cfg).await?;
        }
        Commands::Token { owner, ttl } => {
            commands::run_token(&cfg, &owner, ttl)?;
        }
    }

    Ok(())
}
