//! # Content RAG CLI (`crag`)
//!
//! ```bash
//! crag --config ./config/crag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `crag init` | Create the SQLite database and run schema migrations |
//! | `crag save` | Replace a scope with inline text or one file |
//! | `crag import` | Replace a scope with files and directories |
//! | `crag crawl` | Replace a scope with crawled web pages |
//! | `crag get` | Print the stored chunks of a scope |
//! | `crag search` | Similarity search within a scope |
//! | `crag ask` | Answer a question from a scope |
//! | `crag delete` | Delete a scope |
//! | `crag stats` | Database summary |
//! | `crag serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! crag init
//! crag save --owner alice --category profile --text "My name is Alice."
//! crag import --owner alice --category docs ./notes --include "**/*.md"
//! crag ask --owner alice --category profile "What is my name?"
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use content_rag::client::RagClient;
use content_rag::{config, get, migrate, search, server, stats};

/// Content RAG: identity-scoped content storage and retrieval-augmented
/// answering.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/crag.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "crag",
    about = "Content RAG: identity-scoped content storage and retrieval-augmented answering",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/crag.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// The identity scope a command reads or replaces.
#[derive(Args)]
struct ScopeArgs {
    /// Owner identifier.
    #[arg(long)]
    owner: String,

    /// Category within the owner. Omitting it is not the same as `--category ""`.
    #[arg(long)]
    category: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Replace a scope with inline text or the contents of one file.
    Save {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Text to store.
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        text: Option<String>,

        /// File whose contents to store (`.pdf` is text-extracted).
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Replace a scope with files and directories, joined in order.
    Import {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Files or directories.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Glob of files to include when walking directories (repeatable).
        #[arg(long)]
        include: Vec<String>,

        /// Glob of files to skip when walking directories (repeatable).
        #[arg(long)]
        exclude: Vec<String>,
    },

    /// Replace a scope with web pages crawled from the given URLs.
    Crawl {
        #[command(flatten)]
        scope: ScopeArgs,

        #[arg(required = true)]
        urls: Vec<String>,

        /// 1 fetches only the given pages. Defaults to `[crawl] max_depth`.
        #[arg(long)]
        max_depth: Option<usize>,
    },

    /// Print the stored chunks of a scope.
    Get {
        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Similarity search within a scope.
    Search {
        #[command(flatten)]
        scope: ScopeArgs,

        query: String,

        /// Maximum number of results. Defaults to `[retrieval] limit`.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Answer a question from a scope using the configured language model.
    Ask {
        #[command(flatten)]
        scope: ScopeArgs,

        question: String,
    },

    /// Delete every chunk of a scope.
    Delete {
        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Show database statistics.
    Stats,

    /// Start the HTTP server on `[server] bind`.
    Serve,
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("RUST_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized at {}", cfg.db.path.display());
        }
        Commands::Save { scope, text, file } => {
            let client = RagClient::open(&cfg).await?;
            let result = match (text, file) {
                (Some(text), _) => client
                    .save_content(&scope.owner, &text, scope.category.as_deref())
                    .await
                    .map(Some)
                    .map_err(anyhow::Error::from),
                (None, Some(file)) => client
                    .import_paths(&scope.owner, &[file], &[], &[], scope.category.as_deref())
                    .await
                    .map(|report| report.unit),
                (None, None) => Err(anyhow::anyhow!("either --text or --file is required")),
            };
            client.close().await;
            print_saved(result?.as_ref().map(|u| u.id.as_str()));
        }
        Commands::Import {
            scope,
            paths,
            include,
            exclude,
        } => {
            let client = RagClient::open(&cfg).await?;
            let result = client
                .import_paths(
                    &scope.owner,
                    &paths,
                    &include,
                    &exclude,
                    scope.category.as_deref(),
                )
                .await;
            client.close().await;
            let report = result?;
            println!("Loaded {} files", report.documents);
            print_saved(report.unit.as_ref().map(|u| u.id.as_str()));
        }
        Commands::Crawl {
            scope,
            urls,
            max_depth,
        } => {
            let client = RagClient::open(&cfg).await?;
            let result = client
                .save_urls(&scope.owner, &urls, max_depth, scope.category.as_deref())
                .await;
            client.close().await;
            let report = result?;
            println!("Fetched {} pages", report.documents);
            print_saved(report.unit.as_ref().map(|u| u.id.as_str()));
        }
        Commands::Get { scope } => {
            get::run_get(&cfg, &scope.owner, scope.category.as_deref()).await?;
        }
        Commands::Search {
            scope,
            query,
            limit,
        } => {
            search::run_search(&cfg, &query, &scope.owner, scope.category.as_deref(), limit)
                .await?;
        }
        Commands::Ask { scope, question } => {
            let client = RagClient::open(&cfg).await?;
            let result = client
                .ask(&question, &scope.owner, scope.category.as_deref())
                .await;
            client.close().await;
            println!("{}", result?);
        }
        Commands::Delete { scope } => {
            let client = RagClient::open(&cfg).await?;
            let result = client
                .delete_content(&scope.owner, scope.category.as_deref())
                .await;
            client.close().await;
            println!("Deleted {} chunks", result?);
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            let client = RagClient::open(&cfg).await?;
            server::run_server(client).await?;
        }
    }

    Ok(())
}

fn print_saved(unit_id: Option<&str>) {
    match unit_id {
        Some(id) => println!("Saved content {}", id),
        None => println!("Nothing to save"),
    }
}
