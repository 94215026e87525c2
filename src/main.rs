//! # Chatbot KB CLI (`kb`)
//!
//! The `kb` binary initializes the database, manages categories and
//! entries, and runs the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! kb --config ./config/kb.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kb init` | Create the SQLite database and run schema migrations |
//! | `kb serve` | Start the HTTP server |
//! | `kb category add <name>` | Create a category |
//! | `kb category list` | List categories |
//! | `kb entry list <category>` | List a category's entries |
//! | `kb entry add <category> <content>` | Create an entry and its vector record |
//! | `kb entry update <category> <id> <content>` | Replace an entry's content |
//! | `kb entry delete <category> <id>` | Delete an entry and its vector record |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use chatbot_kb::{category_cmd, config, entry_cmd, logging, migrate, server};

/// Chatbot KB CLI: SQL-backed chatbot entries mirrored into a vector index.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/kb.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "kb",
    about = "Chatbot knowledge base: SQL entries kept in step with their vector-index embeddings",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/kb.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the category and entry tables.
    /// Running it more than once is safe.
    Init,

    /// Start the HTTP server.
    Serve {
        /// Address to bind, overriding `[server].bind`.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Manage categories.
    Category {
        #[command(subcommand)]
        action: CategoryAction,
    },

    /// Manage chatbot entries.
    ///
    /// Mutations update the vector index as well as the database.
    Entry {
        #[command(subcommand)]
        action: EntryAction,
    },
}

#[derive(Subcommand)]
enum CategoryAction {
    /// Create a category.
    Add {
        /// Category name.
        name: String,
    },
    /// List all categories.
    List,
}

#[derive(Subcommand)]
enum EntryAction {
    /// List the entries of a category.
    List {
        /// Category id.
        category: i64,
    },
    /// Add an entry to a category.
    Add {
        /// Category id.
        category: i64,
        /// Entry text.
        content: String,
    },
    /// Replace an entry's content.
    Update {
        /// Category id.
        category: i64,
        /// Entry id.
        id: i64,
        /// New entry text.
        content: String,
    },
    /// Delete an entry.
    Delete {
        /// Category id.
        category: i64,
        /// Entry id.
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    logging::init_tracing(&cfg.logging)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized at {}", cfg.db.path.display());
        }
        Commands::Serve { bind } => {
            server::run_server(&cfg, bind).await?;
        }
        Commands::Category { action } => match action {
            CategoryAction::Add { name } => category_cmd::run_category_add(&cfg, &name).await?,
            CategoryAction::List => category_cmd::run_category_list(&cfg).await?,
        },
        Commands::Entry { action } => match action {
            EntryAction::List { category } => entry_cmd::run_entry_list(&cfg, category).await?,
            EntryAction::Add { category, content } => {
                entry_cmd::run_entry_add(&cfg, category, &content).await?
            }
            EntryAction::Update {
                category,
                id,
                content,
            } => entry_cmd::run_entry_update(&cfg, category, id, &content).await?,
            EntryAction::Delete { category, id } => {
                entry_cmd::run_entry_delete(&cfg, category, id).await?
            }
        },
    }

    Ok(())
}
