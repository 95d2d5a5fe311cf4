//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tally - Log expenses from chat messages and receipt photos
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Self-hosted Telegram expense logger", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "tally.db", global = true)]
    pub db: PathBuf,

    /// Config file (defaults to <config dir>/tally/config.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set TALLY_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Show database and parser status
    Status,

    /// Start the Telegram webhook server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Extract a transaction from a text message
    Parse {
        /// Message text, e.g. "spent 50 on food"
        text: String,

        /// Use the AI provider instead of the rule-based parser
        #[arg(long)]
        ai: bool,
    },

    /// Extract a transaction from a receipt or payment screenshot
    ParseImage {
        /// Image file (PNG, JPEG, GIF or WebP)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Manage transactions (list, verify)
    Transactions {
        #[command(subcommand)]
        action: Option<TransactionsAction>,
    },

    /// Manage a user's categories
    Categories {
        #[command(subcommand)]
        action: CategoriesAction,
    },
}

#[derive(Subcommand)]
pub enum TransactionsAction {
    /// List recent transactions
    List {
        /// Maximum number of transactions to show
        #[arg(short, long, default_value = "20")]
        limit: i64,

        /// Only show transactions of this Telegram user id
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Mark a pending transaction as verified
    Verify {
        /// Transaction ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum CategoriesAction {
    /// List a user's active categories
    List {
        /// Telegram user id
        #[arg(short, long)]
        user: String,
    },

    /// Add a category so matching transactions get linked to it
    Add {
        /// Telegram user id
        #[arg(short, long)]
        user: String,

        /// Category name (matched case-insensitively)
        name: String,

        /// Display color (e.g., "#22c55e")
        #[arg(short, long)]
        color: Option<String>,
    },

    /// Deactivate a category
    Remove {
        /// Category ID
        id: i64,
    },
}
