//! Tally CLI - Telegram expense logger
//!
//! Usage:
//!   tally init                     Initialize database
//!   tally serve --port 8000        Start the webhook server
//!   tally parse "spent 50 on food" Try the text parser
//!   tally parse-image --file r.jpg Try the image parser
//!   tally transactions list        Show recent transactions

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use clap::Parser;
use tally_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Status => commands::cmd_status(&cli.db, &config, cli.no_encrypt),
        Commands::Serve { port, host } => {
            commands::cmd_serve(&cli.db, &config, &host, port, cli.no_encrypt).await
        }
        Commands::Parse { text, ai } => commands::cmd_parse(&config, &text, ai).await,
        Commands::ParseImage { file } => commands::cmd_parse_image(&config, &file).await,
        Commands::Transactions { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None => commands::cmd_transactions_list(&db, 20, None),
                Some(TransactionsAction::List { limit, user }) => {
                    commands::cmd_transactions_list(&db, limit, user.as_deref())
                }
                Some(TransactionsAction::Verify { id }) => commands::cmd_transactions_verify(&db, id),
            }
        }
        Commands::Categories { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                CategoriesAction::List { user } => commands::cmd_categories_list(&db, &user),
                CategoriesAction::Add { user, name, color } => {
                    commands::cmd_categories_add(&db, &user, &name, color.as_deref())
                }
                CategoriesAction::Remove { id } => commands::cmd_categories_remove(&db, id),
            }
        }
    }
}
