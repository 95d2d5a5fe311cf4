//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use clap::Parser;
use tally_core::db::Database;
use tally_core::models::{NewTransaction, TransactionSource, TransactionStatus};
use tally_core::{AiBackendKind, Config, ParserKind};

use crate::cli::{CategoriesAction, Cli, Commands, TransactionsAction};
use crate::commands::{self, truncate};

fn setup_test_db() -> Database {
    Database::in_memory().unwrap()
}

/// Create a user and one transaction, returning (user_id, tx_id)
fn create_test_transaction(db: &Database, telegram_id: &str, amount: f64) -> (i64, i64) {
    let user = db.find_or_create_user(telegram_id).unwrap();
    let tx = db
        .create_transaction(&NewTransaction {
            user_id: user.id,
            amount,
            currency: "INR".into(),
            merchant: Some("Chai Point".into()),
            category: Some("tea".into()),
            category_id: None,
            occurred_on: None,
            source: TransactionSource::Text,
            status: TransactionStatus::Pending,
        })
        .unwrap();
    (user.id, tx.id)
}

fn mock_config() -> Config {
    let mut config = Config::default();
    config.parser = ParserKind::Ai;
    config.ai.backend = AiBackendKind::Mock;
    config
}

// ========== Argument Parsing Tests ==========

#[test]
fn test_parse_args_defaults() {
    let cli = Cli::try_parse_from(["tally", "transactions", "list"]).unwrap();
    assert_eq!(cli.db.to_str(), Some("tally.db"));
    assert!(!cli.no_encrypt);
    assert!(cli.config.is_none());
    assert!(matches!(
        cli.command,
        Commands::Transactions {
            action: Some(TransactionsAction::List { limit: 20, user: None })
        }
    ));
}

#[test]
fn test_parse_args_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "tally",
        "parse",
        "spent 50 on food",
        "--ai",
        "--db",
        "other.db",
        "--no-encrypt",
    ])
    .unwrap();
    assert_eq!(cli.db.to_str(), Some("other.db"));
    assert!(cli.no_encrypt);
    match cli.command {
        Commands::Parse { text, ai } => {
            assert_eq!(text, "spent 50 on food");
            assert!(ai);
        }
        _ => panic!("expected parse command"),
    }
}

#[test]
fn test_parse_args_serve_and_categories() {
    let cli = Cli::try_parse_from(["tally", "serve", "--port", "9000"]).unwrap();
    assert!(matches!(cli.command, Commands::Serve { port: 9000, .. }));

    let cli = Cli::try_parse_from([
        "tally",
        "categories",
        "add",
        "--user",
        "42",
        "Food",
        "--color",
        "#22c55e",
    ])
    .unwrap();
    match cli.command {
        Commands::Categories {
            action: CategoriesAction::Add { user, name, color },
        } => {
            assert_eq!(user, "42");
            assert_eq!(name, "Food");
            assert_eq!(color.as_deref(), Some("#22c55e"));
        }
        _ => panic!("expected categories add"),
    }
}

#[test]
fn test_parse_image_requires_file() {
    assert!(Cli::try_parse_from(["tally", "parse-image"]).is_err());
}

// ========== Core Command Tests ==========

#[test]
fn test_cmd_init_unencrypted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tally.db");

    assert!(commands::cmd_init(&path, true).is_ok());
    assert!(path.exists());

    let db = commands::open_db(&path, true).unwrap();
    assert_eq!(db.count_users().unwrap(), 0);
}

#[test]
fn test_cmd_status_without_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.db");
    assert!(commands::cmd_status(&path, &Config::default(), true).is_ok());
    assert!(!path.exists());
}

// ========== Transactions Command Tests ==========

#[test]
fn test_cmd_transactions_list() {
    let db = setup_test_db();
    assert!(commands::cmd_transactions_list(&db, 20, None).is_ok());

    create_test_transaction(&db, "100", 30.0);
    assert!(commands::cmd_transactions_list(&db, 20, None).is_ok());
    assert!(commands::cmd_transactions_list(&db, 20, Some("100")).is_ok());
    assert!(commands::cmd_transactions_list(&db, 20, Some("unknown")).is_ok());
}

#[test]
fn test_cmd_transactions_verify() {
    let db = setup_test_db();
    let (_, tx_id) = create_test_transaction(&db, "100", 30.0);

    assert!(commands::cmd_transactions_verify(&db, tx_id).is_ok());
    let tx = db.get_transaction(tx_id).unwrap().unwrap();
    assert_eq!(tx.status, TransactionStatus::Verified);

    // Verifying again is a no-op
    assert!(commands::cmd_transactions_verify(&db, tx_id).is_ok());
}

#[test]
fn test_cmd_transactions_verify_missing() {
    let db = setup_test_db();
    assert!(commands::cmd_transactions_verify(&db, 999).is_err());
}

#[test]
fn test_format_row() {
    let db = setup_test_db();
    let (_, tx_id) = create_test_transaction(&db, "100", 30.0);
    let tx = db.get_transaction(tx_id).unwrap().unwrap();

    let row = commands::format_row(&tx);
    assert!(row.starts_with(&format!("[{}] ", tx_id)));
    assert!(row.contains("₹30"));
    assert!(row.contains("tea"));
    assert!(row.contains("• Chai Point"));
}

// ========== Categories Command Tests ==========

#[test]
fn test_cmd_categories_add_and_list() {
    let db = setup_test_db();

    assert!(commands::cmd_categories_add(&db, "55", "Food", Some("#22c55e")).is_ok());
    let user = db.get_user_by_telegram_id("55").unwrap().unwrap();
    let category = db.find_category(user.id, "food").unwrap().unwrap();
    assert_eq!(category.name, "Food");
    assert_eq!(category.color, "#22c55e");

    // Same name in another case does not create a duplicate
    assert!(commands::cmd_categories_add(&db, "55", "FOOD", None).is_ok());
    assert_eq!(db.list_categories(user.id).unwrap().len(), 1);

    assert!(commands::cmd_categories_list(&db, "55").is_ok());
    assert!(commands::cmd_categories_list(&db, "unknown").is_ok());
}

#[test]
fn test_cmd_categories_add_empty_name() {
    let db = setup_test_db();
    assert!(commands::cmd_categories_add(&db, "55", "   ", None).is_err());
    assert!(db.get_user_by_telegram_id("55").unwrap().is_none());
}

#[test]
fn test_cmd_categories_remove() {
    let db = setup_test_db();
    commands::cmd_categories_add(&db, "55", "Travel", None).unwrap();
    let user = db.get_user_by_telegram_id("55").unwrap().unwrap();
    let category = db.find_category(user.id, "travel").unwrap().unwrap();

    assert!(commands::cmd_categories_remove(&db, category.id).is_ok());
    assert!(db.find_category(user.id, "travel").unwrap().is_none());
    assert!(commands::cmd_categories_remove(&db, 999).is_err());
}

// ========== Parse Command Tests ==========

#[tokio::test]
async fn test_parse_text_local() {
    let result = commands::parse_text(&Config::default(), "add 15rs as coffee", false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.amount, Some(15.0));
    assert_eq!(result.category.as_deref(), Some("coffee"));

    let none = commands::parse_text(&Config::default(), "hello there", false)
        .await
        .unwrap();
    assert!(none.is_none());
    assert!(commands::cmd_parse(&Config::default(), "hello there", false)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_parse_text_ai_mock() {
    let result = commands::parse_text(&mock_config(), "coffee 120", true)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.merchant.as_deref(), Some("Mock Store"));
}

#[tokio::test]
async fn test_parse_text_ai_without_key_fails() {
    let mut config = Config::default();
    config.ai.backend = AiBackendKind::Gemini;
    config.ai.api_key = None;
    assert!(commands::parse_text(&config, "coffee 120", true).await.is_err());
}

#[tokio::test]
async fn test_parse_image_mock() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("receipt.png");
    std::fs::write(&file, b"\x89PNG\r\n\x1a\nfake").unwrap();

    let result = commands::parse_image(&mock_config(), &file).await.unwrap();
    assert_eq!(result.amount, Some(-120.5));
    assert!(commands::cmd_parse_image(&mock_config(), &file).await.is_ok());
}

#[tokio::test]
async fn test_parse_image_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("nope.jpg");
    assert!(commands::parse_image(&mock_config(), &file).await.is_err());
}

// ========== Utility Tests ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a longer merchant name", 10), "a longe...");
    assert_eq!(truncate("₹₹₹₹₹₹", 5), "₹₹...");
}
