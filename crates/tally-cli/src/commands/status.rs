//! Status command implementation

use std::path::Path;

use anyhow::Result;
use tally_core::db::DB_KEY_ENV;
use tally_core::{AiBackendKind, Config, ParserKind};

use super::open_db;

pub fn cmd_status(db_path: &Path, config: &Config, no_encrypt: bool) -> Result<()> {
    use std::fs;

    println!();
    println!("📊 Tally Status");
    println!("   ─────────────────────────────────────────────────────────────");

    // Database path
    println!("   Database: {}", db_path.display());

    // Check if database file exists and get size
    if db_path.exists() {
        if let Ok(metadata) = fs::metadata(db_path) {
            let size_kb = metadata.len() as f64 / 1024.0;
            if size_kb < 1024.0 {
                println!("   Size: {:.1} KB", size_kb);
            } else {
                println!("   Size: {:.1} MB", size_kb / 1024.0);
            }
        }
    } else {
        println!("   Size: (database not initialized)");
    }

    // Check encryption status
    let has_key = std::env::var(DB_KEY_ENV).is_ok();
    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else if has_key {
        println!("   🔒 Encryption: ENABLED ({}=***)", DB_KEY_ENV);
    } else {
        println!("   ❌ Encryption: REQUIRED but {} not set", DB_KEY_ENV);
    }

    // Try to open the database and show stats
    if db_path.exists() {
        match open_db(db_path, no_encrypt) {
            Ok(db) => {
                println!();
                if let Ok(users) = db.count_users() {
                    println!("   Users: {}", users);
                }
                if let Ok(transactions) = db.count_transactions() {
                    println!("   Transactions: {}", transactions);
                }
            }
            Err(e) => {
                println!();
                println!("   ❌ Error opening database: {}", e);
                if !no_encrypt && !has_key {
                    println!("      Set {} or use --no-encrypt", DB_KEY_ENV);
                }
            }
        }
    }

    println!();
    print_parser_status(config);

    Ok(())
}

fn print_parser_status(config: &Config) {
    match config.parser {
        ParserKind::Local => println!("   Parser: local (❌ not implemented; choose ai to serve)"),
        ParserKind::Ai => match config.ai.backend {
            AiBackendKind::Gemini => {
                let key = if config.ai.api_key.is_some() {
                    "key set"
                } else {
                    "❌ GEMINI_API_KEY not set"
                };
                println!("   Parser: ai (gemini, model {}, {})", config.ai.model, key);
            }
            AiBackendKind::Mock => println!("   Parser: ai (mock backend)"),
        },
    }
    println!(
        "   Rate-limit backoff: up to {}s",
        config.retry_delay_max().as_secs()
    );

    if config.telegram.bot_token.is_some() {
        println!("   Telegram: bot token set ({})", config.telegram.api_url);
    } else {
        println!("   Telegram: ❌ TELEGRAM_BOT_TOKEN not set");
    }
    if config.telegram.webhook_secret.is_none() {
        println!("   ⚠️  Webhook secret not set (TALLY_WEBHOOK_SECRET)");
    }
}
