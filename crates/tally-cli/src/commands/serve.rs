//! Server command implementation

use std::path::Path;

use anyhow::Result;
use tally_core::Config;

use super::open_db;

pub async fn cmd_serve(
    db_path: &Path,
    config: &Config,
    host: &str,
    port: u16,
    no_encrypt: bool,
) -> Result<()> {
    println!("🚀 Starting Tally webhook server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);
    println!("   Webhook: POST /webhook/telegram");
    println!("   Parser: {}", config.parser);

    if config.telegram.webhook_secret.is_some() {
        println!("   🔐 Webhook secret: configured");
    } else {
        println!("   ⚠️  Webhook secret not set - set TALLY_WEBHOOK_SECRET before exposing the server");
    }
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path, no_encrypt)?;
    tally_server::serve(config, db, host, port).await?;

    Ok(())
}
