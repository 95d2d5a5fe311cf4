//! Transaction command implementations

use anyhow::Result;
use tally_core::db::Database;
use tally_core::ingest::{currency_symbol, format_amount};
use tally_core::{Transaction, TransactionStatus};

use super::truncate;

/// One listing row: id, date, amount, category, merchant, status
pub fn format_row(tx: &Transaction) -> String {
    let date = tx
        .occurred_on
        .unwrap_or_else(|| tx.created_at.date_naive());
    let amount = format!("{}{}", currency_symbol(&tx.currency), format_amount(tx.amount));
    let marker = match tx.status {
        TransactionStatus::Pending => "•",
        TransactionStatus::Verified => "✓",
    };
    format!(
        "[{}] {} │ {:>12} │ {:<15} │ {} {}",
        tx.id,
        date,
        amount,
        truncate(tx.category.as_deref().unwrap_or("-"), 15),
        marker,
        truncate(tx.merchant.as_deref().unwrap_or(""), 30)
    )
}

pub fn cmd_transactions_list(db: &Database, limit: i64, user: Option<&str>) -> Result<()> {
    let user_id = match user {
        Some(telegram_id) => match db.get_user_by_telegram_id(telegram_id)? {
            Some(u) => Some(u.id),
            None => {
                println!("No user with Telegram id {}.", telegram_id);
                return Ok(());
            }
        },
        None => None,
    };

    let transactions = db.list_transactions(user_id, limit, 0)?;

    if transactions.is_empty() {
        println!("No transactions yet. Send the bot a message like 'spent 50 on food'.");
        return Ok(());
    }

    println!();
    println!("📝 Recent Transactions (• pending, ✓ verified)");
    println!("   ─────────────────────────────────────────────────────────────");

    for tx in &transactions {
        println!("   {}", format_row(tx));
    }

    Ok(())
}

pub fn cmd_transactions_verify(db: &Database, id: i64) -> Result<()> {
    let tx = db
        .get_transaction(id)?
        .ok_or_else(|| anyhow::anyhow!("Transaction {} not found", id))?;

    if tx.status == TransactionStatus::Verified {
        println!("Transaction {} is already verified.", id);
        return Ok(());
    }

    db.verify_transaction(id)?;

    println!("✅ Verified transaction {}:", id);
    println!("   {}", format_row(&tx));

    Ok(())
}
