//! Category command implementations

use anyhow::{Context, Result};
use tally_core::db::Database;

pub fn cmd_categories_list(db: &Database, telegram_id: &str) -> Result<()> {
    let Some(user) = db.get_user_by_telegram_id(telegram_id)? else {
        println!("No user with Telegram id {}.", telegram_id);
        return Ok(());
    };

    let categories = db.list_categories(user.id)?;
    let active: Vec<_> = categories.iter().filter(|c| c.is_active).collect();

    if active.is_empty() {
        println!("No categories. Add one with:");
        println!("  tally categories add --user {} Food", telegram_id);
        return Ok(());
    }

    println!();
    println!("🏷️  Categories for {}", telegram_id);
    println!("   ─────────────────────────────");
    for category in active {
        println!("   [{}] {} ({})", category.id, category.name, category.color);
    }

    Ok(())
}

pub fn cmd_categories_add(
    db: &Database,
    telegram_id: &str,
    name: &str,
    color: Option<&str>,
) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("Category name cannot be empty");
    }

    let user = db
        .find_or_create_user(telegram_id)
        .context("Failed to resolve user")?;

    if let Some(existing) = db.find_category(user.id, name)? {
        println!(
            "Category '{}' already exists (id {}).",
            existing.name, existing.id
        );
        return Ok(());
    }

    let id = db.create_category(user.id, name, color)?;
    println!("✅ Added category '{}' (id {}) for {}", name, id, telegram_id);

    Ok(())
}

pub fn cmd_categories_remove(db: &Database, id: i64) -> Result<()> {
    db.deactivate_category(id)
        .with_context(|| format!("Failed to remove category {}", id))?;
    println!("✅ Removed category {}", id);
    Ok(())
}
