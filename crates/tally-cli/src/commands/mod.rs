//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db)
//! - `categories` - Per-user category management
//! - `parse` - Try the text and image parsers without the bot
//! - `serve` - Webhook server command
//! - `status` - Database and parser status
//! - `transactions` - Transaction commands (list, verify)

pub mod categories;
pub mod core;
pub mod parse;
pub mod serve;
pub mod status;
pub mod transactions;

// Re-export command functions for main.rs
pub use categories::*;
pub use core::*;
pub use parse::*;
pub use serve::*;
pub use status::*;
pub use transactions::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
