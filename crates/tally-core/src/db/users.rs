//! User operations

use rusqlite::{params, OptionalExtension};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::User;

const USER_COLUMNS: &str = "id, telegram_id, is_active, created_at";

impl Database {
    /// Get the user for a Telegram id, creating it on first contact
    ///
    /// Safe under concurrent webhooks: the insert is a no-op when another
    /// request created the row first.
    pub fn find_or_create_user(&self, telegram_id: &str) -> Result<User> {
        let conn = self.conn()?;

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO users (telegram_id) VALUES (?)",
            params![telegram_id],
        )?;
        if inserted > 0 {
            tracing::info!(telegram_id, "Created user");
        }

        conn.query_row(
            &format!("SELECT {} FROM users WHERE telegram_id = ?", USER_COLUMNS),
            params![telegram_id],
            Self::row_to_user,
        )
        .map_err(Error::from)
    }

    /// Look up a user by Telegram id
    pub fn get_user_by_telegram_id(&self, telegram_id: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE telegram_id = ?", USER_COLUMNS),
                params![telegram_id],
                Self::row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Count all users
    pub fn count_users(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }

    fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
        let created_at_str: String = row.get(3)?;
        Ok(User {
            id: row.get(0)?,
            telegram_id: row.get(1)?,
            is_active: row.get(2)?,
            created_at: parse_datetime(&created_at_str),
        })
    }
}
