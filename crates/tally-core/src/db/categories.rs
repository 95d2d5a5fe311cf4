//! Category operations

use rusqlite::{params, OptionalExtension};

use super::Database;
use crate::error::{Error, Result};
use crate::models::Category;

/// Color given to categories created without one
pub const DEFAULT_CATEGORY_COLOR: &str = "#6366f1";

impl Database {
    /// Create a category for a user
    pub fn create_category(&self, user_id: i64, name: &str, color: Option<&str>) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO categories (user_id, name, color) VALUES (?, ?, ?)",
            params![user_id, name.trim(), color.unwrap_or(DEFAULT_CATEGORY_COLOR)],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Find a user's active category by name, ignoring case
    ///
    /// With several matches the oldest wins.
    pub fn find_category(&self, user_id: i64, name: &str) -> Result<Option<Category>> {
        let conn = self.conn()?;
        let category = conn
            .query_row(
                r#"
                SELECT id, user_id, name, color, is_active
                FROM categories
                WHERE user_id = ? AND is_active = 1 AND LOWER(name) = LOWER(?)
                ORDER BY id
                LIMIT 1
                "#,
                params![user_id, name.trim()],
                Self::row_to_category,
            )
            .optional()?;
        Ok(category)
    }

    /// List a user's categories
    pub fn list_categories(&self, user_id: i64) -> Result<Vec<Category>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, name, color, is_active FROM categories WHERE user_id = ? ORDER BY name",
        )?;
        let categories = stmt
            .query_map(params![user_id], Self::row_to_category)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    /// Hide a category from matching without deleting it
    pub fn deactivate_category(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE categories SET is_active = 0 WHERE id = ?",
            params![id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("category {}", id)));
        }
        Ok(())
    }

    fn row_to_category(row: &rusqlite::Row) -> rusqlite::Result<Category> {
        Ok(Category {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            color: row.get(3)?,
            is_active: row.get(4)?,
        })
    }
}
