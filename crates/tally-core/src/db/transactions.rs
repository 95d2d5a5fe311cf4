//! Transaction operations

use rusqlite::{params, OptionalExtension};

use super::{parse_date, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{NewTransaction, Transaction, TransactionSource, TransactionStatus};

const TRANSACTION_COLUMNS: &str = "id, user_id, amount, currency, merchant, category, category_id, occurred_on, source, status, created_at";

impl Database {
    /// Insert a transaction and return the stored row
    pub fn create_transaction(&self, tx: &NewTransaction) -> Result<Transaction> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO transactions (user_id, amount, currency, merchant, category, category_id, occurred_on, source, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                tx.user_id,
                tx.amount,
                tx.currency,
                tx.merchant,
                tx.category,
                tx.category_id,
                tx.occurred_on.map(|d| d.to_string()),
                tx.source.as_str(),
                tx.status.as_str(),
            ],
        )?;
        let id = conn.last_insert_rowid();

        conn.query_row(
            &format!("SELECT {} FROM transactions WHERE id = ?", TRANSACTION_COLUMNS),
            params![id],
            Self::row_to_transaction,
        )
        .map_err(Error::from)
    }

    /// Get a transaction by ID
    pub fn get_transaction(&self, id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let tx = conn
            .query_row(
                &format!("SELECT {} FROM transactions WHERE id = ?", TRANSACTION_COLUMNS),
                params![id],
                Self::row_to_transaction,
            )
            .optional()?;
        Ok(tx)
    }

    /// List transactions, newest first, optionally for one user
    pub fn list_transactions(
        &self,
        user_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {}
            FROM transactions
            WHERE (?1 IS NULL OR user_id = ?1)
            ORDER BY created_at DESC, id DESC
            LIMIT ?2 OFFSET ?3
            "#,
            TRANSACTION_COLUMNS
        ))?;

        let transactions = stmt
            .query_map(params![user_id, limit, offset], Self::row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    /// Count transactions
    pub fn count_transactions(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Mark a transaction as confirmed by the user
    pub fn verify_transaction(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE transactions SET status = ? WHERE id = ?",
            params![TransactionStatus::Verified.as_str(), id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("transaction {}", id)));
        }
        Ok(())
    }

    pub(crate) fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
        let occurred_on: Option<String> = row.get(7)?;
        let source_str: String = row.get(8)?;
        let status_str: String = row.get(9)?;
        let created_at_str: String = row.get(10)?;
        Ok(Transaction {
            id: row.get(0)?,
            user_id: row.get(1)?,
            amount: row.get(2)?,
            currency: row.get(3)?,
            merchant: row.get(4)?,
            category: row.get(5)?,
            category_id: row.get(6)?,
            occurred_on: parse_date(occurred_on),
            source: source_str.parse().unwrap_or(TransactionSource::Text),
            status: status_str.parse().unwrap_or_default(),
            created_at: parse_datetime(&created_at_str),
        })
    }
}
