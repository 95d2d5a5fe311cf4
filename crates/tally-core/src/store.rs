//! Persistence contract used by the ingestion pipeline
//!
//! The pipeline only needs three operations. [`Database`] implements them;
//! tests substitute failing or recording stores.

use crate::db::Database;
use crate::error::Result;
use crate::models::{Category, NewTransaction, Transaction, User};

pub trait TransactionStore: Send + Sync {
    /// Resolve the user for a chat sender id, creating it if needed
    fn find_or_create_user(&self, telegram_id: &str) -> Result<User>;

    /// Same-named active category of this user, matched without case
    fn find_category(&self, user_id: i64, name: &str) -> Result<Option<Category>>;

    fn create_transaction(&self, tx: &NewTransaction) -> Result<Transaction>;
}

impl TransactionStore for Database {
    fn find_or_create_user(&self, telegram_id: &str) -> Result<User> {
        Database::find_or_create_user(self, telegram_id)
    }

    fn find_category(&self, user_id: i64, name: &str) -> Result<Option<Category>> {
        Database::find_category(self, user_id, name)
    }

    fn create_transaction(&self, tx: &NewTransaction) -> Result<Transaction> {
        Database::create_transaction(self, tx)
    }
}
