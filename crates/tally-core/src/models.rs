//! Data models for Tally

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Currency assumed whenever an extractor has nothing better
pub const DEFAULT_CURRENCY: &str = "INR";

/// Category assigned by the text extractor when the message names none
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Structured guess produced by either extractor
///
/// Amount sign: negative = expense, positive = income. The text extractor
/// only ever emits positive magnitudes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub merchant: Option<String>,
    pub amount: Option<f64>,
    pub currency: String,
    /// ISO date (YYYY-MM-DD) when the source carries one
    pub date: Option<String>,
    pub category: Option<String>,
    /// Provider refused us twice; every other field is at its default
    #[serde(default)]
    pub rate_limited: bool,
}

impl Default for ExtractionResult {
    fn default() -> Self {
        Self {
            merchant: None,
            amount: None,
            currency: DEFAULT_CURRENCY.to_string(),
            date: None,
            category: None,
            rate_limited: false,
        }
    }
}

impl ExtractionResult {
    /// The "try again later" sentinel
    pub fn rate_limited() -> Self {
        Self {
            rate_limited: true,
            ..Self::default()
        }
    }

    /// Amount that can be recorded (present and non-zero)
    pub fn usable_amount(&self) -> Option<f64> {
        self.amount.filter(|a| *a != 0.0 && a.is_finite())
    }

    /// Date parsed as a calendar date, if it is a valid ISO date
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        self.date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
    }
}

/// Lifecycle status of an ingested transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    /// Created from a chat message, not yet reviewed
    #[default]
    Pending,
    /// Confirmed by the user elsewhere
    Verified,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Verified => "VERIFIED",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "VERIFIED" => Ok(Self::Verified),
            _ => Err(Error::InvalidData(format!("Unknown transaction status: {}", s))),
        }
    }
}

/// How a transaction entered the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionSource {
    /// Photo or image document (receipt, payment screenshot)
    Image,
    /// Free-form chat text
    Text,
}

impl TransactionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Text => "text",
        }
    }
}

impl FromStr for TransactionSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(Self::Image),
            "text" => Ok(Self::Text),
            _ => Err(Error::InvalidData(format!("Unknown transaction source: {}", s))),
        }
    }
}

/// A chat user, keyed by their Telegram id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub telegram_id: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A user-defined spending category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub color: String,
    pub is_active: bool,
}

/// A stored transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    /// Negative = expense, positive = income
    pub amount: f64,
    pub currency: String,
    pub merchant: Option<String>,
    /// Category name as extracted
    pub category: Option<String>,
    /// Linked category row, when the user has one with that name
    pub category_id: Option<i64>,
    /// Date printed on the receipt, if any
    pub occurred_on: Option<NaiveDate>,
    pub source: TransactionSource,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

/// A transaction to be created (before DB insertion)
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: i64,
    pub amount: f64,
    pub currency: String,
    pub merchant: Option<String>,
    pub category: Option<String>,
    pub category_id: Option<i64>,
    pub occurred_on: Option<NaiveDate>,
    pub source: TransactionSource,
    pub status: TransactionStatus,
}
