//! Tally Core Library
//!
//! Shared functionality for the Tally expense-logging bot:
//! - Rule-based and AI-backed transaction extraction
//! - Pluggable AI backends (Gemini, mock)
//! - Telegram Bot API client
//! - Ingestion pipeline from chat update to stored transaction
//! - Database access and migrations
//! - Layered configuration (file + environment)

pub mod ai;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod models;
pub mod parser;
pub mod store;
pub mod telegram;

/// Test utilities including mock Gemini and Telegram servers
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{AIBackend, AIClient, GeminiBackend, GenerateRequest, ImageInput, MockBackend, MockReply};
pub use config::{AiBackendKind, Config, ParserKind};
pub use db::Database;
pub use error::{Error, Result};
pub use ingest::{IngestOutcome, IngestPipeline};
pub use models::{
    Category, ExtractionResult, NewTransaction, Transaction, TransactionSource,
    TransactionStatus, User,
};
pub use parser::{AiParser, ParserClient, TextParser, TransactionParser};
pub use store::TransactionStore;
pub use telegram::{Messenger, TelegramClient, Update};
