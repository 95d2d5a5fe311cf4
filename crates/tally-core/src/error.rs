//! Error types for Tally

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider refused the request because of quota exhaustion.
    /// Carries the provider's message so a retry hint can be read from it.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Messaging error: {0}")]
    Messaging(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Whether this error means the AI provider is rate limiting us
    ///
    /// Besides the dedicated variant, provider errors that only surface as
    /// text are classified by the markers the quota responses carry.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Error::RateLimited(_) => true,
            Error::Provider(msg) => msg.contains("429") || msg.contains("RESOURCE_EXHAUSTED"),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
