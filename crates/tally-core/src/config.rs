//! Runtime configuration
//!
//! Config is resolved in two layers:
//! 1. An optional TOML file (explicit path, or `<config dir>/tally/config.toml`)
//! 2. Environment variable overrides
//!
//! ## Environment variables
//!
//! - `TALLY_PARSER`: `ai` (default); `local` is recognized but has no image
//!   reader, so building the parser fails
//! - `TALLY_AI_BACKEND`: `gemini` or `mock` (default: gemini)
//! - `GEMINI_API_KEY`: Gemini credential (required for the gemini backend)
//! - `GEMINI_MODEL`: model name (default: gemini-2.0-flash)
//! - `GEMINI_BASE_URL`: API root (default: https://generativelanguage.googleapis.com)
//! - `TALLY_RETRY_DELAY_MAX`: rate-limit backoff ceiling in seconds (default: 60)
//! - `TELEGRAM_BOT_TOKEN`: bot token
//! - `TELEGRAM_API_URL`: Bot API root (default: https://api.telegram.org)
//! - `TALLY_WEBHOOK_SECRET`: expected `X-Telegram-Bot-Api-Secret-Token` value
//!
//! ## Example file
//!
//! ```toml
//! parser = "ai"
//!
//! [ai]
//! backend = "gemini"
//! model = "gemini-2.0-flash"
//! retry_delay_max_secs = 30
//! request_timeout_secs = 60
//!
//! [telegram]
//! webhook_secret = "change-me"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Upper bound for the rate-limit backoff, in seconds
pub const DEFAULT_RETRY_DELAY_MAX_SECS: u64 = 60;

/// Per-request timeout for Gemini calls, in seconds
pub const DEFAULT_AI_TIMEOUT_SECS: u64 = 60;

/// Per-request timeout for Bot API calls, in seconds
pub const DEFAULT_TELEGRAM_TIMEOUT_SECS: u64 = 30;

/// Which parser implementation the process uses
///
/// Chosen once at startup and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserKind {
    /// Rule-based extraction only; rejected when the parser is built
    Local,
    /// AI provider extraction
    #[default]
    #[serde(alias = "gemini")]
    Ai,
}

impl ParserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Ai => "ai",
        }
    }
}

impl fmt::Display for ParserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParserKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "ai" | "gemini" => Ok(Self::Ai),
            other => Err(Error::Config(format!(
                "Unknown parser kind '{}' (expected 'local' or 'ai')",
                other
            ))),
        }
    }
}

/// Which AI backend serves the `Ai` parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiBackendKind {
    #[default]
    Gemini,
    /// Canned responses, for development without a provider account
    Mock,
}

impl FromStr for AiBackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "mock" => Ok(Self::Mock),
            other => Err(Error::Config(format!(
                "Unknown AI backend '{}' (expected 'gemini' or 'mock')",
                other
            ))),
        }
    }
}

/// AI provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub backend: AiBackendKind,
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub retry_delay_max_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            backend: AiBackendKind::default(),
            api_key: None,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            retry_delay_max_secs: DEFAULT_RETRY_DELAY_MAX_SECS,
            request_timeout_secs: DEFAULT_AI_TIMEOUT_SECS,
        }
    }
}

/// Telegram Bot API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub api_url: String,
    pub webhook_secret: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_url: DEFAULT_TELEGRAM_API_URL.to_string(),
            webhook_secret: None,
            request_timeout_secs: DEFAULT_TELEGRAM_TIMEOUT_SECS,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub parser: ParserKind,
    pub ai: AiConfig,
    pub telegram: TelegramConfig,
}

impl Config {
    /// Load config from file (if any) and apply environment overrides
    ///
    /// An explicit path must exist. Without one, the default location is
    /// used when present and built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match Self::default_path() {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Default config file location (`~/.config/tally/config.toml` on Linux)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("tally").join("config.toml"))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply overrides using `lookup` to read variables
    ///
    /// Empty values are treated as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(kind) = var("TALLY_PARSER") {
            self.parser = kind.parse()?;
        }
        if let Some(backend) = var("TALLY_AI_BACKEND") {
            self.ai.backend = backend.parse()?;
        }
        if let Some(key) = var("GEMINI_API_KEY") {
            self.ai.api_key = Some(key);
        }
        if let Some(model) = var("GEMINI_MODEL") {
            self.ai.model = model;
        }
        if let Some(url) = var("GEMINI_BASE_URL") {
            self.ai.base_url = url;
        }
        if let Some(secs) = var("TALLY_RETRY_DELAY_MAX") {
            self.ai.retry_delay_max_secs = secs.trim().parse().map_err(|_| {
                Error::Config(format!("TALLY_RETRY_DELAY_MAX must be whole seconds, got '{}'", secs))
            })?;
        }
        if let Some(token) = var("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(token);
        }
        if let Some(url) = var("TELEGRAM_API_URL") {
            self.telegram.api_url = url;
        }
        if let Some(secret) = var("TALLY_WEBHOOK_SECRET") {
            self.telegram.webhook_secret = Some(secret);
        }
        Ok(())
    }

    /// Ceiling for the rate-limit backoff
    pub fn retry_delay_max(&self) -> Duration {
        Duration::from_secs(self.ai.retry_delay_max_secs)
    }
}
