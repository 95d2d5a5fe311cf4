//! Telegram Bot API client
//!
//! The ingestion pipeline talks to chat through the [`Messenger`] trait;
//! [`TelegramClient`] is the production implementation. Every Bot API call
//! carries a timeout (`telegram.request_timeout_secs`).

pub mod types;

pub use types::{Chat, Document, Message, PhotoSize, TelegramUser, Update};

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error};

use crate::config::{TelegramConfig, DEFAULT_TELEGRAM_TIMEOUT_SECS};
use crate::error::{Error, Result};

use types::{ApiResponse, File, SendMessage};

/// Outbound chat operations
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a plain-text message to a chat
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;

    /// Fetch the bytes of an uploaded file
    ///
    /// Any failure is logged and reported as `None`.
    async fn download_file(&self, file_id: &str) -> Option<Vec<u8>>;
}

/// Bot API client over HTTPS
#[derive(Clone)]
pub struct TelegramClient {
    http_client: Client,
    api_url: String,
    token: String,
    timeout: Duration,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str) -> Self {
        Self {
            http_client: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            timeout: Duration::from_secs(DEFAULT_TELEGRAM_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build from config; the bot token is required
    pub fn from_config(config: &TelegramConfig) -> Result<Self> {
        let token = config
            .bot_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::Config("TELEGRAM_BOT_TOKEN is not set".into()))?;
        Ok(Self::new(&config.api_url, token)
            .with_timeout(Duration::from_secs(config.request_timeout_secs)))
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_url, self.token, file_path)
    }

    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>> {
        let info: ApiResponse<File> = self
            .http_client
            .get(self.method_url("getFile"))
            .query(&[("file_id", file_id)])
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !info.ok {
            return Err(Error::Messaging(format!(
                "getFile failed: {}",
                info.description.unwrap_or_default()
            )));
        }
        let file_path = info
            .result
            .and_then(|f| f.file_path)
            .ok_or_else(|| Error::Messaging("getFile returned no file_path".into()))?;

        let bytes = self
            .http_client
            .get(self.file_url(&file_path))
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        debug!(file_id, size = bytes.len(), "Downloaded Telegram file");
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let response = self
            .http_client
            .post(self.method_url("sendMessage"))
            .timeout(self.timeout)
            .json(&SendMessage { chat_id, text })
            .send()
            .await?;

        let status = response.status();
        let body: ApiResponse<serde_json::Value> = response.json().await.map_err(|e| {
            Error::Messaging(format!("sendMessage returned {} with unreadable body: {}", status, e))
        })?;

        if !body.ok {
            return Err(Error::Messaging(format!(
                "sendMessage failed ({}): {}",
                status,
                body.description.unwrap_or_default()
            )));
        }
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Option<Vec<u8>> {
        match self.fetch_file(file_id).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                error!(file_id, error = %e, "Failed to download file from Telegram");
                None
            }
        }
    }
}
