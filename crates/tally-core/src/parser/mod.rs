//! Transaction extraction
//!
//! - [`TextParser`]: rule-based, no I/O, text only
//! - [`AiParser`]: multimodal provider with a retry-once rate-limit policy
//!
//! [`ParserClient`] is the image-capable parser picked from config at
//! startup. It is cheap to clone and carries no per-request state. Plain
//! text always goes through [`TextParser`].

mod ai;
mod retry;
mod text;

pub use ai::AiParser;
pub use retry::retry_delay;
pub use text::TextParser;

use async_trait::async_trait;

use crate::config::{Config, ParserKind};
use crate::error::{Error, Result};
use crate::models::ExtractionResult;

/// Capability shared by every extractor
#[async_trait]
pub trait TransactionParser: Send + Sync {
    /// Extract a transaction from image bytes
    async fn parse_image(&self, image: &[u8]) -> Result<ExtractionResult>;

    /// Extract a transaction from a chat message
    ///
    /// A message with nothing recognizable yields the default result.
    async fn parse_text(&self, text: &str) -> Result<ExtractionResult>;
}

#[async_trait]
impl TransactionParser for AiParser {
    async fn parse_image(&self, image: &[u8]) -> Result<ExtractionResult> {
        Ok(AiParser::parse_image(self, image).await)
    }

    async fn parse_text(&self, text: &str) -> Result<ExtractionResult> {
        Ok(AiParser::parse_text(self, text).await)
    }
}

/// The parser selected for this process
#[derive(Clone)]
pub enum ParserClient {
    Ai(AiParser),
}

impl ParserClient {
    /// Build the configured parser
    ///
    /// Fails for `local`, which has no image reader, and when the AI
    /// backend cannot be built (for example, no API key).
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = match config.parser {
            ParserKind::Local => {
                return Err(Error::Config(
                    "local image parser not implemented; set parser = \"ai\"".into(),
                ))
            }
            ParserKind::Ai => ParserClient::Ai(AiParser::from_config(&config.ai)?),
        };
        tracing::info!(parser = %client.kind(), "Parser selected");
        Ok(client)
    }

    pub fn kind(&self) -> ParserKind {
        match self {
            ParserClient::Ai(_) => ParserKind::Ai,
        }
    }
}

// Delegate to the selected parser
#[async_trait]
impl TransactionParser for ParserClient {
    async fn parse_image(&self, image: &[u8]) -> Result<ExtractionResult> {
        match self {
            ParserClient::Ai(p) => TransactionParser::parse_image(p, image).await,
        }
    }

    async fn parse_text(&self, text: &str) -> Result<ExtractionResult> {
        match self {
            ParserClient::Ai(p) => TransactionParser::parse_text(p, text).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AiBackendKind;

    #[test]
    fn test_select_local_fails_at_construction() {
        let config = Config {
            parser: ParserKind::Local,
            ..Default::default()
        };
        let err = ParserClient::from_config(&config).err().unwrap();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("local")));
    }

    #[test]
    fn test_select_ai_without_key_fails() {
        let config = Config::default();
        assert!(matches!(
            ParserClient::from_config(&config),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_select_ai_mock() {
        let mut config = Config::default();
        config.ai.backend = AiBackendKind::Mock;
        let client = ParserClient::from_config(&config).unwrap();
        assert_eq!(client.kind(), ParserKind::Ai);
    }

    #[tokio::test]
    async fn test_ai_parse_through_client() {
        let mut config = Config::default();
        config.ai.backend = AiBackendKind::Mock;
        let client = ParserClient::from_config(&config).unwrap();

        let result = client.parse_image(b"img").await.unwrap();
        assert_eq!(result.merchant.as_deref(), Some("Mock Store"));
        assert_eq!(result.amount, Some(-120.5));

        let result = client.parse_text("coffee 120").await.unwrap();
        assert_eq!(result.merchant.as_deref(), Some("Mock Store"));
    }
}
