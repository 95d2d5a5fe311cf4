//! Pluggable AI backend abstraction
//!
//! This module provides a backend-agnostic interface for multimodal
//! generation. Parsing and retry policy live one level up in
//! [`crate::parser`]; backends only move prompts and bytes.
//!
//! # Architecture
//!
//! - `AIBackend` trait: defines the interface for all AI backends
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `GeminiBackend`, `MockBackend`
//!
//! # Usage
//!
//! ```rust,ignore
//! let client = AIClient::from_config(&config.ai)?;
//! let text = client.generate(&GenerateRequest::text("hello")).await?;
//! ```

mod gemini;
mod mock;
pub mod parsing;
pub mod types;

pub use gemini::GeminiBackend;
pub use mock::{MockBackend, MockReply, DEFAULT_MOCK_RESPONSE};
pub use types::*;

use async_trait::async_trait;

use crate::config::{AiBackendKind, AiConfig};
use crate::error::Result;

/// Trait defining the interface for all AI backends
///
/// Backends should be Send + Sync to allow use across async tasks.
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Send one prompt (optionally with an image) and return the raw model text
    ///
    /// Quota refusals must surface as errors for which
    /// [`crate::Error::is_rate_limited`] is true.
    async fn generate(&self, request: &GenerateRequest) -> Result<String>;

    /// Check if the backend is available
    async fn health_check(&self) -> bool;

    /// Get the model name (for logging)
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete AI client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum AIClient {
    /// Google Gemini `generateContent`
    Gemini(GeminiBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AIClient {
    /// Create an AI client from config
    ///
    /// The gemini backend needs an API key; a missing key is a configuration
    /// error rather than a silent fallback.
    pub fn from_config(config: &AiConfig) -> Result<Self> {
        match config.backend {
            AiBackendKind::Gemini => GeminiBackend::from_config(config).map(AIClient::Gemini),
            AiBackendKind::Mock => Ok(AIClient::Mock(MockBackend::new())),
        }
    }

    /// Create a Gemini backend directly
    pub fn gemini(base_url: &str, model: &str, api_key: &str) -> Self {
        AIClient::Gemini(GeminiBackend::new(base_url, model, api_key))
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }
}

// Implement AIBackend for AIClient by delegating to the inner backend
#[async_trait]
impl AIBackend for AIClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        match self {
            AIClient::Gemini(b) => b.generate(request).await,
            AIClient::Mock(b) => b.generate(request).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::Gemini(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::Gemini(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::Gemini(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}
