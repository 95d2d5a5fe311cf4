//! Mock backend for testing
//!
//! Replies come from a script queue; once it is drained every call gets the
//! canned receipt JSON. Useful for unit tests and for running the bot
//! without a Gemini key.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::types::GenerateRequest;
use super::AIBackend;

/// Reply used once the script is empty
pub const DEFAULT_MOCK_RESPONSE: &str = r#"{"merchant": "Mock Store", "amount": -120.5, "currency": "INR", "date": "2024-01-15", "category": "Food"}"#;

/// One scripted outcome of `generate`
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Raw model text
    Text(String),
    /// Provider quota error carrying this message
    RateLimited(String),
    /// Any other provider error
    Fail(String),
}

/// Mock AI backend for testing
#[derive(Clone)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    model: String,
    script: Arc<Mutex<VecDeque<MockReply>>>,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<GenerateRequest>>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self {
            healthy: true,
            model: "mock".to_string(),
            script: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    /// Create a mock that plays back `replies` in order
    pub fn scripted(replies: impl IntoIterator<Item = MockReply>) -> Self {
        let mock = Self::new();
        mock.push_all(replies);
        mock
    }

    /// Queue more replies (shared with all clones)
    pub fn push_all(&self, replies: impl IntoIterator<Item = MockReply>) {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        script.extend(replies);
    }

    /// Number of `generate` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, oldest first
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        match next {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::RateLimited(msg)) => Err(Error::RateLimited(msg)),
            Some(MockReply::Fail(msg)) => Err(Error::Provider(msg)),
            None => Ok(DEFAULT_MOCK_RESPONSE.to_string()),
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
