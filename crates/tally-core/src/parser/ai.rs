//! AI-backed extraction with a retry-once rate-limit policy

use std::time::Duration;

use tracing::{error, info, warn};

use crate::ai::parsing::parse_extraction;
use crate::ai::{AIBackend, AIClient, GenerateRequest, ImageInput};
use crate::config::AiConfig;
use crate::error::Result;
use crate::models::ExtractionResult;

use super::retry::retry_delay;

/// Total provider attempts per extraction (first try plus one retry)
const MAX_ATTEMPTS: usize = 2;

const IMAGE_PROMPT: &str = r#"You are reading a photo of a receipt, invoice or payment screenshot.
Reply with a single JSON object and nothing else (no Markdown, no code fences):
{"merchant": string or null, "amount": number or null, "currency": string or null, "date": "YYYY-MM-DD" or null, "category": string or null}

Rules:
- Use null for anything you cannot determine.
- amount is a number. Money going out (payments, purchases, bills) is NEGATIVE, e.g. -50. Money coming in (refunds, income) is POSITIVE. Receipts and invoices are almost always expenses.
- currency is an ISO code such as INR or USD; assume INR if none is shown.
- date uses YYYY-MM-DD.
- category is one word or a short phrase guessed from the merchant, e.g. Food, Transport, Shopping, Coffee."#;

const TEXT_PROMPT: &str = r#"The user is logging a money transaction in a short chat message.
Reply with a single JSON object and nothing else (no Markdown, no code fences):
{"merchant": string or null, "amount": number or null, "currency": string or null, "date": "YYYY-MM-DD" or null, "category": string or null}

Rules:
- The sign of amount carries the direction of money:
  - NEGATIVE for spending words: spent, paid, expense, bought, cost, withdrew (e.g. -50).
  - POSITIVE for incoming words: add, received, income, salary, refund, credited (e.g. 5000).
- When the direction is unclear, treat it as an expense (negative).
- Use null for amount if none can be inferred.
- currency is an ISO code; INR unless the message says otherwise.
- category is one word or a short phrase (Food, Transport, Salary, ...) or null.
- date uses YYYY-MM-DD when the message mentions one, else null."#;

/// Outcome of the retry loop
#[derive(Debug)]
enum Attempt {
    Reply(String),
    RateLimited,
}

/// Extractor backed by an AI provider
#[derive(Clone)]
pub struct AiParser {
    client: AIClient,
    retry_delay_max: Duration,
}

impl AiParser {
    pub fn new(client: AIClient, retry_delay_max: Duration) -> Self {
        Self {
            client,
            retry_delay_max,
        }
    }

    /// Build the backend from config; fails fast on a missing credential
    pub fn from_config(config: &AiConfig) -> Result<Self> {
        let client = AIClient::from_config(config)?;
        Ok(Self::new(
            client,
            Duration::from_secs(config.retry_delay_max_secs),
        ))
    }

    pub fn client(&self) -> &AIClient {
        &self.client
    }

    /// Extract a transaction from an image
    ///
    /// Never fails: provider and parse errors are logged and produce the
    /// default result.
    pub async fn parse_image(&self, image: &[u8]) -> ExtractionResult {
        let request = GenerateRequest::with_image(IMAGE_PROMPT, ImageInput::from_bytes(image.to_vec()));
        self.extract(&request, "image").await
    }

    /// Extract a transaction from free text, with a signed amount
    ///
    /// Blank input returns the default without contacting the provider.
    pub async fn parse_text(&self, text: &str) -> ExtractionResult {
        let text = text.trim();
        if text.is_empty() {
            return ExtractionResult::default();
        }
        let request = GenerateRequest::text(format!("{}\n\nUser message: {}", TEXT_PROMPT, text));
        self.extract(&request, "text").await
    }

    async fn extract(&self, request: &GenerateRequest, kind: &'static str) -> ExtractionResult {
        let reply = match self.generate_with_retry(request).await {
            Ok(Attempt::Reply(reply)) => reply,
            Ok(Attempt::RateLimited) => return ExtractionResult::rate_limited(),
            Err(e) => {
                error!(kind, model = %self.client.model(), error = %e, "AI extraction failed");
                return ExtractionResult::default();
            }
        };

        match parse_extraction(&reply) {
            Ok(result) => {
                info!(
                    kind,
                    amount = ?result.amount,
                    currency = %result.currency,
                    category = ?result.category,
                    "Parsed transaction with AI"
                );
                result
            }
            Err(e) => {
                warn!(kind, error = %e, "AI response was not usable JSON");
                ExtractionResult::default()
            }
        }
    }

    /// Call the provider, retrying once after a rate limit
    ///
    /// Non-rate-limit errors are returned immediately without a retry.
    async fn generate_with_retry(&self, request: &GenerateRequest) -> Result<Attempt> {
        for attempt in 1..=MAX_ATTEMPTS {
            match self.client.generate(request).await {
                Ok(reply) => return Ok(Attempt::Reply(reply)),
                Err(e) if e.is_rate_limited() => {
                    if attempt == MAX_ATTEMPTS {
                        error!(attempt, error = %e, "Still rate limited after retry");
                        break;
                    }
                    let delay = retry_delay(&e.to_string(), self.retry_delay_max);
                    warn!(
                        attempt,
                        delay_secs = delay.as_secs(),
                        error = %e,
                        "Rate limited by AI provider, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Attempt::RateLimited)
    }
}
