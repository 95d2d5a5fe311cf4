//! Chat ingestion pipeline
//!
//! Turns one Telegram update into at most one stored transaction and replies
//! to the sender. Every path ends with a reply (or a deliberate silence for
//! updates with nobody to answer), and nothing escapes as an error: the
//! webhook always gets to acknowledge the update.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::models::{
    ExtractionResult, NewTransaction, TransactionSource, TransactionStatus, DEFAULT_CURRENCY,
};
use crate::parser::{ParserClient, TextParser, TransactionParser};
use crate::store::TransactionStore;
use crate::telegram::{Message, Messenger, Update};

/// User-facing replies
pub mod replies {
    pub const PROCESSING: &str = "⏳ Processing your invoice...";
    pub const DOWNLOAD_FAILED: &str = "❌ Failed to download image. Please try again.";
    pub const NO_AMOUNT: &str =
        "❌ Could not extract transaction amount from the image. Please try with a clearer image.";
    pub const RATE_LIMITED: &str =
        "⏳ The image reader is busy right now. Please send the image again in a minute.";
    pub const UNPARSED: &str = "❌ Could not understand your message. Please send:\n\
        • A payment screenshot/invoice image, or\n\
        • Text like: 'add 15rs as coffee' or 'spent 50 on food'";
    pub const USAGE_HINT: &str = "📸 Please send:\n\
        • A payment screenshot or invoice image, or\n\
        • Text like: 'add 15rs as coffee' or 'spent 50 on food'";
    pub const FAILURE: &str =
        "❌ An error occurred while processing your request. Please try again later.";
}

/// How an update was handled
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// No message, sender or chat; nothing to answer
    Ignored,
    /// Neither an image nor text
    UsageHint,
    /// Text without a recognizable amount
    Unparsed,
    DownloadFailed,
    /// Image parsed but no usable amount
    NoAmount,
    /// AI provider still rate limited after the retry
    RateLimited,
    Recorded { transaction_id: i64, user_id: i64 },
    /// Unexpected error; the sender got the generic failure reply
    Failed,
}

impl IngestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::UsageHint => "usage_hint",
            Self::Unparsed => "unparsed",
            Self::DownloadFailed => "download_failed",
            Self::NoAmount => "no_amount",
            Self::RateLimited => "rate_limited",
            Self::Recorded { .. } => "recorded",
            Self::Failed => "failed",
        }
    }
}

/// Currency prefix for replies: the rupee sign for INR, otherwise the code
pub fn currency_symbol(currency: &str) -> &str {
    if currency.eq_ignore_ascii_case(DEFAULT_CURRENCY) {
        "₹"
    } else {
        currency
    }
}

/// Whole amounts without decimals, others with two
pub fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 && amount.abs() < 1e15 {
        format!("{}", amount as i64)
    } else {
        format!("{:.2}", amount)
    }
}

/// "✅ Tracked ₹15 at Starbucks (coffee)"
pub fn confirmation(result: &ExtractionResult, amount: f64) -> String {
    let mut reply = format!(
        "✅ Tracked {}{}",
        currency_symbol(&result.currency),
        format_amount(amount)
    );
    if let Some(ref merchant) = result.merchant {
        reply.push_str(&format!(" at {}", merchant));
    }
    if let Some(ref category) = result.category {
        reply.push_str(&format!(" ({})", category));
    }
    reply
}

/// `message.chat.id` of an update that failed typed parsing
fn chat_id_of(body: &[u8]) -> Option<i64> {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()?
        .pointer("/message/chat/id")?
        .as_i64()
}

/// Update handler shared by every webhook request
#[derive(Clone)]
pub struct IngestPipeline {
    store: Arc<dyn TransactionStore>,
    messenger: Arc<dyn Messenger>,
    parser: ParserClient,
    text_parser: TextParser,
}

impl IngestPipeline {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        messenger: Arc<dyn Messenger>,
        parser: ParserClient,
    ) -> Self {
        Self {
            store,
            messenger,
            parser,
            text_parser: TextParser::new(),
        }
    }

    pub fn parser(&self) -> &ParserClient {
        &self.parser
    }

    /// Handle a raw webhook body; never fails
    ///
    /// A body that is JSON but not a well-formed update still gets the
    /// generic failure reply when its chat id can be read.
    pub async fn handle_body(&self, body: &[u8]) -> IngestOutcome {
        let err = match serde_json::from_slice::<Update>(body) {
            Ok(update) => {
                debug!(update_id = ?update.update_id, "Received Telegram update");
                return self.handle_update(&update).await;
            }
            Err(e) => e,
        };

        match chat_id_of(body) {
            Some(chat_id) => {
                error!(chat_id, error = %err, "Malformed Telegram update");
                self.reply(chat_id, replies::FAILURE).await;
                IngestOutcome::Failed
            }
            None => {
                warn!(error = %err, size = body.len(), "Ignoring unparseable webhook body");
                IngestOutcome::Ignored
            }
        }
    }

    /// Handle one update; never fails
    pub async fn handle_update(&self, update: &Update) -> IngestOutcome {
        let Some(message) = update.message.as_ref() else {
            warn!(update_id = ?update.update_id, "Received update without message");
            return IngestOutcome::Ignored;
        };
        let Some(sender_id) = message.sender_id() else {
            warn!(update_id = ?update.update_id, "Message without sender id");
            return IngestOutcome::Ignored;
        };
        let Some(chat_id) = message.chat_id() else {
            warn!(update_id = ?update.update_id, sender_id, "Message without chat id");
            return IngestOutcome::Ignored;
        };

        match self.process(message, chat_id, sender_id).await {
            Ok(outcome) => {
                info!(chat_id, sender_id, outcome = outcome.as_str(), "Update handled");
                outcome
            }
            Err(e) => {
                error!(chat_id, sender_id, error = %e, "Error processing Telegram update");
                self.reply(chat_id, replies::FAILURE).await;
                IngestOutcome::Failed
            }
        }
    }

    async fn process(&self, message: &Message, chat_id: i64, sender_id: i64) -> Result<IngestOutcome> {
        let (extraction, source) = if let Some(file_id) = message.image_file_id() {
            match self.extract_image(chat_id, file_id).await? {
                Ok(extraction) => (extraction, TransactionSource::Image),
                Err(outcome) => return Ok(outcome),
            }
        } else if let Some(text) = message.text() {
            match self.text_parser.parse(text) {
                Some(extraction) => (extraction, TransactionSource::Text),
                None => {
                    self.reply(chat_id, replies::UNPARSED).await;
                    return Ok(IngestOutcome::Unparsed);
                }
            }
        } else {
            self.reply(chat_id, replies::USAGE_HINT).await;
            return Ok(IngestOutcome::UsageHint);
        };

        let amount = extraction
            .amount
            .ok_or_else(|| Error::InvalidData("extraction without amount".into()))?;

        let user = self.store.find_or_create_user(&sender_id.to_string())?;
        let category_id = match extraction.category.as_deref() {
            Some(name) => self.store.find_category(user.id, name)?.map(|c| c.id),
            None => None,
        };

        let tx = self.store.create_transaction(&NewTransaction {
            user_id: user.id,
            amount,
            currency: extraction.currency.clone(),
            merchant: extraction.merchant.clone(),
            category: extraction.category.clone(),
            category_id,
            occurred_on: extraction.parsed_date(),
            source,
            status: TransactionStatus::Pending,
        })?;

        info!(
            user_id = user.id,
            tx_id = tx.id,
            amount,
            source = source.as_str(),
            "Recorded transaction"
        );
        self.reply(chat_id, &confirmation(&extraction, amount)).await;

        Ok(IngestOutcome::Recorded {
            transaction_id: tx.id,
            user_id: user.id,
        })
    }

    /// Download and parse an image; the inner `Err` is a terminal outcome
    /// whose reply has already been sent
    async fn extract_image(
        &self,
        chat_id: i64,
        file_id: &str,
    ) -> Result<std::result::Result<ExtractionResult, IngestOutcome>> {
        self.reply(chat_id, replies::PROCESSING).await;

        let Some(bytes) = self.messenger.download_file(file_id).await else {
            self.reply(chat_id, replies::DOWNLOAD_FAILED).await;
            return Ok(Err(IngestOutcome::DownloadFailed));
        };

        let extraction = self.parser.parse_image(&bytes).await?;

        if extraction.rate_limited {
            self.reply(chat_id, replies::RATE_LIMITED).await;
            return Ok(Err(IngestOutcome::RateLimited));
        }
        if extraction.usable_amount().is_none() {
            self.reply(chat_id, replies::NO_AMOUNT).await;
            return Ok(Err(IngestOutcome::NoAmount));
        }

        Ok(Ok(extraction))
    }

    /// Send a reply; delivery failures are logged, not propagated
    async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.messenger.send_message(chat_id, text).await {
            error!(chat_id, error = %e, "Failed to send Telegram message");
        }
    }
}
