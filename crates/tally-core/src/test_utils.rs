//! Test utilities for tally-core
//!
//! Mock Gemini and Telegram HTTP servers, an in-process messenger that
//! records replies, a store that always fails, and builders for webhook
//! updates.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::oneshot;

use crate::ai::DEFAULT_MOCK_RESPONSE;
use crate::error::{Error, Result};
use crate::models::{Category, NewTransaction, Transaction, User};
use crate::store::TransactionStore;
use crate::telegram::{Chat, Document, Message, Messenger, PhotoSize, TelegramUser, Update};

/// Serve `app` on an ephemeral port until the returned sender fires
async fn spawn_server(app: Router) -> (SocketAddr, oneshot::Sender<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .unwrap();
    });

    (addr, shutdown_tx)
}

// ========== Mock Gemini ==========

/// One scripted response of the mock Gemini server
#[derive(Debug, Clone)]
pub enum GeminiReply {
    /// 200 with this model text as the only candidate
    Text(String),
    /// 429 with a Google-style quota error carrying `message`
    RateLimited(String),
    /// Arbitrary status and body
    Status(u16, String),
}

/// Wrap model text the way `generateContent` does
pub fn gemini_body(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    })
}

#[derive(Default)]
struct GeminiState {
    script: Mutex<VecDeque<GeminiReply>>,
    hits: Mutex<Vec<serde_json::Value>>,
}

/// Mock Gemini server for integration tests
///
/// Plays back the script, then answers with [`DEFAULT_MOCK_RESPONSE`].
pub struct MockGeminiServer {
    addr: SocketAddr,
    state: Arc<GeminiState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockGeminiServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        Self::start_with(Vec::new()).await
    }

    /// Start with a script of replies
    pub async fn start_with(script: Vec<GeminiReply>) -> Self {
        let state = Arc::new(GeminiState {
            script: Mutex::new(script.into()),
            hits: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route(
                "/v1beta/models/:model",
                get(handle_gemini_model).post(handle_generate),
            )
            .with_state(state.clone());

        let (addr, shutdown_tx) = spawn_server(app).await;
        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Request bodies received so far
    pub fn requests(&self) -> Vec<serde_json::Value> {
        self.state.hits.lock().unwrap().clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockGeminiServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_gemini_model(Path(model): Path<String>) -> Json<serde_json::Value> {
    Json(json!({"name": format!("models/{}", model)}))
}

async fn handle_generate(
    State(state): State<Arc<GeminiState>>,
    Path(model): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    if !model.ends_with(":generateContent") {
        return StatusCode::NOT_FOUND.into_response();
    }
    state.hits.lock().unwrap().push(body);

    let next = state.script.lock().unwrap().pop_front();
    match next {
        Some(GeminiReply::Text(text)) => Json(gemini_body(&text)).into_response(),
        Some(GeminiReply::RateLimited(message)) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": {"code": 429, "message": message, "status": "RESOURCE_EXHAUSTED"}
            })),
        )
            .into_response(),
        Some(GeminiReply::Status(code, body)) => (
            StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body,
        )
            .into_response(),
        None => Json(gemini_body(DEFAULT_MOCK_RESPONSE)).into_response(),
    }
}

// ========== Mock Telegram ==========

#[derive(Default)]
struct TelegramState {
    files: Mutex<HashMap<String, Vec<u8>>>,
    sent: Mutex<Vec<(i64, String)>>,
}

/// Mock Telegram Bot API server
///
/// Serves `getFile`, the file download endpoint and `sendMessage` for any
/// bot token.
pub struct MockTelegramServer {
    addr: SocketAddr,
    state: Arc<TelegramState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockTelegramServer {
    pub async fn start() -> Self {
        let state = Arc::new(TelegramState::default());
        let app = Router::new()
            .route("/*path", get(handle_telegram_get).post(handle_telegram_post))
            .with_state(state.clone());

        let (addr, shutdown_tx) = spawn_server(app).await;
        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make a file downloadable under `file_id`
    pub fn add_file(&self, file_id: &str, bytes: &[u8]) {
        self.state
            .files
            .lock()
            .unwrap()
            .insert(file_id.to_string(), bytes.to_vec());
    }

    /// Messages received via `sendMessage`
    pub fn sent(&self) -> Vec<(i64, String)> {
        self.state.sent.lock().unwrap().clone()
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockTelegramServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Deserialize)]
struct FileQuery {
    file_id: Option<String>,
}

async fn handle_telegram_get(
    State(state): State<Arc<TelegramState>>,
    Path(path): Path<String>,
    Query(query): Query<FileQuery>,
) -> Response {
    // File download: file/bot<token>/photos/<file_id>.jpg
    if let Some(rest) = path.strip_prefix("file/") {
        let file_id = rest
            .rsplit('/')
            .next()
            .and_then(|name| name.strip_suffix(".jpg"))
            .unwrap_or_default();
        return match state.files.lock().unwrap().get(file_id) {
            Some(bytes) => Bytes::from(bytes.clone()).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        };
    }

    if path.ends_with("/getFile") {
        let file_id = query.file_id.unwrap_or_default();
        if state.files.lock().unwrap().contains_key(&file_id) {
            return Json(json!({
                "ok": true,
                "result": {"file_id": file_id, "file_path": format!("photos/{}.jpg", file_id)}
            }))
            .into_response();
        }
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"ok": false, "error_code": 400, "description": "Bad Request: invalid file_id"})),
        )
            .into_response();
    }

    StatusCode::NOT_FOUND.into_response()
}

#[derive(Deserialize)]
struct SendMessageBody {
    chat_id: i64,
    text: String,
}

async fn handle_telegram_post(
    State(state): State<Arc<TelegramState>>,
    Path(path): Path<String>,
    Json(body): Json<SendMessageBody>,
) -> Response {
    if !path.ends_with("/sendMessage") {
        return StatusCode::NOT_FOUND.into_response();
    }
    state
        .sent
        .lock()
        .unwrap()
        .push((body.chat_id, body.text.clone()));
    Json(json!({
        "ok": true,
        "result": {"message_id": 1, "chat": {"id": body.chat_id}, "text": body.text}
    }))
    .into_response()
}

// ========== In-process doubles ==========

/// Messenger that records every reply instead of sending it
#[derive(Clone, Default)]
pub struct RecordingMessenger {
    sent: Arc<Mutex<Vec<(i64, String)>>>,
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    fail_sends: bool,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messenger whose sends all fail (downloads still work)
    pub fn failing_sends() -> Self {
        Self {
            fail_sends: true,
            ..Self::default()
        }
    }

    pub fn with_file(self, file_id: &str, bytes: &[u8]) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(file_id.to_string(), bytes.to_vec());
        self
    }

    /// Every (chat_id, text) sent, oldest first
    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Just the texts
    pub fn texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, text)| text).collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        if self.fail_sends {
            return Err(Error::Messaging("send disabled".into()));
        }
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(file_id).cloned()
    }
}

/// Store whose every operation fails
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingStore;

impl TransactionStore for FailingStore {
    fn find_or_create_user(&self, _telegram_id: &str) -> Result<User> {
        Err(Error::InvalidData("store unavailable".into()))
    }

    fn find_category(&self, _user_id: i64, _name: &str) -> Result<Option<Category>> {
        Err(Error::InvalidData("store unavailable".into()))
    }

    fn create_transaction(&self, _tx: &NewTransaction) -> Result<Transaction> {
        Err(Error::InvalidData("store unavailable".into()))
    }
}

// ========== Update builders ==========

fn base_message(sender_id: i64, chat_id: i64) -> Message {
    Message {
        message_id: Some(1),
        from: Some(TelegramUser {
            id: sender_id,
            username: None,
        }),
        chat: Some(Chat { id: chat_id }),
        ..Default::default()
    }
}

fn wrap(message: Message) -> Update {
    Update {
        update_id: Some(1),
        message: Some(message),
    }
}

/// Text message from `sender_id` in a private chat of the same id
pub fn text_update(sender_id: i64, text: &str) -> Update {
    wrap(Message {
        text: Some(text.to_string()),
        ..base_message(sender_id, sender_id)
    })
}

/// Photo message; `file_ids` are size variants, smallest first
pub fn photo_update(sender_id: i64, file_ids: &[&str]) -> Update {
    wrap(Message {
        photo: Some(
            file_ids
                .iter()
                .map(|id| PhotoSize {
                    file_id: id.to_string(),
                    width: None,
                    height: None,
                })
                .collect(),
        ),
        ..base_message(sender_id, sender_id)
    })
}

/// Document message with the given media type
pub fn document_update(sender_id: i64, file_id: &str, mime_type: &str) -> Update {
    wrap(Message {
        document: Some(Document {
            file_id: file_id.to_string(),
            mime_type: Some(mime_type.to_string()),
            file_name: None,
        }),
        ..base_message(sender_id, sender_id)
    })
}

/// Message with neither text nor image (a sticker, say)
pub fn empty_update(sender_id: i64) -> Update {
    wrap(base_message(sender_id, sender_id))
}
