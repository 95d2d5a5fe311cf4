//! Tally Web Server
//!
//! Axum-based webhook receiver for the Tally expense-logging bot.
//!
//! - `POST /webhook/telegram`: acknowledges each update at once and hands
//!   it to the ingestion pipeline on its own task, so Telegram never
//!   redelivers while a slow provider call or backoff is running
//! - `GET /health`: liveness plus database reachability
//! - `GET /`: banner
//!
//! When a webhook secret is configured, requests must carry it in the
//! `X-Telegram-Bot-Api-Secret-Token` header (compared in constant time).

use std::sync::Arc;

use anyhow::Context;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{info, warn};

use tally_core::{AIBackend, Config, Database, IngestPipeline, ParserClient, TelegramClient};

/// Maximum webhook body size (1 MB; updates carry file ids, not file bytes)
pub const MAX_UPDATE_SIZE: usize = 1024 * 1024;

/// Header Telegram uses to echo the secret set with `setWebhook`
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Server configuration
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Expected secret token; `None` accepts every request
    pub webhook_secret: Option<String>,
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub pipeline: IngestPipeline,
    pub config: ServerConfig,
}

/// Compare the presented secret with the configured one in constant time
fn secret_matches(provided: Option<&str>, expected: &str) -> bool {
    use subtle::ConstantTimeEq;

    let Some(provided) = provided else {
        return false;
    };
    let provided_bytes = provided.as_bytes();
    let expected_bytes = expected.as_bytes();
    // Only compare if lengths match (constant-time for same-length secrets)
    provided_bytes.len() == expected_bytes.len() && provided_bytes.ct_eq(expected_bytes).into()
}

/// Create the router over an already-built pipeline
pub fn create_router(db: Database, pipeline: IngestPipeline, config: ServerConfig) -> Router {
    if config.webhook_secret.is_none() {
        warn!("⚠️  No webhook secret configured - any caller can submit updates");
    }

    let state = Arc::new(AppState {
        db,
        pipeline,
        config,
    });

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/webhook/telegram", post(telegram_webhook))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_UPDATE_SIZE))
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Tally bot is running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> Response {
    let parser = state.pipeline.parser().kind();
    match state.db.conn() {
        Ok(_) => Json(json!({
            "status": "healthy",
            "service": "tally",
            "parser": parser.as_str(),
        }))
        .into_response(),
        Err(e) => {
            warn!(error = %e, "Health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": "tally",
                    "parser": parser.as_str(),
                })),
            )
                .into_response()
        }
    }
}

/// Telegram webhook
///
/// Malformed bodies are acknowledged like any other update; the pipeline
/// decides whether anyone can be told about them.
async fn telegram_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(ref expected) = state.config.webhook_secret {
        let provided = headers
            .get(SECRET_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        if !secret_matches(provided, expected) {
            warn!("Rejected webhook request with missing or wrong secret token");
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"ok": false, "error": "Unauthorized"})),
            )
                .into_response();
        }
    }

    tokio::spawn(async move {
        state.pipeline.handle_body(&body).await;
    });

    Json(json!({"ok": true})).into_response()
}

/// Build the production pipeline from config
///
/// Fails when the selected parser or the Telegram client cannot be built.
pub fn build_pipeline(config: &Config, db: &Database) -> anyhow::Result<IngestPipeline> {
    let parser = ParserClient::from_config(config).context("Failed to build parser")?;
    let telegram =
        TelegramClient::from_config(&config.telegram).context("Failed to build Telegram client")?;
    Ok(IngestPipeline::new(
        Arc::new(db.clone()),
        Arc::new(telegram),
        parser,
    ))
}

/// Start the server
pub async fn serve(config: &Config, db: Database, host: &str, port: u16) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config, &db)?;
    check_ai_connection(pipeline.parser()).await;

    let server_config = ServerConfig {
        webhook_secret: config.telegram.webhook_secret.clone(),
    };
    let app = create_router(db, pipeline, server_config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log AI backend connection status
async fn check_ai_connection(parser: &ParserClient) {
    let ParserClient::Ai(ai) = parser;
    let client = ai.client();
    if client.health_check().await {
        info!(
            "✅ AI backend connected: {} (model: {})",
            client.host(),
            client.model()
        );
    } else {
        warn!(
            "⚠️  AI backend configured but not responding: {} (model: {})",
            client.host(),
            client.model()
        );
    }
}

#[cfg(test)]
mod tests;
