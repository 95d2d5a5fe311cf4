//! Server API tests

use super::*;
use axum::{body::Body, http::Request};
use http_body_util::BodyExt;
use std::time::Duration;
use tally_core::ingest::replies;
use tally_core::test_utils::{
    photo_update, text_update, GeminiReply, MockGeminiServer, MockTelegramServer,
    RecordingMessenger,
};
use tally_core::{AIClient, AiParser, MockBackend, Update};
use tower::ServiceExt;

struct TestApp {
    app: Router,
    db: Database,
    messenger: RecordingMessenger,
}

fn setup_test_app(secret: Option<&str>) -> TestApp {
    let db = Database::in_memory().unwrap();
    let messenger = RecordingMessenger::new().with_file("receipt", b"image-bytes");
    let parser = ParserClient::Ai(AiParser::new(
        AIClient::Mock(MockBackend::new()),
        Duration::from_secs(1),
    ));
    let pipeline = IngestPipeline::new(Arc::new(db.clone()), Arc::new(messenger.clone()), parser);
    let config = ServerConfig {
        webhook_secret: secret.map(String::from),
    };
    TestApp {
        app: create_router(db.clone(), pipeline, config),
        db,
        messenger,
    }
}

fn webhook_request(body: impl Into<Body>, secret: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhook/telegram")
        .header("content-type", "application/json");
    if let Some(secret) = secret {
        builder = builder.header(SECRET_TOKEN_HEADER, secret);
    }
    builder.body(body.into()).unwrap()
}

fn update_json(update: &Update) -> String {
    serde_json::to_string(update).unwrap()
}

/// Wait until the spawned update handling has sent `count` replies
async fn wait_for_replies(
    sent: impl Fn() -> Vec<(i64, String)>,
    count: usize,
) -> Vec<(i64, String)> {
    for _ in 0..500 {
        let replies = sent();
        if replies.len() >= count {
            return replies;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    sent()
}

/// Give spawned update handling time to (not) reply
async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ========== Basic endpoints ==========

#[tokio::test]
async fn test_root() {
    let t = setup_test_app(None);

    let response = t
        .app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_health() {
    let t = setup_test_app(None);

    let response = t
        .app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["parser"], "ai");
}

#[test]
fn test_secret_matches() {
    assert!(secret_matches(Some("s3cret"), "s3cret"));
    assert!(!secret_matches(Some("s3cres"), "s3cret"));
    assert!(!secret_matches(Some("s3cret-longer"), "s3cret"));
    assert!(!secret_matches(Some(""), "s3cret"));
    assert!(!secret_matches(None, "s3cret"));
}

// ========== Webhook ==========

#[tokio::test]
async fn test_webhook_records_text_update() {
    let t = setup_test_app(None);

    let response = t
        .app
        .oneshot(webhook_request(update_json(&text_update(11, "spent 50 on food")), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_body_json(response).await, json!({"ok": true}));
    let sent = wait_for_replies(|| t.messenger.sent(), 1).await;
    assert_eq!(sent, vec![(11, "✅ Tracked ₹50 (food)".to_string())]);
    assert_eq!(t.db.count_transactions().unwrap(), 1);
}

#[tokio::test]
async fn test_webhook_records_photo_update() {
    let t = setup_test_app(None);

    let response = t
        .app
        .oneshot(webhook_request(update_json(&photo_update(11, &["receipt"])), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    wait_for_replies(|| t.messenger.sent(), 2).await;
    assert_eq!(t.db.count_transactions().unwrap(), 1);
    assert_eq!(
        t.messenger.texts(),
        vec![
            replies::PROCESSING.to_string(),
            "✅ Tracked ₹-120.50 at Mock Store (Food)".to_string()
        ]
    );
}

#[tokio::test]
async fn test_webhook_acknowledges_malformed_body() {
    let t = setup_test_app(None);

    let response = t
        .app
        .oneshot(webhook_request("{not json", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_body_json(response).await, json!({"ok": true}));
    settle().await;
    assert!(t.messenger.sent().is_empty());
}

#[tokio::test]
async fn test_webhook_malformed_update_with_chat_gets_failure_reply() {
    let t = setup_test_app(None);

    let response = t
        .app
        .clone()
        .oneshot(webhook_request(
            r#"{"update_id": 8, "message": {"from": {"id": 7}, "chat": {"id": 55}, "photo": [{"width": 90}]}}"#,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_body_json(response).await, json!({"ok": true}));
    let sent = wait_for_replies(|| t.messenger.sent(), 1).await;
    assert_eq!(sent, vec![(55, replies::FAILURE.to_string())]);

    let response = t
        .app
        .oneshot(webhook_request(
            r#"{"update_id": 9, "message": {"from": {"id": 7}, "chat": {"id": 55}, "text": 12345}}"#,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let sent = wait_for_replies(|| t.messenger.sent(), 2).await;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1], (55, replies::FAILURE.to_string()));
    assert_eq!(t.db.count_transactions().unwrap(), 0);
}

#[tokio::test]
async fn test_webhook_acknowledges_update_without_message() {
    let t = setup_test_app(None);

    let response = t
        .app
        .oneshot(webhook_request(
            r#"{"update_id": 5, "edited_message": {"text": "50 food"}}"#,
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    settle().await;
    assert!(t.messenger.sent().is_empty());
    assert_eq!(t.db.count_transactions().unwrap(), 0);
}

#[tokio::test]
async fn test_webhook_hint_for_unrecognized_update() {
    let t = setup_test_app(None);

    let response = t
        .app
        .oneshot(webhook_request(
            r#"{"update_id": 6, "message": {"message_id": 1, "from": {"id": 3}, "chat": {"id": 3}, "sticker": {}}}"#,
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let sent = wait_for_replies(|| t.messenger.sent(), 1).await;
    assert_eq!(sent, vec![(3, replies::USAGE_HINT.to_string())]);
}

#[tokio::test]
async fn test_webhook_secret_required() {
    let body = update_json(&text_update(11, "42"));

    let t = setup_test_app(Some("hook-secret"));
    let response = t
        .app
        .clone()
        .oneshot(webhook_request(body.clone(), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = t
        .app
        .clone()
        .oneshot(webhook_request(body.clone(), Some("wrong")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    settle().await;
    assert_eq!(t.db.count_transactions().unwrap(), 0);

    let response = t
        .app
        .oneshot(webhook_request(body, Some("hook-secret")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    wait_for_replies(|| t.messenger.sent(), 1).await;
    assert_eq!(t.db.count_transactions().unwrap(), 1);
}

#[tokio::test]
async fn test_webhook_secret_ignored_when_not_configured() {
    let t = setup_test_app(None);

    let response = t
        .app
        .oneshot(webhook_request(
            update_json(&text_update(11, "42")),
            Some("anything"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_webhook_rejects_oversized_body() {
    let t = setup_test_app(None);

    let request = Request::builder()
        .method("POST")
        .uri("/webhook/telegram")
        .header("content-type", "application/json")
        .header("content-length", MAX_UPDATE_SIZE + 1)
        .body(Body::from(vec![b' '; MAX_UPDATE_SIZE + 1]))
        .unwrap();

    let response = t.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

// ========== Against mock provider servers ==========

fn live_pipeline(
    db: &Database,
    telegram: &MockTelegramServer,
    gemini: &MockGeminiServer,
    retry_delay_max: Duration,
) -> IngestPipeline {
    let ai = AIClient::gemini(&gemini.url(), "gemini-2.0-flash", "test-key");
    IngestPipeline::new(
        Arc::new(db.clone()),
        Arc::new(TelegramClient::new(&telegram.url(), "123:abc")),
        ParserClient::Ai(AiParser::new(ai, retry_delay_max)),
    )
}

#[tokio::test]
async fn test_photo_through_real_clients() {
    let telegram = MockTelegramServer::start().await;
    telegram.add_file("photo-1", b"\xff\xd8\xffjpeg");
    let gemini = MockGeminiServer::start_with(vec![GeminiReply::Text(
        "```json\n{\"merchant\": \"Cafe Coffee Day\", \"amount\": \"-1,250.00\", \"currency\": \"inr\", \"date\": \"2024-03-01\", \"category\": \"Coffee\"}\n```".into(),
    )])
    .await;

    let db = Database::in_memory().unwrap();
    let app = create_router(
        db.clone(),
        live_pipeline(&db, &telegram, &gemini, Duration::from_secs(1)),
        ServerConfig::default(),
    );

    let response = app
        .oneshot(webhook_request(update_json(&photo_update(21, &["photo-1"])), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let sent = wait_for_replies(|| telegram.sent(), 2).await;

    let requests = gemini.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0]["contents"][0]["parts"][1]["inlineData"]["mimeType"],
        "image/jpeg"
    );

    let user = db.get_user_by_telegram_id("21").unwrap().unwrap();
    let txs = db.list_transactions(Some(user.id), 10, 0).unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].amount, -1250.0);
    assert_eq!(txs[0].currency, "INR");

    assert_eq!(
        sent,
        vec![
            (21, replies::PROCESSING.to_string()),
            (21, "✅ Tracked ₹-1250 at Cafe Coffee Day (Coffee)".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_rate_limit_retried_once_through_real_clients() {
    let telegram = MockTelegramServer::start().await;
    telegram.add_file("photo-1", b"png");
    let gemini = MockGeminiServer::start_with(vec![
        GeminiReply::RateLimited("Quota exceeded. Please retry in 0.5s.".into()),
        GeminiReply::RateLimited("Quota exceeded. Please retry in 0.5s.".into()),
    ])
    .await;

    let db = Database::in_memory().unwrap();
    let app = create_router(
        db.clone(),
        live_pipeline(&db, &telegram, &gemini, Duration::from_millis(20)),
        ServerConfig::default(),
    );

    let response = app
        .oneshot(webhook_request(update_json(&photo_update(21, &["photo-1"])), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let sent = wait_for_replies(|| telegram.sent(), 2).await;

    assert_eq!(gemini.requests().len(), 2);
    assert_eq!(db.count_transactions().unwrap(), 0);
    assert_eq!(
        sent,
        vec![
            (21, replies::PROCESSING.to_string()),
            (21, replies::RATE_LIMITED.to_string()),
        ]
    );
}

#[tokio::test]
async fn test_download_failure_through_real_clients() {
    let telegram = MockTelegramServer::start().await;
    let gemini = MockGeminiServer::start().await;

    let db = Database::in_memory().unwrap();
    let app = create_router(
        db.clone(),
        live_pipeline(&db, &telegram, &gemini, Duration::from_secs(1)),
        ServerConfig::default(),
    );

    let response = app
        .oneshot(webhook_request(update_json(&photo_update(21, &["unknown"])), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let sent = wait_for_replies(|| telegram.sent(), 2).await;

    assert!(gemini.requests().is_empty());
    assert_eq!(
        sent,
        vec![
            (21, replies::PROCESSING.to_string()),
            (21, replies::DOWNLOAD_FAILED.to_string()),
        ]
    );
}

#[test]
fn test_build_pipeline_rejects_local_parser() {
    let db = Database::in_memory().unwrap();
    let mut config = Config::default();
    config.parser = tally_core::ParserKind::Local;
    config.telegram.bot_token = Some("123:abc".into());

    let err = build_pipeline(&config, &db).err().unwrap();
    assert!(format!("{:#}", err).contains("local image parser not implemented"));
}
