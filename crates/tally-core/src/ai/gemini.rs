//! Google Gemini backend
//!
//! Talks to the `generateContent` REST endpoint:
//! `POST {base_url}/v1beta/models/{model}:generateContent`
//!
//! # Configuration
//!
//! - `GEMINI_API_KEY`: API key (required)
//! - `GEMINI_MODEL`: Model name (default: gemini-2.0-flash)
//! - `GEMINI_BASE_URL`: API root, overridable for tests and proxies
//!
//! Every request carries a timeout (`ai.request_timeout_secs`).

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{AiConfig, DEFAULT_AI_TIMEOUT_SECS};
use crate::error::{Error, Result};

use super::types::GenerateRequest;
use super::AIBackend;

/// Marker Gemini puts in quota errors
const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";

/// Gemini `generateContent` backend
#[derive(Clone)]
pub struct GeminiBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl GeminiBackend {
    pub fn new(base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            timeout: Duration::from_secs(DEFAULT_AI_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build from config; fails when no API key is configured
    pub fn from_config(config: &AiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                Error::Config("GEMINI_API_KEY is required for the gemini backend".into())
            })?;
        Ok(Self::new(&config.base_url, &config.model, api_key)
            .with_timeout(Duration::from_secs(config.request_timeout_secs)))
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

/// Map a non-success response to the error taxonomy
fn classify_failure(status: StatusCode, body: &str) -> Error {
    let message = format!("Gemini API error {}: {}", status, body);
    if status == StatusCode::TOO_MANY_REQUESTS || body.contains(RESOURCE_EXHAUSTED) {
        Error::RateLimited(message)
    } else {
        Error::Provider(message)
    }
}

#[async_trait]
impl AIBackend for GeminiBackend {
    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        let mut parts = vec![Part::Text {
            text: request.prompt.clone(),
        }];
        if let Some(ref image) = request.image {
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: image.mime_type.clone(),
                    data: base64::engine::general_purpose::STANDARD.encode(&image.data),
                },
            });
        }

        let body = GenerateContentRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig { temperature: 0.1 },
        };

        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body));
        }

        let parsed: GenerateContentResponse = response.json().await?;
        let text = parsed.first_text().ok_or_else(|| {
            Error::Provider("No candidates in Gemini response".into())
        })?;

        debug!(model = %self.model, chars = text.len(), "Gemini response received");
        Ok(text)
    }

    async fn health_check(&self) -> bool {
        match self
            .http_client
            .get(format!("{}/v1beta/models/{}", self.base_url, self.model))
            .header("x-goog-api-key", &self.api_key)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, all text parts joined
    fn first_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        Some(text)
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::types::ImageInput;

    #[test]
    fn test_backend_new_trims_trailing_slash() {
        let backend = GeminiBackend::new("https://example.test/", "gemini-2.0-flash", "k");
        assert_eq!(backend.host(), "https://example.test");
        assert_eq!(backend.model(), "gemini-2.0-flash");
        assert_eq!(
            backend.endpoint(),
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = AiConfig::default();
        assert!(matches!(
            GeminiBackend::from_config(&config),
            Err(Error::Config(_))
        ));

        let config = AiConfig {
            api_key: Some("  ".into()),
            ..Default::default()
        };
        assert!(GeminiBackend::from_config(&config).is_err());

        let config = AiConfig {
            api_key: Some("secret".into()),
            ..Default::default()
        };
        let backend = GeminiBackend::from_config(&config).unwrap();
        assert_eq!(backend.api_key, "secret");
    }

    #[test]
    fn test_classify_failure() {
        let err = classify_failure(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(err, Error::RateLimited(_)));

        let err = classify_failure(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#,
        );
        assert!(matches!(err, Error::RateLimited(_)));

        let err = classify_failure(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert!(matches!(err, Error::Provider(_)));
        assert!(!err.is_rate_limited());
    }

    #[test]
    fn test_request_serialization() {
        let request = GenerateRequest::with_image(
            "read this",
            ImageInput {
                mime_type: "image/png".into(),
                data: vec![1, 2, 3],
            },
        );
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: request.prompt.clone(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/png".into(),
                            data: base64::engine::general_purpose::STANDARD.encode([1, 2, 3]),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig { temperature: 0.1 },
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "read this");
        assert_eq!(
            json["contents"][0]["parts"][1]["inlineData"]["mimeType"],
            "image/png"
        );
        assert_eq!(json["contents"][0]["parts"][1]["inlineData"]["data"], "AQID");
        assert!(json.get("generationConfig").is_some());
    }

    #[test]
    fn test_response_text_joins_parts() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"{\"amount\":"},{"text":"5}"}]}}]}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.first_text().as_deref(), Some("{\"amount\":5}"));
    }

    #[test]
    fn test_response_without_candidates() {
        let parsed: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.first_text().is_none());
    }

    #[tokio::test]
    async fn test_stalled_provider_times_out() {
        // Accepts connections but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let backend = GeminiBackend::new(&url, "gemini-2.0-flash", "k")
            .with_timeout(Duration::from_millis(100));

        let started = std::time::Instant::now();
        let err = backend
            .generate(&GenerateRequest::text("p"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Http(ref e) if e.is_timeout()));
        assert!(!backend.health_check().await);
        assert!(started.elapsed() < Duration::from_secs(5));
        drop(listener);
    }

    #[test]
    fn test_from_config_timeout() {
        let config = AiConfig {
            api_key: Some("k".into()),
            request_timeout_secs: 7,
            ..Default::default()
        };
        let backend = GeminiBackend::from_config(&config).unwrap();
        assert_eq!(backend.timeout, Duration::from_secs(7));
        assert_eq!(
            GeminiBackend::new("http://x", "m", "k").timeout,
            Duration::from_secs(DEFAULT_AI_TIMEOUT_SECS)
        );
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let backend = GeminiBackend::new("http://localhost:99999", "gemini-2.0-flash", "k");
        assert!(!backend.health_check().await);
    }
}
