use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::json;

use crate::config::GeminiConfig;
use crate::error::RemoteError;

/// Image bytes plus their MIME type, as sent to the model.
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime_type: &'static str,
    pub data: Vec<u8>,
}

/// A hosted model that answers a text instruction about one image.
#[async_trait::async_trait]
pub trait VisionModel: Send + Sync {
    async fn generate(&self, prompt: &str, image: &InlineImage) -> Result<String, RemoteError>;
}

/// Gemini `generateContent` over REST.
pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait::async_trait]
impl VisionModel for GeminiClient {
    async fn generate(&self, prompt: &str, image: &InlineImage) -> Result<String, RemoteError> {
        let body = json!({
            "contents": [{
                "parts": [
                    { "text": prompt },
                    {
                        "inline_data": {
                            "mime_type": image.mime_type,
                            "data": STANDARD.encode(&image.data),
                        }
                    }
                ]
            }]
        });

        let resp = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            tracing::warn!(status = %status, model = %self.config.model, "Gemini API error");
            return Err(RemoteError::new(error_message(status, &text)));
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| RemoteError::new(format!("Malformed Gemini response: {e}")))?;
        parsed.into_text()
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

impl GenerateResponse {
    /// Concatenate the text parts of the first candidate.
    fn into_text(self) -> Result<String, RemoteError> {
        let Some(candidate) = self.candidates.into_iter().next() else {
            let reason = self
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "unknown".into());
            return Err(RemoteError::new(format!(
                "Gemini returned no candidates (block reason: {reason})"
            )));
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".into());
            return Err(RemoteError::new(format!(
                "Gemini returned no text (finish reason: {reason})"
            )));
        }
        Ok(text)
    }
}

/// Prefer the service's own `error.message`; fall back to status and body.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{status}: {body}"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use crate::services::analysis::classify_remote_error;
    use axum::Json;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;

    fn parse(body: serde_json::Value) -> Result<String, RemoteError> {
        serde_json::from_value::<GenerateResponse>(body)
            .unwrap()
            .into_text()
    }

    #[test]
    fn test_joins_text_parts() {
        let text = parse(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Heart line: " }, { "text": "long." }] },
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        assert_eq!(text, "Heart line: long.");
    }

    #[test]
    fn test_blocked_prompt_is_an_error() {
        let err = parse(json!({ "promptFeedback": { "blockReason": "SAFETY" } })).unwrap_err();
        assert!(err.message.contains("SAFETY"));
    }

    #[test]
    fn test_candidate_without_text_is_an_error() {
        let err = parse(json!({ "candidates": [{ "finishReason": "RECITATION" }] })).unwrap_err();
        assert!(err.message.contains("RECITATION"));
    }

    #[test]
    fn test_error_message_prefers_service_message() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, body),
            "API key not valid. Please pass a valid API key."
        );
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "upstream down"),
            "502 Bad Gateway: upstream down"
        );
    }

    /// Serve `router` on an ephemeral port; returns a Gemini-style base URL.
    pub(crate) async fn spawn_stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/v1beta")
    }

    pub(crate) fn client_for(base_url: String) -> GeminiClient {
        GeminiClient::new(GeminiConfig {
            api_key: "test-key".into(),
            model: "gemini-test".into(),
            base_url,
        })
    }

    fn sample_image() -> InlineImage {
        InlineImage {
            mime_type: "image/png",
            data: vec![1, 2, 3],
        }
    }

    #[tokio::test]
    async fn test_generate_sends_prompt_and_image() {
        let router = Router::new().route(
            "/v1beta/models/gemini-test:generateContent",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                assert_eq!(headers["x-goog-api-key"], "test-key");
                let parts = &body["contents"][0]["parts"];
                assert_eq!(parts[0]["text"], "read this palm");
                assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
                assert_eq!(parts[1]["inline_data"]["data"], "AQID");
                Json(json!({
                    "candidates": [{ "content": { "parts": [{ "text": "Sample reading" }] } }]
                }))
            }),
        );
        let client = client_for(spawn_stub(router).await);

        let text = client.generate("read this palm", &sample_image()).await.unwrap();
        assert_eq!(text, "Sample reading");
    }

    #[tokio::test]
    async fn test_generate_surfaces_service_error_message() {
        let router = Router::new().route(
            "/v1beta/models/gemini-test:generateContent",
            post(|| async {
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({
                        "error": { "code": 429, "message": "Resource has been exhausted (e.g. check quota).", "status": "RESOURCE_EXHAUSTED" }
                    })),
                )
            }),
        );
        let client = client_for(spawn_stub(router).await);

        let err = client.generate("prompt", &sample_image()).await.unwrap_err();
        assert_eq!(err.message, "Resource has been exhausted (e.g. check quota).");
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_a_model_error() {
        // Bind then drop to get a port nothing listens on.
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let client = client_for(format!("http://{addr}/v1beta"));

        let err = client.generate("prompt", &sample_image()).await.unwrap_err();

        assert!(!err.message.contains("generateContent"), "{}", err.message);
        assert!(!err.message.to_lowercase().contains("model"), "{}", err.message);
        let classified = classify_remote_error(&err, "gemini-test");
        assert!(
            matches!(classified, AnalysisError::UnknownRemote(ref m) if *m == err.message),
            "{classified}"
        );
    }
}
