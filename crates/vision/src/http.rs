//! HTTP transport for OpenAI-compatible chat-completions endpoints.
//!
//! Sends the prompt and the image (as a `data:` URL) in a single user
//! message to `POST {api_url}/chat/completions` and returns the text of the
//! first choice. Status codes are mapped onto [`AnalysisError`] so the
//! caller can decide between retrying, skipping and aborting.

use std::time::Duration;

use async_trait::async_trait;
use dermascan_core::error::AnalysisError;
use dermascan_core::request::InferenceRequest;
use serde::Deserialize;

use crate::transport::InferenceTransport;

/// Default model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Token budget for one answer; the JSON object is small.
const MAX_TOKENS: u32 = 800;

/// Low temperature keeps the answer close to the requested schema.
const TEMPERATURE: f64 = 0.2;

/// Longest slice of an error body carried into an error message.
const ERROR_BODY_LIMIT: usize = 200;

/// HTTP client for one inference endpoint.
pub struct HttpTransport {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

/// Response envelope of the chat-completions endpoint.
#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Errors raised while constructing the transport.
#[derive(Debug, thiserror::Error)]
pub enum HttpTransportError {
    /// The underlying [`reqwest::Client`] could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

impl HttpTransport {
    /// Create a transport with its own connection pool.
    ///
    /// * `api_url` - Base URL, e.g. `https://api.openai.com/v1`.
    /// * `timeout` - Per-request timeout applied by the HTTP client.
    pub fn new(
        api_url: String,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, HttpTransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, api_url, api_key, model))
    }

    /// Create a transport reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        api_url: String,
        api_key: String,
        model: String,
    ) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// JSON body for one chat-completions request.
    pub fn request_body(&self, request: &InferenceRequest) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "temperature": TEMPERATURE,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": request.prompt() },
                    {
                        "type": "image_url",
                        "image_url": { "url": request.image().data_url(), "detail": "high" }
                    }
                ]
            }]
        })
    }

    // ---- private helpers ----

    /// Map a non-2xx response onto the error taxonomy.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, AnalysisError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(classify_status(status.as_u16(), &body))
    }
}

#[async_trait]
impl InferenceTransport for HttpTransport {
    async fn analyze(&self, request: &InferenceRequest) -> Result<String, AnalysisError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(classify_transport_error)?;

        let response = Self::ensure_success(response).await?;
        let completion: ChatCompletion = response.json().await.map_err(|e| {
            AnalysisError::MalformedResponse(format!("unexpected response envelope: {e}"))
        })?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| AnalysisError::MalformedResponse("response contained no text".into()))
    }

    async fn probe(&self) -> Result<(), AnalysisError> {
        // Any HTTP answer, even 401, proves the endpoint is reachable.
        self.client
            .get(format!("{}/models", self.api_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map(|_| ())
            .map_err(classify_transport_error)
    }
}

/// Classify an HTTP error status.
///
/// | Status        | Error                                |
/// |---------------|--------------------------------------|
/// | 401, 403      | [`AnalysisError::Auth`] (fatal)      |
/// | 429           | [`AnalysisError::RateLimit`] (fatal) |
/// | other 4xx     | [`AnalysisError::Validation`]        |
/// | 5xx and other | [`AnalysisError::Network`]           |
pub fn classify_status(status: u16, body: &str) -> AnalysisError {
    let detail = format!("HTTP {status}: {}", truncate(body.trim(), ERROR_BODY_LIMIT));
    match status {
        401 | 403 => AnalysisError::Auth(detail),
        429 => AnalysisError::RateLimit(detail),
        400..=499 => AnalysisError::Validation(detail),
        _ => AnalysisError::Network(detail),
    }
}

/// Failures before any status was received are transient network errors,
/// except for response bodies that could not be decoded.
fn classify_transport_error(err: reqwest::Error) -> AnalysisError {
    if err.is_decode() {
        AnalysisError::MalformedResponse(err.to_string())
    } else if err.is_timeout() {
        AnalysisError::Network(format!("request timed out: {err}"))
    } else {
        AnalysisError::Network(err.to_string())
    }
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
