// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Anthropic Messages API.
//!
//! Each completion request is attempted up to `1 + RETRY_BUDGET` times.
//! Rate limits and server-side failures back off exponentially with jitter
//! before the next attempt; transport failures surface immediately as
//! `Unreachable` so the conversation driver can apply its own retry policy
//! instead of stacking a second one here.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use steward_core::StewardError;
use tracing::{debug, warn};

use crate::types::{ApiErrorResponse, MessageRequest, MessageResponse};

/// Base URL for the Anthropic Messages API.
const API_BASE_URL: &str = "https://api.anthropic.com/v1/messages";

/// Retries after the first attempt.
const RETRY_BUDGET: u32 = 2;
/// First backoff delay; doubles per attempt, plus jitter.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Statuses worth another attempt: rate limiting (429) and server-side
/// trouble (5xx, which includes Anthropic's 529 overloaded signal).
fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// How a single request attempt failed.
enum AttemptError {
    /// Worth retrying after a backoff.
    Retryable(String),
    /// Retrying cannot help; surface immediately.
    Fatal(StewardError),
}

/// HTTP client for Anthropic API communication.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    default_model: String,
    base_url: String,
}

impl AnthropicClient {
    /// Creates a new Anthropic API client.
    ///
    /// # Arguments
    /// * `api_key` - Anthropic API key for authentication
    /// * `api_version` - API version string (e.g., "2023-06-01")
    /// * `model` - Default model identifier
    pub fn new(api_key: String, api_version: String, model: String) -> Result<Self, StewardError> {
        let client = reqwest::Client::builder()
            .default_headers(build_headers(&api_key, &api_version)?)
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| StewardError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            default_model: model,
            base_url: API_BASE_URL.to_string(),
        })
    }

    /// Returns the default model identifier.
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Overrides the base URL (for testing with wiremock).
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    /// Sends a non-streaming request and returns the full response.
    pub async fn complete_message(
        &self,
        request: &MessageRequest,
    ) -> Result<MessageResponse, StewardError> {
        let mut wire = request.clone();
        wire.stream = false;

        let mut last_reason = String::new();
        for attempt in 0..=RETRY_BUDGET {
            if attempt > 0 {
                let delay = retry_delay(attempt - 1);
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    reason = %last_reason,
                    "backing off before retrying Anthropic request"
                );
                tokio::time::sleep(delay).await;
            }

            match self.send_once(&wire).await {
                Ok(response) => return Ok(response),
                Err(AttemptError::Fatal(e)) => return Err(e),
                Err(AttemptError::Retryable(reason)) => last_reason = reason,
            }
        }

        Err(StewardError::Provider {
            message: format!(
                "Anthropic API still failing after {} attempts: {last_reason}",
                RETRY_BUDGET + 1
            ),
            source: None,
        })
    }

    /// One request attempt: transport errors are fatal (`Unreachable`),
    /// retryable statuses come back with their decoded reason.
    async fn send_once(&self, request: &MessageRequest) -> Result<MessageResponse, AttemptError> {
        let response = self
            .client
            .post(&self.base_url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                AttemptError::Fatal(StewardError::Unreachable {
                    message: format!("Anthropic API unreachable: {e}"),
                })
            })?;

        let status = response.status();
        debug!(status = %status, "Anthropic response received");

        if status.is_success() {
            let body = response.text().await.map_err(|e| {
                AttemptError::Fatal(StewardError::Provider {
                    message: format!("failed to read response body: {e}"),
                    source: Some(Box::new(e)),
                })
            })?;
            return serde_json::from_str(&body).map_err(|e| {
                AttemptError::Fatal(StewardError::Provider {
                    message: format!("failed to parse API response: {e}"),
                    source: Some(Box::new(e)),
                })
            });
        }

        let body = response.text().await.unwrap_or_default();
        let reason = decode_error_body(status, &body);
        if is_retryable(status) {
            Err(AttemptError::Retryable(reason))
        } else {
            Err(AttemptError::Fatal(StewardError::Provider {
                message: reason,
                source: None,
            }))
        }
    }
}

fn build_headers(api_key: &str, api_version: &str) -> Result<HeaderMap, StewardError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        "x-api-key",
        HeaderValue::from_str(api_key)
            .map_err(|e| StewardError::Config(format!("invalid API key header value: {e}")))?,
    );
    headers.insert(
        "anthropic-version",
        HeaderValue::from_str(api_version)
            .map_err(|e| StewardError::Config(format!("invalid API version header value: {e}")))?,
    );
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    Ok(headers)
}

/// Exponential backoff with jitter: 500ms, 1s, 2s... plus up to 250ms.
fn retry_delay(completed_attempts: u32) -> Duration {
    use rand::Rng;
    let base = RETRY_BASE_DELAY.as_millis() as u64;
    let jitter = rand::thread_rng().gen_range(0..base / 2);
    Duration::from_millis((base << completed_attempts.min(4)) + jitter)
}

/// Renders the most useful error description available from the body.
fn decode_error_body(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api_error) => format!(
            "Anthropic API error ({}): {}",
            api_error.error.type_, api_error.error.message
        ),
        Err(_) if body.is_empty() => format!("API returned {status}"),
        Err(_) => format!("API returned {status}: {body}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ApiContent, ApiMessage};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> AnthropicClient {
        AnthropicClient::new(
            "test-api-key".into(),
            "2023-06-01".into(),
            "claude-sonnet-4-20250514".into(),
        )
        .unwrap()
        .with_base_url(base_url.to_string())
    }

    fn test_request() -> MessageRequest {
        MessageRequest {
            model: "claude-sonnet-4-20250514".into(),
            messages: vec![ApiMessage {
                role: "user".into(),
                content: ApiContent::Text("List pods".into()),
            }],
            system: None,
            max_tokens: 1024,
            stream: false,
            tools: None,
        }
    }

    fn success_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "msg_test",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": text}],
            "model": "claude-sonnet-4-20250514",
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        })
    }

    #[tokio::test]
    async fn complete_message_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("Hi there!")))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let result = client.complete_message(&test_request()).await.unwrap();

        assert_eq!(result.id, "msg_test");
        assert_eq!(result.usage.input_tokens, 10);
        assert_eq!(result.content.len(), 1);
    }

    #[tokio::test]
    async fn complete_message_retries_on_429() {
        let server = MockServer::start().await;

        let error_body = serde_json::json!({
            "error": {"type": "rate_limit_error", "message": "Rate limited"}
        });

        // First request returns 429, second returns 200.
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(429).set_body_json(&error_body))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("After retry")))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let result = client.complete_message(&test_request()).await.unwrap();
        assert_eq!(result.id, "msg_test");
    }

    #[tokio::test]
    async fn complete_message_fails_fast_on_400() {
        let server = MockServer::start().await;

        let error_body = serde_json::json!({
            "error": {"type": "invalid_request_error", "message": "Bad request"}
        });

        // A client error must not be retried.
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(400).set_body_json(&error_body))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let result = client.complete_message(&test_request()).await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("invalid_request_error"), "got: {err}");
    }

    #[tokio::test]
    async fn complete_message_exhausts_retry_budget_on_503() {
        let server = MockServer::start().await;

        let error_body = serde_json::json!({
            "error": {"type": "overloaded_error", "message": "Service overloaded"}
        });

        // Every attempt (initial + full retry budget) returns 503.
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(503).set_body_json(&error_body))
            .expect(u64::from(RETRY_BUDGET) + 1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let result = client.complete_message(&test_request()).await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("overloaded_error"), "got: {err}");
        assert!(err.contains("attempts"), "got: {err}");
    }

    #[tokio::test]
    async fn client_sends_correct_headers() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("x-api-key", "test-api-key"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("ok")))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let result = client.complete_message(&test_request()).await;
        assert!(result.is_ok(), "headers should match: {result:?}");
    }

    #[tokio::test]
    async fn connection_refused_maps_to_unreachable_without_retry() {
        // Nothing listens on this port; the driver owns transport retries.
        let client = test_client("http://127.0.0.1:1");
        let started = std::time::Instant::now();
        let result = client.complete_message(&test_request()).await;
        match result {
            Err(StewardError::Unreachable { .. }) => {}
            other => panic!("expected Unreachable, got {other:?}"),
        }
        assert!(
            started.elapsed() < RETRY_BASE_DELAY,
            "transport failures must not consume the backoff budget"
        );
    }

    #[test]
    fn retry_delay_grows_exponentially_with_jitter() {
        for completed in 0..3u32 {
            let delay = retry_delay(completed).as_millis() as u64;
            let floor = 500u64 << completed;
            assert!(
                (floor..floor + 250).contains(&delay),
                "attempt {completed}: {delay}ms outside [{floor}, {})",
                floor + 250
            );
        }
    }

    #[test]
    fn retryable_statuses_cover_rate_limits_and_server_errors() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_retryable(StatusCode::from_u16(529).unwrap()));
        assert!(!is_retryable(StatusCode::BAD_REQUEST));
        assert!(!is_retryable(StatusCode::NOT_FOUND));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn decode_error_body_prefers_structured_errors() {
        let structured = r#"{"error": {"type": "overloaded_error", "message": "Overloaded"}}"#;
        let decoded = decode_error_body(StatusCode::SERVICE_UNAVAILABLE, structured);
        assert_eq!(decoded, "Anthropic API error (overloaded_error): Overloaded");

        let plain = decode_error_body(StatusCode::BAD_GATEWAY, "upstream broke");
        assert!(plain.contains("502"));
        assert!(plain.contains("upstream broke"));

        let empty = decode_error_body(StatusCode::BAD_GATEWAY, "");
        assert!(empty.contains("502"));
    }
}
