//! AI client trait and metadata definitions.

pub mod claude;
pub mod gemini;
pub mod openai;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

use crate::llm::error::LlmError;

/// HTTP request timeout for AI API calls.
///
/// Reduce and distill prompts can carry a long history, so this is generous.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Metadata about an AI client implementation.
#[derive(Clone, Debug)]
pub struct AiClientMetadata {
    /// Service provider name.
    pub provider: String,
    /// Model identifier.
    pub model: String,
    /// Endpoint the client talks to.
    pub endpoint: String,
}

// ── Shared helpers for AI client implementations ────────────────────

/// Builds an HTTP client with the standard request timeout.
pub(crate) fn build_http_client() -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}

/// Joins a base URL and an endpoint path without doubling slashes.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Checks an HTTP response for error status and returns a structured error
/// if non-success.
///
/// On success, returns the response unchanged for further processing.
pub(crate) async fn check_error_response(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let error_text = response.text().await.unwrap_or_else(|e| {
        tracing::debug!("Failed to read error response body: {e}");
        String::new()
    });
    Err(LlmError::ApiRequestFailed(format!("HTTP {status}: {error_text}")).into())
}

/// Logs successful text extraction from an AI API response.
pub(crate) fn log_response_success(provider: &str, result: &Result<String>) {
    if let Ok(text) = result {
        tracing::debug!(
            response_len = text.len(),
            "Successfully extracted text content from {} API response",
            provider
        );
        tracing::trace!(
            response_content = %text,
            "{} API response content",
            provider
        );
    }
}

/// Boxed future returned by [`AiClient::send_request`].
pub type AiFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// A chat-style completion endpoint: one system prompt, one user prompt,
/// one text reply.
pub trait AiClient: Send + Sync {
    /// Sends one prompt pair and returns the reply text.
    fn send_request<'a>(&'a self, system_prompt: &'a str, user_prompt: &'a str) -> AiFuture<'a>;

    /// Returns metadata about the AI client implementation.
    fn get_metadata(&self) -> AiClientMetadata;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(
            join_url("http://localhost:11434/", "/v1/chat/completions"),
            "http://localhost:11434/v1/chat/completions"
        );
        assert_eq!(
            join_url("https://api.deepseek.com", "v1/chat/completions"),
            "https://api.deepseek.com/v1/chat/completions"
        );
    }

    #[tokio::test]
    async fn error_status_becomes_api_request_failed() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let response = reqwest::get(server.uri()).await.unwrap();
        let err = check_error_response(response).await.unwrap_err();
        let llm_err = err.downcast_ref::<LlmError>().unwrap();
        assert!(matches!(llm_err, LlmError::ApiRequestFailed(msg) if msg.contains("429") && msg.contains("slow down")));
    }
}
