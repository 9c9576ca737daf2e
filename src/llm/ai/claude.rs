//! Anthropic Messages API client implementation.

use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{AiClient, AiClientMetadata, AiFuture};
use crate::llm::error::LlmError;

/// Default Anthropic endpoint.
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Default model when `ANTHROPIC_MODEL` is not set.
pub const DEFAULT_CLAUDE_MODEL: &str = "claude-sonnet-4-5";

const MAX_TOKENS: i32 = 8_192;

/// Claude API request message.
#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

/// Claude API request body.
#[derive(Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: i32,
    system: String,
    messages: Vec<Message>,
}

/// Claude API response content.
#[derive(Deserialize)]
struct Content {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

/// Claude API response.
#[derive(Deserialize)]
struct ClaudeResponse {
    content: Vec<Content>,
}

/// Claude API client implementation.
pub struct ClaudeAiClient {
    /// HTTP client for API requests.
    client: Client,
    /// API key for authentication.
    api_key: String,
    /// Model identifier.
    model: String,
    /// API base URL.
    base_url: String,
}

impl ClaudeAiClient {
    /// Creates a new Claude AI client against the public endpoint.
    pub fn new(model: String, api_key: String) -> Result<Self> {
        Self::with_base_url(model, api_key, ANTHROPIC_BASE_URL.to_string())
    }

    /// Creates a client against a custom base URL.
    pub fn with_base_url(model: String, api_key: String, base_url: String) -> Result<Self> {
        Ok(Self {
            client: super::build_http_client()?,
            api_key,
            model,
            base_url,
        })
    }
}

impl AiClient for ClaudeAiClient {
    fn send_request<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
    ) -> AiFuture<'a> {
        Box::pin(async move {
            debug!(
                system_prompt_len = system_prompt.len(),
                user_prompt_len = user_prompt.len(),
                model = %self.model,
                "Preparing Claude API request"
            );

            let request = ClaudeRequest {
                model: self.model.clone(),
                max_tokens: MAX_TOKENS,
                system: system_prompt.to_string(),
                messages: vec![Message {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                }],
            };

            let url = super::join_url(&self.base_url, "v1/messages");
            info!(url = %url, model = %self.model, "Sending request to Claude API");

            let response = self
                .client
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .header("content-type", "application/json")
                .json(&request)
                .send()
                .await
                .map_err(|e| LlmError::NetworkError(e.to_string()))?;

            let response = super::check_error_response(response).await?;

            let claude_response: ClaudeResponse = response
                .json()
                .await
                .map_err(|e| LlmError::InvalidResponseFormat(e.to_string()))?;

            let result = claude_response
                .content
                .iter()
                .find(|c| c.content_type == "text")
                .map(|c| c.text.clone())
                .ok_or_else(|| {
                    LlmError::InvalidResponseFormat("No text content in response".to_string())
                        .into()
                });

            super::log_response_success("Claude", &result);
            result
        })
    }

    fn get_metadata(&self) -> AiClientMetadata {
        AiClientMetadata {
            provider: "Anthropic".to_string(),
            model: self.model.clone(),
            endpoint: self.base_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn extracts_first_text_block() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-ant"))
            .and(body_partial_json(serde_json::json!({
                "model": "claude-test",
                "system": "sys"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [
                    {"type": "thinking", "thinking": "..."},
                    {"type": "text", "text": "Added caching."}
                ]
            })))
            .mount(&server)
            .await;

        let client = ClaudeAiClient::with_base_url(
            "claude-test".to_string(),
            "sk-ant".to_string(),
            server.uri(),
        )
        .unwrap();
        let text = client.send_request("sys", "user").await.unwrap();
        assert_eq!(text, "Added caching.");
        assert_eq!(client.get_metadata().provider, "Anthropic");
    }

    #[tokio::test]
    async fn empty_content_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": []
            })))
            .mount(&server)
            .await;

        let client =
            ClaudeAiClient::with_base_url("m".to_string(), "k".to_string(), server.uri()).unwrap();
        let err = client.send_request("", "x").await.unwrap_err();
        assert!(err.to_string().contains("Invalid response format"));
    }
}
