//! OpenAI-compatible API client implementation (works with OpenAI, DeepSeek, Ollama, etc.)

use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{AiClient, AiClientMetadata, AiFuture};
use crate::llm::error::LlmError;

/// Public OpenAI endpoint.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// DeepSeek's OpenAI-compatible endpoint.
pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";

/// Default local Ollama endpoint.
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// OpenAI API request message
#[derive(Serialize, Debug)]
struct Message {
    role: String,
    content: String,
}

/// OpenAI API request body
#[derive(Serialize, Debug)]
struct OpenAiRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

/// OpenAI API response choice
#[derive(Deserialize, Debug)]
struct Choice {
    message: ResponseMessage,
}

/// OpenAI API response message
#[derive(Deserialize, Debug)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI API response
#[derive(Deserialize, Debug)]
struct OpenAiResponse {
    choices: Vec<Choice>,
    model: Option<String>,
}

/// OpenAI-compatible API client
pub struct OpenAiAiClient {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication (optional for Ollama)
    api_key: Option<String>,
    /// Model identifier
    model: String,
    /// Base URL for the API (e.g., "https://api.openai.com" or "http://localhost:11434")
    base_url: String,
    /// Temperature for response generation
    temperature: Option<f32>,
    /// Provider label reported in metadata
    provider: String,
}

impl OpenAiAiClient {
    /// Create a new OpenAI-compatible API client
    pub fn new(
        provider: impl Into<String>,
        model: String,
        api_key: Option<String>,
        base_url: String,
        temperature: Option<f32>,
    ) -> Result<Self> {
        Ok(Self {
            client: super::build_http_client()?,
            api_key,
            model,
            base_url,
            temperature,
            provider: provider.into(),
        })
    }

    /// Create a new client for Ollama with sensible defaults
    pub fn new_ollama(model: String, base_url: Option<String>) -> Result<Self> {
        Self::new(
            "Ollama",
            model,
            None,
            base_url.unwrap_or_else(|| OLLAMA_BASE_URL.to_string()),
            Some(0.1),
        )
    }

    /// Create a new client for OpenAI with sensible defaults
    pub fn new_openai(model: String, api_key: String, base_url: Option<String>) -> Result<Self> {
        Self::new(
            "OpenAI",
            model,
            Some(api_key),
            base_url.unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            Some(0.3),
        )
    }

    /// Create a new client for DeepSeek's OpenAI-compatible API
    pub fn new_deepseek(model: String, api_key: String) -> Result<Self> {
        Self::new(
            "DeepSeek",
            model,
            Some(api_key),
            DEEPSEEK_BASE_URL.to_string(),
            None,
        )
    }

    /// Build the full API URL
    fn get_api_url(&self) -> String {
        let url = super::join_url(&self.base_url, "v1/chat/completions");
        debug!(base_url = %self.base_url, full_url = %url, "Constructed OpenAI-compatible API URL");
        url
    }
}

impl AiClient for OpenAiAiClient {
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
                base_url = %self.base_url,
                "Preparing OpenAI-compatible API request"
            );

            // System prompt first, then user prompt
            let mut messages = Vec::new();
            if !system_prompt.is_empty() {
                messages.push(Message {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                });
            }
            messages.push(Message {
                role: "user".to_string(),
                content: user_prompt.to_string(),
            });

            let request = OpenAiRequest {
                model: self.model.clone(),
                messages,
                temperature: self.temperature,
                stream: false,
            };

            let api_url = self.get_api_url();
            info!(url = %api_url, model = %self.model, "Sending request to OpenAI-compatible API");

            let mut req_builder = self
                .client
                .post(&api_url)
                .header("Content-Type", "application/json")
                .json(&request);

            if let Some(ref api_key) = self.api_key {
                req_builder = req_builder.bearer_auth(api_key);
            }

            let response = req_builder
                .send()
                .await
                .map_err(|e| LlmError::NetworkError(e.to_string()))?;

            let response = super::check_error_response(response).await?;

            let openai_response: OpenAiResponse = response
                .json()
                .await
                .map_err(|e| LlmError::InvalidResponseFormat(e.to_string()))?;

            debug!(
                choice_count = openai_response.choices.len(),
                model = ?openai_response.model,
                "Received OpenAI-compatible API response"
            );

            let result = openai_response
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .map(|content| content.trim().to_string())
                .filter(|content| !content.is_empty())
                .ok_or_else(|| {
                    LlmError::InvalidResponseFormat("No content in response".to_string()).into()
                });

            super::log_response_success(&self.provider, &result);
            result
        })
    }

    fn get_metadata(&self) -> AiClientMetadata {
        AiClientMetadata {
            provider: self.provider.clone(),
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

    #[test]
    fn test_new_ollama() {
        let client = OpenAiAiClient::new_ollama("llama3".to_string(), None).unwrap();
        assert_eq!(client.model, "llama3");
        assert_eq!(client.base_url, "http://localhost:11434");
        assert!(client.api_key.is_none());
        assert_eq!(client.get_metadata().provider, "Ollama");
    }

    #[test]
    fn test_new_deepseek() {
        let client =
            OpenAiAiClient::new_deepseek("deepseek-chat".to_string(), "sk".to_string()).unwrap();
        assert_eq!(
            client.get_api_url(),
            "https://api.deepseek.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_get_api_url_trailing_slash() {
        let client = OpenAiAiClient::new(
            "Test",
            "test-model".to_string(),
            None,
            "http://localhost:11434/".to_string(),
            None,
        )
        .unwrap();
        assert_eq!(
            client.get_api_url(),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[tokio::test]
    async fn sends_system_then_user_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-test",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "diff here"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "  Fixed a bug.\n"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiAiClient::new_openai(
            "gpt-test".to_string(),
            "sk-test".to_string(),
            Some(server.uri()),
        )
        .unwrap();
        let text = client.send_request("be brief", "diff here").await.unwrap();
        assert_eq!(text, "Fixed a bug.");
    }

    #[tokio::test]
    async fn server_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let client = OpenAiAiClient::new_ollama("m".to_string(), Some(server.uri())).unwrap();
        let err = client.send_request("", "x").await.unwrap_err();
        assert!(err.to_string().contains("HTTP 500"));
    }

    #[tokio::test]
    async fn empty_choices_are_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let client = OpenAiAiClient::new_ollama("m".to_string(), Some(server.uri())).unwrap();
        assert!(client.send_request("", "x").await.is_err());
    }
}
