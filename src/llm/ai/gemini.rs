//! Google Gemini `generateContent` client implementation.

use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{AiClient, AiClientMetadata, AiFuture};
use crate::llm::error::LlmError;

/// Public Gemini endpoint.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default model when `GEMINI_MODEL` is not set.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

#[derive(Serialize, Deserialize, Debug)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Serialize, Debug)]
struct RequestContent {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    contents: Vec<RequestContent>,
}

#[derive(Deserialize, Debug)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

/// Gemini API client.
pub struct GeminiAiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiAiClient {
    /// Creates a client against the public endpoint.
    pub fn new(model: String, api_key: String) -> Result<Self> {
        Self::with_base_url(model, api_key, GEMINI_BASE_URL.to_string())
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

    fn get_api_url(&self) -> String {
        let model = self.model.trim_start_matches("models/");
        super::join_url(
            &self.base_url,
            &format!("v1beta/models/{model}:generateContent"),
        )
    }
}

impl AiClient for GeminiAiClient {
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
                "Preparing Gemini API request"
            );

            let request = GenerateRequest {
                system_instruction: (!system_prompt.is_empty()).then(|| SystemInstruction {
                    parts: vec![Part {
                        text: system_prompt.to_string(),
                    }],
                }),
                contents: vec![RequestContent {
                    role: "user".to_string(),
                    parts: vec![Part {
                        text: user_prompt.to_string(),
                    }],
                }],
            };

            let url = self.get_api_url();
            info!(url = %url, model = %self.model, "Sending request to Gemini API");

            let response = self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&request)
                .send()
                .await
                .map_err(|e| LlmError::NetworkError(e.to_string()))?;

            let response = super::check_error_response(response).await?;

            let parsed: GenerateResponse = response
                .json()
                .await
                .map_err(|e| LlmError::InvalidResponseFormat(e.to_string()))?;

            let text: String = parsed
                .candidates
                .into_iter()
                .next()
                .and_then(|c| c.content)
                .map(|content| content.parts.into_iter().map(|p| p.text).collect())
                .unwrap_or_default();

            let result = if text.trim().is_empty() {
                Err(LlmError::InvalidResponseFormat("Empty candidate text".to_string()).into())
            } else {
                Ok(text)
            };
            super::log_response_success("Gemini", &result);
            result
        })
    }

    fn get_metadata(&self) -> AiClientMetadata {
        AiClientMetadata {
            provider: "Gemini".to_string(),
            model: self.model.clone(),
            endpoint: self.base_url.clone(),
        }
    }
}
