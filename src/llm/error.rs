//! Provider error handling.

use thiserror::Error;

/// Errors raised by AI clients and providers.
#[derive(Error, Debug)]
pub enum LlmError {
    /// A required credential is not configured.
    #[error("API key not found. Set {0} in the environment or settings.json")]
    ApiKeyNotFound(String),

    /// The API answered with a non-success status.
    #[error("API request failed: {0}")]
    ApiRequestFailed(String),

    /// The API answered with a body we could not interpret.
    #[error("Invalid response format: {0}")]
    InvalidResponseFormat(String),

    /// The request never reached the API.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Provider configuration is inconsistent.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}
