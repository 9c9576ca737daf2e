//! AI providers: clients, prompts and the provider registry.

pub mod ai;
pub mod error;
pub mod mock;
pub mod prompts;
pub mod provider;
#[cfg(test)]
pub(crate) mod test_utils;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::Settings;
use crate::registry::{discover_manifests, Constructor, Registry};

pub use ai::{AiClient, AiClientMetadata, AiFuture};
pub use error::LlmError;
pub use mock::MockProvider;
pub use provider::{ArticleRequest, LlmFuture, LlmProvider, PromptedProvider};

use ai::claude::{ClaudeAiClient, DEFAULT_CLAUDE_MODEL};
use ai::gemini::{GeminiAiClient, DEFAULT_GEMINI_MODEL};
use ai::openai::OpenAiAiClient;

/// Provider constructors keyed by provider id.
pub type ProviderRegistry = Registry<dyn LlmProvider, Settings>;

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_DEEPSEEK_MODEL: &str = "deepseek-chat";
const DEFAULT_OLLAMA_MODEL: &str = "llama3.1";

fn require_key(settings: &Settings, keys: &[&str]) -> Result<String, LlmError> {
    settings
        .get_env_vars(keys)
        .ok_or_else(|| LlmError::ApiKeyNotFound(keys.join(" or ")))
}

fn model_or(settings: &Settings, key: &str, default: &str) -> String {
    settings
        .get_env_var(key)
        .unwrap_or_else(|| default.to_string())
}

fn anthropic(settings: &Settings) -> Result<Box<dyn LlmProvider>> {
    let api_key = require_key(settings, &["ANTHROPIC_API_KEY", "CLAUDE_API_KEY"])?;
    let model = model_or(settings, "ANTHROPIC_MODEL", DEFAULT_CLAUDE_MODEL);
    let client = ClaudeAiClient::new(model, api_key)?;
    Ok(Box::new(PromptedProvider::new("anthropic", Box::new(client))))
}

fn openai(settings: &Settings) -> Result<Box<dyn LlmProvider>> {
    let api_key = require_key(settings, &["OPENAI_API_KEY"])?;
    let model = model_or(settings, "OPENAI_MODEL", DEFAULT_OPENAI_MODEL);
    let client = OpenAiAiClient::new_openai(model, api_key, settings.get_env_var("OPENAI_BASE_URL"))?;
    Ok(Box::new(PromptedProvider::new("openai", Box::new(client))))
}

fn deepseek(settings: &Settings) -> Result<Box<dyn LlmProvider>> {
    let api_key = require_key(settings, &["DEEPSEEK_API_KEY"])?;
    let model = model_or(settings, "DEEPSEEK_MODEL", DEFAULT_DEEPSEEK_MODEL);
    let client = OpenAiAiClient::new_deepseek(model, api_key)?;
    Ok(Box::new(PromptedProvider::new("deepseek", Box::new(client))))
}

fn ollama(settings: &Settings) -> Result<Box<dyn LlmProvider>> {
    let model = model_or(settings, "OLLAMA_MODEL", DEFAULT_OLLAMA_MODEL);
    let client = OpenAiAiClient::new_ollama(model, settings.get_env_var("OLLAMA_BASE_URL"))?;
    Ok(Box::new(PromptedProvider::new("ollama", Box::new(client))))
}

fn gemini(settings: &Settings) -> Result<Box<dyn LlmProvider>> {
    let api_key = require_key(settings, &["GEMINI_API_KEY"])?;
    let model = model_or(settings, "GEMINI_MODEL", DEFAULT_GEMINI_MODEL);
    let client = GeminiAiClient::new(model, api_key)?;
    Ok(Box::new(PromptedProvider::new("gemini", Box::new(client))))
}

fn mock(_settings: &Settings) -> Result<Box<dyn LlmProvider>> {
    Ok(Box::new(MockProvider))
}

/// Registry with every built-in provider.
pub fn builtin_providers() -> ProviderRegistry {
    let mut registry = ProviderRegistry::new("provider");
    let builtins: [(&str, Constructor<dyn LlmProvider, Settings>); 6] = [
        ("anthropic", Arc::new(anthropic)),
        ("openai", Arc::new(openai)),
        ("deepseek", Arc::new(deepseek)),
        ("ollama", Arc::new(ollama)),
        ("gemini", Arc::new(gemini)),
        ("mock", Arc::new(mock)),
    ];
    for (name, constructor) in builtins {
        registry.register_or_skip(name, constructor);
    }
    registry
}

/// Wire protocol a manifest provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Anthropic Messages API.
    Anthropic,
    /// OpenAI-compatible chat completions.
    Openai,
    /// Gemini `generateContent`.
    Gemini,
}

/// `<extensions>/providers/*.yaml` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderManifest {
    /// Provider id.
    pub name: String,
    /// Wire protocol.
    pub kind: ProviderKind,
    /// Model identifier.
    pub model: String,
    /// Endpoint override.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Extra or replacement article style templates.
    #[serde(default)]
    pub styles: BTreeMap<String, String>,
}

impl ProviderManifest {
    /// Builds the provider, reading the key from `settings`.
    pub fn build(&self, settings: &Settings) -> Result<Box<dyn LlmProvider>> {
        let api_key = match &self.api_key_env {
            Some(var) => Some(require_key(settings, &[var.as_str()])?),
            None => None,
        };

        let client: Box<dyn AiClient> = match self.kind {
            ProviderKind::Openai => {
                let base_url = self
                    .base_url
                    .clone()
                    .unwrap_or_else(|| ai::openai::OPENAI_BASE_URL.to_string());
                Box::new(OpenAiAiClient::new(
                    self.name.clone(),
                    self.model.clone(),
                    api_key,
                    base_url,
                    None,
                )?)
            }
            ProviderKind::Anthropic => {
                let api_key = api_key.ok_or_else(|| self.missing_key())?;
                let base_url = self
                    .base_url
                    .clone()
                    .unwrap_or_else(|| ai::claude::ANTHROPIC_BASE_URL.to_string());
                Box::new(ClaudeAiClient::with_base_url(
                    self.model.clone(),
                    api_key,
                    base_url,
                )?)
            }
            ProviderKind::Gemini => {
                let api_key = api_key.ok_or_else(|| self.missing_key())?;
                let base_url = self
                    .base_url
                    .clone()
                    .unwrap_or_else(|| ai::gemini::GEMINI_BASE_URL.to_string());
                Box::new(GeminiAiClient::with_base_url(
                    self.model.clone(),
                    api_key,
                    base_url,
                )?)
            }
        };

        Ok(Box::new(
            PromptedProvider::new(self.name.clone(), client).with_styles(self.styles.clone()),
        ))
    }

    fn missing_key(&self) -> LlmError {
        LlmError::ConfigurationError(format!(
            "provider '{}' needs api_key_env for kind {:?}",
            self.name, self.kind
        ))
    }
}

/// Registers every provider manifest in `dir`. Broken files and duplicate
/// names are logged and skipped. Returns the number of providers added.
pub fn discover_providers(registry: &mut ProviderRegistry, dir: &Path) -> usize {
    let mut added = 0;
    for manifest in discover_manifests::<ProviderManifest>(dir) {
        let body = Arc::new(manifest.body);
        let name = body.name.clone();
        let constructor: Constructor<dyn LlmProvider, Settings> =
            Arc::new(move |settings: &Settings| body.build(settings));
        if registry.register_or_skip(&name, constructor) {
            info!(provider = %name, path = %manifest.path.display(), "Registered provider");
            added += 1;
        }
    }
    debug!(added, "Provider discovery finished");
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn settings(vars: &[(&str, &str)]) -> Settings {
        Settings::isolated(vars.iter().map(|(k, v)| (*k, *v)))
    }

    #[test]
    fn builtins_are_registered() {
        let registry = builtin_providers();
        assert_eq!(
            registry.names(),
            vec!["anthropic", "openai", "deepseek", "ollama", "gemini", "mock"]
        );
    }

    #[test]
    fn missing_credentials_fail_construction() {
        let registry = builtin_providers();
        let err = registry.resolve("gemini", &settings(&[])).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<LlmError>(),
            Some(LlmError::ApiKeyNotFound(_))
        ));
        assert!(registry
            .resolve("gemini", &settings(&[("GEMINI_API_KEY", "k")]))
            .is_ok());
        assert!(registry.resolve("ollama", &settings(&[])).is_ok());
    }

    #[test]
    fn unknown_provider_is_a_registry_error() {
        let err = builtin_providers()
            .resolve("gpt-17", &settings(&[]))
            .err()
            .unwrap();
        assert!(err.to_string().contains("Unknown provider 'gpt-17'"));
    }

    #[test]
    fn discovery_tolerates_broken_manifest() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("good.yaml"),
            "name: local-llm\nkind: openai\nmodel: qwen\nbase_url: http://127.0.0.1:8080\nstyles:\n  haiku: Write a haiku.\n",
        )
        .unwrap();
        fs::write(dir.path().join("broken.yaml"), "name: oops\nkind: [").unwrap();
        fs::write(
            dir.path().join("dup.json"),
            r#"{"name": "mock", "kind": "openai", "model": "x"}"#,
        )
        .unwrap();

        let mut registry = builtin_providers();
        assert_eq!(discover_providers(&mut registry, dir.path()), 1);

        let provider = registry.resolve("local-llm", &settings(&[])).unwrap();
        assert_eq!(provider.name(), "local-llm");
        assert!(provider.styles().contains(&"haiku".to_string()));

        // The built-in mock keeps its slot.
        let mock = registry.resolve("mock", &settings(&[])).unwrap();
        assert_eq!(mock.name(), "mock");
    }

    #[test]
    fn manifest_key_variable_is_required_when_named() {
        let manifest = ProviderManifest {
            name: "corp".to_string(),
            kind: ProviderKind::Anthropic,
            model: "claude".to_string(),
            base_url: None,
            api_key_env: Some("CORP_KEY".to_string()),
            styles: BTreeMap::new(),
        };
        assert!(manifest.build(&settings(&[])).is_err());
        assert!(manifest.build(&settings(&[("CORP_KEY", "k")])).is_ok());

        let keyless = ProviderManifest {
            api_key_env: None,
            ..manifest
        };
        assert!(keyless.build(&settings(&[])).is_err());
    }
}
