//! The four-call summarization capability and its prompt-driven implementation.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use anyhow::Result;
use tracing::{debug, warn};

use super::ai::AiClient;
use super::prompts::{self, DEFAULT_ARTICLE_STYLE};

/// Boxed future returned by [`LlmProvider`] calls.
pub type LlmFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// Inputs of the style transform.
#[derive(Debug, Clone, Copy)]
pub struct ArticleRequest<'a> {
    /// Reduce output.
    pub summary: &'a str,
    /// Project memory, if any.
    pub memory: Option<&'a str>,
    /// Project description (README), if any.
    pub readme: Option<&'a str>,
    /// Requested style name.
    pub style: &'a str,
}

/// Swappable AI backend.
pub trait LlmProvider: Send + Sync {
    /// Registry name of the provider.
    fn name(&self) -> &str;

    /// One-line summary of a single commit diff.
    fn summarize_diff<'a>(&'a self, diff: &'a str) -> LlmFuture<'a>;

    /// The day's narrative from the raw report, optional per-commit
    /// summaries and optional prior memory.
    fn summarize_report<'a>(
        &'a self,
        raw_report: &'a str,
        commit_summaries: Option<&'a str>,
        memory: Option<&'a str>,
    ) -> LlmFuture<'a>;

    /// Replacement memory document from the full history log.
    fn distill_memory<'a>(&'a self, full_log: &'a str) -> LlmFuture<'a>;

    /// Re-voices the summary in a named style.
    fn generate_article<'a>(&'a self, request: ArticleRequest<'a>) -> LlmFuture<'a>;

    /// Styles this provider knows, sorted.
    fn styles(&self) -> Vec<String>;
}

/// Collapses all whitespace so the text fits on one line.
pub fn flatten_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Provider that renders the shared prompt set and sends it through an
/// [`AiClient`].
pub struct PromptedProvider {
    name: String,
    client: Box<dyn AiClient>,
    styles: BTreeMap<String, String>,
}

impl PromptedProvider {
    /// Wraps a client with the built-in styles.
    pub fn new(name: impl Into<String>, client: Box<dyn AiClient>) -> Self {
        Self {
            name: name.into(),
            client,
            styles: prompts::builtin_article_styles(),
        }
    }

    /// Adds or replaces style templates.
    #[must_use]
    pub fn with_styles(mut self, styles: BTreeMap<String, String>) -> Self {
        self.styles.extend(styles);
        self
    }

    /// Returns the template for `style`, falling back to the default style.
    fn style_template(&self, style: &str) -> (&str, &str) {
        if let Some((name, template)) = self.styles.get_key_value(style) {
            return (name.as_str(), template.as_str());
        }
        warn!(
            provider = %self.name,
            style = %style,
            "Unknown article style, falling back to '{DEFAULT_ARTICLE_STYLE}'"
        );
        self.styles
            .get_key_value(DEFAULT_ARTICLE_STYLE)
            .map_or((DEFAULT_ARTICLE_STYLE, ""), |(n, t)| (n.as_str(), t.as_str()))
    }
}

impl LlmProvider for PromptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn summarize_diff<'a>(&'a self, diff: &'a str) -> LlmFuture<'a> {
        Box::pin(async move {
            let user = prompts::diff_map_user_prompt(diff);
            let text = self
                .client
                .send_request(prompts::DIFF_MAP_SYSTEM_PROMPT, &user)
                .await?;
            Ok(flatten_line(&text))
        })
    }

    fn summarize_report<'a>(
        &'a self,
        raw_report: &'a str,
        commit_summaries: Option<&'a str>,
        memory: Option<&'a str>,
    ) -> LlmFuture<'a> {
        Box::pin(async move {
            let user = prompts::summary_reduce_user_prompt(raw_report, commit_summaries, memory);
            let text = self
                .client
                .send_request(prompts::SUMMARY_REDUCE_SYSTEM_PROMPT, &user)
                .await?;
            Ok(text.trim().to_string())
        })
    }

    fn distill_memory<'a>(&'a self, full_log: &'a str) -> LlmFuture<'a> {
        Box::pin(async move {
            let user = prompts::memory_distill_user_prompt(full_log);
            let text = self
                .client
                .send_request(prompts::MEMORY_DISTILL_SYSTEM_PROMPT, &user)
                .await?;
            Ok(text.trim().to_string())
        })
    }

    fn generate_article<'a>(&'a self, request: ArticleRequest<'a>) -> LlmFuture<'a> {
        Box::pin(async move {
            let (style, template) = self.style_template(request.style);
            debug!(provider = %self.name, style = %style, "Generating article");
            let system = prompts::article_system_prompt(template);
            let user = prompts::article_user_prompt(request.summary, request.memory, request.readme);
            let text = self.client.send_request(&system, &user).await?;
            Ok(text.trim().to_string())
        })
    }

    fn styles(&self) -> Vec<String> {
        self.styles.keys().cloned().collect()
    }
}
