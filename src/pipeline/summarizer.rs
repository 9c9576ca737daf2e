//! The four AI stages. Every stage logs its own failure and yields `None`.

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::MAX_DIFF_CHARS;
use crate::git::Commit;
use crate::llm::{ArticleRequest, LlmProvider};
use crate::source::DataSource;

/// Map output for a diff too large to send.
pub const DIFF_TOO_LARGE_PLACEHOLDER: &str = "(Diff too large, summary skipped)";

/// Active provider plus the Map stage's concurrency bound.
pub struct Summarizer {
    provider: Box<dyn LlmProvider>,
    concurrency: usize,
}

impl Summarizer {
    /// Runs Map with at most `concurrency` commits in flight.
    pub fn new(provider: Box<dyn LlmProvider>, concurrency: usize) -> Self {
        Self {
            provider,
            concurrency: concurrency.max(1),
        }
    }

    /// Name of the active provider.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Map: one line per non-merge commit, in commit order. Commits whose
    /// diff or summary fails are left out; `None` if nothing succeeded.
    pub async fn map(&self, source: &dyn DataSource, commits: &[Commit]) -> Option<String> {
        let permits = Semaphore::new(self.concurrency);
        let permits = &permits;
        let tasks = commits.iter().filter(|c| !c.is_merge()).map(|commit| async move {
            let _permit = permits.acquire().await.ok()?;
            let summary = self.summarize_commit(source, commit).await?;
            Some(format!(
                "* {} ({}): {summary}",
                commit.short_hash(),
                commit.author()
            ))
        });
        let lines: Vec<String> = join_all(tasks).await.into_iter().flatten().collect();

        if lines.is_empty() {
            info!("Map stage produced no commit summaries");
            return None;
        }
        info!(summaries = lines.len(), "Map stage finished");
        Some(lines.join("\n"))
    }

    async fn summarize_commit(&self, source: &dyn DataSource, commit: &Commit) -> Option<String> {
        let hash = commit.short_hash();
        let Some(diff) = source.get_diff(hash).await.filter(|d| !d.trim().is_empty()) else {
            warn!(commit = %hash, "No diff available, skipping commit");
            return None;
        };

        let chars = diff.chars().count();
        if chars > MAX_DIFF_CHARS {
            warn!(commit = %hash, chars, "Diff too large, skipping summary");
            return Some(DIFF_TOO_LARGE_PLACEHOLDER.to_string());
        }

        debug!(commit = %hash, chars, "Summarizing diff");
        match self.provider.summarize_diff(&diff).await {
            Ok(summary) if !summary.trim().is_empty() => Some(summary),
            Ok(_) => {
                warn!(commit = %hash, "Provider returned an empty diff summary");
                None
            }
            Err(e) => {
                warn!(commit = %hash, "Diff summary failed: {e:#}");
                None
            }
        }
    }

    /// Reduce: the day's narrative.
    pub async fn reduce(
        &self,
        raw_report: &str,
        commit_summaries: Option<&str>,
        memory: Option<&str>,
    ) -> Option<String> {
        let result = self
            .provider
            .summarize_report(raw_report, commit_summaries, memory)
            .await;
        non_empty(result, "Reduce")
    }

    /// Distill: a replacement memory document from the full log.
    pub async fn distill(&self, full_log: &str) -> Option<String> {
        non_empty(self.provider.distill_memory(full_log).await, "Distill")
    }

    /// Style transform.
    pub async fn style(
        &self,
        summary: &str,
        memory: Option<&str>,
        readme: Option<&str>,
        style: &str,
    ) -> Option<String> {
        let request = ArticleRequest {
            summary,
            memory,
            readme,
            style,
        };
        non_empty(self.provider.generate_article(request).await, "Style")
    }
}

fn non_empty(result: anyhow::Result<String>, stage: &str) -> Option<String> {
    match result {
        Ok(text) if !text.trim().is_empty() => {
            info!(stage, "AI stage finished");
            Some(text)
        }
        Ok(_) => {
            warn!(stage, "AI stage returned nothing");
            None
        }
        Err(e) => {
            warn!(stage, "AI stage failed: {e:#}");
            None
        }
    }
}

impl std::fmt::Debug for Summarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Summarizer")
            .field("provider", &self.provider.name())
            .field("concurrency", &self.concurrency)
            .finish()
    }
}
