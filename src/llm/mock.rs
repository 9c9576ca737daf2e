//! Deterministic provider that never touches the network.

use super::prompts::DEFAULT_ARTICLE_STYLE;
use super::provider::{flatten_line, ArticleRequest, LlmFuture, LlmProvider};

const DIFF_PREVIEW_CHARS: usize = 40;

/// Provider returning fixed, input-derived text. Registered as `mock`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockProvider;

impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn summarize_diff<'a>(&'a self, diff: &'a str) -> LlmFuture<'a> {
        Box::pin(async move {
            let preview: String = flatten_line(diff).chars().take(DIFF_PREVIEW_CHARS).collect();
            Ok(format!("[mock] {} changed lines: {preview}", diff.lines().count()))
        })
    }

    fn summarize_report<'a>(
        &'a self,
        raw_report: &'a str,
        commit_summaries: Option<&'a str>,
        memory: Option<&'a str>,
    ) -> LlmFuture<'a> {
        Box::pin(async move {
            let yes_no = |present: bool| if present { "yes" } else { "no" };
            Ok(format!(
                "# [mock] Daily summary\n\n\
                 - Report length: {} chars\n\
                 - Commit summaries: {}\n\
                 - Prior memory: {}",
                raw_report.chars().count(),
                yes_no(commit_summaries.is_some()),
                yes_no(memory.is_some()),
            ))
        })
    }

    fn distill_memory<'a>(&'a self, full_log: &'a str) -> LlmFuture<'a> {
        Box::pin(async move {
            let entries = full_log.lines().filter(|l| !l.trim().is_empty()).count();
            Ok(format!("# [mock] Project memory\n\n{entries} log entries distilled."))
        })
    }

    fn generate_article<'a>(&'a self, request: ArticleRequest<'a>) -> LlmFuture<'a> {
        Box::pin(async move {
            let style = if self.styles().iter().any(|s| s == request.style) {
                request.style
            } else {
                DEFAULT_ARTICLE_STYLE
            };
            let headline = request.summary.lines().next().unwrap_or_default();
            Ok(format!("# [mock] Article ({style})\n\n{headline}"))
        })
    }

    fn styles(&self) -> Vec<String> {
        super::prompts::builtin_article_styles().into_keys().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn outputs_are_deterministic() {
        let provider = MockProvider;
        let line = provider
            .summarize_diff("+fn a() {}\n-fn b() {}\n")
            .await
            .unwrap();
        assert_eq!(line, "[mock] 2 changed lines: +fn a() {} -fn b() {}");
        assert!(!line.contains('\n'));

        let report = provider
            .summarize_report("abc", Some("- x"), None)
            .await
            .unwrap();
        insta::assert_snapshot!(report, @r"
        # [mock] Daily summary

        - Report length: 3 chars
        - Commit summaries: yes
        - Prior memory: no
        ");

        let memory = provider.distill_memory("{}\n{}\n\n").await.unwrap();
        assert!(memory.contains("2 log entries"));
    }

    #[tokio::test]
    async fn unknown_style_uses_default() {
        let article = MockProvider
            .generate_article(ArticleRequest {
                summary: "Shipped v2\nmore",
                memory: None,
                readme: None,
                style: "limerick",
            })
            .await
            .unwrap();
        assert_eq!(article, "# [mock] Article (default)\n\nShipped v2");
    }
}
