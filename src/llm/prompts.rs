//! Prompt templates shared by every prompted provider.

use std::collections::BTreeMap;

/// Style that every provider supports.
pub const DEFAULT_ARTICLE_STYLE: &str = "default";

/// System prompt for the per-commit (map) call.
pub const DIFF_MAP_SYSTEM_PROMPT: &str = r"You are a senior engineer reading a single git commit.
Summarize what the change does in ONE short sentence (at most 30 words).
Describe behaviour, not file names. Do not use markdown, bullet points or line breaks.";

/// System prompt for the daily narrative (reduce) call.
pub const SUMMARY_REDUCE_SYSTEM_PROMPT: &str = r"You are the technical lead writing the daily development report for a software project.
You receive the raw git report for the period, optional one-line summaries of individual commits,
and optional long-term project memory.

Write a concise markdown report with these sections:
## Overview
## Key Changes
## Risks and Follow-ups

Rules:
- Ground every statement in the provided data; never invent commits or people.
- Use the project memory only to put today's work in context.
- Group related commits together and mention authors where it helps.
- If the data is thin, keep the report short instead of padding it.";

/// System prompt for the memory distillation call.
///
/// The weighting policy lives entirely in this text.
pub const MEMORY_DISTILL_SYSTEM_PROMPT: &str = r"You maintain the long-term memory of a software project.
You receive the complete history log: one JSON object per line with date, additions, deletions and summary.
Rewrite it into a single compact markdown memory document using a three-tier policy:

1. Recent (last 3 days): keep full detail, including notable commits and people.
2. Mid-term (roughly the previous one to two weeks): compress each day into a short narrative.
3. Long-term (older): keep only milestones (releases, architectural shifts, major features).
   Entries older than one week with small line deltas and no lasting impact are dropped.

Output only the memory document, at most 600 words, newest information first.";

const ARTICLE_DEFAULT: &str = r"Rewrite today's technical summary as a short public-facing update for the project's users.
Explain what changed and why it matters in plain language. Keep it factual and under 500 words.";

const ARTICLE_NOVEL: &str = r"Retell today's development work as a chapter of a light-hearted novel.
The developers are the characters and the code changes are the plot. Stay faithful to the facts
in the technical summary and keep the chapter under 800 words.";

const ARTICLE_ANIME: &str = r"Retell today's development work as an energetic anime episode synopsis,
complete with a dramatic episode title. Every plot beat must map to a real change from the
technical summary. Keep it under 600 words.";

const ARTICLE_TECH: &str = r"Write a technical blog post for experienced engineers about today's changes.
Explain the design decisions, trade-offs and any notable implementation details visible in the
summary. Use headings and keep it under 1000 words.";

/// Built-in article style templates keyed by style name.
pub fn builtin_article_styles() -> BTreeMap<String, String> {
    [
        (DEFAULT_ARTICLE_STYLE, ARTICLE_DEFAULT),
        ("novel", ARTICLE_NOVEL),
        ("anime", ARTICLE_ANIME),
        ("tech", ARTICLE_TECH),
    ]
    .into_iter()
    .map(|(name, template)| (name.to_string(), template.to_string()))
    .collect()
}

/// User prompt for the map call.
pub fn diff_map_user_prompt(diff: &str) -> String {
    format!("Summarize this commit diff:\n\n```diff\n{diff}\n```")
}

/// User prompt for the reduce call. Absent inputs are left out entirely.
pub fn summary_reduce_user_prompt(
    raw_report: &str,
    commit_summaries: Option<&str>,
    memory: Option<&str>,
) -> String {
    let mut prompt = String::new();
    if let Some(memory) = memory.filter(|m| !m.trim().is_empty()) {
        prompt.push_str("## Project memory\n\n");
        prompt.push_str(memory.trim());
        prompt.push_str("\n\n");
    }
    if let Some(summaries) = commit_summaries.filter(|s| !s.trim().is_empty()) {
        prompt.push_str("## Commit summaries\n\n");
        prompt.push_str(summaries.trim());
        prompt.push_str("\n\n");
    }
    prompt.push_str("## Raw git report\n\n");
    prompt.push_str(raw_report.trim());
    prompt.push('\n');
    prompt
}

/// User prompt for the distill call.
pub fn memory_distill_user_prompt(full_log: &str) -> String {
    format!("Complete history log (JSON lines, oldest first):\n\n{full_log}")
}

/// System prompt for an article in the given style template.
pub fn article_system_prompt(style_template: &str) -> String {
    format!(
        "You turn internal engineering reports into articles.\n\n{style_template}\n\n\
         Output markdown only, starting with a level-one heading."
    )
}

/// User prompt for the article call.
pub fn article_user_prompt(summary: &str, memory: Option<&str>, readme: Option<&str>) -> String {
    let mut prompt = String::new();
    if let Some(readme) = readme.filter(|r| !r.trim().is_empty()) {
        prompt.push_str("## Project description (README)\n\n");
        prompt.push_str(readme.trim());
        prompt.push_str("\n\n");
    }
    if let Some(memory) = memory.filter(|m| !m.trim().is_empty()) {
        prompt.push_str("## Project history\n\n");
        prompt.push_str(memory.trim());
        prompt.push_str("\n\n");
    }
    prompt.push_str("## Today's technical summary\n\n");
    prompt.push_str(summary.trim());
    prompt.push('\n');
    prompt
}
