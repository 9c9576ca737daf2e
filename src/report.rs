//! Rendered outputs: text report, HTML report, styled article and PDF.

pub mod html;
pub mod pdf;
pub mod text;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tracing::info;

use crate::config::REPORT_FILENAME_PREFIX;
use crate::git::Commit;

pub use html::{render_html_report, HtmlReport};
pub use pdf::PdfConverter;
pub use text::render_text_report;

/// Prefix of saved style articles.
pub const ARTICLE_FILENAME_PREFIX: &str = "PublicArticle";

/// Commits by one author, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorGroup<'a> {
    /// Author name.
    pub author: &'a str,
    /// The author's non-merge commits.
    pub commits: Vec<&'a Commit>,
}

/// Groups non-merge commits by author, keeping the order in which authors
/// first appear.
pub fn group_by_author(commits: &[Commit]) -> Vec<AuthorGroup<'_>> {
    let mut groups: Vec<AuthorGroup<'_>> = Vec::new();
    for commit in commits.iter().filter(|c| !c.is_merge()) {
        match groups.iter_mut().find(|g| g.author == commit.author()) {
            Some(group) => group.commits.push(commit),
            None => groups.push(AuthorGroup {
                author: commit.author(),
                commits: vec![commit],
            }),
        }
    }
    groups
}

/// Number of merge commits.
pub fn merge_count(commits: &[Commit]) -> usize {
    commits.iter().filter(|c| c.is_merge()).count()
}

/// `GitReport_<YYYYmmdd_HHMMSS>.html`.
pub fn report_filename(at: DateTime<Local>) -> String {
    format!("{REPORT_FILENAME_PREFIX}_{}.html", at.format("%Y%m%d_%H%M%S"))
}

/// `PublicArticle_<style>_<YYYYmmdd>.md`.
pub fn article_filename(style: &str, at: DateTime<Local>) -> String {
    format!("{ARTICLE_FILENAME_PREFIX}_{style}_{}.md", at.format("%Y%m%d"))
}

/// Writes the HTML report into `dir`.
pub fn save_html_report(dir: &Path, html: &str, at: DateTime<Local>) -> Result<PathBuf> {
    let path = dir.join(report_filename(at));
    fs::write(&path, html)
        .with_context(|| format!("Failed to save HTML report to {}", path.display()))?;
    info!(path = %path.display(), "Saved HTML report");
    Ok(path)
}

/// Writes a style article into `dir`.
pub fn save_article(dir: &Path, style: &str, article: &str, at: DateTime<Local>) -> Result<PathBuf> {
    let path = dir.join(article_filename(style, at));
    fs::write(&path, article)
        .with_context(|| format!("Failed to save article to {}", path.display()))?;
    info!(path = %path.display(), "Saved article");
    Ok(path)
}

/// Opens `path` with the platform's default handler. Failures are logged.
pub fn open_in_browser(path: &Path) {
    let mut command = if cfg!(target_os = "windows") {
        let mut c = std::process::Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    } else if cfg!(target_os = "macos") {
        std::process::Command::new("open")
    } else {
        std::process::Command::new("xdg-open")
    };
    match command.arg(path).spawn() {
        Ok(_) => info!(path = %path.display(), "Opened report in browser"),
        Err(e) => tracing::warn!(
            path = %path.display(),
            "Could not open the report automatically: {e}"
        ),
    }
}
