//! PDF conversion through an external HTML-to-PDF command.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use super::html::article_document;
use crate::config::Settings;

/// Converter used when `DEVLOG_PDF_CONVERTER` is unset. `{output}` is
/// replaced with the target path; HTML arrives on stdin.
pub const DEFAULT_PDF_CONVERTER: &str = "prince - -o {output}";

const CONVERTER_TIMEOUT: Duration = Duration::from_secs(120);

/// External HTML-to-PDF command.
#[derive(Debug, Clone)]
pub struct PdfConverter {
    command: Vec<String>,
    timeout: Duration,
}

impl PdfConverter {
    /// Converter from `DEVLOG_PDF_CONVERTER` or the default.
    pub fn from_settings(settings: &Settings) -> Self {
        let command = settings
            .get_env_var("DEVLOG_PDF_CONVERTER")
            .unwrap_or_else(|| DEFAULT_PDF_CONVERTER.to_string());
        Self::new(&command)
    }

    /// Converter running `command` (split on whitespace).
    pub fn new(command: &str) -> Self {
        Self {
            command: command.split_whitespace().map(str::to_string).collect(),
            timeout: CONVERTER_TIMEOUT,
        }
    }

    /// Overrides the deadline covering both the HTML write and the wait.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Renders the markdown article next to `article_path` as a PDF with the
    /// same stem. Returns the PDF path.
    pub async fn convert_article(&self, article_path: &Path) -> Result<PathBuf> {
        let markdown = tokio::fs::read_to_string(article_path)
            .await
            .with_context(|| format!("Failed to read {}", article_path.display()))?;
        let title = article_path
            .file_stem()
            .map_or_else(|| "article".to_string(), |s| s.to_string_lossy().into_owned());
        let output = article_path.with_extension("pdf");
        self.convert(&article_document(&title, &markdown), &output)
            .await?;
        Ok(output)
    }

    /// Pipes `html` to the converter, writing `output`.
    pub async fn convert(&self, html: &str, output: &Path) -> Result<()> {
        let output_str = output.to_string_lossy();
        let args: Vec<String> = self
            .command
            .iter()
            .map(|a| a.replace("{output}", &output_str))
            .collect();
        let (program, args) = args.split_first().context("PDF converter command is empty")?;
        debug!(program = %program, output = %output.display(), "Running PDF converter");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("PDF converter '{program}' could not be started"))?;

        let mut stdin = child.stdin.take().context("Converter stdin unavailable")?;
        let exchange = async move {
            stdin
                .write_all(html.as_bytes())
                .await
                .context("Failed to write HTML to the converter")?;
            drop(stdin);
            child
                .wait_with_output()
                .await
                .context("Failed to wait for the PDF converter")
        };
        // Dropping the exchange on timeout kills the child.
        let result = tokio::time::timeout(self.timeout, exchange)
            .await
            .context("PDF converter timed out")??;
        if !result.status.success() {
            bail!(
                "PDF converter exited with {}: {}",
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            );
        }
        if !output.exists() {
            bail!("PDF converter succeeded but {} is missing", output.display());
        }
        info!(path = %output.display(), "PDF written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[cfg(unix)]
    #[tokio::test]
    async fn converter_receives_html_on_stdin() {
        let dir = TempDir::new().unwrap();
        let article = dir.path().join("PublicArticle_novel_20260101.md");
        fs::write(&article, "# Chapter one\n\nThe build went green.").unwrap();

        let converter = PdfConverter::new("sh -c cat>{output}");
        let pdf = converter.convert_article(&article).await.unwrap();
        assert_eq!(pdf.extension().unwrap(), "pdf");
        let written = fs::read_to_string(pdf).unwrap();
        assert!(written.contains("<h1>Chapter one</h1>"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stalled_converter_times_out() {
        let dir = TempDir::new().unwrap();
        let html = "x".repeat(2 * 1024 * 1024);
        let converter = PdfConverter::new("sleep 30").with_timeout(Duration::from_millis(300));
        let result = tokio::time::timeout(
            Duration::from_secs(10),
            converter.convert(&html, &dir.path().join("out.pdf")),
        )
        .await
        .expect("convert must respect its own deadline");
        assert!(result.unwrap_err().to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn missing_converter_is_an_error() {
        let dir = TempDir::new().unwrap();
        let converter = PdfConverter::new("devlog-no-such-converter - -o {output}");
        let err = converter
            .convert("<html/>", &dir.path().join("out.pdf"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("could not be started"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn silent_converter_without_output_fails() {
        let dir = TempDir::new().unwrap();
        let converter = PdfConverter::new("true");
        assert!(converter
            .convert("<html/>", &dir.path().join("out.pdf"))
            .await
            .is_err());
    }
}
