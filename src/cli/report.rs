//! `devlog report`.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::debug;

use crate::config::{AttachFormat, RunOverrides, Settings};
use crate::pipeline::{Extensions, Orchestrator, RunStatus};

/// Generates a report for one repository.
#[derive(Parser, Debug)]
pub struct ReportCommand {
    /// Local path or remote URL of the repository.
    #[arg(short = 'r', long, conflicts_with = "project")]
    pub repo: Option<String>,

    /// Project alias from the alias table.
    #[arg(short = 'p', long)]
    pub project: Option<String>,

    /// Relative time phrase, e.g. "3 days ago" (default: "1 day ago").
    #[arg(short = 't', long = "time", conflicts_with = "number")]
    pub since: Option<String>,

    /// Report on the N most recent commits instead of a time window.
    #[arg(short = 'n', long)]
    pub number: Option<u32>,

    /// AI provider id.
    #[arg(long)]
    pub llm: Option<String>,

    /// Narrative style of the article.
    #[arg(long)]
    pub style: Option<String>,

    /// Attachment format for notifications (html or pdf).
    #[arg(long)]
    pub attach_format: Option<AttachFormat>,

    /// Comma-separated recipients.
    #[arg(short = 'e', long)]
    pub email: Option<String>,

    /// Skip every AI stage.
    #[arg(long)]
    pub no_ai: bool,

    /// Do not open the HTML report in a browser.
    #[arg(long)]
    pub no_browser: bool,
}

impl ReportCommand {
    fn overrides(self) -> RunOverrides {
        RunOverrides {
            project: self.project,
            repo: self.repo,
            since: self.since,
            number: self.number,
            llm: self.llm,
            style: self.style,
            attach_format: self.attach_format,
            email: self.email,
            no_ai: self.no_ai,
            no_browser: self.no_browser,
        }
    }

    /// Executes the report command.
    pub async fn execute(self) -> Result<()> {
        let settings = Arc::new(Settings::load()?);
        let ctx = self.overrides().resolve(settings.clone())?;
        debug!(?ctx, "Resolved run context");

        println!("📂 Project: {} ({})", ctx.locator.project_name(), ctx.locator);
        println!("🕒 Range: {}", ctx.range.label());

        let extensions = Extensions::load(&settings);
        let outcome = Orchestrator::new(ctx, extensions).run().await?;

        match outcome.status {
            Some(RunStatus::Completed) => {
                println!("✅ Done ({} commits)", outcome.commits);
            }
            Some(RunStatus::Aborted(_)) | None => {
                println!("⚠️  Run ended early, nothing was delivered");
            }
        }
        Ok(())
    }
}
