//! Sequences one report run.
//!
//! Whether AI is available is decided once, up front: the orchestrator holds
//! an optional [`Summarizer`] instead of flipping a flag on the run context.
//! Provider construction failures downgrade the run to text-only; an unknown
//! provider or data source name is a configuration error and fails the run
//! before anything happens.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Local};
use tracing::{error, info, warn};

use super::memory::{LogEntry, ProjectMemory};
use super::summarizer::Summarizer;
use crate::config::{AttachFormat, RunContext, Settings};
use crate::git::{ChangeStats, Commit};
use crate::hooks::{FilterPoint, NotifyEvent, PluginManager, RunEndEvent};
use crate::llm::{builtin_providers, discover_providers, ProviderRegistry};
use crate::notify::{dispatch_all, Delivery, NotifierFactory};
use crate::report::{self, HtmlReport, PdfConverter};
use crate::source::{DataSource, SourceFactory};

/// Every extensible capability available to a run.
#[derive(Debug)]
pub struct Extensions {
    /// AI providers.
    pub providers: ProviderRegistry,
    /// Data sources.
    pub sources: SourceFactory,
    /// Plugins in dispatch order.
    pub plugins: PluginManager,
    /// Delivery channels.
    pub notifiers: NotifierFactory,
}

impl Extensions {
    /// Built-in capabilities only.
    pub fn builtin() -> Self {
        Self {
            providers: builtin_providers(),
            sources: SourceFactory::with_builtins(),
            plugins: PluginManager::with_builtins(),
            notifiers: NotifierFactory::with_builtins(),
        }
    }

    /// Built-ins plus everything discovered under the configured
    /// extensions directory.
    pub fn load(settings: &Settings) -> Self {
        let mut extensions = Self::builtin();
        if let Some(root) = settings.extensions_dir() {
            extensions.discover(&root);
        }
        extensions
    }

    /// Scans `providers/`, `plugins/`, `notifiers/` and `sources/` under
    /// `root`. Broken entries are logged and skipped.
    pub fn discover(&mut self, root: &Path) {
        let providers = discover_providers(&mut self.providers, &root.join("providers"));
        let plugins = self.plugins.discover(&root.join("plugins"));
        let notifiers = self.notifiers.discover(&root.join("notifiers"));
        self.sources.discover(&root.join("sources"));
        info!(
            root = %root.display(),
            providers,
            plugins,
            notifiers,
            "Extension discovery finished"
        );
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// The pipeline ran to the end.
    Completed,
    /// A terminal failure stopped the run; nothing was delivered.
    Aborted(String),
}

/// What a run produced.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    /// `None` until the run finishes.
    pub status: Option<RunStatus>,
    /// Provider used, if AI was available.
    pub provider: Option<String>,
    /// Commits fetched (merges included).
    pub commits: usize,
    /// Plain-text report.
    pub text_report: Option<String>,
    /// Map output.
    pub commit_summaries: Option<String>,
    /// Reduce output after the summary filter chain.
    pub summary: Option<String>,
    /// Saved HTML report.
    pub html_report: Option<PathBuf>,
    /// Saved style article.
    pub article: Option<PathBuf>,
    /// File attached to notifications.
    pub attachment: Option<PathBuf>,
    /// Whether the log gained an entry.
    pub log_appended: bool,
    /// Whether the memory document was rewritten.
    pub memory_updated: bool,
    /// Per-channel delivery results.
    pub deliveries: Vec<Delivery>,
}

impl RunOutcome {
    /// Whether the run reached the end of the pipeline.
    pub fn completed(&self) -> bool {
        self.status == Some(RunStatus::Completed)
    }
}

/// Drives one run for one context.
#[derive(Debug)]
pub struct Orchestrator {
    ctx: RunContext,
    extensions: Extensions,
}

impl Orchestrator {
    /// Orchestrator over the given capabilities.
    pub fn new(ctx: RunContext, extensions: Extensions) -> Self {
        Self { ctx, extensions }
    }

    /// The run context.
    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Builds the summarizer, or `None` when AI is disabled or the provider
    /// cannot be constructed. An unknown provider id is an error.
    fn summarizer(&self) -> Result<Option<Summarizer>> {
        if self.ctx.no_ai {
            info!("AI disabled for this run");
            return Ok(None);
        }
        let constructor = self.extensions.providers.constructor(&self.ctx.provider_id)?;
        match constructor(&*self.ctx.settings) {
            Ok(provider) => {
                info!(provider = %provider.name(), "AI provider ready");
                Ok(Some(Summarizer::new(
                    provider,
                    self.ctx.settings.map_concurrency(),
                )))
            }
            Err(e) => {
                error!(provider = %self.ctx.provider_id, "AI provider unavailable: {e:#}");
                println!(
                    "⚠️  AI provider '{}' could not be initialised, continuing without AI",
                    self.ctx.provider_id
                );
                Ok(None)
            }
        }
    }

    /// Runs the pipeline.
    ///
    /// Returns an error only for configuration problems detected before the
    /// run starts. Terminal failures during the run end it early with
    /// [`RunStatus::Aborted`]; every other failure is logged and skipped.
    pub async fn run(&self) -> Result<RunOutcome> {
        let summarizer = self.summarizer()?;
        let source = self.extensions.sources.create(&self.ctx)?;

        let plugins = &self.extensions.plugins;
        plugins.notify(&self.ctx, NotifyEvent::RunStart);

        let mut outcome = RunOutcome {
            provider: summarizer.as_ref().map(|s| s.provider_name().to_string()),
            ..RunOutcome::default()
        };
        let result = self
            .run_stages(summarizer.as_ref(), source.as_ref(), &mut outcome)
            .await;

        let end = match &result {
            Ok(()) => RunEndEvent::completed("report generated"),
            Err(reason) => RunEndEvent::aborted(reason.clone()),
        };
        plugins.notify(&self.ctx, NotifyEvent::RunEnd(&end));

        outcome.status = Some(match result {
            Ok(()) => RunStatus::Completed,
            Err(reason) => {
                println!("❌ {reason}");
                RunStatus::Aborted(reason)
            }
        });
        Ok(outcome)
    }

    /// The stages after setup. `Err` carries the reason of a terminal
    /// failure.
    async fn run_stages(
        &self,
        summarizer: Option<&Summarizer>,
        source: &dyn DataSource,
        outcome: &mut RunOutcome,
    ) -> Result<(), String> {
        let ctx = &self.ctx;
        let now = Local::now();
        let store = ProjectMemory::new(&ctx.project_dir);
        let prior_memory = summarizer.and_then(|_| store.load_memory());

        if !source.validate().await {
            return Err(format!("{} is not an accessible git repository", ctx.locator));
        }
        let readme = source.get_readme().await;

        let commits = source.get_commits().await;
        outcome.commits = commits.len();
        if commits.is_empty() {
            return Err(format!("No commits found {}", ctx.range.label()));
        }
        let stats = source.get_stats().await;
        self.extensions.plugins.notify(
            ctx,
            NotifyEvent::DataFetched {
                commits: &commits,
                stats: &stats,
            },
        );

        let text_report = report::render_text_report(&commits, &stats, &ctx.range.label(), now);
        outcome.text_report = Some(text_report.clone());

        if let Some(summarizer) = summarizer {
            println!("🤖 Summarizing {} commits with {}...", commits.len(), summarizer.provider_name());
            outcome.commit_summaries = summarizer.map(source, &commits).await;
            outcome.summary = summarizer
                .reduce(
                    &text_report,
                    outcome.commit_summaries.as_deref(),
                    prior_memory.as_deref(),
                )
                .await
                .map(|s| {
                    self.extensions
                        .plugins
                        .filter(FilterPoint::SummaryProduced, ctx, s)
                });
        }

        let html = self.render_html(&commits, &stats, outcome.summary.as_deref(), now);
        let html_path = report::save_html_report(&ctx.project_dir, &html, now)
            .map_err(|e| format!("{e:#}"))?;
        println!("✅ HTML report saved: {}", html_path.display());
        outcome.html_report = Some(html_path.clone());

        if let (Some(summarizer), Some(summary)) = (summarizer, outcome.summary.clone()) {
            let fresh_memory = self
                .update_memory(summarizer, &store, &summary, &stats, now, outcome)
                .await;
            if self.wants_article() {
                let memory = fresh_memory.as_deref().or(prior_memory.as_deref());
                outcome.article = self
                    .write_article(summarizer, &summary, memory, readme.as_deref(), now)
                    .await;
            }
        }

        if ctx.recipients.is_empty() {
            print_console(outcome, &text_report, &stats, &commits);
        }
        if !ctx.no_browser {
            report::open_in_browser(&html_path);
        }

        self.deliver(outcome, &text_report, &html_path, now).await;
        Ok(())
    }

    fn render_html(
        &self,
        commits: &[Commit],
        stats: &ChangeStats,
        summary: Option<&str>,
        now: DateTime<Local>,
    ) -> String {
        let project = self.ctx.locator.project_name();
        let range_label = self.ctx.range.label();
        let html = report::render_html_report(&HtmlReport {
            project: &project,
            range_label: &range_label,
            summary,
            commits,
            stats,
            generated_at: now,
        });
        self.extensions
            .plugins
            .filter(FilterPoint::ReportRendered, &self.ctx, html)
    }

    /// Appends the log entry and rewrites the memory document. Returns the
    /// new memory on success.
    async fn update_memory(
        &self,
        summarizer: &Summarizer,
        store: &ProjectMemory,
        summary: &str,
        stats: &ChangeStats,
        now: DateTime<Local>,
        outcome: &mut RunOutcome,
    ) -> Option<String> {
        let entry = LogEntry {
            date: now.format("%Y-%m-%d").to_string(),
            additions: stats.additions,
            deletions: stats.deletions,
            summary: summary.to_string(),
        };
        if let Err(e) = store.append(&entry) {
            error!("Failed to append to project log: {e:#}");
            return None;
        }
        outcome.log_appended = true;

        let full_log = match store.read_log() {
            Ok(Some(log)) => log,
            Ok(None) => return None,
            Err(e) => {
                error!("Failed to read project log: {e:#}");
                return None;
            }
        };
        let memory = summarizer.distill(&full_log).await?;
        match store.write_memory(&memory) {
            Ok(()) => {
                outcome.memory_updated = true;
                Some(memory)
            }
            Err(e) => {
                error!("Failed to rewrite project memory: {e:#}");
                None
            }
        }
    }

    /// The article is needed for a PDF attachment, or to show a custom style
    /// on the console when nobody receives the report.
    fn wants_article(&self) -> bool {
        let ctx = &self.ctx;
        if ctx.recipients.is_empty() {
            ctx.wants_custom_style()
        } else {
            ctx.attach_format == AttachFormat::Pdf
        }
    }

    async fn write_article(
        &self,
        summarizer: &Summarizer,
        summary: &str,
        memory: Option<&str>,
        readme: Option<&str>,
        now: DateTime<Local>,
    ) -> Option<PathBuf> {
        let style = &self.ctx.style;
        println!("🤖 Writing the '{style}' article...");
        let article = summarizer.style(summary, memory, readme, style).await?;
        match report::save_article(&self.ctx.project_dir, style, &article, now) {
            Ok(path) => {
                if self.ctx.recipients.is_empty() {
                    println!("\n{}", "=".repeat(50));
                    println!("📰 Article ({style}), saved to {}:", path.display());
                    println!("{}", "=".repeat(50));
                    println!("{article}");
                }
                Some(path)
            }
            Err(e) => {
                error!("{e:#}");
                None
            }
        }
    }

    /// Chooses the attachment and sends through every enabled channel.
    async fn deliver(
        &self,
        outcome: &mut RunOutcome,
        text_report: &str,
        html_path: &Path,
        now: DateTime<Local>,
    ) {
        let notifiers = self.extensions.notifiers.active(&self.ctx);
        if notifiers.is_empty() {
            return;
        }

        let attachment = self.attachment(outcome.article.as_deref(), html_path).await;
        let content = outcome.summary.as_deref().unwrap_or_else(|| {
            warn!("No AI summary, sending the text report");
            text_report
        });
        let subject = format!(
            "{} development report - {}",
            self.ctx.locator.project_name(),
            now.format("%Y-%m-%d")
        );

        println!("📨 Sending through {} channel(s)...", notifiers.len());
        outcome.deliveries = dispatch_all(&notifiers, &subject, content, Some(&attachment)).await;
        for delivery in &outcome.deliveries {
            if delivery.success {
                println!("   ✅ {}: sent", delivery.name);
            } else {
                println!("   ❌ {}: failed (see log)", delivery.name);
            }
        }
        outcome.attachment = Some(attachment);
    }

    /// PDF of the article when requested and possible, else the HTML report.
    async fn attachment(&self, article: Option<&Path>, html_path: &Path) -> PathBuf {
        if self.ctx.attach_format != AttachFormat::Pdf {
            return html_path.to_path_buf();
        }
        let Some(article) = article else {
            warn!("PDF requested but no article was produced, attaching HTML");
            return html_path.to_path_buf();
        };
        let converter = PdfConverter::from_settings(&self.ctx.settings);
        match converter.convert_article(article).await {
            Ok(pdf) => pdf,
            Err(e) => {
                warn!("PDF conversion failed, attaching HTML: {e:#}");
                html_path.to_path_buf()
            }
        }
    }
}

fn print_console(outcome: &RunOutcome, text_report: &str, stats: &ChangeStats, commits: &[Commit]) {
    println!("\n{}", "=".repeat(50));
    match (&outcome.summary, &outcome.provider) {
        (Some(summary), Some(provider)) => {
            println!("🤖 AI summary ({provider}):");
            println!("{}", "=".repeat(50));
            println!("{summary}");
        }
        _ => {
            println!("📄 Text report (no AI summary):");
            println!("{}", "=".repeat(50));
            println!("{text_report}");
        }
    }
    println!("{}", "=".repeat(50));

    let mut authors: Vec<&str> = commits.iter().map(Commit::author).collect();
    authors.sort_unstable();
    authors.dedup();
    println!("\n📊 Change statistics:");
    println!("   {}", report::text::stats_line(stats));
    println!("   👥 Authors: {}", authors.len());
}
