//! Plugins shipped with devlog and the manifest format that instantiates them.

use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::sync::{mpsc, Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::plugin::{Plugin, RunEndEvent};
use super::ExtensionPoint;
use crate::config::RunContext;
use crate::git::{ChangeStats, Commit};
use crate::registry::{Constructor, Registry};

/// `<extensions>/plugins/*.yaml` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginManifest {
    /// Plugin name, unique per run.
    pub name: String,
    /// Plugin kind: `clean-output`, `redact`, `footer` or `command`.
    pub kind: String,
    /// Words replaced by `redact`.
    #[serde(default)]
    pub words: Vec<String>,
    /// Markup injected by `footer`.
    #[serde(default)]
    pub html: Option<String>,
    /// Program run by `command`.
    #[serde(default)]
    pub program: Option<String>,
    /// Arguments passed to `program`.
    #[serde(default)]
    pub args: Vec<String>,
    /// Points a `command` plugin subscribes to.
    #[serde(default)]
    pub points: Vec<ExtensionPoint>,
    /// Seconds a `command` plugin may run per call.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Plugin kinds that manifests may name.
pub fn plugin_kinds() -> Registry<dyn Plugin, PluginManifest> {
    let mut kinds = Registry::new("plugin kind");
    let builtins: [(&str, Constructor<dyn Plugin, PluginManifest>); 4] = [
        (
            "clean-output",
            Arc::new(|m: &PluginManifest| -> Result<Box<dyn Plugin>> {
                Ok(Box::new(CleanOutputPlugin::named(&m.name)))
            }),
        ),
        (
            "redact",
            Arc::new(|m: &PluginManifest| -> Result<Box<dyn Plugin>> {
                if m.words.is_empty() {
                    bail!("redact plugin '{}' lists no words", m.name);
                }
                Ok(Box::new(RedactPlugin::new(&m.name, m.words.clone())))
            }),
        ),
        (
            "footer",
            Arc::new(|m: &PluginManifest| -> Result<Box<dyn Plugin>> {
                let html = m
                    .html
                    .clone()
                    .with_context(|| format!("footer plugin '{}' has no html", m.name))?;
                Ok(Box::new(FooterPlugin::new(&m.name, html)))
            }),
        ),
        (
            "command",
            Arc::new(|m: &PluginManifest| -> Result<Box<dyn Plugin>> {
                let program = m
                    .program
                    .clone()
                    .with_context(|| format!("command plugin '{}' has no program", m.name))?;
                let mut plugin =
                    CommandPlugin::new(&m.name, program, m.args.clone(), m.points.clone());
                if let Some(secs) = m.timeout_secs {
                    plugin = plugin.with_timeout(Duration::from_secs(secs));
                }
                Ok(Box::new(plugin))
            }),
        ),
    ];
    for (name, constructor) in builtins {
        kinds.register_or_skip(name, constructor);
    }
    kinds
}

#[allow(clippy::unwrap_used)] // static patterns
fn fence_patterns() -> &'static (Regex, Regex) {
    static FENCES: OnceLock<(Regex, Regex)> = OnceLock::new();
    FENCES.get_or_init(|| {
        (
            Regex::new(r"(?i)^\s*```(?:markdown|md)?[ \t]*\r?\n").unwrap(),
            Regex::new(r"\r?\n?```\s*$").unwrap(),
        )
    })
}

/// Strips a fenced code block wrapped around the whole AI summary.
#[derive(Debug, Clone)]
pub struct CleanOutputPlugin {
    name: String,
}

impl CleanOutputPlugin {
    /// Instance with a custom name.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Removes a leading ```` ```markdown ```` line and a trailing fence.
    pub fn clean(text: &str) -> String {
        let (opening, closing) = fence_patterns();
        let stripped = opening.replace(text, "");
        let stripped = closing.replace(&stripped, "");
        stripped.trim().to_string()
    }
}

impl Default for CleanOutputPlugin {
    fn default() -> Self {
        Self::named("clean-output")
    }
}

impl Plugin for CleanOutputPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_summary_produced(&self, _ctx: &RunContext, summary: &str) -> Result<Option<String>> {
        Ok(Some(Self::clean(summary)))
    }
}

/// Replaces listed words in the summary with `***`.
#[derive(Debug, Clone)]
pub struct RedactPlugin {
    name: String,
    words: Vec<String>,
}

impl RedactPlugin {
    /// Redacts `words`; empty entries are ignored.
    pub fn new(name: impl Into<String>, words: Vec<String>) -> Self {
        Self {
            name: name.into(),
            words: words.into_iter().filter(|w| !w.is_empty()).collect(),
        }
    }
}

impl Plugin for RedactPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_summary_produced(&self, _ctx: &RunContext, summary: &str) -> Result<Option<String>> {
        let mut hits = 0;
        let mut out = summary.to_string();
        for word in &self.words {
            if out.contains(word.as_str()) {
                out = out.replace(word.as_str(), "***");
                hits += 1;
            }
        }
        if hits == 0 {
            return Ok(None);
        }
        println!("🛡️  [{}] redacted {hits} word(s)", self.name);
        Ok(Some(out))
    }
}

/// Injects markup right before `</body>` of the HTML report.
#[derive(Debug, Clone)]
pub struct FooterPlugin {
    name: String,
    html: String,
}

impl FooterPlugin {
    /// Footer plugin inserting `html`.
    pub fn new(name: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            html: html.into(),
        }
    }
}

impl Plugin for FooterPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_report_rendered(&self, _ctx: &RunContext, html: &str) -> Result<Option<String>> {
        Ok(html
            .rfind("</body>")
            .map(|at| format!("{}{}{}", &html[..at], self.html, &html[at..])))
    }
}

/// Per-call limit for command plugins without `timeout_secs`.
pub const COMMAND_PLUGIN_TIMEOUT: Duration = Duration::from_secs(30);

const EXIT_POLL: Duration = Duration::from_millis(20);

/// Runs an external program at the subscribed points.
///
/// Filter points pipe the current value to stdin and take stdout as the
/// replacement. Notify points send a JSON event on stdin and ignore output.
#[derive(Debug, Clone)]
pub struct CommandPlugin {
    name: String,
    program: String,
    args: Vec<String>,
    points: Vec<ExtensionPoint>,
    timeout: Duration,
}

impl CommandPlugin {
    /// Plugin running `program args..`. An empty `points` list subscribes
    /// to every point.
    pub fn new(
        name: impl Into<String>,
        program: impl Into<String>,
        args: Vec<String>,
        points: Vec<ExtensionPoint>,
    ) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args,
            points,
            timeout: COMMAND_PLUGIN_TIMEOUT,
        }
    }

    /// Overrides how long one call may run before the program is killed.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn subscribed(&self, point: ExtensionPoint) -> bool {
        self.points.is_empty() || self.points.contains(&point)
    }

    /// Feeds `input` to the program and collects its stdout. The program is
    /// killed once the call exceeds the plugin timeout.
    fn run(&self, point: ExtensionPoint, input: Vec<u8>) -> Result<String> {
        debug!(plugin = %self.name, point = %point, program = %self.program, "Running command plugin");
        let deadline = Instant::now() + self.timeout;
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("DEVLOG_EXTENSION_POINT", point.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("Failed to start '{}'", self.program))?;

        let mut stdin = child.stdin.take().context("Child stdin unavailable")?;
        let mut stdout = child.stdout.take().context("Child stdout unavailable")?;
        let name = self.name.clone();
        thread::spawn(move || {
            if let Err(e) = stdin.write_all(&input) {
                debug!(plugin = %name, "Child closed stdin early: {e}");
            }
        });
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            // The receiver is gone only after a timeout.
            let _ = tx.send(stdout.read_to_end(&mut buf).map(|_| buf));
        });

        let status = loop {
            let exited = child
                .try_wait()
                .with_context(|| format!("Failed to wait for '{}'", self.program))?;
            if let Some(status) = exited {
                break status;
            }
            if Instant::now() >= deadline {
                if let Err(e) = child.kill() {
                    warn!(plugin = %self.name, "Failed to kill '{}': {e}", self.program);
                }
                child.wait().ok();
                bail!("'{}' timed out after {:?}", self.program, self.timeout);
            }
            thread::sleep(EXIT_POLL);
        };
        if !status.success() {
            bail!("'{}' exited with {}", self.program, status);
        }

        let grace = deadline
            .saturating_duration_since(Instant::now())
            .max(Duration::from_secs(1));
        let output = rx
            .recv_timeout(grace)
            .with_context(|| format!("'{}' left its stdout open", self.program))?
            .with_context(|| format!("Failed to read output of '{}'", self.program))?;
        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    fn notify(&self, point: ExtensionPoint, ctx: &RunContext, payload: serde_json::Value) -> Result<()> {
        if !self.subscribed(point) {
            return Ok(());
        }
        let event = json!({
            "point": point,
            "project": ctx.locator.project_name(),
            "repo": ctx.locator.to_string(),
            "range": ctx.range.label(),
            "data": payload,
        });
        self.run(point, serde_json::to_vec(&event)?)?;
        Ok(())
    }

    fn filter(&self, point: ExtensionPoint, value: &str) -> Result<Option<String>> {
        if !self.subscribed(point) {
            return Ok(None);
        }
        let out = self.run(point, value.as_bytes().to_vec())?;
        Ok(Some(out))
    }
}

impl Plugin for CommandPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_run_start(&self, ctx: &RunContext) -> Result<()> {
        self.notify(ExtensionPoint::RunStart, ctx, serde_json::Value::Null)
    }

    fn on_data_fetched(&self, ctx: &RunContext, commits: &[Commit], stats: &ChangeStats) -> Result<()> {
        self.notify(
            ExtensionPoint::DataFetched,
            ctx,
            json!({ "commits": commits, "stats": stats }),
        )
    }

    fn on_run_end(&self, ctx: &RunContext, event: &RunEndEvent) -> Result<()> {
        self.notify(ExtensionPoint::RunEnd, ctx, serde_json::to_value(event)?)
    }

    fn on_summary_produced(&self, _ctx: &RunContext, summary: &str) -> Result<Option<String>> {
        self.filter(ExtensionPoint::SummaryProduced, summary)
    }

    fn on_report_rendered(&self, _ctx: &RunContext, html: &str) -> Result<Option<String>> {
        self.filter(ExtensionPoint::ReportRendered, html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RepoLocator, Settings};

    fn ctx() -> RunContext {
        RunContext::new(
            RepoLocator::parse("/srv/widgets").unwrap(),
            std::env::temp_dir(),
            Arc::new(Settings::isolated(Vec::<(String, String)>::new())),
        )
    }

    #[test]
    fn clean_strips_fences() {
        assert_eq!(
            CleanOutputPlugin::clean("```markdown\n# Title\n\nbody\n```\n"),
            "# Title\n\nbody"
        );
        assert_eq!(CleanOutputPlugin::clean("```MD\nx\n```"), "x");
        assert_eq!(CleanOutputPlugin::clean("  plain text \n"), "plain text");
    }

    #[test]
    fn redact_reports_no_change_when_clean() {
        let plugin = RedactPlugin::new("r", vec!["secret".to_string(), String::new()]);
        assert_eq!(plugin.on_summary_produced(&ctx(), "all good").unwrap(), None);
        assert_eq!(
            plugin
                .on_summary_produced(&ctx(), "a secret and a secret")
                .unwrap()
                .as_deref(),
            Some("a *** and a ***")
        );
    }

    #[test]
    fn footer_goes_before_body_close() {
        let plugin = FooterPlugin::new("f", "<p>x</p>");
        let out = plugin
            .on_report_rendered(&ctx(), "<html><body>r</body></html>")
            .unwrap();
        insta::assert_snapshot!(out.unwrap(), @"<html><body>r<p>x</p></body></html>");
        assert_eq!(plugin.on_report_rendered(&ctx(), "no body").unwrap(), None);
    }

    #[test]
    fn manifest_kinds_validate_fields() {
        let kinds = plugin_kinds();
        let manifest: PluginManifest =
            serde_yaml::from_str("name: f\nkind: footer\n").unwrap();
        assert!(kinds.resolve("footer", &manifest).is_err());
        let manifest: PluginManifest =
            serde_yaml::from_str("name: c\nkind: command\nprogram: cat\npoints: [summary-produced]\n")
                .unwrap();
        assert_eq!(manifest.points, vec![ExtensionPoint::SummaryProduced]);
        assert!(kinds.resolve("command", &manifest).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn command_filters_through_stdout() {
        let plugin = CommandPlugin::new(
            "upper",
            "tr",
            vec!["a-z".to_string(), "A-Z".to_string()],
            vec![ExtensionPoint::SummaryProduced],
        );
        let out = plugin.on_summary_produced(&ctx(), "shipped").unwrap();
        assert_eq!(out.as_deref(), Some("SHIPPED"));
        assert_eq!(plugin.on_report_rendered(&ctx(), "<html>").unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn command_failure_is_an_error() {
        let plugin = CommandPlugin::new("nope", "false", Vec::new(), Vec::new());
        assert!(plugin.on_run_start(&ctx()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn stalled_command_is_killed_at_the_deadline() {
        let plugin = CommandPlugin::new(
            "slow",
            "sleep",
            vec!["30".to_string()],
            vec![ExtensionPoint::SummaryProduced],
        )
        .with_timeout(Duration::from_millis(300));
        let started = Instant::now();
        let err = plugin
            .on_summary_produced(&ctx(), &"x".repeat(2 * 1024 * 1024))
            .unwrap_err();
        assert!(err.to_string().contains("timed out"), "{err}");
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn manifest_timeout_is_applied() {
        let manifest: PluginManifest = serde_yaml::from_str(
            "name: slow\nkind: command\nprogram: sleep\nargs: ['30']\ntimeout_secs: 0\n",
        )
        .unwrap();
        let plugin = plugin_kinds().resolve("command", &manifest).unwrap();
        let err = plugin.on_run_start(&ctx()).unwrap_err();
        assert!(err.to_string().contains("timed out"), "{err}");
    }
}
