//! Email delivery through a sendmail-compatible command.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Local;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use super::{Notifier, NotifyFuture};
use crate::config::RunContext;
use crate::report::html::escape;

/// Command used when `DEVLOG_SENDMAIL` is unset.
pub const DEFAULT_SENDMAIL: &str = "sendmail -t -i";

/// Sender used when `DEVLOG_MAIL_FROM` is unset.
pub const DEFAULT_MAIL_FROM: &str = "devlog@localhost";

const SENDMAIL_TIMEOUT: Duration = Duration::from_secs(60);
const BASE64_LINE: usize = 76;

/// Sends an HTML message with an optional attachment to the run's recipients.
/// Enabled iff the recipient list is non-empty.
#[derive(Debug, Clone)]
pub struct EmailNotifier {
    recipients: Vec<String>,
    from: String,
    command: Vec<String>,
    timeout: Duration,
}

impl EmailNotifier {
    /// Reads recipients from the run and the transport from settings.
    pub fn from_context(ctx: &RunContext) -> Self {
        let command = ctx
            .settings
            .get_env_var("DEVLOG_SENDMAIL")
            .unwrap_or_else(|| DEFAULT_SENDMAIL.to_string());
        let from = ctx
            .settings
            .get_env_var("DEVLOG_MAIL_FROM")
            .unwrap_or_else(|| DEFAULT_MAIL_FROM.to_string());
        Self::new(ctx.recipients.clone(), from, &command)
    }

    /// Notifier piping messages into `command` (split on whitespace).
    pub fn new(recipients: Vec<String>, from: impl Into<String>, command: &str) -> Self {
        Self {
            recipients,
            from: from.into(),
            command: command.split_whitespace().map(str::to_string).collect(),
            timeout: SENDMAIL_TIMEOUT,
        }
    }

    /// Overrides the deadline for writing the message and waiting for the
    /// mail command.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn deliver(&self, message: String) -> Result<()> {
        let (program, args) = self
            .command
            .split_first()
            .context("DEVLOG_SENDMAIL is empty")?;
        debug!(program = %program, "Piping message to mail command");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start mail command '{program}'"))?;

        let mut stdin = child.stdin.take().context("Mail command stdin unavailable")?;
        let exchange = async move {
            stdin
                .write_all(message.as_bytes())
                .await
                .context("Failed to write message to mail command")?;
            drop(stdin);
            child
                .wait_with_output()
                .await
                .context("Failed to wait for mail command")
        };
        // Dropping the exchange on timeout kills the child.
        let output = tokio::time::timeout(self.timeout, exchange)
            .await
            .context("Mail command timed out")??;
        if !output.status.success() {
            bail!(
                "Mail command exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        "email"
    }

    fn is_enabled(&self) -> bool {
        !self.recipients.is_empty()
    }

    fn send<'a>(
        &'a self,
        subject: &'a str,
        content: &'a str,
        attachment: Option<&'a Path>,
    ) -> NotifyFuture<'a> {
        Box::pin(async move {
            let attachment = match attachment {
                Some(path) => {
                    let bytes = tokio::fs::read(path)
                        .await
                        .with_context(|| format!("Failed to read attachment {}", path.display()))?;
                    let name = path
                        .file_name()
                        .map_or_else(|| "report".to_string(), |n| n.to_string_lossy().into_owned());
                    Some((name, bytes))
                }
                None => None,
            };
            let boundary = format!("devlog-{}", Local::now().format("%Y%m%d%H%M%S%f"));
            let message = build_message(
                &self.from,
                &self.recipients,
                subject,
                &html_body(content),
                attachment.as_ref().map(|(n, b)| (n.as_str(), b.as_slice())),
                &boundary,
            );
            self.deliver(message).await?;
            info!(recipients = %self.recipients.join(", "), "Email handed to mail command");
            Ok(())
        })
    }
}

/// Wraps plain content in a minimal HTML letter; full documents pass through.
pub fn html_body(content: &str) -> String {
    if content.contains("<html") {
        return content.to_string();
    }
    format!(
        "<html>\n<body>\n<p>Hello,</p>\n<p>Here is the latest development report:</p>\n<hr>\n\
         <pre style=\"font-family: monospace; white-space: pre-wrap;\">{}</pre>\n<hr>\n\
         <p>The full report is attached.</p>\n</body>\n</html>\n",
        escape(content)
    )
}

fn wrap_base64(bytes: &[u8]) -> String {
    let encoded = STANDARD.encode(bytes);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / BASE64_LINE * 2);
    for chunk in encoded.as_bytes().chunks(BASE64_LINE) {
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push_str("\r\n");
    }
    out
}

fn content_type(name: &str) -> &'static str {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".pdf") {
        "application/pdf"
    } else if lower.ends_with(".html") || lower.ends_with(".htm") {
        "text/html"
    } else {
        "application/octet-stream"
    }
}

/// Renders a `multipart/mixed` RFC 5322 message.
pub fn build_message(
    from: &str,
    to: &[String],
    subject: &str,
    html: &str,
    attachment: Option<(&str, &[u8])>,
    boundary: &str,
) -> String {
    let mut msg = String::new();
    msg.push_str(&format!("From: {from}\r\n"));
    msg.push_str(&format!("To: {}\r\n", to.join(", ")));
    msg.push_str(&format!(
        "Subject: =?UTF-8?B?{}?=\r\n",
        STANDARD.encode(subject.as_bytes())
    ));
    msg.push_str("MIME-Version: 1.0\r\n");
    msg.push_str(&format!(
        "Content-Type: multipart/mixed; boundary=\"{boundary}\"\r\n\r\n"
    ));

    msg.push_str(&format!("--{boundary}\r\n"));
    msg.push_str("Content-Type: text/html; charset=utf-8\r\n");
    msg.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
    msg.push_str(&wrap_base64(html.as_bytes()));

    if let Some((name, bytes)) = attachment {
        msg.push_str(&format!("--{boundary}\r\n"));
        msg.push_str(&format!(
            "Content-Type: {}; name=\"{name}\"\r\n",
            content_type(name)
        ));
        msg.push_str(&format!(
            "Content-Disposition: attachment; filename=\"{name}\"\r\n"
        ));
        msg.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
        msg.push_str(&wrap_base64(bytes));
    }
    msg.push_str(&format!("--{boundary}--\r\n"));
    msg
}
