//! Generic JSON webhook.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::{Notifier, NotifyFuture};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct Payload<'a> {
    subject: &'a str,
    content: &'a str,
    attachment: Option<String>,
}

/// POSTs `{subject, content, attachment}` as JSON. Enabled iff a URL is set.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    name: String,
    url: Option<String>,
    client: Client,
}

impl WebhookNotifier {
    /// Channel named `name` posting to `url`.
    pub fn new(name: impl Into<String>, url: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            name: name.into(),
            url: url.filter(|u| !u.trim().is_empty()),
            client,
        })
    }
}

impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    fn send<'a>(
        &'a self,
        subject: &'a str,
        content: &'a str,
        attachment: Option<&'a Path>,
    ) -> NotifyFuture<'a> {
        Box::pin(async move {
            let url = self.url.as_deref().context("Webhook URL is not configured")?;
            debug!(notifier = %self.name, url = %url, "Posting webhook");
            let payload = Payload {
                subject,
                content,
                attachment: attachment.map(|p| p.display().to_string()),
            };
            let response = self
                .client
                .post(url)
                .json(&payload)
                .send()
                .await
                .with_context(|| format!("Webhook '{}' request failed", self.name))?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                bail!("Webhook '{}' returned HTTP {status}: {body}", self.name);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn posts_json_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!({
                "subject": "Daily",
                "content": "done",
                "attachment": "/tmp/r.html"
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new("hook", Some(server.uri())).unwrap();
        notifier
            .send("Daily", "done", Some(Path::new("/tmp/r.html")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn error_status_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let notifier = WebhookNotifier::new("hook", Some(server.uri())).unwrap();
        assert!(notifier.send("s", "c", None).await.is_err());
    }

    #[test]
    fn blank_url_disables() {
        assert!(!WebhookNotifier::new("hook", Some("  ".to_string())).unwrap().is_enabled());
        assert!(!WebhookNotifier::new("hook", None).unwrap().is_enabled());
    }
}
