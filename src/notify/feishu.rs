//! Feishu (Lark) delivery.
//!
//! With app credentials the notifier obtains a tenant token, uploads the
//! attachment and messages every recipient directly, addressed by email.
//! Without them it falls back to the group webhook, which carries text only.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;

use super::{Notifier, NotifyFuture};
use crate::config::RunContext;

/// Open API base used when `FEISHU_API_URL` is unset.
pub const FEISHU_API_BASE: &str = "https://open.feishu.cn/open-apis";

const FEISHU_TIMEOUT: Duration = Duration::from_secs(60);

/// App credentials for direct messages.
#[derive(Debug, Clone)]
pub struct FeishuApp {
    /// App id.
    pub app_id: String,
    /// App secret.
    pub app_secret: String,
}

/// Feishu channel with app mode and webhook fallback.
#[derive(Debug, Clone)]
pub struct FeishuNotifier {
    client: Client,
    api_base: String,
    app: Option<FeishuApp>,
    webhook: Option<String>,
    recipients: Vec<String>,
}

/// Envelope every Feishu endpoint answers with.
#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    tenant_access_token: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

impl Envelope {
    fn ok(self, what: &str) -> Result<Self> {
        if self.code != 0 {
            bail!("Feishu {what} failed (code {}): {}", self.code, self.msg);
        }
        Ok(self)
    }
}

impl FeishuNotifier {
    /// Reads credentials, webhook and API base from settings.
    pub fn from_context(ctx: &RunContext) -> Result<Self> {
        let settings = &ctx.settings;
        let app = match (
            settings.get_env_var("FEISHU_APP_ID"),
            settings.get_env_var("FEISHU_APP_SECRET"),
        ) {
            (Some(app_id), Some(app_secret)) => Some(FeishuApp { app_id, app_secret }),
            _ => None,
        };
        let api_base = settings
            .get_env_var("FEISHU_API_URL")
            .unwrap_or_else(|| FEISHU_API_BASE.to_string());
        Self::new(
            api_base,
            app,
            settings.get_env_var("FEISHU_WEBHOOK"),
            ctx.recipients.clone(),
        )
    }

    /// Creates the notifier.
    pub fn new(
        api_base: impl Into<String>,
        app: Option<FeishuApp>,
        webhook: Option<String>,
        recipients: Vec<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(FEISHU_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            app,
            webhook,
            recipients,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let raw = format!("{}/{path}", self.api_base);
        Url::parse(&raw).with_context(|| format!("Invalid Feishu URL: {raw}"))
    }

    async fn read_envelope(response: reqwest::Response, what: &str) -> Result<Envelope> {
        let status = response.status();
        let envelope: Envelope = response
            .json()
            .await
            .with_context(|| format!("Feishu {what} returned HTTP {status} without JSON"))?;
        envelope.ok(what)
    }

    async fn tenant_token(&self, app: &FeishuApp) -> Result<String> {
        let url = self.endpoint("auth/v3/tenant_access_token/internal")?;
        let response = self
            .client
            .post(url)
            .json(&json!({ "app_id": app.app_id, "app_secret": app.app_secret }))
            .send()
            .await
            .context("Feishu token request failed")?;
        Self::read_envelope(response, "token request")
            .await?
            .tenant_access_token
            .context("Feishu token response has no tenant_access_token")
    }

    async fn upload(&self, token: &str, path: &Path) -> Result<String> {
        let name = path
            .file_name()
            .map_or_else(|| "report".to_string(), |n| n.to_string_lossy().into_owned());
        let file_type = if name.to_ascii_lowercase().ends_with(".pdf") {
            "pdf"
        } else {
            "stream"
        };
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read attachment {}", path.display()))?;
        let form = Form::new()
            .text("file_type", file_type)
            .text("file_name", name.clone())
            .part("file", Part::bytes(bytes).file_name(name));

        let response = self
            .client
            .post(self.endpoint("im/v1/files")?)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .context("Feishu upload failed")?;
        let envelope = Self::read_envelope(response, "upload").await?;
        envelope
            .data
            .as_ref()
            .and_then(|d| d.get("file_key"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .context("Feishu upload response has no file_key")
    }

    async fn message(&self, token: &str, email: &str, msg_type: &str, content: Value) -> Result<()> {
        let mut url = self.endpoint("im/v1/messages")?;
        url.query_pairs_mut().append_pair("receive_id_type", "email");
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&json!({
                "receive_id": email,
                "msg_type": msg_type,
                "content": content.to_string(),
            }))
            .send()
            .await
            .context("Feishu message request failed")?;
        Self::read_envelope(response, "message").await?;
        Ok(())
    }

    async fn send_via_app(
        &self,
        app: &FeishuApp,
        subject: &str,
        content: &str,
        attachment: Option<&Path>,
    ) -> Result<()> {
        let token = self.tenant_token(app).await?;

        let file_key = match attachment {
            Some(path) => match self.upload(&token, path).await {
                Ok(key) => Some(key),
                Err(e) => {
                    warn!("Attachment upload failed, sending text only: {e:#}");
                    None
                }
            },
            None => None,
        };

        let text = format!("{subject}\n\n{content}");
        let mut delivered = 0;
        for email in &self.recipients {
            if let Err(e) = self
                .message(&token, email, "text", json!({ "text": text }))
                .await
            {
                warn!(recipient = %email, "Feishu message failed: {e:#}");
                continue;
            }
            delivered += 1;
            if let Some(key) = &file_key {
                if let Err(e) = self
                    .message(&token, email, "file", json!({ "file_key": key }))
                    .await
                {
                    warn!(recipient = %email, "Feishu file message failed: {e:#}");
                }
            }
        }
        info!(delivered, total = self.recipients.len(), "Feishu direct messages sent");
        if delivered == 0 {
            bail!("No Feishu recipient could be reached");
        }
        Ok(())
    }

    async fn send_via_webhook(&self, webhook: &str, subject: &str, content: &str) -> Result<()> {
        debug!("Sending Feishu webhook message (text only)");
        let url = Url::parse(webhook).with_context(|| format!("Invalid FEISHU_WEBHOOK: {webhook}"))?;
        let response = self
            .client
            .post(url)
            .json(&json!({
                "msg_type": "text",
                "content": {
                    "text": format!("【{subject}】\n\n{content}\n\n(The full report is delivered by email.)")
                },
            }))
            .send()
            .await
            .context("Feishu webhook request failed")?;
        Self::read_envelope(response, "webhook").await?;
        Ok(())
    }
}

impl Notifier for FeishuNotifier {
    fn name(&self) -> &str {
        "feishu"
    }

    fn is_enabled(&self) -> bool {
        self.app.is_some() || self.webhook.is_some()
    }

    fn send<'a>(
        &'a self,
        subject: &'a str,
        content: &'a str,
        attachment: Option<&'a Path>,
    ) -> NotifyFuture<'a> {
        Box::pin(async move {
            match (&self.app, self.webhook.as_deref()) {
                (Some(app), _) if !self.recipients.is_empty() => {
                    self.send_via_app(app, subject, content, attachment).await
                }
                (_, Some(webhook)) => self.send_via_webhook(webhook, subject, content).await,
                (Some(_), None) => bail!("Feishu app mode needs at least one recipient email"),
                (None, None) => bail!("Feishu is not configured"),
            }
        })
    }
}
