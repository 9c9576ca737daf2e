//! Delivery channels for the finished report.
//!
//! Every channel decides for itself whether it is enabled. The factory builds
//! all registered channels for a run and keeps the enabled ones; delivery then
//! tries each channel independently so one failure never blocks the others.

pub mod email;
pub mod feishu;
pub mod webhook;

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::config::RunContext;
use crate::registry::{discover_manifests, Constructor, Registry};

pub use email::EmailNotifier;
pub use feishu::FeishuNotifier;
pub use webhook::WebhookNotifier;

/// Boxed future returned by [`Notifier::send`].
pub type NotifyFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Delivery channel.
pub trait Notifier: Send + Sync {
    /// Channel name for logs and the delivery summary.
    fn name(&self) -> &str;

    /// Whether the channel has what it needs to deliver.
    fn is_enabled(&self) -> bool;

    /// Delivers one message, optionally with a file attached.
    fn send<'a>(
        &'a self,
        subject: &'a str,
        content: &'a str,
        attachment: Option<&'a Path>,
    ) -> NotifyFuture<'a>;
}

/// Outcome of one channel's delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Channel name.
    pub name: String,
    /// Whether the channel reported success.
    pub success: bool,
}

/// `<extensions>/notifiers/*.yaml` entry declaring an extra webhook channel.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifierManifest {
    /// Channel name.
    pub name: String,
    /// Channel implementation; only `webhook` is understood.
    pub kind: String,
    /// Endpoint receiving the JSON payload.
    pub url: String,
}

/// Registry of channel constructors.
pub struct NotifierFactory {
    registry: Registry<dyn Notifier, RunContext>,
}

impl NotifierFactory {
    /// Factory with `email`, `feishu` and `webhook`.
    pub fn with_builtins() -> Self {
        let mut registry = Registry::new("notifier");
        let builtins: [(&str, Constructor<dyn Notifier, RunContext>); 3] = [
            (
                "email",
                Arc::new(|ctx: &RunContext| -> Result<Box<dyn Notifier>> {
                    Ok(Box::new(EmailNotifier::from_context(ctx)))
                }),
            ),
            (
                "feishu",
                Arc::new(|ctx: &RunContext| -> Result<Box<dyn Notifier>> {
                    Ok(Box::new(FeishuNotifier::from_context(ctx)?))
                }),
            ),
            (
                "webhook",
                Arc::new(|ctx: &RunContext| -> Result<Box<dyn Notifier>> {
                    let url = ctx.settings.get_env_var("DEVLOG_WEBHOOK_URL");
                    Ok(Box::new(WebhookNotifier::new("webhook", url)?))
                }),
            ),
        ];
        for (name, constructor) in builtins {
            registry.register_or_skip(name, constructor);
        }
        Self { registry }
    }

    /// Adds webhook channels declared in `dir`. Returns how many were added.
    pub fn discover(&mut self, dir: &Path) -> usize {
        let mut added = 0;
        for manifest in discover_manifests::<NotifierManifest>(dir) {
            let body = manifest.body;
            if body.kind != "webhook" {
                warn!(
                    path = %manifest.path.display(),
                    kind = %body.kind,
                    "Skipping notifier manifest with unsupported kind"
                );
                continue;
            }
            let name = body.name.clone();
            let constructor: Constructor<dyn Notifier, RunContext> =
                Arc::new(move |_: &RunContext| -> Result<Box<dyn Notifier>> {
                    Ok(Box::new(WebhookNotifier::new(
                        body.name.clone(),
                        Some(body.url.clone()),
                    )?))
                });
            if self.registry.register_or_skip(&name, constructor) {
                info!(notifier = %name, "Registered notifier");
                added += 1;
            }
        }
        added
    }

    /// Registered channel names.
    pub fn names(&self) -> Vec<&str> {
        self.registry.names()
    }

    /// Mutable access for programmatic registration.
    pub fn registry_mut(&mut self) -> &mut Registry<dyn Notifier, RunContext> {
        &mut self.registry
    }

    /// Builds every channel and keeps the enabled ones, in registration order.
    /// A channel that fails to build is logged and left out.
    pub fn active(&self, ctx: &RunContext) -> Vec<Box<dyn Notifier>> {
        let mut active = Vec::new();
        for (name, built) in self.registry.build_all(ctx) {
            match built {
                Ok(notifier) if notifier.is_enabled() => {
                    info!(notifier = %name, "Notifier enabled");
                    active.push(notifier);
                }
                Ok(_) => debug!(notifier = %name, "Notifier not configured"),
                Err(e) => error!(notifier = %name, "Failed to initialise notifier: {e:#}"),
            }
        }
        active
    }
}

impl Default for NotifierFactory {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for NotifierFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifierFactory")
            .field("registry", &self.registry)
            .finish()
    }
}

/// Sends through every channel in order, recording each outcome.
pub async fn dispatch_all(
    notifiers: &[Box<dyn Notifier>],
    subject: &str,
    content: &str,
    attachment: Option<&Path>,
) -> Vec<Delivery> {
    let mut deliveries = Vec::with_capacity(notifiers.len());
    for notifier in notifiers {
        let name = notifier.name().to_string();
        let success = match notifier.send(subject, content, attachment).await {
            Ok(()) => {
                info!(notifier = %name, "Delivered");
                true
            }
            Err(e) => {
                error!(notifier = %name, "Delivery failed: {e:#}");
                false
            }
        };
        deliveries.push(Delivery { name, success });
    }
    deliveries
}
