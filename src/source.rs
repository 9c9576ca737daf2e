//! Data sources: where commits, statistics, diffs and the README come from.
//!
//! Every source is constructed through a [`Registry`] keyed by name. The
//! built-in `local` source shells out to git; the built-in `github` source
//! talks to the GitHub REST API. Extra hosted sources can be declared as
//! manifests under `<extensions>/sources/`, each routing one host to an API
//! base URL.

pub mod local;
pub mod range;
pub mod remote;

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::config::{ConfigError, RepoLocator, RunContext, Settings};
use crate::git::{ChangeStats, Commit};
use crate::registry::{discover_manifests, Constructor, Registry};

pub use local::LocalGitSource;
pub use remote::{GitHubSource, RemoteRepo};

/// Boxed future returned by [`DataSource`] methods.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Name of the built-in local source.
pub const LOCAL_SOURCE: &str = "local";

/// Name of the built-in hosted source.
pub const GITHUB_SOURCE: &str = "github";

/// Public host always served by the `github` source.
pub const GITHUB_HOST: &str = "github.com";

/// Origin of repository data for one run.
///
/// Failures of the underlying process or HTTP call are logged and surface as
/// empty or absent results; none of these methods return an error.
pub trait DataSource: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Whether the repository exists and is accessible.
    fn validate(&self) -> SourceFuture<'_, bool>;

    /// Commits in the configured range, newest first.
    fn get_commits(&self) -> SourceFuture<'_, Vec<Commit>>;

    /// Aggregate change statistics for the configured range.
    fn get_stats(&self) -> SourceFuture<'_, ChangeStats>;

    /// Unified diff of one commit.
    fn get_diff<'a>(&'a self, id: &'a str) -> SourceFuture<'a, Option<String>>;

    /// Project README content.
    fn get_readme(&self) -> SourceFuture<'_, Option<String>>;
}

/// `<extensions>/sources/*.yaml` entry routing one host to a hosted API.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceManifest {
    /// Registry name.
    pub name: String,
    /// Implementation; only `github` is understood.
    #[serde(default = "default_source_kind")]
    pub kind: String,
    /// Host whose locators this source handles (e.g. `git.example.com`).
    pub host: String,
    /// REST API base URL.
    pub api_base: String,
    /// Environment variable holding the bearer token.
    #[serde(default)]
    pub token_env: Option<String>,
}

fn default_source_kind() -> String {
    GITHUB_SOURCE.to_string()
}

/// Source registry plus the host routing table used to pick a source.
#[derive(Debug)]
pub struct SourceFactory {
    registry: Registry<dyn DataSource, RunContext>,
    routes: Vec<(String, String)>,
}

impl SourceFactory {
    /// Factory without any source; register `local`/`github` replacements
    /// through [`SourceFactory::registry_mut`].
    pub fn new() -> Self {
        Self {
            registry: Registry::new("data source"),
            routes: Vec::new(),
        }
    }

    /// Factory with the `local` and `github` sources registered.
    pub fn with_builtins() -> Self {
        let mut registry: Registry<dyn DataSource, RunContext> = Registry::new("data source");
        let builtins: [(&str, Constructor<dyn DataSource, RunContext>); 2] = [
            (
                LOCAL_SOURCE,
                Arc::new(|ctx: &RunContext| -> Result<Box<dyn DataSource>> {
                    Ok(Box::new(LocalGitSource::from_context(ctx)?))
                }),
            ),
            (
                GITHUB_SOURCE,
                Arc::new(|ctx: &RunContext| -> Result<Box<dyn DataSource>> {
                    Ok(Box::new(GitHubSource::from_context(ctx, None, None)?))
                }),
            ),
        ];
        for (name, constructor) in builtins {
            registry.register_or_skip(name, constructor);
        }
        Self {
            registry,
            routes: Vec::new(),
        }
    }

    /// Loads hosted-source manifests from `dir`.
    pub fn discover(&mut self, dir: &Path) {
        for manifest in discover_manifests::<SourceManifest>(dir) {
            let body = manifest.body;
            if body.kind != GITHUB_SOURCE {
                tracing::warn!(
                    path = %manifest.path.display(),
                    kind = %body.kind,
                    "Skipping source manifest with unsupported kind"
                );
                continue;
            }
            let api_base = body.api_base.clone();
            let token_env = body.token_env.clone();
            let added = self.registry.register_or_skip(
                &body.name,
                Arc::new(move |ctx: &RunContext| -> Result<Box<dyn DataSource>> {
                    Ok(Box::new(GitHubSource::from_context(
                        ctx,
                        Some(api_base.clone()),
                        token_env.clone(),
                    )?))
                }),
            );
            if added {
                info!(name = %body.name, host = %body.host, "Registered hosted source");
                self.routes.push((body.host.to_ascii_lowercase(), body.name));
            }
        }
    }

    /// Registry holding every source constructor.
    pub fn registry(&self) -> &Registry<dyn DataSource, RunContext> {
        &self.registry
    }

    /// Mutable registry, for programmatic registrations.
    pub fn registry_mut(&mut self) -> &mut Registry<dyn DataSource, RunContext> {
        &mut self.registry
    }

    /// Picks the source name for a locator: local paths use `local`; remote
    /// URLs use the source routed for their host, else `github` when the host
    /// is `github.com` or the host of `GITHUB_API_URL`. Any other host is an
    /// error.
    pub fn select(
        &self,
        locator: &RepoLocator,
        settings: &Settings,
    ) -> Result<String, ConfigError> {
        let url = match locator {
            RepoLocator::Local(_) => return Ok(LOCAL_SOURCE.to_string()),
            RepoLocator::Remote(url) => url,
        };
        let host = RemoteRepo::parse(url)
            .map(|r| r.host.to_ascii_lowercase())
            .ok_or_else(|| ConfigError::InvalidLocator(url.clone()))?;
        if let Some((_, name)) = self.routes.iter().find(|(h, _)| *h == host) {
            return Ok(name.clone());
        }
        let github_hosts = github_hosts(settings);
        if github_hosts.contains(&host) {
            return Ok(GITHUB_SOURCE.to_string());
        }
        let routed: Vec<&str> = github_hosts
            .iter()
            .map(String::as_str)
            .chain(self.routes.iter().map(|(h, _)| h.as_str()))
            .collect();
        Err(ConfigError::InvalidLocator(format!(
            "no data source handles host '{host}' (routed hosts: {})",
            routed.join(", ")
        )))
    }

    /// Builds the source for a run.
    pub fn create(&self, ctx: &RunContext) -> Result<Box<dyn DataSource>> {
        let name = self.select(&ctx.locator, &ctx.settings)?;
        debug!(source = %name, locator = %ctx.locator, "Selected data source");
        self.registry.resolve(&name, ctx)
    }
}

/// Hosts served by the built-in `github` source.
fn github_hosts(settings: &Settings) -> Vec<String> {
    let mut hosts = vec![GITHUB_HOST.to_string()];
    let api_host = settings
        .get_env_var("GITHUB_API_URL")
        .and_then(|raw| Url::parse(&raw).ok())
        .and_then(|url| url.host_str().map(str::to_ascii_lowercase));
    if let Some(host) = api_host {
        if !hosts.contains(&host) {
            hosts.push(host);
        }
    }
    hosts
}

impl Default for SourceFactory {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn ctx(locator: &str) -> RunContext {
        RunContext::new(
            RepoLocator::parse(locator).unwrap(),
            std::env::temp_dir(),
            Arc::new(Settings::isolated(Vec::<(String, String)>::new())),
        )
    }

    fn select(factory: &SourceFactory, locator: &str) -> Result<String, ConfigError> {
        let ctx = ctx(locator);
        factory.select(&ctx.locator, &ctx.settings)
    }

    #[test]
    fn scheme_selects_variant() {
        let factory = SourceFactory::with_builtins();
        assert_eq!(select(&factory, "/srv/widgets").unwrap(), "local");
        assert_eq!(
            select(&factory, "https://github.com/acme/widgets").unwrap(),
            "github"
        );
        assert_eq!(
            select(&factory, "git@github.com:acme/widgets.git").unwrap(),
            "github"
        );
    }

    #[test]
    fn unrouted_host_is_rejected() {
        let factory = SourceFactory::with_builtins();
        let err = select(&factory, "https://gitlab.com/acme/widgets").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLocator(_)));
        let message = err.to_string();
        assert!(message.contains("gitlab.com"), "{message}");
        assert!(message.contains("github.com"), "{message}");

        let ctx = ctx("https://gitlab.com/acme/widgets");
        assert!(factory.create(&ctx).is_err());
    }

    #[test]
    fn enterprise_api_host_routes_to_github() {
        let factory = SourceFactory::with_builtins();
        let settings = Settings::isolated([("GITHUB_API_URL", "https://ghe.corp.example/api/v3")]);
        let locator = RepoLocator::parse("https://ghe.corp.example/team/app").unwrap();
        assert_eq!(factory.select(&locator, &settings).unwrap(), "github");

        let locator = RepoLocator::parse("https://gitlab.com/acme/widgets").unwrap();
        let err = factory.select(&locator, &settings).unwrap_err();
        assert!(err.to_string().contains("ghe.corp.example"));
    }

    #[test]
    fn manifests_route_hosts() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("corp.yaml"),
            "name: corp\nhost: git.corp.example\napi_base: https://git.corp.example/api/v3\ntoken_env: CORP_TOKEN\n",
        )
        .unwrap();
        fs::write(dir.path().join("local.yaml"), "name: local\nhost: x\napi_base: y\n").unwrap();
        fs::write(dir.path().join("zz.yaml"), "name: [").unwrap();

        let mut factory = SourceFactory::with_builtins();
        factory.discover(dir.path());

        assert_eq!(factory.registry().names(), vec!["local", "github", "corp"]);
        assert_eq!(
            select(&factory, "https://git.corp.example/team/app.git").unwrap(),
            "corp"
        );
        assert_eq!(
            select(&factory, "https://github.com/acme/widgets").unwrap(),
            "github"
        );
        let source = factory
            .create(&ctx("https://git.corp.example/team/app.git"))
            .unwrap();
        assert_eq!(source.name(), "github");
    }
}
