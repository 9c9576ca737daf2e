//! GitHub REST API data source.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::{debug, error, info, warn};
use url::Url;

use super::range::{parse_since, relative_label};
use super::{DataSource, SourceFuture};
use crate::config::{CommitRange, ConfigError, RepoLocator, RunContext, REMOTE_COMMIT_CAP};
use crate::git::{ChangeStats, Commit, SHORT_HASH_LEN};

/// Default public API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const API_TIMEOUT: Duration = Duration::from_secs(60);

/// Host, owner and repository name extracted from a remote locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRepo {
    /// Lowercased host name.
    pub host: String,
    /// Owning user or organisation.
    pub owner: String,
    /// Repository name without `.git`.
    pub name: String,
}

impl RemoteRepo {
    /// Parses `https://host/owner/repo(.git)`, `ssh://git@host/owner/repo`
    /// and `git@host:owner/repo(.git)`.
    pub fn parse(locator: &str) -> Option<Self> {
        let locator = locator.trim();
        let (host, path) = if let Some(rest) = locator.strip_prefix("git@") {
            let (host, path) = rest.split_once(':')?;
            (host.to_string(), path.to_string())
        } else {
            let url = Url::parse(locator).ok()?;
            (url.host_str()?.to_string(), url.path().to_string())
        };

        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let owner = segments.next()?.to_string();
        let name = segments.next()?;
        let name = name.strip_suffix(".git").unwrap_or(name).to_string();
        if name.is_empty() {
            return None;
        }

        Some(Self {
            host: host.to_ascii_lowercase(),
            owner,
            name,
        })
    }
}

#[derive(Deserialize)]
struct ApiCommit {
    sha: String,
    commit: ApiCommitBody,
}

#[derive(Deserialize)]
struct ApiCommitBody {
    message: String,
    author: Option<ApiSignature>,
}

#[derive(Deserialize)]
struct ApiSignature {
    name: Option<String>,
    date: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct ApiCommitDetail {
    #[serde(default)]
    files: Vec<ApiFile>,
}

#[derive(Deserialize)]
struct ApiFile {
    filename: String,
    patch: Option<String>,
}

/// Data source backed by the GitHub REST API (or a compatible server).
///
/// Aggregate statistics are not computed: doing so would cost one request per
/// commit. [`DataSource::get_stats`] returns zeros flagged as
/// [`crate::git::StatsCoverage::Unavailable`].
pub struct GitHubSource {
    client: Client,
    api_base: String,
    repo: RemoteRepo,
    token: Option<String>,
    range: CommitRange,
}

impl GitHubSource {
    /// Builds the source for a remote locator.
    ///
    /// `api_base` overrides `GITHUB_API_URL`; `token_env` names the variable
    /// holding the token instead of `GITHUB_TOKEN`.
    pub fn from_context(
        ctx: &RunContext,
        api_base: Option<String>,
        token_env: Option<String>,
    ) -> Result<Self> {
        let RepoLocator::Remote(url) = &ctx.locator else {
            return Err(ConfigError::InvalidLocator(format!(
                "{} is not a remote repository",
                ctx.locator
            ))
            .into());
        };
        let repo = RemoteRepo::parse(url)
            .ok_or_else(|| ConfigError::InvalidLocator(format!("cannot parse {url}")))?;

        let api_base = api_base
            .or_else(|| ctx.settings.get_env_var("GITHUB_API_URL"))
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let token_key = token_env.as_deref().unwrap_or("GITHUB_TOKEN");
        let token = ctx.settings.get_env_var(token_key);
        if token.is_none() {
            warn!(
                variable = token_key,
                "No API token configured, using anonymous access (rate limited)"
            );
        }

        Self::new(api_base, repo, token, ctx.range.clone())
    }

    /// Creates a source for an already parsed repository.
    pub fn new(
        api_base: impl Into<String>,
        repo: RemoteRepo,
        token: Option<String>,
        range: CommitRange,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(API_TIMEOUT)
            .user_agent(concat!("devlog/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            repo,
            token,
            range,
        })
    }

    fn repo_url(&self, suffix: &str) -> Result<Url> {
        let raw = format!(
            "{}/repos/{}/{}{suffix}",
            self.api_base, self.repo.owner, self.repo.name
        );
        Url::parse(&raw).with_context(|| format!("Invalid API URL: {raw}"))
    }

    fn request(&self, url: Url, accept: &str) -> RequestBuilder {
        let builder = self.client.get(url).header("Accept", accept);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Sends a GET and returns the successful response; failures are logged.
    async fn fetch(&self, url: Url, accept: &str) -> Option<reqwest::Response> {
        debug!(url = %url, "GitHub API request");
        let response = match self.request(url.clone(), accept).send().await {
            Ok(response) => response,
            Err(e) => {
                error!(url = %url, "GitHub API request failed: {e}");
                return None;
            }
        };
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(url = %url, status = %status, "GitHub API error: {body}");
            return None;
        }
        Some(response)
    }

    fn commits_url(&self) -> Result<Url> {
        let mut url = self.repo_url("/commits")?;
        {
            let mut query = url.query_pairs_mut();
            match &self.range {
                CommitRange::Since(phrase) => {
                    let since = parse_since(phrase, Utc::now());
                    query.append_pair("since", &since.to_rfc3339_opts(SecondsFormat::Secs, true));
                    query.append_pair("per_page", &REMOTE_COMMIT_CAP.to_string());
                }
                CommitRange::Last(n) => {
                    let per_page = (*n as usize).clamp(1, REMOTE_COMMIT_CAP);
                    query.append_pair("per_page", &per_page.to_string());
                }
            }
        }
        Ok(url)
    }

    fn to_commit(api: ApiCommit, now: DateTime<Utc>) -> Commit {
        let short_hash: String = api.sha.chars().take(SHORT_HASH_LEN).collect();
        let subject = api.commit.message.lines().next().unwrap_or("").trim().to_string();
        let (author, time) = match api.commit.author {
            Some(sig) => (
                sig.name.unwrap_or_else(|| "unknown".to_string()),
                sig.date
                    .map_or_else(|| "unknown".to_string(), |d| relative_label(d, now)),
            ),
            None => ("unknown".to_string(), "unknown".to_string()),
        };
        Commit::new(short_hash, subject, time, author)
    }
}

impl DataSource for GitHubSource {
    fn name(&self) -> &str {
        "github"
    }

    fn validate(&self) -> SourceFuture<'_, bool> {
        Box::pin(async move {
            let Ok(url) = self.repo_url("") else {
                return false;
            };
            let ok = self.fetch(url, "application/vnd.github+json").await.is_some();
            if ok {
                info!(owner = %self.repo.owner, repo = %self.repo.name, "Remote repository reachable");
            }
            ok
        })
    }

    fn get_commits(&self) -> SourceFuture<'_, Vec<Commit>> {
        Box::pin(async move {
            let url = match self.commits_url() {
                Ok(url) => url,
                Err(e) => {
                    error!("Failed to build commit listing URL: {e:#}");
                    return Vec::new();
                }
            };
            let Some(response) = self.fetch(url, "application/vnd.github+json").await else {
                return Vec::new();
            };
            let listed: Vec<ApiCommit> = match response.json().await {
                Ok(listed) => listed,
                Err(e) => {
                    error!("Malformed commit listing from GitHub API: {e}");
                    return Vec::new();
                }
            };

            let cap = match self.range {
                CommitRange::Last(n) => (n as usize).min(REMOTE_COMMIT_CAP),
                CommitRange::Since(_) => REMOTE_COMMIT_CAP,
            };
            let now = Utc::now();
            let commits: Vec<Commit> = listed
                .into_iter()
                .take(cap)
                .map(|api| Self::to_commit(api, now))
                .collect();
            debug!(commit_count = commits.len(), "Listed remote commits");
            commits
        })
    }

    fn get_stats(&self) -> SourceFuture<'_, ChangeStats> {
        Box::pin(async move {
            info!("Change statistics are not computed for remote repositories");
            ChangeStats::unavailable()
        })
    }

    fn get_diff<'a>(&'a self, id: &'a str) -> SourceFuture<'a, Option<String>> {
        Box::pin(async move {
            let url = self.repo_url(&format!("/commits/{id}")).ok()?;
            let response = self.fetch(url, "application/vnd.github+json").await?;
            let detail: ApiCommitDetail = match response.json().await {
                Ok(detail) => detail,
                Err(e) => {
                    error!(commit = %id, "Malformed commit detail from GitHub API: {e}");
                    return None;
                }
            };

            let diff: String = detail
                .files
                .iter()
                .filter_map(|file| {
                    file.patch.as_ref().map(|patch| {
                        format!(
                            "diff --git a/{name} b/{name}\n{patch}\n",
                            name = file.filename
                        )
                    })
                })
                .collect();
            if diff.is_empty() {
                debug!(commit = %id, "Commit has no textual patch");
                return None;
            }
            Some(diff)
        })
    }

    fn get_readme(&self) -> SourceFuture<'_, Option<String>> {
        Box::pin(async move {
            let url = self.repo_url("/readme").ok()?;
            let response = self.fetch(url, "application/vnd.github.raw").await?;
            match response.text().await {
                Ok(text) if !text.trim().is_empty() => Some(text),
                Ok(_) => None,
                Err(e) => {
                    error!("Failed to read README body: {e}");
                    None
                }
            }
        })
    }
}
