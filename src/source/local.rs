//! Local working-tree data source backed by the `git` binary.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::Result;
use git2::Repository;
use tokio::process::Command;
use tracing::{debug, error, warn};

use super::{DataSource, SourceFuture};
use crate::config::{CommitRange, ConfigError, RunContext, GIT_COMMAND_TIMEOUT};
use crate::git::log::{parse_log, LOG_PRETTY_FORMAT};
use crate::git::{ChangeStats, Commit, IgnoreSet, StatsAccumulator};

const README_CANDIDATES: &[&str] = &["README.md", "readme.md", "README", "README.rst"];

/// Runs `git` inside a local repository.
///
/// Every invocation is bounded by a timeout; a non-zero exit, a timeout or a
/// spawn failure is logged and reported as `None`.
pub struct LocalGitSource {
    repo_path: PathBuf,
    range: CommitRange,
    ignore: IgnoreSet,
    timeout: Duration,
}

impl LocalGitSource {
    /// Creates a source for `repo_path`.
    pub fn new(repo_path: impl Into<PathBuf>, range: CommitRange, ignore: IgnoreSet) -> Self {
        Self {
            repo_path: repo_path.into(),
            range,
            ignore,
            timeout: GIT_COMMAND_TIMEOUT,
        }
    }

    /// Builds the source for a local locator.
    pub fn from_context(ctx: &RunContext) -> Result<Self> {
        let path = ctx.locator.local_path().ok_or_else(|| {
            ConfigError::InvalidLocator(format!("{} is not a local path", ctx.locator))
        })?;
        Ok(Self::new(path, ctx.range.clone(), ctx.ignore.clone()))
    }

    /// Overrides the per-command timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Repository directory.
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    async fn run_git(&self, args: &[String]) -> Option<String> {
        debug!(repo = %self.repo_path.display(), args = ?args, "Running git");
        let child = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                error!(args = ?args, "Failed to run git: {e}");
                return None;
            }
            Err(_) => {
                error!(args = ?args, timeout_secs = self.timeout.as_secs(), "git command timed out");
                return None;
            }
        };

        if !output.status.success() {
            error!(
                args = ?args,
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "git command failed"
            );
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn log_args(&self, leading: &[&str]) -> Vec<String> {
        let mut args: Vec<String> = std::iter::once("log")
            .chain(leading.iter().copied())
            .map(str::to_string)
            .collect();
        args.extend(self.range.git_args());
        args
    }
}

impl DataSource for LocalGitSource {
    fn name(&self) -> &str {
        "local"
    }

    fn validate(&self) -> SourceFuture<'_, bool> {
        Box::pin(async move {
            if !self.repo_path.is_dir() {
                error!(path = %self.repo_path.display(), "Repository path does not exist");
                return false;
            }
            match Repository::discover(&self.repo_path) {
                Ok(repo) => {
                    debug!(git_dir = %repo.path().display(), "Found git repository");
                    true
                }
                Err(e) => {
                    error!(path = %self.repo_path.display(), "Not a git repository: {e}");
                    false
                }
            }
        })
    }

    fn get_commits(&self) -> SourceFuture<'_, Vec<Commit>> {
        Box::pin(async move {
            let format = format!("--pretty=format:{LOG_PRETTY_FORMAT}");
            let args = self.log_args(&["--graph", format.as_str()]);
            self.run_git(&args)
                .await
                .map(|out| parse_log(&out))
                .unwrap_or_default()
        })
    }

    fn get_stats(&self) -> SourceFuture<'_, ChangeStats> {
        Box::pin(async move {
            let args = self.log_args(&["--numstat", "--pretty=format:"]);
            let mut acc = StatsAccumulator::new(self.ignore.clone());
            match self.run_git(&args).await {
                Some(out) => out.lines().for_each(|line| acc.add_numstat_line(line)),
                None => warn!("No change statistics available"),
            }
            acc.finish()
        })
    }

    fn get_diff<'a>(&'a self, id: &'a str) -> SourceFuture<'a, Option<String>> {
        Box::pin(async move {
            let args = ["show", id, "--pretty=", "--no-color"].map(str::to_string);
            self.run_git(&args).await
        })
    }

    fn get_readme(&self) -> SourceFuture<'_, Option<String>> {
        Box::pin(async move {
            for candidate in README_CANDIDATES {
                let path = self.repo_path.join(candidate);
                if let Ok(content) = tokio::fs::read_to_string(&path).await {
                    debug!(path = %path.display(), "Read README");
                    return Some(content);
                }
            }
            None
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_directory_fails_validation() {
        let dir = TempDir::new().unwrap();
        let source = LocalGitSource::new(
            dir.path().join("missing"),
            CommitRange::Last(1),
            IgnoreSet::empty(),
        );
        assert!(!source.validate().await);
    }

    #[tokio::test]
    async fn plain_directory_is_not_a_repository() {
        let dir = TempDir::new().unwrap();
        let source = LocalGitSource::new(dir.path(), CommitRange::Last(1), IgnoreSet::empty());
        assert!(!source.validate().await);
        // git exits non-zero outside a repository; the caller sees empty data.
        assert!(source.get_commits().await.is_empty());
        assert!(source.get_diff("HEAD").await.is_none());
    }

    #[tokio::test]
    async fn readme_from_working_tree() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("README.md"), "# Demo\n").unwrap();
        let source = LocalGitSource::new(dir.path(), CommitRange::Last(1), IgnoreSet::empty());
        assert_eq!(source.get_readme().await.as_deref(), Some("# Demo\n"));
    }

    #[test]
    fn log_arguments_follow_range() {
        let source = LocalGitSource::new(
            "/tmp",
            CommitRange::Since("2 days ago".to_string()),
            IgnoreSet::empty(),
        );
        assert_eq!(
            source.log_args(&["--numstat"]),
            vec!["log", "--numstat", "--since=2 days ago"]
        );
    }
}
