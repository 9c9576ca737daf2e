//! Immutable per-run configuration aggregate.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{ConfigError, Settings, DEFAULT_STYLE};
use crate::git::IgnoreSet;

/// Where the repository lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RepoLocator {
    /// A working tree on the local filesystem.
    Local(PathBuf),
    /// A hosted repository addressed by `http(s)://`, `ssh://` or `git@` URL.
    Remote(String),
}

impl RepoLocator {
    /// Interprets a user-supplied locator. URL/SSH schemes select the remote
    /// variant; anything else is treated as a filesystem path.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ConfigError::InvalidLocator("empty locator".to_string()));
        }
        if Self::is_remote_str(raw) {
            return Ok(Self::Remote(raw.to_string()));
        }
        let path = PathBuf::from(raw);
        let path = if path.is_absolute() {
            path
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&path))
                .unwrap_or(path)
        };
        Ok(Self::Local(path))
    }

    /// Whether the string carries a scheme handled by remote sources.
    pub fn is_remote_str(raw: &str) -> bool {
        ["http://", "https://", "ssh://", "git@"]
            .iter()
            .any(|scheme| raw.starts_with(scheme))
    }

    /// Whether this locator points at a hosted repository.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// Local working tree path, if any.
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            Self::Local(path) => Some(path),
            Self::Remote(_) => None,
        }
    }

    /// Name used for the project data directory: the last path segment with
    /// any `.git` suffix removed.
    pub fn project_name(&self) -> String {
        let raw = match self {
            Self::Local(path) => path.to_string_lossy().into_owned(),
            Self::Remote(url) => url.clone(),
        };
        let trimmed = raw.trim_end_matches(['/', '\\']);
        let last = trimmed
            .rsplit(['/', '\\', ':'])
            .find(|segment| !segment.is_empty() && *segment != ".")
            .unwrap_or("project");
        last.strip_suffix(".git").unwrap_or(last).to_string()
    }
}

impl fmt::Display for RepoLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => write!(f, "{url}"),
        }
    }
}

/// Which commits a run covers. The two forms are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CommitRange {
    /// Commits newer than a relative-time phrase such as `3 days ago`.
    Since(String),
    /// The N most recent commits.
    Last(u32),
}

impl CommitRange {
    /// Arguments appended to `git log`.
    pub fn git_args(&self) -> Vec<String> {
        match self {
            Self::Since(phrase) => vec![format!("--since={phrase}")],
            Self::Last(n) => vec!["-n".to_string(), n.to_string()],
        }
    }

    /// Human label for reports and logs.
    pub fn label(&self) -> String {
        match self {
            Self::Since(phrase) => format!("since {phrase}"),
            Self::Last(n) => format!("last {n} commits"),
        }
    }
}

/// Attachment format sent with notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachFormat {
    /// The rendered HTML report.
    #[default]
    Html,
    /// The styled article converted to PDF, falling back to HTML.
    Pdf,
}

impl FromStr for AttachFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" => Ok(Self::Html),
            "pdf" => Ok(Self::Pdf),
            other => Err(ConfigError::InvalidAttachFormat(other.to_string())),
        }
    }
}

impl fmt::Display for AttachFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Html => write!(f, "html"),
            Self::Pdf => write!(f, "pdf"),
        }
    }
}

/// Everything a single invocation needs, resolved once up front.
///
/// Components only ever read it. Whether AI is available for the run is not
/// stored here; the orchestrator threads an optional summarizer instead.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Repository being reported on.
    pub locator: RepoLocator,
    /// Project data directory (log, memory, reports).
    pub project_dir: PathBuf,
    /// Selected provider id.
    pub provider_id: String,
    /// Requested narrative style.
    pub style: String,
    /// Attachment format for notifications.
    pub attach_format: AttachFormat,
    /// Commit range.
    pub range: CommitRange,
    /// Notification recipients.
    pub recipients: Vec<String>,
    /// Skip every AI stage.
    pub no_ai: bool,
    /// Do not open the HTML report in a browser.
    pub no_browser: bool,
    /// Process-wide settings.
    pub settings: Arc<Settings>,
    /// Compiled ignore globs.
    pub ignore: IgnoreSet,
}

impl RunContext {
    /// Minimal context with defaults, mostly for embedding and tests.
    pub fn new(locator: RepoLocator, project_dir: PathBuf, settings: Arc<Settings>) -> Self {
        let ignore = settings.ignore_set().unwrap_or_else(|e| {
            tracing::warn!("Falling back to an empty ignore set: {e}");
            IgnoreSet::empty()
        });
        Self {
            locator,
            project_dir,
            provider_id: settings.default_provider(),
            style: DEFAULT_STYLE.to_string(),
            attach_format: AttachFormat::Html,
            range: CommitRange::Since(super::DEFAULT_SINCE.to_string()),
            recipients: Vec::new(),
            no_ai: false,
            no_browser: true,
            settings,
            ignore,
        }
    }

    /// Whether a non-default narrative style was requested.
    pub fn wants_custom_style(&self) -> bool {
        self.style != DEFAULT_STYLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_selects_remote() {
        for raw in [
            "https://github.com/acme/widgets",
            "http://git.example.com/acme/widgets.git",
            "git@github.com:acme/widgets.git",
            "ssh://git@host/acme/widgets",
        ] {
            assert!(RepoLocator::parse(raw).unwrap().is_remote(), "{raw}");
        }
        assert!(!RepoLocator::parse("/srv/repos/widgets").unwrap().is_remote());
        assert!(!RepoLocator::parse("relative/dir").unwrap().is_remote());
    }

    #[test]
    fn relative_paths_become_absolute() {
        let locator = RepoLocator::parse("some/dir").unwrap();
        assert!(locator.local_path().unwrap().is_absolute());
    }

    #[test]
    fn empty_locator_is_rejected() {
        assert!(RepoLocator::parse("  ").is_err());
    }

    #[test]
    fn project_names() {
        let cases = [
            ("/srv/repos/widgets/", "widgets"),
            ("https://github.com/acme/widgets.git", "widgets"),
            ("git@github.com:acme/gadgets.git", "gadgets"),
        ];
        for (raw, expected) in cases {
            assert_eq!(RepoLocator::parse(raw).unwrap().project_name(), expected);
        }
    }

    #[test]
    fn range_arguments_and_labels() {
        let since = CommitRange::Since("2 weeks ago".to_string());
        assert_eq!(since.git_args(), vec!["--since=2 weeks ago"]);
        assert_eq!(since.label(), "since 2 weeks ago");

        let last = CommitRange::Last(5);
        assert_eq!(last.git_args(), vec!["-n", "5"]);
        insta::assert_snapshot!(last.label(), @"last 5 commits");
    }

    #[test]
    fn attach_format_parsing() {
        assert_eq!("PDF".parse::<AttachFormat>().unwrap(), AttachFormat::Pdf);
        assert_eq!(" html ".parse::<AttachFormat>().unwrap(), AttachFormat::Html);
        assert!("docx".parse::<AttachFormat>().is_err());
    }
}
