//! Project data directories, alias table and per-project defaults.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};

use super::{
    AttachFormat, CommitRange, ConfigError, RepoLocator, RunContext, Settings, DEFAULT_SINCE,
    DEFAULT_STYLE, PROJECT_ALIASES_FILE, PROJECT_CONFIG_FILE,
};

/// Per-project defaults stored in `<project dir>/config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Provider id.
    #[serde(default)]
    pub default_llm: Option<String>,
    /// Narrative style.
    #[serde(default)]
    pub default_style: Option<String>,
    /// Attachment format (`html` or `pdf`).
    #[serde(default)]
    pub default_attach_format: Option<String>,
    /// Recipients, either a list or a comma-separated string.
    #[serde(default, deserialize_with = "deserialize_recipients")]
    pub default_email: Vec<String>,
}

fn deserialize_recipients<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Recipients {
        One(String),
        Many(Vec<String>),
        Missing(Option<()>),
    }

    Ok(match Recipients::deserialize(deserializer)? {
        Recipients::One(s) => split_recipients(&s),
        Recipients::Many(list) => list
            .iter()
            .flat_map(|s| split_recipients(s))
            .collect(),
        Recipients::Missing(_) => Vec::new(),
    })
}

/// Splits a comma-separated recipient list, dropping blanks.
pub fn split_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl ProjectConfig {
    /// Loads the project config; a missing or unreadable file yields defaults.
    pub fn load(project_dir: &Path) -> Self {
        let path = project_dir.join(PROJECT_CONFIG_FILE);
        let Ok(content) = fs::read_to_string(&path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %path.display(), "Ignoring malformed project config: {e}");
            Self::default()
        })
    }
}

/// Data root layout: one directory per project plus the alias table.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    data_root: PathBuf,
}

impl ProjectPaths {
    /// Layout rooted at `data_root`.
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
        }
    }

    /// Root directory.
    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Project directory for a locator.
    pub fn project_dir(&self, locator: &RepoLocator) -> PathBuf {
        self.data_root.join(locator.project_name())
    }

    /// Reads the alias table; missing or malformed tables are empty.
    pub fn aliases(&self) -> BTreeMap<String, String> {
        let path = self.data_root.join(PROJECT_ALIASES_FILE);
        let Ok(content) = fs::read_to_string(&path) else {
            return BTreeMap::new();
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %path.display(), "Ignoring malformed alias table: {e}");
            BTreeMap::new()
        })
    }

    /// Resolves an alias to its locator string.
    pub fn resolve_alias(&self, alias: &str) -> Result<String, ConfigError> {
        self.aliases()
            .remove(alias)
            .ok_or_else(|| ConfigError::UnknownAlias(alias.to_string()))
    }
}

/// Per-invocation overrides. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    /// Project alias.
    pub project: Option<String>,
    /// Repository locator.
    pub repo: Option<String>,
    /// Relative-time phrase.
    pub since: Option<String>,
    /// Commit count.
    pub number: Option<u32>,
    /// Provider id.
    pub llm: Option<String>,
    /// Narrative style.
    pub style: Option<String>,
    /// Attachment format.
    pub attach_format: Option<AttachFormat>,
    /// Recipients (comma-separated).
    pub email: Option<String>,
    /// Skip AI stages.
    pub no_ai: bool,
    /// Skip opening the browser.
    pub no_browser: bool,
}

impl RunOverrides {
    /// Builds the run context. Precedence for every value is
    /// override > project config > process-wide default.
    pub fn resolve(self, settings: Arc<Settings>) -> Result<RunContext> {
        let paths = ProjectPaths::new(settings.data_root()?);

        let raw_locator = match (&self.project, &self.repo) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingProjectSelection.into()),
            (Some(alias), None) => {
                let locator = paths.resolve_alias(alias)?;
                info!(alias = %alias, locator = %locator, "Resolved project alias");
                locator
            }
            (None, Some(repo)) => repo.clone(),
            (None, None) => return Err(ConfigError::MissingSelection.into()),
        };
        let locator = RepoLocator::parse(&raw_locator)?;

        let project_dir = paths.project_dir(&locator);
        fs::create_dir_all(&project_dir).with_context(|| {
            format!(
                "Failed to create project directory: {}",
                project_dir.display()
            )
        })?;
        let project = ProjectConfig::load(&project_dir);

        let provider_id = self
            .llm
            .or(project.default_llm)
            .map_or_else(|| settings.default_provider(), |id| id.to_lowercase());
        let style = self
            .style
            .or(project.default_style)
            .unwrap_or_else(|| DEFAULT_STYLE.to_string());
        let attach_format = match self.attach_format {
            Some(format) => format,
            None => match project.default_attach_format {
                Some(raw) => raw.parse()?,
                None => AttachFormat::Html,
            },
        };
        let recipients = match self.email {
            Some(raw) => split_recipients(&raw),
            None => project.default_email,
        };
        let range = match (self.number, self.since) {
            (Some(n), _) => CommitRange::Last(n),
            (None, Some(phrase)) => CommitRange::Since(phrase),
            (None, None) => CommitRange::Since(DEFAULT_SINCE.to_string()),
        };

        let ignore = settings.ignore_set()?;

        Ok(RunContext {
            locator,
            project_dir,
            provider_id,
            style,
            attach_format,
            range,
            recipients,
            no_ai: self.no_ai,
            no_browser: self.no_browser,
            settings,
            ignore,
        })
    }
}
