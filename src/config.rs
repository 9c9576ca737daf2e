//! Process-wide settings, per-project configuration and the per-run context.

pub mod context;
pub mod project;
pub mod settings;

use std::time::Duration;

use thiserror::Error;

pub use context::{AttachFormat, CommitRange, RepoLocator, RunContext};
pub use project::{ProjectConfig, ProjectPaths, RunOverrides};
pub use settings::Settings;

/// Append-only newline-delimited JSON log of past summaries.
pub const PROJECT_LOG_FILE: &str = "project_log.jsonl";

/// Compressed memory document rewritten after every distillation.
pub const PROJECT_MEMORY_FILE: &str = "project_memory.md";

/// Per-project defaults document.
pub const PROJECT_CONFIG_FILE: &str = "config.json";

/// Alias table kept at the data root.
pub const PROJECT_ALIASES_FILE: &str = "projects.json";

/// Filename prefix for rendered HTML reports.
pub const REPORT_FILENAME_PREFIX: &str = "GitReport";

/// Diffs longer than this many characters are not sent to the provider.
pub const MAX_DIFF_CHARS: usize = 100_000;

/// Timeout applied to every git subprocess.
pub const GIT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on commits listed from a hosted API in one run.
pub const REMOTE_COMMIT_CAP: usize = 100;

/// Provider used when neither the invocation nor the project names one.
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Narrative style that needs no transform call.
pub const DEFAULT_STYLE: &str = "default";

/// Range phrase used when neither `--time` nor `--number` is given.
pub const DEFAULT_SINCE: &str = "1 day ago";

/// Files that never count towards change statistics.
pub const DEFAULT_IGNORE_GLOBS: &[&str] = &[
    "*.lock",
    "package-lock.json",
    "pnpm-lock.yaml",
    "poetry.lock",
    "pdm.lock",
    "uv.lock",
    "dist/*",
    "build/*",
    "target/*",
    "*.min.js",
    "*.pyc",
    "*.so",
    "*.o",
    "__pycache__/*",
    ".pytest_cache/*",
    ".mypy_cache/*",
    ".ruff_cache/*",
    ".vscode/*",
    ".idea/*",
    ".env",
    "*.png",
    "*.jpg",
    "*.jpeg",
    "*.gif",
    "*.svg",
    "*.ico",
    "*.pdf",
    "*.woff",
    "*.woff2",
    "*.eot",
    "*.ttf",
    "*.otf",
    "*.zip",
    "*.tar.gz",
];

/// Configuration errors. All of them abort the invocation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Neither a project alias nor a repository locator was supplied.
    #[error("Either --project <alias> or --repo <path|url> is required")]
    MissingSelection,

    /// Both a project alias and a repository locator were supplied.
    #[error("--project and --repo are mutually exclusive")]
    ConflictingProjectSelection,

    /// The alias is not present in the alias table.
    #[error("Project alias '{0}' is not configured")]
    UnknownAlias(String),

    /// The attachment format is neither `html` nor `pdf`.
    #[error("Invalid attachment format '{0}' (expected 'html' or 'pdf')")]
    InvalidAttachFormat(String),

    /// The repository locator could not be interpreted.
    #[error("Invalid repository locator: {0}")]
    InvalidLocator(String),
}
