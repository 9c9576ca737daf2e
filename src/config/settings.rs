//! Settings and configuration utilities.
//!
//! Process-wide configuration comes from environment variables with a
//! fallback to `$HOME/.devlog/settings.json`.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use super::{DEFAULT_IGNORE_GLOBS, DEFAULT_PROVIDER};
use crate::git::IgnoreSet;

/// Default number of concurrent provider calls during the map stage.
pub const DEFAULT_MAP_CONCURRENCY: usize = 4;

/// Settings loaded from $HOME/.devlog/settings.json.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    /// Environment variable fallbacks.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Extra ignore globs appended to the built-in list.
    #[serde(default)]
    pub ignore_globs: Vec<String>,

    /// When set, the process environment is not consulted.
    #[serde(skip)]
    isolated: bool,
}

impl Settings {
    /// Loads settings from the default location.
    pub fn load() -> Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Self::load_from_path(&settings_path)
    }

    /// Loads settings from a specific path.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // If file doesn't exist, return default settings
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        serde_json::from_str::<Self>(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))
    }

    /// Returns the default settings path.
    pub fn get_settings_path() -> Result<PathBuf> {
        Ok(Self::home_dir()?.join("settings.json"))
    }

    fn home_dir() -> Result<PathBuf> {
        let home_dir = dirs::home_dir().context("Failed to determine home directory")?;
        Ok(home_dir.join(".devlog"))
    }

    /// Settings backed only by the given map, ignoring the process environment.
    pub fn isolated<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            env: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            ignore_globs: Vec::new(),
            isolated: true,
        }
    }

    /// Returns a copy with `key` set in the fallback map.
    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Returns an environment variable with fallback to settings.
    ///
    /// Empty values count as unset.
    pub fn get_env_var(&self, key: &str) -> Option<String> {
        let from_env = if self.isolated {
            None
        } else {
            env::var(key).ok()
        };
        from_env
            .or_else(|| self.env.get(key).cloned())
            .filter(|value| !value.trim().is_empty())
    }

    /// Returns the first of several variables that is set.
    pub fn get_env_vars(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.get_env_var(key))
    }

    /// Provider id used when neither the invocation nor the project names one.
    pub fn default_provider(&self) -> String {
        self.get_env_var("DEVLOG_DEFAULT_LLM")
            .map_or_else(|| DEFAULT_PROVIDER.to_string(), |v| v.to_lowercase())
    }

    /// Root directory holding one sub-directory per project.
    pub fn data_root(&self) -> Result<PathBuf> {
        match self.get_env_var("DEVLOG_DATA_DIR") {
            Some(dir) => Ok(PathBuf::from(dir)),
            None => Ok(Self::home_dir()?.join("data")),
        }
    }

    /// Root of the `providers/`, `plugins/`, `notifiers/` and `sources/`
    /// extension directories.
    pub fn extensions_dir(&self) -> Option<PathBuf> {
        self.get_env_var("DEVLOG_EXTENSIONS_DIR")
            .map(PathBuf::from)
            .or_else(|| Self::home_dir().ok().map(|home| home.join("extensions")))
    }

    /// Bound on concurrent provider calls in the map stage (at least 1).
    pub fn map_concurrency(&self) -> usize {
        self.get_env_var("DEVLOG_MAP_CONCURRENCY")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAP_CONCURRENCY)
            .max(1)
    }

    /// Built-in ignore globs plus any configured extras.
    pub fn ignore_set(&self) -> Result<IgnoreSet> {
        let mut patterns: Vec<String> = DEFAULT_IGNORE_GLOBS
            .iter()
            .map(|p| (*p).to_string())
            .collect();
        patterns.extend(self.ignore_globs.iter().cloned());
        IgnoreSet::new(&patterns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn settings_load_from_path() {
        let temp_dir = TempDir::new().unwrap();
        let settings_path = temp_dir.path().join("settings.json");

        let settings_json = r#"{
            "env": {
                "DEVLOG_TEST_ONLY_VAR": "test_value",
                "GEMINI_API_KEY": "test_api_key"
            },
            "ignore_globs": ["*.snap"]
        }"#;
        fs::write(&settings_path, settings_json).unwrap();

        let settings = Settings::load_from_path(&settings_path).unwrap();

        assert_eq!(
            settings.env.get("DEVLOG_TEST_ONLY_VAR").unwrap(),
            "test_value"
        );
        assert!(settings.ignore_set().unwrap().is_ignored("tests/out.snap"));
        assert!(settings.ignore_set().unwrap().is_ignored("Cargo.lock"));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::load_from_path(temp_dir.path().join("nope.json")).unwrap();
        assert!(settings.env.is_empty());
    }

    #[test]
    fn env_takes_precedence_over_file() {
        let settings = Settings {
            env: HashMap::from([(
                "DEVLOG_SETTINGS_PRECEDENCE_TEST".to_string(),
                "file".to_string(),
            )]),
            ..Settings::default()
        };

        env::set_var("DEVLOG_SETTINGS_PRECEDENCE_TEST", "env");
        assert_eq!(
            settings
                .get_env_var("DEVLOG_SETTINGS_PRECEDENCE_TEST")
                .unwrap(),
            "env"
        );
        env::remove_var("DEVLOG_SETTINGS_PRECEDENCE_TEST");
        assert_eq!(
            settings
                .get_env_var("DEVLOG_SETTINGS_PRECEDENCE_TEST")
                .unwrap(),
            "file"
        );
    }

    #[test]
    fn isolated_settings_ignore_process_env() {
        env::set_var("DEVLOG_ISOLATION_TEST", "leaked");
        let settings = Settings::isolated([("OTHER", "x")]);
        assert!(settings.get_env_var("DEVLOG_ISOLATION_TEST").is_none());
        env::remove_var("DEVLOG_ISOLATION_TEST");
    }

    #[test]
    fn empty_values_are_unset() {
        let settings = Settings::isolated([("GEMINI_API_KEY", "  ")]);
        assert!(settings.get_env_var("GEMINI_API_KEY").is_none());
    }

    #[test]
    fn typed_accessors() {
        let settings = Settings::isolated([
            ("DEVLOG_DEFAULT_LLM", "DeepSeek"),
            ("DEVLOG_MAP_CONCURRENCY", "0"),
            ("DEVLOG_DATA_DIR", "/tmp/devlog-data"),
        ]);
        assert_eq!(settings.default_provider(), "deepseek");
        assert_eq!(settings.map_concurrency(), 1);
        assert_eq!(
            settings.data_root().unwrap(),
            PathBuf::from("/tmp/devlog-data")
        );

        let defaults = Settings::isolated(Vec::<(String, String)>::new());
        assert_eq!(defaults.default_provider(), "gemini");
        assert_eq!(defaults.map_concurrency(), DEFAULT_MAP_CONCURRENCY);
    }
}
