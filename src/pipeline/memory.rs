//! Append-only summary log and the distilled memory document.
//!
//! Both live in the project directory. The log gains one JSON line per
//! successful AI summary and is never rewritten; the memory document is
//! replaced wholesale after every successful distillation.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::{PROJECT_LOG_FILE, PROJECT_MEMORY_FILE};

/// One line of the summary log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Local date, `YYYY-MM-DD`.
    pub date: String,
    /// Lines added in the reported range.
    pub additions: u64,
    /// Lines deleted in the reported range.
    pub deletions: u64,
    /// The AI summary.
    pub summary: String,
}

/// Paths of a project's log and memory document.
#[derive(Debug, Clone)]
pub struct ProjectMemory {
    log_path: PathBuf,
    memory_path: PathBuf,
}

impl ProjectMemory {
    /// Memory files inside `project_dir`.
    pub fn new(project_dir: &Path) -> Self {
        Self {
            log_path: project_dir.join(PROJECT_LOG_FILE),
            memory_path: project_dir.join(PROJECT_MEMORY_FILE),
        }
    }

    /// Log file path.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Memory document path.
    pub fn memory_path(&self) -> &Path {
        &self.memory_path
    }

    /// The current memory document. Missing, empty or unreadable documents
    /// yield `None`.
    pub fn load_memory(&self) -> Option<String> {
        match fs::read_to_string(&self.memory_path) {
            Ok(text) if text.trim().is_empty() => None,
            Ok(text) => {
                info!(path = %self.memory_path.display(), "Loaded project memory");
                Some(text)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.memory_path.display(), "No project memory yet");
                None
            }
            Err(e) => {
                warn!(path = %self.memory_path.display(), "Failed to read project memory: {e}");
                None
            }
        }
    }

    /// Appends one entry to the log.
    pub fn append(&self, entry: &LogEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry).context("Failed to encode log entry")?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .with_context(|| format!("Failed to open {}", self.log_path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("Failed to append to {}", self.log_path.display()))?;
        info!(path = %self.log_path.display(), "Appended to project log");
        Ok(())
    }

    /// Full log text, `None` if there is no log yet.
    pub fn read_log(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.log_path) {
            Ok(text) if text.trim().is_empty() => Ok(None),
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to read {}", self.log_path.display()))
            }
        }
    }

    /// Parsed log entries; malformed lines are skipped.
    pub fn entries(&self) -> Result<Vec<LogEntry>> {
        let Some(text) = self.read_log()? else {
            return Ok(Vec::new());
        };
        Ok(text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| match serde_json::from_str(l) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping malformed log line: {e}");
                    None
                }
            })
            .collect())
    }

    /// Replaces the memory document atomically.
    pub fn write_memory(&self, memory: &str) -> Result<()> {
        let dir = self
            .memory_path
            .parent()
            .context("Memory path has no parent directory")?;
        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create a temporary file in {}", dir.display()))?;
        tmp.write_all(memory.as_bytes())
            .context("Failed to write memory document")?;
        tmp.persist(&self.memory_path)
            .with_context(|| format!("Failed to replace {}", self.memory_path.display()))?;
        info!(path = %self.memory_path.display(), "Rewrote project memory");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(day: u32, summary: &str) -> LogEntry {
        LogEntry {
            date: format!("2026-01-{day:02}"),
            additions: 10,
            deletions: 2,
            summary: summary.to_string(),
        }
    }

    #[test]
    fn log_only_grows() {
        let dir = TempDir::new().unwrap();
        let memory = ProjectMemory::new(dir.path());
        assert!(memory.read_log().unwrap().is_none());

        memory.append(&entry(1, "first\nline")).unwrap();
        memory.append(&entry(2, "second")).unwrap();

        let text = memory.read_log().unwrap().unwrap();
        assert_eq!(text.lines().count(), 2);
        assert_eq!(
            memory.entries().unwrap(),
            vec![entry(1, "first\nline"), entry(2, "second")]
        );
    }

    #[test]
    fn memory_is_replaced_whole() {
        let dir = TempDir::new().unwrap();
        let memory = ProjectMemory::new(dir.path());
        assert!(memory.load_memory().is_none());

        memory.write_memory("# v1\nlong text").unwrap();
        memory.write_memory("# v2").unwrap();
        assert_eq!(memory.load_memory().as_deref(), Some("# v2"));

        memory.write_memory("  \n").unwrap();
        assert!(memory.load_memory().is_none());
    }

    #[test]
    fn malformed_log_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let memory = ProjectMemory::new(dir.path());
        memory.append(&entry(3, "ok")).unwrap();
        fs::OpenOptions::new()
            .append(true)
            .open(memory.log_path())
            .unwrap()
            .write_all(b"not json\n")
            .unwrap();
        assert_eq!(memory.entries().unwrap(), vec![entry(3, "ok")]);
    }

    #[test]
    fn writes_fail_without_project_dir() {
        let dir = TempDir::new().unwrap();
        let memory = ProjectMemory::new(&dir.path().join("missing"));
        assert!(memory.append(&entry(1, "x")).is_err());
        assert!(memory.write_memory("x").is_err());
    }
}
