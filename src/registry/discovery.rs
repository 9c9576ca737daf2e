//! Manifest scanning for extension directories.
//!
//! Every `*.yaml`, `*.yml` or `*.json` file in a directory is parsed into a
//! caller-chosen manifest type. Files are visited in lexicographic order of
//! their names so discovery order is the same on every platform. A file that
//! cannot be read or parsed is logged and skipped.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// A parsed manifest and the file it came from.
#[derive(Debug, Clone)]
pub struct Manifest<M> {
    /// File the manifest was read from.
    pub path: PathBuf,
    /// Parsed body.
    pub body: M,
}

const MANIFEST_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Parses every manifest file in `dir`.
///
/// A missing directory yields no manifests.
pub fn discover_manifests<M: DeserializeOwned>(dir: &Path) -> Vec<Manifest<M>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), "No extension directory: {e}");
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_manifest(path))
        .collect();
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    paths
        .into_iter()
        .filter_map(|path| match parse_manifest(&path) {
            Ok(body) => {
                debug!(path = %path.display(), "Loaded extension manifest");
                Some(Manifest { path, body })
            }
            Err(e) => {
                warn!(path = %path.display(), "Skipping broken extension manifest: {e:#}");
                None
            }
        })
        .collect()
}

fn is_manifest(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MANIFEST_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn parse_manifest<M: DeserializeOwned>(path: &Path) -> Result<M> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON manifest: {}", path.display()))
    } else {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML manifest: {}", path.display()))
    }
}
