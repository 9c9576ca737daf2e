//! Plugins observing or transforming artifacts at fixed points of a run.
//!
//! Two dispatch modes exist. Notify points (`run-start`, `data-fetched`,
//! `run-end`) call every plugin and ignore results. Filter points
//! (`summary-produced`, `report-rendered`) thread a value through every plugin
//! in registration order, each one free to replace it. In both modes a plugin
//! that errors or panics is logged with its name and skipped; the run and the
//! in-flight value carry on unaffected.

pub mod builtin;
pub mod manager;
pub mod plugin;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use builtin::{
    plugin_kinds, CleanOutputPlugin, CommandPlugin, FooterPlugin, PluginManifest, RedactPlugin,
};
pub use manager::PluginManager;
pub use plugin::{FilterPoint, NotifyEvent, Plugin, RunEndEvent};

/// Named pipeline moment where plugins run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtensionPoint {
    /// Before any data is fetched.
    RunStart,
    /// Commits and statistics are available.
    DataFetched,
    /// The run finished, successfully or not.
    RunEnd,
    /// The AI summary is about to be used.
    SummaryProduced,
    /// The HTML report is about to be written.
    ReportRendered,
}

impl ExtensionPoint {
    /// Every point in pipeline order.
    pub const ALL: [Self; 5] = [
        Self::RunStart,
        Self::DataFetched,
        Self::SummaryProduced,
        Self::ReportRendered,
        Self::RunEnd,
    ];

    /// Kebab-case name used in manifests and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RunStart => "run-start",
            Self::DataFetched => "data-fetched",
            Self::RunEnd => "run-end",
            Self::SummaryProduced => "summary-produced",
            Self::ReportRendered => "report-rendered",
        }
    }

    /// Whether the point threads a value through plugins.
    pub fn is_filter(self) -> bool {
        matches!(self, Self::SummaryProduced | Self::ReportRendered)
    }
}

impl fmt::Display for ExtensionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
