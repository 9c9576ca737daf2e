//! The plugin capability and the events passed to it.

use anyhow::Result;
use serde::Serialize;

use super::ExtensionPoint;
use crate::config::RunContext;
use crate::git::{ChangeStats, Commit};

/// How a run ended, as seen by `run-end` plugins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunEndEvent {
    /// Whether the run reached the end of the pipeline.
    pub succeeded: bool,
    /// Short human-readable outcome.
    pub detail: String,
}

impl RunEndEvent {
    /// A run that completed.
    pub fn completed(detail: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            detail: detail.into(),
        }
    }

    /// A run aborted by a terminal failure.
    pub fn aborted(detail: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            detail: detail.into(),
        }
    }
}

/// Arguments of a notify point.
#[derive(Debug, Clone, Copy)]
pub enum NotifyEvent<'a> {
    /// `run-start`.
    RunStart,
    /// `data-fetched`.
    DataFetched {
        /// Commits in range.
        commits: &'a [Commit],
        /// Aggregate statistics.
        stats: &'a ChangeStats,
    },
    /// `run-end`.
    RunEnd(&'a RunEndEvent),
}

impl NotifyEvent<'_> {
    /// Extension point this event is dispatched to.
    pub fn point(&self) -> ExtensionPoint {
        match self {
            Self::RunStart => ExtensionPoint::RunStart,
            Self::DataFetched { .. } => ExtensionPoint::DataFetched,
            Self::RunEnd(_) => ExtensionPoint::RunEnd,
        }
    }
}

/// Filter points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterPoint {
    /// `summary-produced`: the AI summary text.
    SummaryProduced,
    /// `report-rendered`: the full HTML document.
    ReportRendered,
}

impl FilterPoint {
    /// Extension point this filter is dispatched to.
    pub fn point(self) -> ExtensionPoint {
        match self {
            Self::SummaryProduced => ExtensionPoint::SummaryProduced,
            Self::ReportRendered => ExtensionPoint::ReportRendered,
        }
    }
}

/// Code run at extension points. Every method defaults to doing nothing, so
/// a plugin implements only the points it cares about.
///
/// Filter methods return `Ok(None)` (or an empty string) to leave the value
/// unchanged.
pub trait Plugin: Send + Sync {
    /// Identity used in logs.
    fn name(&self) -> &str;

    /// Called before anything is fetched.
    fn on_run_start(&self, _ctx: &RunContext) -> Result<()> {
        Ok(())
    }

    /// Called once commits and statistics are known.
    fn on_data_fetched(
        &self,
        _ctx: &RunContext,
        _commits: &[Commit],
        _stats: &ChangeStats,
    ) -> Result<()> {
        Ok(())
    }

    /// Called when the run ends, including after a terminal failure.
    fn on_run_end(&self, _ctx: &RunContext, _event: &RunEndEvent) -> Result<()> {
        Ok(())
    }

    /// May replace the AI summary.
    fn on_summary_produced(&self, _ctx: &RunContext, _summary: &str) -> Result<Option<String>> {
        Ok(None)
    }

    /// May replace the rendered HTML report.
    fn on_report_rendered(&self, _ctx: &RunContext, _html: &str) -> Result<Option<String>> {
        Ok(None)
    }
}
