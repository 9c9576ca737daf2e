//! # devlog
//!
//! Turns a repository's recent git history into a written development report.
//!
//! A run fetches commits and change statistics from a [`source::DataSource`],
//! renders a plain report, optionally asks an [`llm::LlmProvider`] for a
//! narrative (Map → Reduce → Distill → Style), keeps a per-project memory and
//! hands the result to every enabled [`notify::Notifier`]. Providers, data
//! sources, plugins and notifiers are all looked up through registries, so
//! new ones can be added without touching the pipeline.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use devlog::config::{RunOverrides, Settings};
//! use devlog::pipeline::{Extensions, Orchestrator};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let settings = Arc::new(Settings::load()?);
//! let ctx = RunOverrides {
//!     repo: Some(".".to_string()),
//!     no_ai: true,
//!     ..RunOverrides::default()
//! }
//! .resolve(settings.clone())?;
//! let outcome = Orchestrator::new(ctx, Extensions::load(&settings)).run().await?;
//! println!("{} commits", outcome.commits);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod git;
pub mod hooks;
pub mod llm;
pub mod notify;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod source;

pub use crate::cli::Cli;

/// The current version of devlog.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
