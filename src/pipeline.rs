//! The report run: Map → Reduce → Distill → Style around data fetching,
//! rendering and delivery.

pub mod memory;
pub mod orchestrator;
pub mod summarizer;

pub use memory::{LogEntry, ProjectMemory};
pub use orchestrator::{Extensions, Orchestrator, RunOutcome, RunStatus};
pub use summarizer::{Summarizer, DIFF_TOO_LARGE_PLACEHOLDER};
