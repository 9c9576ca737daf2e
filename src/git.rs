//! Commit and change-statistics models plus parsers for git's textual output.

pub mod commit;
pub mod log;
pub mod stats;

pub use commit::Commit;
pub use stats::{ChangeStats, FileStat, IgnoreSet, StatsAccumulator, StatsCoverage};

/// Number of hex characters kept when a source only has full commit hashes.
pub const SHORT_HASH_LEN: usize = 7;
