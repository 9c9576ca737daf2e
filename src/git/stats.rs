//! Per-file change statistics and their aggregation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Added/deleted line counts for one path, summed across commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    /// Path relative to the repository root.
    pub path: String,
    /// Lines added.
    pub additions: u64,
    /// Lines deleted.
    pub deletions: u64,
}

/// Whether aggregate numbers reflect the real change set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsCoverage {
    /// Totals were computed from every commit in range.
    #[default]
    Complete,
    /// The source does not compute totals; every number is zero by contract.
    Unavailable,
}

/// Aggregate statistics for a commit range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStats {
    /// Total added lines across non-ignored files.
    pub additions: u64,
    /// Total deleted lines across non-ignored files.
    pub deletions: u64,
    /// Per-file totals ordered by path.
    pub file_stats: Vec<FileStat>,
    /// Whether the totals can be trusted.
    pub coverage: StatsCoverage,
}

impl ChangeStats {
    /// Zeroed statistics flagged as not computed by the source.
    pub fn unavailable() -> Self {
        Self {
            coverage: StatsCoverage::Unavailable,
            ..Self::default()
        }
    }

    /// Number of distinct files touched.
    pub fn files_changed(&self) -> usize {
        self.file_stats.len()
    }
}

/// Compiled set of ignore globs.
///
/// `*` also matches `/`, so `*.lock` ignores lockfiles in any directory.
#[derive(Debug, Clone)]
pub struct IgnoreSet {
    globs: GlobSet,
}

impl IgnoreSet {
    /// Compiles the given patterns.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            builder.add(
                Glob::new(pattern).with_context(|| format!("Invalid ignore glob: {pattern}"))?,
            );
        }
        Ok(Self {
            globs: builder.build().context("Failed to compile ignore globs")?,
        })
    }

    /// An ignore set that matches nothing.
    pub fn empty() -> Self {
        Self {
            globs: GlobSet::empty(),
        }
    }

    /// Whether the path is ignored.
    pub fn is_ignored(&self, path: &str) -> bool {
        self.globs.is_match(path)
    }
}

/// Accumulates raw change lines into [`ChangeStats`].
///
/// Ignored paths are dropped before they touch any total.
#[derive(Debug)]
pub struct StatsAccumulator {
    ignore: IgnoreSet,
    files: BTreeMap<String, FileStat>,
}

impl StatsAccumulator {
    /// Creates an accumulator filtering through `ignore`.
    pub fn new(ignore: IgnoreSet) -> Self {
        Self {
            ignore,
            files: BTreeMap::new(),
        }
    }

    /// Adds one change record. Returns `false` when the path was ignored.
    pub fn add(&mut self, path: &str, additions: u64, deletions: u64) -> bool {
        if self.ignore.is_ignored(path) {
            debug!(path = %path, "Ignoring file in change statistics");
            return false;
        }

        let entry = self
            .files
            .entry(path.to_string())
            .or_insert_with(|| FileStat {
                path: path.to_string(),
                additions: 0,
                deletions: 0,
            });
        entry.additions += additions;
        entry.deletions += deletions;
        true
    }

    /// Adds a `git log --numstat` line (`added<TAB>deleted<TAB>path`).
    ///
    /// Binary files report `-` counts and contribute zero lines. Lines that
    /// are not numstat records are skipped.
    pub fn add_numstat_line(&mut self, line: &str) {
        let mut parts = line.splitn(3, '\t');
        let (Some(added), Some(deleted), Some(path)) = (parts.next(), parts.next(), parts.next())
        else {
            return;
        };
        let path = path.trim();
        if path.is_empty() {
            return;
        }
        self.add(
            path,
            added.trim().parse().unwrap_or(0),
            deleted.trim().parse().unwrap_or(0),
        );
    }

    /// Finalizes the accumulated totals.
    pub fn finish(self) -> ChangeStats {
        let file_stats: Vec<FileStat> = self.files.into_values().collect();
        ChangeStats {
            additions: file_stats.iter().map(|f| f.additions).sum(),
            deletions: file_stats.iter().map(|f| f.deletions).sum(),
            file_stats,
            coverage: StatsCoverage::Complete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ignore() -> IgnoreSet {
        IgnoreSet::new(&["*.lock", "dist/*", "*.png"]).unwrap()
    }

    #[test]
    fn sums_lines_for_same_path() {
        let mut acc = StatsAccumulator::new(ignore());
        acc.add_numstat_line("10\t2\tsrc/main.rs");
        acc.add_numstat_line("3\t1\tsrc/main.rs");
        acc.add_numstat_line("1\t0\tREADME.md");

        let stats = acc.finish();
        assert_eq!(stats.additions, 14);
        assert_eq!(stats.deletions, 3);
        assert_eq!(stats.files_changed(), 2);
        let main = stats
            .file_stats
            .iter()
            .find(|f| f.path == "src/main.rs")
            .unwrap();
        assert_eq!((main.additions, main.deletions), (13, 3));
    }

    #[test]
    fn ignored_paths_never_contribute() {
        let mut acc = StatsAccumulator::new(ignore());
        acc.add_numstat_line("500\t20\tCargo.lock");
        acc.add_numstat_line("7\t7\tdist/bundle.js");
        acc.add_numstat_line("4\t0\tsub/dir/yarn.lock");
        acc.add_numstat_line("2\t1\tsrc/lib.rs");

        let stats = acc.finish();
        assert_eq!(stats.additions, 2);
        assert_eq!(stats.deletions, 1);
        assert_eq!(stats.file_stats.len(), 1);
        assert_eq!(stats.file_stats[0].path, "src/lib.rs");
    }

    #[test]
    fn binary_and_garbage_lines() {
        let mut acc = StatsAccumulator::new(IgnoreSet::empty());
        acc.add_numstat_line("-\t-\tassets/logo.bin");
        acc.add_numstat_line("");
        acc.add_numstat_line("not a numstat line");

        let stats = acc.finish();
        assert_eq!(stats.additions, 0);
        assert_eq!(stats.files_changed(), 1);
    }

    #[test]
    fn unavailable_stats_are_flagged() {
        let stats = ChangeStats::unavailable();
        assert_eq!(stats.coverage, StatsCoverage::Unavailable);
        assert_eq!(stats.additions, 0);
        assert!(stats.file_stats.is_empty());
    }

    #[test]
    fn invalid_glob_is_an_error() {
        assert!(IgnoreSet::new(&["a[b"]).is_err());
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        fn arb_path() -> impl Strategy<Value = String> {
            prop_oneof![
                Just("src/a.rs".to_string()),
                Just("src/b.rs".to_string()),
                Just("Cargo.lock".to_string()),
                Just("dist/app.js".to_string()),
                Just("docs/img.png".to_string()),
                "[a-z]{1,6}/[a-z]{1,6}\\.(rs|md|lock)",
            ]
        }

        fn aggregate(records: &[(String, u64, u64)]) -> ChangeStats {
            let mut acc = StatsAccumulator::new(ignore());
            for (path, add, del) in records {
                acc.add(path, *add, *del);
            }
            acc.finish()
        }

        proptest! {
            #[test]
            fn aggregation_is_order_independent(
                records in proptest::collection::vec((arb_path(), 0u64..1000, 0u64..1000), 0..40),
                seed in any::<u64>(),
            ) {
                let mut shuffled = records.clone();
                // Deterministic permutation driven by the seed.
                let len = shuffled.len();
                if len > 1 {
                    let mut state = seed;
                    for i in (1..len).rev() {
                        state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
                        let j = (state % (i as u64 + 1)) as usize;
                        shuffled.swap(i, j);
                    }
                }
                prop_assert_eq!(aggregate(&records), aggregate(&shuffled));
            }

            #[test]
            fn ignored_paths_contribute_zero(
                records in proptest::collection::vec((arb_path(), 0u64..1000, 0u64..1000), 0..40),
            ) {
                let set = ignore();
                let stats = aggregate(&records);
                let expected_add: u64 = records
                    .iter()
                    .filter(|(p, _, _)| !set.is_ignored(p))
                    .map(|(_, a, _)| a)
                    .sum();
                prop_assert_eq!(stats.additions, expected_add);
                prop_assert!(stats.file_stats.iter().all(|f| !set.is_ignored(&f.path)));
            }
        }
    }
}
