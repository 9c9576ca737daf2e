//! Plain-text report for the console and as reduce input.

use chrono::{DateTime, Local};

use super::{group_by_author, merge_count};
use crate::git::{ChangeStats, Commit, StatsCoverage};

const RULE_WIDTH: usize = 80;

fn rule(ch: char) -> String {
    ch.to_string().repeat(RULE_WIDTH)
}

fn centered(title: &str) -> String {
    let pad = RULE_WIDTH.saturating_sub(title.chars().count()) / 2;
    format!("{}{title}", " ".repeat(pad))
}

/// Summary line for the change statistics.
pub fn stats_line(stats: &ChangeStats) -> String {
    match stats.coverage {
        StatsCoverage::Complete => format!(
            "+{} -{} (files changed: {})",
            stats.additions,
            stats.deletions,
            stats.files_changed()
        ),
        StatsCoverage::Unavailable => "not computed by this data source".to_string(),
    }
}

/// Renders the text report: header, totals, commits grouped by author and
/// the per-file table. Merge commits are counted but not listed.
pub fn render_text_report(
    commits: &[Commit],
    stats: &ChangeStats,
    range_label: &str,
    generated_at: DateTime<Local>,
) -> String {
    let mut out = String::new();
    let merges = merge_count(commits);
    let listed = commits.len() - merges;

    out.push_str(&format!("{}\n", rule('=')));
    out.push_str(&format!("{}\n", centered("Development Report")));
    out.push_str(&format!("{}\n", rule('=')));
    out.push_str(&format!("Generated: {}\n", generated_at.format("%Y-%m-%d %H:%M:%S")));
    out.push_str(&format!("Range:     {range_label}\n"));
    if merges > 0 {
        out.push_str(&format!("Commits:   {listed} (+{merges} merge)\n"));
    } else {
        out.push_str(&format!("Commits:   {listed}\n"));
    }
    out.push_str(&format!("Changes:   {}\n", stats_line(stats)));
    out.push('\n');

    let groups = group_by_author(commits);
    if groups.is_empty() {
        out.push_str("No commits found in range.\n\n");
    }
    for group in &groups {
        out.push_str(&format!("Author: {} ({} commits)\n", group.author, group.commits.len()));
        out.push_str(&format!("{}\n", "-".repeat(40)));
        for commit in &group.commits {
            let branch = if commit.has_branch() {
                format!(" {}", commit.branch_label())
            } else {
                String::new()
            };
            out.push_str(&format!(
                "{} {}{branch} - {} ({})\n",
                commit.graph_glyph(),
                commit.short_hash(),
                commit.subject(),
                commit.relative_time()
            ));
        }
        out.push('\n');
    }

    if !stats.file_stats.is_empty() {
        out.push_str(&format!("{}\n", rule('=')));
        out.push_str(&format!("{}\n", centered("File changes")));
        out.push_str(&format!("{}\n", rule('=')));
        out.push_str(&format!(" {:<6} | {:<6} | File\n", "Added", "Deleted"));
        out.push_str(&format!("{}\n", rule('-')));
        for file in &stats.file_stats {
            out.push_str(&format!(
                " +{:<5} | -{:<5} | {}\n",
                file.additions, file.deletions, file.path
            ));
        }
        out.push_str(&format!("{}\n", rule('-')));
    }
    out.push_str(&rule('='));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::FileStat;
    use chrono::TimeZone;

    #[test]
    fn text_report_layout() {
        let commits = vec![
            Commit::new("a1b2c3d", "Add parser", "2 hours ago", "alice")
                .with_branch_label("(HEAD -> main)"),
            Commit::new("e4f5a6b", "Merge pull request #4", "3 hours ago", "bob"),
            Commit::new("c7d8e9f", "Fix off-by-one", "5 hours ago", "bob"),
        ];
        let stats = ChangeStats {
            additions: 12,
            deletions: 3,
            file_stats: vec![FileStat {
                path: "src/parser.rs".to_string(),
                additions: 12,
                deletions: 3,
            }],
            coverage: StatsCoverage::Complete,
        };
        let at = Local.with_ymd_and_hms(2026, 5, 4, 18, 30, 0).unwrap();
        insta::assert_snapshot!(render_text_report(&commits, &stats, "since 1 day ago", at), @r"
        ================================================================================
                                       Development Report
        ================================================================================
        Generated: 2026-05-04 18:30:00
        Range:     since 1 day ago
        Commits:   2 (+1 merge)
        Changes:   +12 -3 (files changed: 1)

        Author: alice (1 commits)
        ----------------------------------------
        * a1b2c3d (HEAD -> main) - Add parser (2 hours ago)

        Author: bob (1 commits)
        ----------------------------------------
        * c7d8e9f - Fix off-by-one (5 hours ago)

        ================================================================================
                                          File changes
        ================================================================================
         Added  | Deleted | File
        --------------------------------------------------------------------------------
         +12    | -3     | src/parser.rs
        --------------------------------------------------------------------------------
        ================================================================================
        ");
    }

    #[test]
    fn unavailable_stats_are_explicit() {
        let line = stats_line(&ChangeStats::unavailable());
        assert_eq!(line, "not computed by this data source");
    }
}
