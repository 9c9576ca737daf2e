//! Parsing of `git log --graph --pretty=format:%h|%d|%s|%cr|%an` output.

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use super::Commit;

/// Pretty format consumed by [`parse_log`].
pub const LOG_PRETTY_FORMAT: &str = "%h|%d|%s|%cr|%an";

#[allow(clippy::unwrap_used)] // static pattern
fn graph_prefix() -> &'static Regex {
    static GRAPH_PREFIX: OnceLock<Regex> = OnceLock::new();
    GRAPH_PREFIX.get_or_init(|| Regex::new(r"^[*|\\/ _.-]+").unwrap())
}

/// Parses a single graph log line into a commit.
///
/// The subject may itself contain `|`; hash and decoration are taken from the
/// left, relative time and author from the right.
pub fn parse_line(line: &str) -> Option<Commit> {
    let glyph = line
        .chars()
        .next()
        .filter(|c| !c.is_alphanumeric())
        .map_or_else(|| "*".to_string(), |c| c.to_string());

    let body = graph_prefix().replace(line, "");
    let body = body.trim();

    let mut left = body.splitn(3, '|');
    let (Some(hash), Some(decoration), Some(rest)) = (left.next(), left.next(), left.next())
    else {
        warn!(line = %line, "Unexpected commit line format");
        return None;
    };

    let mut right = rest.rsplitn(3, '|');
    let (Some(author), Some(time), Some(subject)) = (right.next(), right.next(), right.next())
    else {
        warn!(line = %line, "Unexpected commit line format");
        return None;
    };

    let hash = hash.trim();
    if hash.is_empty() {
        return None;
    }

    Some(
        Commit::new(hash, subject.trim(), time.trim(), author.trim())
            .with_branch_label(decoration.trim())
            .with_graph_glyph(glyph),
    )
}

/// Parses complete graph log output, skipping connector-only lines.
pub fn parse_log(output: &str) -> Vec<Commit> {
    let commits: Vec<Commit> = output
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .filter(|line| line.contains('|') && !graph_prefix().replace(line, "").is_empty())
        .filter_map(parse_line)
        .collect();

    debug!(commit_count = commits.len(), "Parsed git log output");
    commits
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
* a1b2c3d| (HEAD -> main, origin/main)|Merge branch 'feature'|2 hours ago|Alice
|\\
| * e4f5a6b||Add parser | with pipe|3 hours ago|Bob
|/
* 0a1b2c3||Initial commit|5 hours ago|Alice
";

    #[test]
    fn parses_graph_output() {
        let commits = parse_log(SAMPLE);
        assert_eq!(commits.len(), 3);

        assert_eq!(commits[0].short_hash(), "a1b2c3d");
        assert_eq!(commits[0].branch_label(), "(HEAD -> main, origin/main)");
        assert!(commits[0].is_merge());
        assert_eq!(commits[0].graph_glyph(), "*");

        assert_eq!(commits[1].short_hash(), "e4f5a6b");
        assert_eq!(commits[1].subject(), "Add parser | with pipe");
        assert_eq!(commits[1].author(), "Bob");
        assert_eq!(commits[1].relative_time(), "3 hours ago");
        assert_eq!(commits[1].graph_glyph(), "|");
        assert!(!commits[1].has_branch());
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let commits = parse_log("* deadbee|only two\n* 0a1b2c3||Fix|now|Ann\n");
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].subject(), "Fix");
    }

    #[test]
    fn empty_output_yields_nothing() {
        assert!(parse_log("").is_empty());
        assert!(parse_log("\n\n*\n").is_empty());
    }
}
