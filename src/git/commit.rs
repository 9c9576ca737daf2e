//! Commit model

use serde::{Deserialize, Serialize};

/// A single commit as reported by a data source.
///
/// Commits are assembled once from a data source response and never mutated
/// afterwards; all fields are exposed through accessors only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    short_hash: String,
    branch_label: String,
    subject: String,
    relative_time: String,
    author: String,
    graph_glyph: String,
}

impl Commit {
    /// Creates a commit without branch decoration, drawn with the default `*` glyph.
    pub fn new(
        short_hash: impl Into<String>,
        subject: impl Into<String>,
        relative_time: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            short_hash: short_hash.into(),
            branch_label: String::new(),
            subject: subject.into(),
            relative_time: relative_time.into(),
            author: author.into(),
            graph_glyph: "*".to_string(),
        }
    }

    /// Returns the commit with the given branch/ref decoration.
    #[must_use]
    pub fn with_branch_label(mut self, label: impl Into<String>) -> Self {
        self.branch_label = label.into();
        self
    }

    /// Returns the commit with the given graph glyph.
    #[must_use]
    pub fn with_graph_glyph(mut self, glyph: impl Into<String>) -> Self {
        self.graph_glyph = glyph.into();
        self
    }

    /// Abbreviated commit hash.
    pub fn short_hash(&self) -> &str {
        &self.short_hash
    }

    /// Ref decoration such as `(HEAD -> main, origin/main)`, possibly empty.
    pub fn branch_label(&self) -> &str {
        &self.branch_label
    }

    /// First line of the commit message.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Human relative commit time ("2 hours ago") or a timestamp.
    pub fn relative_time(&self) -> &str {
        &self.relative_time
    }

    /// Author display name.
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Leading glyph of the `--graph` rendering.
    pub fn graph_glyph(&self) -> &str {
        &self.graph_glyph
    }

    /// Whether the commit carries a ref decoration.
    pub fn has_branch(&self) -> bool {
        !self.branch_label.trim().is_empty()
    }

    /// Whether the subject case-insensitively starts with "merge".
    pub fn is_merge(&self) -> bool {
        self.subject
            .get(..5)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("merge"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_detection_is_case_insensitive() {
        for subject in ["Merge branch 'dev'", "merge pull request #4", "MERGE fixes"] {
            assert!(Commit::new("abc1234", subject, "1 hour ago", "Ann").is_merge());
        }
    }

    #[test]
    fn merge_must_be_a_prefix() {
        assert!(!Commit::new("abc1234", "Fix merge conflict handling", "now", "Ann").is_merge());
        assert!(!Commit::new("abc1234", "merg", "now", "Ann").is_merge());
        assert!(!Commit::new("abc1234", "", "now", "Ann").is_merge());
    }

    #[test]
    fn branch_label_whitespace_is_not_a_branch() {
        let commit = Commit::new("abc1234", "Add feature", "now", "Ann").with_branch_label("  ");
        assert!(!commit.has_branch());
        let commit = commit.with_branch_label("(HEAD -> main)");
        assert!(commit.has_branch());
    }

    #[test]
    fn multibyte_subject_does_not_panic() {
        let commit = Commit::new("abc1234", "修复合并问题", "now", "Ann");
        assert!(!commit.is_merge());
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn is_merge_matches_lowercase_prefix(subject in "\\PC{0,40}") {
                let commit = Commit::new("abc1234", subject.clone(), "now", "Ann");
                let expected = subject.to_ascii_lowercase().starts_with("merge");
                prop_assert_eq!(commit.is_merge(), expected);
            }

            #[test]
            fn merge_prefix_any_case(
                mask in proptest::collection::vec(any::<bool>(), 5),
                rest in "[a-z ]{0,20}",
            ) {
                let prefix: String = "merge"
                    .chars()
                    .zip(mask)
                    .map(|(c, upper)| if upper { c.to_ascii_uppercase() } else { c })
                    .collect();
                let commit = Commit::new("abc1234", format!("{prefix}{rest}"), "now", "Ann");
                prop_assert!(commit.is_merge());
            }
        }
    }
}
