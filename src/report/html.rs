//! Self-contained HTML report.

use chrono::{DateTime, Local};

use super::text::stats_line;
use super::{group_by_author, merge_count};
use crate::git::{ChangeStats, Commit};

const STYLES: &str = "\
body{font-family:-apple-system,Segoe UI,Helvetica,Arial,sans-serif;max-width:960px;margin:2em auto;color:#24292f;line-height:1.5}\
h1{border-bottom:2px solid #d0d7de;padding-bottom:.3em}\
h2{margin-top:1.6em;color:#0969da}\
.meta{color:#57606a}\
.summary{background:#f6f8fa;border-left:4px solid #0969da;padding:.5em 1.2em}\
.commit{font-family:ui-monospace,Menlo,monospace;font-size:.9em}\
.hash{color:#8250df}.branch{color:#1a7f37}.time{color:#57606a}\
table{border-collapse:collapse;width:100%}\
td,th{border:1px solid #d0d7de;padding:.3em .6em;text-align:left}\
.add{color:#1a7f37}.del{color:#cf222e}";

/// Escapes text for use in HTML element content and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn inline(text: &str) -> String {
    let escaped = escape(text);
    let mut out = String::with_capacity(escaped.len());
    for (i, part) in escaped.split("**").enumerate() {
        if i % 2 == 1 {
            out.push_str(&format!("<strong>{part}</strong>"));
        } else {
            out.push_str(part);
        }
    }
    out
}

/// Converts the markdown subset AI output uses (headings, bullet lists,
/// bold, fenced code and paragraphs) to HTML. All text is escaped.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut out = String::new();
    let mut paragraph: Vec<&str> = Vec::new();
    let mut in_list = false;
    let mut in_code = false;

    let flush = |out: &mut String, paragraph: &mut Vec<&str>| {
        if !paragraph.is_empty() {
            let lines: Vec<String> = paragraph.iter().map(|l| inline(l)).collect();
            out.push_str(&format!("<p>{}</p>\n", lines.join("<br>\n")));
            paragraph.clear();
        }
    };

    for line in markdown.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            flush(&mut out, &mut paragraph);
            if in_list {
                out.push_str("</ul>\n");
                in_list = false;
            }
            out.push_str(if in_code { "</code></pre>\n" } else { "<pre><code>" });
            in_code = !in_code;
            continue;
        }
        if in_code {
            out.push_str(&format!("{}\n", escape(line)));
            continue;
        }

        let item = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "));
        if item.is_none() && in_list {
            out.push_str("</ul>\n");
            in_list = false;
        }

        if trimmed.is_empty() {
            flush(&mut out, &mut paragraph);
        } else if let Some(item) = item {
            flush(&mut out, &mut paragraph);
            if !in_list {
                out.push_str("<ul>\n");
                in_list = true;
            }
            out.push_str(&format!("<li>{}</li>\n", inline(item)));
        } else if trimmed.starts_with('#') {
            flush(&mut out, &mut paragraph);
            let level = trimmed.chars().take_while(|c| *c == '#').count().min(6);
            let title = trimmed[level..].trim();
            out.push_str(&format!("<h{level}>{}</h{level}>\n", inline(title)));
        } else {
            paragraph.push(trimmed);
        }
    }
    flush(&mut out, &mut paragraph);
    if in_list {
        out.push_str("</ul>\n");
    }
    if in_code {
        out.push_str("</code></pre>\n");
    }
    out
}

/// Inputs of the HTML report.
#[derive(Debug, Clone, Copy)]
pub struct HtmlReport<'a> {
    /// Project name shown in the title.
    pub project: &'a str,
    /// Human label of the commit range.
    pub range_label: &'a str,
    /// AI summary in markdown, if one was produced.
    pub summary: Option<&'a str>,
    /// Commits in range.
    pub commits: &'a [Commit],
    /// Aggregate statistics.
    pub stats: &'a ChangeStats,
    /// Generation time.
    pub generated_at: DateTime<Local>,
}

/// Renders the complete HTML document.
pub fn render_html_report(report: &HtmlReport<'_>) -> String {
    let mut out = String::new();
    let title = format!(
        "{} development report - {}",
        report.project,
        report.generated_at.format("%Y-%m-%d")
    );
    let merges = merge_count(report.commits);
    let groups = group_by_author(report.commits);

    out.push_str(&format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>{STYLES}</style>\n</head>\n<body>\n",
        escape(&title)
    ));
    out.push_str(&format!("<h1>{}</h1>\n", escape(&title)));
    out.push_str(&format!(
        "<p class=\"meta\">Generated {} &middot; {} &middot; {} commits ({} merges) &middot; {} authors &middot; {}</p>\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S"),
        escape(report.range_label),
        report.commits.len() - merges,
        merges,
        groups.len(),
        escape(&stats_line(report.stats)),
    ));

    if let Some(summary) = report.summary {
        out.push_str("<h2>AI summary</h2>\n<div class=\"summary\">\n");
        out.push_str(&markdown_to_html(summary));
        out.push_str("</div>\n");
    }

    out.push_str("<h2>Commits</h2>\n");
    if groups.is_empty() {
        out.push_str("<p>No commits found in range.</p>\n");
    }
    for group in &groups {
        out.push_str(&format!(
            "<h3>{} ({} commits)</h3>\n<ul>\n",
            escape(group.author),
            group.commits.len()
        ));
        for commit in &group.commits {
            let branch = if commit.has_branch() {
                format!(" <span class=\"branch\">{}</span>", escape(commit.branch_label()))
            } else {
                String::new()
            };
            out.push_str(&format!(
                "<li class=\"commit\"><span class=\"hash\">{}</span>{branch} {} <span class=\"time\">({})</span></li>\n",
                escape(commit.short_hash()),
                escape(commit.subject()),
                escape(commit.relative_time()),
            ));
        }
        out.push_str("</ul>\n");
    }

    if !report.stats.file_stats.is_empty() {
        out.push_str("<h2>File changes</h2>\n<table>\n<tr><th>Added</th><th>Deleted</th><th>File</th></tr>\n");
        for file in &report.stats.file_stats {
            out.push_str(&format!(
                "<tr><td class=\"add\">+{}</td><td class=\"del\">-{}</td><td>{}</td></tr>\n",
                file.additions,
                file.deletions,
                escape(&file.path)
            ));
        }
        out.push_str("</table>\n");
    }

    out.push_str("</body>\n</html>\n");
    out
}

/// Wraps a markdown article in a printable HTML document.
pub fn article_document(title: &str, markdown: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>{STYLES}</style>\n</head>\n<body>\n<div class=\"markdown-body\">\n{}</div>\n</body>\n</html>\n",
        escape(title),
        markdown_to_html(markdown)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn escape_covers_markup() {
        assert_eq!(
            escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn markdown_subset() {
        let html = markdown_to_html("# Today\n\n- **Parser** done\n- tests <green>\n\nShip it.\nTomorrow.\n");
        insta::assert_snapshot!(html, @r"
        <h1>Today</h1>
        <ul>
        <li><strong>Parser</strong> done</li>
        <li>tests &lt;green&gt;</li>
        </ul>
        <p>Ship it.<br>
        Tomorrow.</p>
        ");
    }

    #[test]
    fn report_escapes_and_omits_missing_summary() {
        let commits = vec![
            Commit::new("a1", "Guard <script> input", "1 hour ago", "alice"),
            Commit::new("m2", "Merge branch 'x'", "2 hours ago", "alice"),
        ];
        let stats = ChangeStats::default();
        let at = Local.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let report = HtmlReport {
            project: "widgets",
            range_label: "since 1 day ago",
            summary: None,
            commits: &commits,
            stats: &stats,
            generated_at: at,
        };
        let html = render_html_report(&report);
        assert!(html.contains("Guard &lt;script&gt; input"));
        assert!(!html.contains("Merge branch"));
        assert!(!html.contains("AI summary"));
        assert!(html.trim_end().ends_with("</body>\n</html>"));

        let with_summary = render_html_report(&HtmlReport {
            summary: Some("**done**"),
            ..report
        });
        assert!(with_summary.contains("<strong>done</strong>"));
    }
}
