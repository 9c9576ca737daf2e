//! Relative-time phrases used by hosted API sources.

use std::sync::OnceLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use tracing::warn;

/// Window (in hours) used when a phrase cannot be interpreted.
pub const DEFAULT_WINDOW_HOURS: i64 = 24;

#[allow(clippy::unwrap_used)] // static pattern
fn since_pattern() -> &'static Regex {
    static SINCE: OnceLock<Regex> = OnceLock::new();
    SINCE.get_or_init(|| {
        Regex::new(r"(?i)(\d+)\s+(hour|day|week|month|year)s?\s+ago").unwrap()
    })
}

/// Converts `"N unit(s) ago"` into an absolute lower bound.
///
/// Months count as 30 days and years as 365. Anything that does not match
/// falls back to one day before `now`.
pub fn parse_since(phrase: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let Some(caps) = since_pattern().captures(phrase) else {
        warn!(phrase = %phrase, "Unrecognised time range, defaulting to 1 day");
        return now - Duration::hours(DEFAULT_WINDOW_HOURS);
    };

    let Ok(amount) = caps[1].parse::<i64>() else {
        warn!(phrase = %phrase, "Time range amount out of bounds, defaulting to 1 day");
        return now - Duration::hours(DEFAULT_WINDOW_HOURS);
    };

    let window = match caps[2].to_ascii_lowercase().as_str() {
        "hour" => Duration::try_hours(amount),
        "day" => Duration::try_days(amount),
        "week" => Duration::try_weeks(amount),
        "month" => amount.checked_mul(30).and_then(Duration::try_days),
        _ => amount.checked_mul(365).and_then(Duration::try_days),
    };

    window
        .and_then(|w| now.checked_sub_signed(w))
        .unwrap_or_else(|| {
            warn!(phrase = %phrase, "Time range out of bounds, defaulting to 1 day");
            now - Duration::hours(DEFAULT_WINDOW_HOURS)
        })
}

/// Formats `then` the way `git log --format=%cr` does.
pub fn relative_label(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds().max(0);
    let (amount, unit) = match secs {
        s if s < 60 => (s, "second"),
        s if s < 3_600 => (s / 60, "minute"),
        s if s < 86_400 => (s / 3_600, "hour"),
        s if s < 14 * 86_400 => (s / 86_400, "day"),
        s if s < 60 * 86_400 => (s / (7 * 86_400), "week"),
        s if s < 365 * 86_400 => (s / (30 * 86_400), "month"),
        s => (s / (365 * 86_400), "year"),
    };
    let plural = if amount == 1 { "" } else { "s" };
    format!("{amount} {unit}{plural} ago")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn within_a_second(actual: DateTime<Utc>, expected: DateTime<Utc>) -> bool {
        (actual - expected).num_milliseconds().abs() <= 1_000
    }

    #[test]
    fn three_days_ago() {
        let now = Utc::now();
        let since = parse_since("3 days ago", now);
        assert!(within_a_second(since, Utc::now() - Duration::hours(72)));
    }

    #[test]
    fn unparseable_defaults_to_one_day() {
        let now = Utc::now();
        for phrase in ["yesterday-ish", "", "ago 3 days", "5 fortnights ago"] {
            let since = parse_since(phrase, now);
            assert!(within_a_second(since, now - Duration::hours(24)), "{phrase}");
        }
    }

    #[test]
    fn units_and_plurals() {
        let now = Utc::now();
        assert_eq!(parse_since("1 hour ago", now), now - Duration::hours(1));
        assert_eq!(parse_since("2 Weeks ago", now), now - Duration::days(14));
        assert_eq!(parse_since("1 month ago", now), now - Duration::days(30));
        assert_eq!(parse_since("2 years ago", now), now - Duration::days(730));
    }

    #[test]
    fn absurd_amounts_fall_back() {
        let now = Utc::now();
        let since = parse_since("99999999999999999999 days ago", now);
        assert_eq!(since, now - Duration::hours(DEFAULT_WINDOW_HOURS));
    }

    #[test]
    fn relative_labels() {
        let now = Utc::now();
        assert_eq!(relative_label(now - Duration::minutes(1), now), "1 minute ago");
        assert_eq!(relative_label(now - Duration::hours(5), now), "5 hours ago");
        assert_eq!(relative_label(now - Duration::days(20), now), "2 weeks ago");
        insta::assert_snapshot!(relative_label(now - Duration::days(800), now), @"2 years ago");
    }
}
