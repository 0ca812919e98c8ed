use chrono::Duration;
use duration_string::DurationString;
use log::warn;
use regex::Regex;

/// A compiled set of patterns to match tag names against, either a
/// comma-separated wildcard list or a single regular expression -
/// selected by `useRegex` at the configuration boundary.
#[derive(Debug, Clone)]
pub enum PatternSet {
    Wildcards(Vec<Regex>),
    Regex(Regex),
}

impl PatternSet {
    pub fn matches(&self, value: &str) -> bool {
        match self {
            PatternSet::Wildcards(patterns) => patterns.iter().any(|p| p.is_match(value)),
            PatternSet::Regex(pattern) => pattern.is_match(value),
        }
    }
}

/// Parse a `deleteTags`/`excludeTags`-style configuration value. Returns
/// `None` for an empty value (policy disabled) or when every pattern
/// fails to compile.
pub fn parse_pattern_set(raw: &str, use_regex: bool) -> Option<PatternSet> {
    if raw.trim().is_empty() {
        return None;
    }

    if use_regex {
        return match Regex::new(raw) {
            Ok(pattern) => Some(PatternSet::Regex(pattern)),
            Err(err) => {
                warn!("Received invalid tag pattern regex '{raw}'. Reason: {err}");
                None
            }
        };
    }

    let patterns: Vec<Regex> = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(wildcard_to_regex)
        .collect();

    if patterns.is_empty() {
        None
    } else {
        Some(PatternSet::Wildcards(patterns))
    }
}

fn wildcard_to_regex(pattern: &str) -> Option<Regex> {
    let escaped = regex::escape(pattern)
        .replace("\\*", ".*")
        .replace("\\?", ".");
    match Regex::new(&format!("^{escaped}$")) {
        Ok(regex) => Some(regex),
        Err(err) => {
            warn!("Received invalid wildcard pattern '{pattern}'. Reason: {err}");
            None
        }
    }
}

/// Parse a human-interval `olderThan` string (e.g. `"1 second"`,
/// `"30 years"`) into a [`chrono::Duration`]. Normalises the spaced,
/// full-word unit grammar this configuration surface uses down to the
/// compact `[0-9]+(ns|us|ms|[smhdwy])` grammar `duration-string` expects,
/// then delegates to it.
pub fn parse_older_than(raw: &str) -> Option<Duration> {
    let normalized = normalize_interval(raw)?;
    match DurationString::from_string(normalized) {
        Ok(duration) => Duration::from_std(duration.into()).ok(),
        Err(_) => {
            warn!("Received invalid 'olderThan' duration '{raw}'");
            None
        }
    }
}

fn normalize_interval(raw: &str) -> Option<String> {
    let pattern = Regex::new(r"^\s*([0-9]+)\s*([A-Za-z]+)\s*$").expect("interval regex should compile");
    let captures = pattern.captures(raw.trim())?;
    let amount = &captures[1];
    let unit = captures[2].to_lowercase();

    let short_unit = match unit.as_str() {
        "ns" | "nanosecond" | "nanoseconds" => "ns",
        "us" | "microsecond" | "microseconds" => "us",
        "ms" | "millisecond" | "milliseconds" => "ms",
        "s" | "sec" | "secs" | "second" | "seconds" => "s",
        "m" | "min" | "mins" | "minute" | "minutes" => "m",
        "h" | "hr" | "hrs" | "hour" | "hours" => "h",
        "d" | "day" | "days" => "d",
        "w" | "week" | "weeks" => "w",
        "y" | "year" | "years" => "y",
        _ => {
            warn!("Received unknown interval unit '{unit}' in 'olderThan' duration '{raw}'");
            return None;
        }
    };

    Some(format!("{amount}{short_unit}"))
}
