use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDate};
use std::time::{SystemTime, UNIX_EPOCH};

/// Jira renders timestamps like `2025-01-05T10:15:00.000+0100`.
const TRACKER_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

pub fn now_epoch_secs() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

/// Hard cut at `max_chars` Unicode characters, no marker appended.
pub fn truncate_chars(input: &str, max_chars: usize) -> String {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => input[..idx].to_string(),
        None => input.to_string(),
    }
}

/// Strip control characters and clamp to at most `max_chars` characters,
/// ending in `…` when something was cut.
pub fn clamp_with_ellipsis(input: &str, max_chars: usize) -> String {
    let clean: String = input.chars().filter(|c| !c.is_control()).collect();
    let clean = clean.trim();
    if clean.chars().count() <= max_chars {
        return clean.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    let mut out = truncate_chars(clean, max_chars - 1);
    out.push('…');
    out
}

/// Calendar date (in the timestamp's own offset) of a tracker timestamp.
pub fn parse_created_date(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_str(trimmed, TRACKER_TIMESTAMP_FORMAT) {
        return Ok(parsed.date_naive());
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.date_naive());
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|err| anyhow!("unrecognised created timestamp `{trimmed}`: {err}"))
}
