//! Shared utilities for CLI commands.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use tb_core::{EventId, EventLog, MeterCatalog, MeterId};

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s+(minute|hour|day|week)s?\s+ago$").expect("relative time regex is valid")
});

/// Conservative bounds for relative time parsing (~1000 years in minutes).
const MAX_RELATIVE_MINUTES: i64 = 1000 * 365 * 24 * 60;

/// Parse a datetime string as either RFC 3339 or relative to `now`.
///
/// Supports:
/// - RFC 3339: "2025-04-02T08:30:00Z"
/// - Relative: "2 hours ago", "30 minutes ago", "1 day ago", "1 week ago"
pub fn parse_datetime(s: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let Some(caps) = RELATIVE_TIME_RE.captures(s.trim()) else {
        anyhow::bail!(
            "Invalid datetime: {s}. Use RFC 3339 (e.g., 2025-04-02T08:30:00Z) or relative (e.g., '2 hours ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let (max_for_unit, minutes_per_unit) = match &caps[2] {
        "minute" => (MAX_RELATIVE_MINUTES, 1),
        "hour" => (MAX_RELATIVE_MINUTES / 60, 60),
        "day" => (MAX_RELATIVE_MINUTES / (60 * 24), 60 * 24),
        "week" => (MAX_RELATIVE_MINUTES / (60 * 24 * 7), 60 * 24 * 7),
        unit => anyhow::bail!("Unknown time unit: {unit}"),
    };

    if n > max_for_unit {
        anyhow::bail!("Relative time value too large: {n} {}", &caps[2]);
    }

    Ok(now - Duration::minutes(n * minutes_per_unit))
}

/// Looks a meter up by id, 1-based position or name, in that order.
pub fn resolve_meter(catalog: &MeterCatalog, key: &str) -> Result<MeterId> {
    let key = key.trim();
    if let Ok(id) = key.parse::<MeterId>() {
        if catalog.contains(id) {
            return Ok(id);
        }
    }
    if let Ok(position) = key.parse::<usize>() {
        if let Some(meter) = position.checked_sub(1).and_then(|p| catalog.at_position(p)) {
            return Ok(meter.id);
        }
    }
    catalog
        .find_by_name(key)
        .map(|meter| meter.id)
        .with_context(|| format!("no meter matches {key:?}"))
}

/// Looks an event up by id or by its 1-based index in the log.
pub fn resolve_event(log: &EventLog, key: &str) -> Result<EventId> {
    let key = key.trim();
    if let Ok(id) = key.parse::<EventId>() {
        return Ok(id);
    }
    key.parse::<usize>()
        .ok()
        .and_then(|index| index.checked_sub(1))
        .and_then(|index| log.events().get(index))
        .map(|event| event.id)
        .with_context(|| format!("no event matches {key:?}"))
}

/// Formats a signed duration as hours and minutes, e.g. `-1h 05m` or `45m`.
pub fn format_duration(duration: Duration) -> String {
    let sign = if duration < Duration::zero() { "-" } else { "" };
    let total_minutes = duration.num_minutes().abs();
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours >= 1 {
        format!("{sign}{hours}h {minutes:02}m")
    } else {
        format!("{sign}{minutes}m")
    }
}

/// Formats an instant for listings.
pub fn format_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}
