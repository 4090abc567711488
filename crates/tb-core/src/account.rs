//! The account aggregate and its serialized forms.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::event::MeterEvent;
use crate::log::EventLog;
use crate::meter::{Meter, MeterCatalog};
use crate::types::{AccountKind, default_timeline_period};

/// Aggregate root: the unit of persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeAccount {
    pub events: EventLog,
    pub meters: MeterCatalog,
    pub timeline_period: Duration,
}

impl TimeAccount {
    pub fn new(kind: AccountKind) -> Self {
        Self {
            events: EventLog::new(),
            meters: MeterCatalog::new(kind),
            timeline_period: default_timeline_period(),
        }
    }

    pub(crate) fn to_snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            events: self.events.events().to_vec(),
            meters: self.meters.meters().to_vec(),
            timeline_period: self.timeline_period,
        }
    }
}

/// Persisted JSON form of a [`TimeAccount`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AccountSnapshot {
    #[serde(alias = "Events", default)]
    pub events: Vec<MeterEvent>,

    #[serde(alias = "Meters", default)]
    pub meters: Vec<Meter>,

    /// Zero means "never set".
    #[serde(alias = "TimelinePeriod", default = "Duration::zero", with = "period")]
    pub timeline_period: Duration,
}

/// Export/import envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    #[serde(alias = "ExportedAt", default = "Utc::now")]
    pub exported_at: DateTime<Utc>,

    #[serde(alias = "Language", default)]
    pub language: String,

    #[serde(alias = "TutorialCompleted", default)]
    pub tutorial_completed: bool,

    #[serde(alias = "Meters", alias = "activities", alias = "Activities", default)]
    pub meters: Vec<Meter>,

    #[serde(alias = "Events", default)]
    pub events: Vec<MeterEvent>,
}

/// Failure to parse a `[-][d.]hh:mm:ss[.fffffff]` period string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid period {0:?}, expected [d.]hh:mm:ss")]
pub struct PeriodParseError(String);

/// Formats a duration as `[-][d.]hh:mm:ss`, dropping sub-second precision.
pub fn format_period(period: Duration) -> String {
    let sign = if period < Duration::zero() { "-" } else { "" };
    let total = period.num_seconds().unsigned_abs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    if days > 0 {
        format!("{sign}{days}.{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{sign}{hours:02}:{minutes:02}:{seconds:02}")
    }
}

/// Parses a `[-][d.]hh:mm:ss[.fffffff]` period string.
pub fn parse_period(input: &str) -> Result<Duration, PeriodParseError> {
    let err = || PeriodParseError(input.to_string());
    let trimmed = input.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let mut parts = body.split(':');
    let (Some(head), Some(minutes), Some(tail), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(err());
    };

    let (days, hours) = match head.split_once('.') {
        Some((days, hours)) => (days, hours),
        None => ("0", head),
    };
    let (seconds, fraction) = match tail.split_once('.') {
        Some((seconds, fraction)) => (seconds, Some(fraction)),
        None => (tail, None),
    };

    let number = |s: &str| s.parse::<i64>().map_err(|_| err());
    let (days, hours, minutes, seconds) =
        (number(days)?, number(hours)?, number(minutes)?, number(seconds)?);
    let in_range = days >= 0
        && (0..24).contains(&hours)
        && (0..60).contains(&minutes)
        && (0..60).contains(&seconds);
    if !in_range {
        return Err(err());
    }

    let mut total = Duration::try_days(days)
        .zip(Duration::try_hours(hours))
        .and_then(|(d, h)| d.checked_add(&h))
        .zip(Duration::try_minutes(minutes))
        .and_then(|(t, m)| t.checked_add(&m))
        .zip(Duration::try_seconds(seconds))
        .and_then(|(t, s)| t.checked_add(&s))
        .ok_or_else(err)?;
    if let Some(fraction) = fraction {
        if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let digits: String = fraction.chars().chain("000000000".chars()).take(9).collect();
        total = total
            .checked_add(&Duration::nanoseconds(number(&digits)?))
            .ok_or_else(err)?;
    }
    Ok(if negative { -total } else { total })
}

pub(crate) mod period {
    use super::{Deserialize, Deserializer, Duration, Serializer, format_period, parse_period};

    pub fn serialize<S>(period: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_period(*period))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_period(&raw).map_err(serde::de::Error::custom)
    }
}
