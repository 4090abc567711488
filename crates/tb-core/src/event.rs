//! Activation intervals.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::meter::Meter;
use crate::types::{EventId, FACTOR_EPSILON, MeterId};

/// One open-or-closed interval during which a meter was active.
///
/// Name and factor are copied from the meter when the event starts; renaming
/// the meter later leaves history untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterEvent {
    #[serde(alias = "Id", default)]
    pub id: EventId,

    #[serde(alias = "StartTime")]
    pub start_time: DateTime<Utc>,

    /// `None` while the event is running.
    #[serde(alias = "EndTime", default)]
    pub end_time: Option<DateTime<Utc>>,

    /// Factor snapshot.
    #[serde(alias = "Factor")]
    pub factor: f64,

    /// Meter name snapshot.
    #[serde(
        alias = "MeterName",
        alias = "activityName",
        alias = "ActivityName",
        default
    )]
    pub meter_name: String,

    #[serde(
        alias = "Comment",
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub comment: Option<String>,

    /// The meter this event was started from. Absent in legacy data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meter_id: Option<MeterId>,
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

impl MeterEvent {
    /// Starts a new event for `meter` at `now`.
    pub fn start(meter: &Meter, comment: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: EventId::new(),
            start_time: now,
            end_time: None,
            factor: meter.factor,
            meter_name: meter.name.clone(),
            comment,
            meter_id: Some(meter.id),
        }
    }

    pub const fn is_active(&self) -> bool {
        self.end_time.is_none()
    }

    /// Time the event has been running, using `now` for open events.
    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        self.end_time.unwrap_or(now) - self.start_time
    }

    /// Signed contribution to the balance: `duration * factor`.
    pub fn contribution(&self, now: DateTime<Utc>) -> Duration {
        scale(self.duration(now), self.factor)
    }

    /// Whether this event was started from `meter`.
    ///
    /// Matches on the stored meter ID; events without one fall back to
    /// comparing the name and factor snapshots.
    pub fn originates_from(&self, meter: &Meter) -> bool {
        match self.meter_id {
            Some(id) => id == meter.id,
            None => {
                self.meter_name == meter.name && (self.factor - meter.factor).abs() < FACTOR_EPSILON
            }
        }
    }

    pub(crate) fn close(&mut self, at: DateTime<Utc>) {
        self.end_time = Some(at);
    }
}

/// Multiplies a duration by a float factor at millisecond precision.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub(crate) fn scale(duration: Duration, factor: f64) -> Duration {
    Duration::milliseconds((duration.num_milliseconds() as f64 * factor) as i64)
}

/// Converts a duration to fractional hours.
#[allow(clippy::cast_precision_loss)]
pub fn hours(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / 3_600_000.0
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn meter(name: &str, factor: f64) -> Meter {
        Meter {
            id: MeterId::new(),
            name: name.to_string(),
            factor,
            display_order: 0,
        }
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, hour, minute, 0).unwrap()
    }

    #[test]
    fn open_event_uses_now() {
        let event = MeterEvent::start(&meter("Work", 1.5), None, at(9, 0));
        assert!(event.is_active());
        assert_eq!(event.duration(at(11, 0)), Duration::hours(2));
        assert_eq!(event.contribution(at(11, 0)), Duration::hours(3));
    }

    #[test]
    fn closed_event_ignores_now() {
        let mut event = MeterEvent::start(&meter("Break", -1.0), None, at(9, 0));
        event.close(at(9, 30));
        assert!(!event.is_active());
        assert_eq!(event.contribution(at(23, 0)), Duration::minutes(-30));
    }

    #[test]
    fn originates_from_prefers_meter_id() {
        let work = meter("Work", 1.0);
        let twin = meter("Work", 1.0);
        let event = MeterEvent::start(&work, None, at(9, 0));
        assert!(event.originates_from(&work));
        assert!(!event.originates_from(&twin));
    }

    #[test]
    fn legacy_event_matches_by_name_and_factor() {
        let work = meter("Work", 1.0);
        let mut event = MeterEvent::start(&work, None, at(9, 0));
        event.meter_id = None;
        assert!(event.originates_from(&work));
        assert!(!event.originates_from(&meter("Work", 2.0)));
    }

    #[test]
    fn legacy_activity_event_parses() {
        let json = r#"{
            "Id": "0d4f2a52-2d0e-4c0c-b8f7-3a3f1c7d0e55",
            "StartTime": "2025-01-01T08:00:00.1234567+00:00",
            "EndTime": null,
            "Factor": 1.0,
            "ActivityName": "Reading",
            "Comment": "",
            "IsActive": true
        }"#;
        let event: MeterEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.meter_name, "Reading");
        assert!(event.is_active());
        assert_eq!(event.comment, None);
        assert_eq!(event.meter_id, None);
    }
}
