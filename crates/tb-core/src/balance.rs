//! Balance and timeline computation.
//!
//! Everything here is a pure function of the event slice and a sampled `now`;
//! nothing is cached between calls.
//!
//! # Timeline algorithm
//!
//! 1. Sum the contribution of every event that started before the window,
//!    clipped to end at the window start.
//! 2. Emit a point at the window start.
//! 3. Walk the events overlapping the window in ascending start order. Emit a
//!    point at the event start (balance before its contribution) if the start
//!    lies inside the window, add the contribution clipped to
//!    `[window_start, now]`, and emit a point at the event end if it has one.
//! 4. Emit a final point at `now`.
//! 5. Sort points by timestamp.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::event::{MeterEvent, hours, scale};

/// One sample of the balance for charting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineDataPoint {
    pub timestamp: DateTime<Utc>,
    pub balance_hours: f64,
}

/// Sum of every event's signed contribution, with `now` closing open events.
pub fn current_balance(events: &[MeterEvent], now: DateTime<Utc>) -> Duration {
    events
        .iter()
        .fold(Duration::zero(), |total, event| total + event.contribution(now))
}

/// Balance samples covering `[now - period, now]`.
///
/// A window reaching past the earliest representable instant starts there.
/// The last point always equals [`current_balance`] for events started by
/// `now`.
pub fn timeline(
    events: &[MeterEvent],
    period: Duration,
    now: DateTime<Utc>,
) -> Vec<TimelineDataPoint> {
    let window_start = now
        .checked_sub_signed(period)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let mut running = events
        .iter()
        .filter(|e| e.start_time < window_start)
        .fold(Duration::zero(), |total, e| {
            total + before_window(e, window_start)
        });

    let mut overlapping: Vec<&MeterEvent> = events
        .iter()
        .filter(|e| e.start_time <= now && e.end_time.unwrap_or(now) >= window_start)
        .collect();
    overlapping.sort_by_key(|e| e.start_time);

    let mut points = Vec::with_capacity(overlapping.len() * 2 + 2);
    points.push(point(window_start, running));

    for event in overlapping {
        let counted = if event.start_time < window_start {
            before_window(event, window_start)
        } else {
            points.push(point(event.start_time, running));
            Duration::zero()
        };
        running += event.contribution(now) - counted;

        if let Some(end) = event.end_time.filter(|end| *end <= now) {
            points.push(point(end, running));
        }
    }

    points.push(point(now, running));

    points.sort_by_key(|p| p.timestamp);
    points
}

/// Contribution of the part of `event` before `window_start`.
fn before_window(event: &MeterEvent, window_start: DateTime<Utc>) -> Duration {
    let end = event.end_time.unwrap_or(window_start).min(window_start);
    scale(end - event.start_time, event.factor)
}

fn point(timestamp: DateTime<Utc>, balance: Duration) -> TimelineDataPoint {
    TimelineDataPoint {
        timestamp,
        balance_hours: hours(balance),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::meter::Meter;
    use crate::types::MeterId;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 2, hour, minute, 0).unwrap()
    }

    fn closed(factor: f64, start: DateTime<Utc>, end: DateTime<Utc>) -> MeterEvent {
        let mut event = open(factor, start);
        event.end_time = Some(end);
        event
    }

    fn open(factor: f64, start: DateTime<Utc>) -> MeterEvent {
        let meter = Meter {
            id: MeterId::new(),
            name: format!("{factor:+}x"),
            factor,
            display_order: 0,
        };
        MeterEvent::start(&meter, None, start)
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn work_then_break_nets_one_hour() {
        let events = vec![
            closed(1.0, at(8, 0), at(10, 0)),
            closed(-1.0, at(10, 0), at(11, 0)),
        ];
        assert_eq!(current_balance(&events, at(12, 0)), Duration::hours(1));
    }

    #[test]
    fn open_event_counts_until_now() {
        let events = vec![open(2.0, at(9, 0))];
        assert_eq!(current_balance(&events, at(9, 30)), Duration::hours(1));
        assert_eq!(current_balance(&events, at(9, 30)), Duration::hours(1));
    }

    #[test]
    fn empty_log_has_flat_timeline() {
        let points = timeline(&[], Duration::hours(24), at(12, 0));
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].timestamp, at(12, 0) - Duration::hours(24));
        assert_eq!(points[1].timestamp, at(12, 0));
        assert_close(points[1].balance_hours, 0.0);
    }

    #[test]
    fn timeline_marks_event_boundaries() {
        let events = vec![
            closed(1.0, at(8, 0), at(10, 0)),
            closed(-1.0, at(10, 0), at(11, 0)),
        ];
        let points = timeline(&events, Duration::hours(6), at(12, 0));

        let stamps: Vec<_> = points.iter().map(|p| p.timestamp).collect();
        assert_eq!(
            stamps,
            vec![at(6, 0), at(8, 0), at(10, 0), at(10, 0), at(11, 0), at(12, 0)]
        );
        let balances: Vec<_> = points.iter().map(|p| p.balance_hours).collect();
        assert_close(balances[0], 0.0);
        assert_close(balances[1], 0.0);
        assert_close(balances[2], 2.0);
        assert_close(balances[3], 2.0);
        assert_close(balances[4], 1.0);
        assert_close(balances[5], 1.0);
    }

    #[test]
    fn event_straddling_window_start_is_split() {
        let events = vec![closed(1.0, at(4, 0), at(8, 0))];
        let points = timeline(&events, Duration::hours(6), at(12, 0));

        assert_eq!(points[0].timestamp, at(6, 0));
        assert_close(points[0].balance_hours, 2.0);
        assert_eq!(points[1].timestamp, at(8, 0));
        assert_close(points[1].balance_hours, 4.0);
        assert_close(points.last().unwrap().balance_hours, 4.0);
    }

    #[test]
    fn open_event_before_window_counts_in_both_parts() {
        let events = vec![open(-0.5, at(2, 0))];
        let now = at(12, 0);
        let points = timeline(&events, Duration::hours(4), now);

        assert_eq!(points.len(), 2);
        assert_close(points[0].balance_hours, -3.0);
        assert_close(points[1].balance_hours, -5.0);
    }

    #[test]
    fn timeline_ends_at_current_balance() {
        let events = vec![
            closed(1.5, at(1, 0), at(3, 15)),
            closed(-2.0, at(5, 0), at(5, 45)),
            closed(1.0, at(9, 10), at(10, 0)),
            open(0.5, at(10, 30)),
        ];
        let now = at(11, 47);
        for period in [Duration::hours(1), Duration::hours(6), Duration::days(7)] {
            let points = timeline(&events, period, now);
            assert_eq!(points.first().unwrap().timestamp, now - period);
            assert_eq!(points.last().unwrap().timestamp, now);
            assert!(points.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
            assert_close(
                points.last().unwrap().balance_hours,
                hours(current_balance(&events, now)),
            );
        }
    }

    #[test]
    fn timeline_end_matches_balance_exactly() {
        let start = at(7, 0) + Duration::milliseconds(1);
        let events = vec![
            closed(1.3, start, at(8, 0) + Duration::milliseconds(7)),
            closed(-0.7, at(8, 0) + Duration::milliseconds(7), at(9, 33) + Duration::seconds(7)),
            open(0.3, at(9, 33) + Duration::seconds(7)),
        ];
        let now = at(11, 0) + Duration::milliseconds(3);
        for period in [Duration::minutes(30), Duration::minutes(150), Duration::hours(5)] {
            let points = timeline(&events, period, now);
            let last = points.last().unwrap().balance_hours;
            assert_eq!(last.to_bits(), hours(current_balance(&events, now)).to_bits());
        }
    }

    #[test]
    fn window_beyond_representable_range_starts_at_min() {
        let events = vec![closed(1.0, at(8, 0), at(10, 0))];
        let points = timeline(&events, Duration::days(100_000_000), at(12, 0));

        assert_eq!(points[0].timestamp, DateTime::<Utc>::MIN_UTC);
        assert_close(points[0].balance_hours, 0.0);
        assert_close(points.last().unwrap().balance_hours, 2.0);
    }
}
