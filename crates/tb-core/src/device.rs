//! Mapping of tracking-device signals onto meter activation.
//!
//! A device reports which face points up. Face `n` selects the `n`-th meter
//! in display order; anything that maps to no meter stops tracking.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::controller::AccountController;
use crate::error::AccountError;
use crate::types::{AccountKind, EventId};

/// A discrete signal from a tracking device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceSignal {
    /// Orientation change. `None` when the face is unknown.
    Face(Option<u32>),
    Connected,
    Disconnected,
}

/// What applying a [`DeviceSignal`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceOutcome {
    /// The meter at this 1-based position was started.
    Activated { position: usize, event: EventId },
    /// The selected meter was already running.
    AlreadyActive,
    /// The running event was stopped.
    Deactivated,
    /// Nothing ran and nothing was selected.
    Ignored,
    Connected,
    Disconnected { stopped: Option<EventId> },
}

impl fmt::Display for DeviceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Activated { position, .. } => write!(f, "activated #{position}"),
            Self::AlreadyActive => f.write_str("already active"),
            Self::Deactivated => f.write_str("deactivated"),
            Self::Ignored => f.write_str("ignored"),
            Self::Connected => f.write_str("connected"),
            Self::Disconnected { stopped: Some(_) } => f.write_str("disconnected, tracking stopped"),
            Self::Disconnected { stopped: None } => f.write_str("disconnected"),
        }
    }
}

/// A line that is not a device signal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unrecognized device signal {0:?}, expected `face N`, `connect` or `disconnect`")]
pub struct ParseSignalError(String);

impl FromStr for DeviceSignal {
    type Err = ParseSignalError;

    /// Parses `face N`, `face` (unknown face), `connect` or `disconnect`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseSignalError(s.to_string());
        let mut words = s.split_whitespace();
        let signal = match words.next().map(str::to_ascii_lowercase).as_deref() {
            Some("face") => match words.next() {
                None | Some("?") => Self::Face(None),
                Some(n) => Self::Face(Some(n.parse().map_err(|_| err())?)),
            },
            Some("connect" | "connected") => Self::Connected,
            Some("disconnect" | "disconnected") => Self::Disconnected,
            _ => return Err(err()),
        };
        if words.next().is_some() {
            return Err(err());
        }
        Ok(signal)
    }
}

/// Applies a device signal to the account.
pub fn apply_device_signal(
    controller: &mut AccountController,
    signal: DeviceSignal,
) -> Result<DeviceOutcome, AccountError> {
    match signal {
        DeviceSignal::Connected => {
            controller.notify("Device connected", "Flip the device to start tracking");
            Ok(DeviceOutcome::Connected)
        }
        DeviceSignal::Disconnected => {
            let stopped = controller.deactivate();
            controller.notify("Device disconnected", "Reconnect to keep tracking by face");
            Ok(DeviceOutcome::Disconnected { stopped })
        }
        DeviceSignal::Face(face) => apply_face(controller, face),
    }
}

fn apply_face(
    controller: &mut AccountController,
    face: Option<u32>,
) -> Result<DeviceOutcome, AccountError> {
    let target = face
        .filter(|&n| n > 0)
        .and_then(|n| usize::try_from(n - 1).ok())
        .and_then(|index| controller.meters().at_position(index))
        .cloned();

    let Some(meter) = target else {
        if controller.deactivate().is_some() {
            return Ok(DeviceOutcome::Deactivated);
        }
        tracing::debug!(?face, "face maps to no meter");
        return Ok(DeviceOutcome::Ignored);
    };

    if controller
        .active_event()
        .is_some_and(|event| event.originates_from(&meter))
    {
        return Ok(DeviceOutcome::AlreadyActive);
    }

    let position = controller.meters().position_of(meter.id).map_or(0, |p| p + 1);
    let comment = match controller.kind() {
        AccountKind::Activity => Some(format!("Face {position}")),
        AccountKind::Meter => None,
    };
    let event = controller.activate(meter.id, comment.as_deref())?;
    Ok(DeviceOutcome::Activated { position, event })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::clock::ManualClock;
    use crate::defaults::StaticDefaults;
    use crate::meter::MeterTemplate;
    use crate::storage::{MemoryStore, shared};

    fn controller(kind: AccountKind) -> AccountController {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 4, 2, 8, 0, 0).unwrap(),
        ));
        let mut controller = AccountController::builder(shared(MemoryStore::new()))
            .kind(kind)
            .defaults(StaticDefaults::new(vec![
                MeterTemplate::new("Work", Some(1.0)),
                MeterTemplate::new("Break", Some(-1.0)),
            ]))
            .clock(clock)
            .build();
        controller.load().unwrap();
        controller
    }

    #[test]
    fn parses_signals() {
        assert_eq!("face 3".parse::<DeviceSignal>(), Ok(DeviceSignal::Face(Some(3))));
        assert_eq!("FACE".parse::<DeviceSignal>(), Ok(DeviceSignal::Face(None)));
        assert_eq!(" disconnect ".parse::<DeviceSignal>(), Ok(DeviceSignal::Disconnected));
        assert_eq!("connect".parse::<DeviceSignal>(), Ok(DeviceSignal::Connected));
        assert!("face x".parse::<DeviceSignal>().is_err());
        assert!("face 1 2".parse::<DeviceSignal>().is_err());
        assert!("spin".parse::<DeviceSignal>().is_err());
    }

    #[test]
    fn face_activates_meter_by_position() {
        let mut c = controller(AccountKind::Meter);
        let outcome = apply_device_signal(&mut c, DeviceSignal::Face(Some(2))).unwrap();
        assert!(matches!(outcome, DeviceOutcome::Activated { position: 2, .. }));
        assert_eq!(c.active_event().unwrap().meter_name, "Break");

        let again = apply_device_signal(&mut c, DeviceSignal::Face(Some(2))).unwrap();
        assert_eq!(again, DeviceOutcome::AlreadyActive);
        assert_eq!(c.events().len(), 1);
    }

    #[test]
    fn unmapped_face_stops_tracking() {
        let mut c = controller(AccountKind::Meter);
        apply_device_signal(&mut c, DeviceSignal::Face(Some(1))).unwrap();

        let outcome = apply_device_signal(&mut c, DeviceSignal::Face(Some(99))).unwrap();
        assert_eq!(outcome, DeviceOutcome::Deactivated);
        assert!(c.active_event().is_none());

        for face in [None, Some(0), Some(9)] {
            let outcome = apply_device_signal(&mut c, DeviceSignal::Face(face)).unwrap();
            assert_eq!(outcome, DeviceOutcome::Ignored);
        }
    }

    #[test]
    fn activity_faces_carry_a_comment() {
        let mut c = controller(AccountKind::Activity);
        apply_device_signal(&mut c, DeviceSignal::Face(Some(1))).unwrap();
        assert_eq!(c.active_event().unwrap().comment.as_deref(), Some("Face 1"));
    }

    #[test]
    fn disconnect_stops_running_event() {
        let mut c = controller(AccountKind::Meter);
        let DeviceOutcome::Activated { event, .. } =
            apply_device_signal(&mut c, DeviceSignal::Face(Some(1))).unwrap()
        else {
            panic!("expected activation");
        };
        let outcome = apply_device_signal(&mut c, DeviceSignal::Disconnected).unwrap();
        assert_eq!(outcome, DeviceOutcome::Disconnected { stopped: Some(event) });
        assert!(c.active_event().is_none());
    }
}
