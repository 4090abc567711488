//! Core domain logic for timebank.
//!
//! This crate contains the fundamental types and logic for:
//! - Meters: a bounded catalog of named time multipliers
//! - Events: the activation log with at most one running event
//! - Balance: the signed time balance and its timeline
//! - The account controller that ties them together and persists snapshots

mod account;
mod balance;
pub mod clock;
mod controller;
pub mod defaults;
pub mod device;
mod error;
mod event;
mod log;
mod meter;
pub mod notify;
mod persist;
pub mod settings;
pub mod storage;
mod types;

pub use account::{ExportData, PeriodParseError, TimeAccount, format_period, parse_period};
pub use balance::{TimelineDataPoint, current_balance, timeline};
pub use controller::{AccountController, ControllerBuilder, StateChange, SubscriptionId};
pub use error::{AccountError, ErrorKind};
pub use event::{MeterEvent, hours};
pub use log::EventLog;
pub use meter::{Meter, MeterCatalog, MeterTemplate};
pub use persist::SaveQueue;
pub use types::{
    AccountKind, EventId, MAX_COMMENT_LEN, MAX_FACTOR, MAX_METERS, MAX_NAME_LEN, MIN_FACTOR,
    MeterId, ValidationError, default_timeline_period, validate_name,
};
