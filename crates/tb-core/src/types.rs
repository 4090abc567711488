//! Core type definitions with validation.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::AccountError;

/// Maximum number of meters a catalog may hold.
pub const MAX_METERS: usize = 8;

/// Maximum length of a meter name, in characters.
pub const MAX_NAME_LEN: usize = 40;

/// Maximum length of an event comment, in characters.
pub const MAX_COMMENT_LEN: usize = 250;

/// Lower bound for a free-range meter factor.
pub const MIN_FACTOR: f64 = -10.0;

/// Upper bound for a free-range meter factor.
pub const MAX_FACTOR: f64 = 10.0;

/// Tolerance used when matching legacy events to meters by factor.
pub(crate) const FACTOR_EPSILON: f64 = 0.0001;

/// The timeline lookback used when none has been chosen yet.
pub fn default_timeline_period() -> Duration {
    Duration::hours(24)
}

/// Validation errors for user-provided input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The name was empty or whitespace-only.
    #[error("name cannot be empty")]
    EmptyName,

    /// The name exceeded the maximum length.
    #[error("name must be at most {max} characters, got {len}")]
    NameTooLong { len: usize, max: usize },

    /// A comment is mandatory for this account kind.
    #[error("a comment is required to start an activity")]
    CommentRequired,

    /// The comment exceeded the maximum length.
    #[error("comment must be at most {max} characters, got {len}")]
    CommentTooLong { len: usize, max: usize },

    /// The start time was not strictly before the end time.
    #[error("start time must be before end time")]
    StartNotBeforeEnd,

    /// The end time lies in the future.
    #[error("end time cannot be in the future")]
    EndInFuture,

    /// Imported data did not contain a single meter.
    #[error("import data must contain at least one meter")]
    NoMeters,

    /// The timeline period was zero or negative.
    #[error("timeline period must be positive")]
    NonPositivePeriod,
}

/// Which flavour of account is being kept.
///
/// Decides the factor policy applied to every meter and whether starting an
/// event needs a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// Signed factors in `[-10, 10]`, comments optional.
    #[default]
    Meter,
    /// Factor pinned to `1.0`, every event carries a comment.
    Activity,
}

impl AccountKind {
    /// Human-readable noun for this kind, used in notifications.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Meter => "Meter",
            Self::Activity => "Activity",
        }
    }

    /// Applies the factor policy of this kind.
    ///
    /// `Meter` rejects values outside `[-10, 10]` (and NaN); `Activity`
    /// normalizes anything to `1.0`.
    pub fn normalize_factor(self, factor: f64) -> Result<f64, AccountError> {
        match self {
            Self::Activity => Ok(1.0),
            Self::Meter => {
                if factor.is_nan() || !(MIN_FACTOR..=MAX_FACTOR).contains(&factor) {
                    return Err(AccountError::FactorOutOfRange {
                        value: factor,
                        min: MIN_FACTOR,
                        max: MAX_FACTOR,
                    });
                }
                Ok(factor)
            }
        }
    }

    /// Like [`normalize_factor`](Self::normalize_factor) but clamps instead of
    /// failing. Used for stored and imported data.
    pub(crate) fn coerce_factor(self, factor: f64) -> f64 {
        match self {
            Self::Activity => 1.0,
            Self::Meter if factor.is_nan() => 1.0,
            Self::Meter => factor.clamp(MIN_FACTOR, MAX_FACTOR),
        }
    }

    /// Validates an event comment for this kind.
    ///
    /// Returns the trimmed comment, or `None` when an optional comment was
    /// left blank.
    pub fn validate_comment(self, comment: Option<&str>) -> Result<Option<String>, ValidationError> {
        let trimmed = comment.map(str::trim).filter(|c| !c.is_empty());
        match (self, trimmed) {
            (Self::Activity, None) => Err(ValidationError::CommentRequired),
            (_, None) => Ok(None),
            (_, Some(text)) => {
                let len = text.chars().count();
                if len > MAX_COMMENT_LEN {
                    return Err(ValidationError::CommentTooLong {
                        len,
                        max: MAX_COMMENT_LEN,
                    });
                }
                Ok(Some(text.to_string()))
            }
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Meter => write!(f, "meter"),
            Self::Activity => write!(f, "activity"),
        }
    }
}

/// Validates and trims a meter name.
pub fn validate_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    let len = trimmed.chars().count();
    if len > MAX_NAME_LEN {
        return Err(ValidationError::NameTooLong {
            len,
            max: MAX_NAME_LEN,
        });
    }
    Ok(trimmed.to_string())
}

/// Generates a UUID-backed ID newtype with common trait implementations.
macro_rules! define_uuid_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh random ID.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_uuid_id!(
    /// Identifier of a configured meter.
    MeterId
);

define_uuid_id!(
    /// Identifier of a single activation interval.
    EventId
);
