//! Account-level errors.

use thiserror::Error;

use crate::defaults::DefaultsError;
use crate::storage::StorageError;
use crate::types::{EventId, MeterId, ValidationError};

/// Errors raised synchronously by catalog, log, and controller operations.
///
/// None of these are retried internally.
#[derive(Debug, Error)]
pub enum AccountError {
    /// Bad input shape or length.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A factor outside the permitted range.
    #[error("factor must be between {min} and {max}, got {value}")]
    FactorOutOfRange { value: f64, min: f64, max: f64 },

    /// The event is still running and cannot be edited.
    #[error("cannot edit times of active event {id}")]
    EventActive { id: EventId },

    /// The meter is the origin of the running event.
    #[error("cannot delete the currently active meter {name:?}")]
    MeterActive { name: String },

    /// The catalog is full.
    #[error("cannot add more than {max} meters")]
    CapacityExceeded { max: usize },

    /// Stored or imported JSON could not be parsed.
    #[error("invalid account data: {0}")]
    Format(#[source] serde_json::Error),

    /// No meter with this ID exists.
    #[error("meter {0} not found")]
    MeterNotFound(MeterId),

    /// No event with this ID exists.
    #[error("event {0} not found")]
    EventNotFound(EventId),

    /// The meter configuration collaborator failed.
    #[error("failed to load default meters: {0}")]
    Defaults(#[from] DefaultsError),

    /// The stored snapshot could not be read.
    #[error("failed to read stored account: {0}")]
    Storage(#[from] StorageError),
}

/// Coarse classification of [`AccountError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Range,
    State,
    Conflict,
    Capacity,
    Format,
    NotFound,
    Unavailable,
}

impl AccountError {
    /// Returns the taxonomy bucket of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::FactorOutOfRange { .. } => ErrorKind::Range,
            Self::EventActive { .. } => ErrorKind::State,
            Self::MeterActive { .. } => ErrorKind::Conflict,
            Self::CapacityExceeded { .. } => ErrorKind::Capacity,
            Self::Format(_) => ErrorKind::Format,
            Self::MeterNotFound(_) | Self::EventNotFound(_) => ErrorKind::NotFound,
            Self::Defaults(_) | Self::Storage(_) => ErrorKind::Unavailable,
        }
    }
}
