//! Default meter configuration.

use thiserror::Error;

use crate::meter::MeterTemplate;
use crate::types::AccountKind;

/// Errors from the meter configuration collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DefaultsError {
    /// The source yielded no meters.
    #[error("no default meters configured")]
    Empty,

    /// The source could not be read.
    #[error("failed to read default meters: {0}")]
    Source(String),
}

/// Supplies the meters used when an account has none.
pub trait MeterDefaults: Send {
    fn load_defaults(&self) -> Result<Vec<MeterTemplate>, DefaultsError>;
}

/// A fixed list of default meters.
#[derive(Debug, Clone, Default)]
pub struct StaticDefaults {
    templates: Vec<MeterTemplate>,
}

impl StaticDefaults {
    pub const fn new(templates: Vec<MeterTemplate>) -> Self {
        Self { templates }
    }

    /// The built-in defaults for `kind`.
    pub fn builtin(kind: AccountKind) -> Self {
        Self::new(builtin_templates(kind))
    }
}

impl MeterDefaults for StaticDefaults {
    fn load_defaults(&self) -> Result<Vec<MeterTemplate>, DefaultsError> {
        if self.templates.is_empty() {
            return Err(DefaultsError::Empty);
        }
        Ok(self.templates.clone())
    }
}

/// Built-in meters for a fresh account.
pub fn builtin_templates(kind: AccountKind) -> Vec<MeterTemplate> {
    match kind {
        AccountKind::Meter => vec![
            MeterTemplate::new("+1x", Some(1.0)),
            MeterTemplate::new("+1.5x", Some(1.5)),
            MeterTemplate::new("+2x", Some(2.0)),
            MeterTemplate::new("-1x", Some(-1.0)),
            MeterTemplate::new("-2x", Some(-2.0)),
        ],
        AccountKind::Activity => ["Work", "Study", "Exercise", "Chores"]
            .into_iter()
            .map(|name| MeterTemplate::new(name, None))
            .collect(),
    }
}
