//! Meters and the catalog that owns them.

use serde::{Deserialize, Serialize};

use crate::error::AccountError;
use crate::event::MeterEvent;
use crate::types::{AccountKind, MAX_METERS, MAX_NAME_LEN, MeterId, validate_name};

/// A configurable category that accrues time while active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meter {
    #[serde(alias = "Id", default)]
    pub id: MeterId,

    /// Display name, 1–40 characters.
    #[serde(alias = "Name")]
    pub name: String,

    /// Signed multiplier applied to active time.
    #[serde(alias = "Factor", default = "default_factor")]
    pub factor: f64,

    /// Position in listings, ascending.
    #[serde(alias = "DisplayOrder", default)]
    pub display_order: i32,
}

const fn default_factor() -> f64 {
    1.0
}

/// A meter definition as supplied by the configuration collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterTemplate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factor: Option<f64>,
}

impl MeterTemplate {
    pub fn new(name: impl Into<String>, factor: Option<f64>) -> Self {
        Self {
            name: name.into(),
            factor,
        }
    }
}

/// Ordered collection of at most [`MAX_METERS`] meters.
///
/// Meters are kept sorted by `display_order`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeterCatalog {
    kind: AccountKind,
    meters: Vec<Meter>,
}

impl MeterCatalog {
    /// Creates an empty catalog.
    pub const fn new(kind: AccountKind) -> Self {
        Self {
            kind,
            meters: Vec::new(),
        }
    }

    /// Builds a catalog from stored meters.
    ///
    /// Factors are coerced into the kind's domain, meters are sorted by
    /// display order and anything past the capacity is dropped. Names are
    /// trimmed and cut to [`MAX_NAME_LEN`]; blank ones become `Meter N`.
    pub fn from_meters(kind: AccountKind, mut meters: Vec<Meter>) -> Self {
        for meter in &mut meters {
            let coerced = kind.coerce_factor(meter.factor);
            if (coerced - meter.factor).abs() > f64::EPSILON {
                tracing::warn!(
                    meter = %meter.name,
                    factor = meter.factor,
                    coerced,
                    "stored factor outside allowed domain"
                );
                meter.factor = coerced;
            }
        }
        meters.sort_by_key(|m| m.display_order);
        if meters.len() > MAX_METERS {
            tracing::warn!(
                count = meters.len(),
                max = MAX_METERS,
                "truncating meter catalog"
            );
            meters.truncate(MAX_METERS);
        }
        for (position, meter) in meters.iter_mut().enumerate() {
            let repaired = repair_name(&meter.name, position);
            if repaired != meter.name {
                tracing::warn!(name = %meter.name, %repaired, "stored meter name invalid");
                meter.name = repaired;
            }
        }
        Self { kind, meters }
    }

    /// Builds a catalog from configuration templates, numbering them in order.
    pub fn from_templates(
        kind: AccountKind,
        templates: &[MeterTemplate],
    ) -> Result<Self, AccountError> {
        let mut meters = Vec::with_capacity(templates.len().min(MAX_METERS));
        for (order, template) in (0..).zip(templates.iter().take(MAX_METERS)) {
            meters.push(Meter {
                id: MeterId::new(),
                name: validate_name(&template.name)?,
                factor: kind.normalize_factor(template.factor.unwrap_or(1.0))?,
                display_order: order,
            });
        }
        Ok(Self { kind, meters })
    }

    pub const fn kind(&self) -> AccountKind {
        self.kind
    }

    /// Meters in display order.
    pub fn meters(&self) -> &[Meter] {
        &self.meters
    }

    pub fn len(&self) -> usize {
        self.meters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meters.is_empty()
    }

    pub fn get(&self, id: MeterId) -> Option<&Meter> {
        self.meters.iter().find(|m| m.id == id)
    }

    pub fn contains(&self, id: MeterId) -> bool {
        self.get(id).is_some()
    }

    /// Returns the meter at a 0-based display position.
    pub fn at_position(&self, position: usize) -> Option<&Meter> {
        self.meters.get(position)
    }

    /// Returns the 0-based display position of a meter.
    pub fn position_of(&self, id: MeterId) -> Option<usize> {
        self.meters.iter().position(|m| m.id == id)
    }

    /// Finds a meter by exact (case-insensitive) name.
    pub fn find_by_name(&self, name: &str) -> Option<&Meter> {
        let name = name.trim();
        self.meters
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }

    /// Adds a meter at the end of the display order.
    ///
    /// A missing factor means `1.0`.
    pub fn add(&mut self, name: &str, factor: Option<f64>) -> Result<&Meter, AccountError> {
        let name = validate_name(name)?;
        if self.meters.len() >= MAX_METERS {
            return Err(AccountError::CapacityExceeded { max: MAX_METERS });
        }
        let factor = self.kind.normalize_factor(factor.unwrap_or(1.0))?;
        let display_order = self
            .meters
            .iter()
            .map(|m| m.display_order)
            .max()
            .map_or(0, |max| max + 1);

        self.meters.push(Meter {
            id: MeterId::new(),
            name,
            factor,
            display_order,
        });
        Ok(&self.meters[self.meters.len() - 1])
    }

    /// Renames a meter. The factor never changes.
    pub fn rename(&mut self, id: MeterId, new_name: &str) -> Result<&Meter, AccountError> {
        let name = validate_name(new_name)?;
        let meter = self
            .meters
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(AccountError::MeterNotFound(id))?;
        meter.name = name;
        Ok(&*meter)
    }

    /// Removes a meter unless it is the origin of the running event.
    pub fn remove(
        &mut self,
        id: MeterId,
        active: Option<&MeterEvent>,
    ) -> Result<Meter, AccountError> {
        let index = self
            .meters
            .iter()
            .position(|m| m.id == id)
            .ok_or(AccountError::MeterNotFound(id))?;
        let meter = &self.meters[index];
        if active.is_some_and(|event| event.originates_from(meter)) {
            return Err(AccountError::MeterActive {
                name: meter.name.clone(),
            });
        }
        Ok(self.meters.remove(index))
    }

    /// Rewrites display order from a full permutation of the current IDs.
    ///
    /// Anything other than an exact permutation is ignored. Returns whether
    /// the order was applied.
    pub fn reorder(&mut self, ordered: &[MeterId]) -> bool {
        if ordered.len() != self.meters.len() {
            return false;
        }
        let mut reordered = Vec::with_capacity(ordered.len());
        for id in ordered {
            if reordered.iter().any(|m: &Meter| m.id == *id) {
                return false;
            }
            match self.get(*id) {
                Some(meter) => reordered.push(meter.clone()),
                None => return false,
            }
        }
        for (order, meter) in (0..).zip(reordered.iter_mut()) {
            meter.display_order = order;
        }
        self.meters = reordered;
        true
    }

    pub(crate) fn into_meters(self) -> Vec<Meter> {
        self.meters
    }
}

fn repair_name(name: &str, position: usize) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return format!("Meter {}", position + 1);
    }
    let cut: String = trimmed.chars().take(MAX_NAME_LEN).collect();
    cut.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::types::ValidationError;

    fn catalog() -> MeterCatalog {
        MeterCatalog::from_templates(
            AccountKind::Meter,
            &[
                MeterTemplate::new("Work", Some(1.0)),
                MeterTemplate::new("Break", Some(-1.0)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn add_assigns_next_display_order() {
        let mut catalog = catalog();
        let meter = catalog.add("Focus", Some(2.5)).unwrap();
        assert_eq!(meter.display_order, 2);
        assert!((meter.factor - 2.5).abs() < f64::EPSILON);
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn add_to_empty_catalog_starts_at_zero() {
        let mut catalog = MeterCatalog::new(AccountKind::Meter);
        assert_eq!(catalog.add("First", None).unwrap().display_order, 0);
    }

    #[test]
    fn add_rejects_ninth_meter() {
        let mut catalog = MeterCatalog::new(AccountKind::Meter);
        for i in 0..MAX_METERS {
            catalog.add(&format!("Meter {i}"), Some(1.0)).unwrap();
        }
        let err = catalog.add("Overflow", Some(1.0)).unwrap_err();
        assert!(matches!(err, AccountError::CapacityExceeded { max: 8 }));
        assert_eq!(catalog.len(), MAX_METERS);
    }

    #[test]
    fn add_validates_name_and_factor() {
        let mut catalog = catalog();
        assert!(matches!(
            catalog.add(" ", Some(1.0)),
            Err(AccountError::Validation(ValidationError::EmptyName))
        ));
        assert!(matches!(
            catalog.add("Invalid", Some(100.0)),
            Err(AccountError::FactorOutOfRange { .. })
        ));
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn activity_catalog_pins_factor() {
        let mut catalog = MeterCatalog::new(AccountKind::Activity);
        let meter = catalog.add("Reading", Some(-4.0)).unwrap();
        assert!((meter.factor - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rename_changes_name_only() {
        let mut catalog = catalog();
        let id = catalog.meters()[0].id;
        let meter = catalog.rename(id, "  Deep work ").unwrap();
        assert_eq!(meter.name, "Deep work");
        assert!((meter.factor - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rename_unknown_meter_fails() {
        let mut catalog = catalog();
        assert!(matches!(
            catalog.rename(MeterId::new(), "Ghost"),
            Err(AccountError::MeterNotFound(_))
        ));
    }

    #[test]
    fn remove_refuses_active_origin() {
        let mut catalog = catalog();
        let work = catalog.meters()[0].clone();
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        let running = MeterEvent::start(&work, None, start);

        let err = catalog.remove(work.id, Some(&running)).unwrap_err();
        assert!(matches!(err, AccountError::MeterActive { .. }));

        let removed = catalog.remove(work.id, None).unwrap();
        assert_eq!(removed.name, "Work");
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn reorder_applies_permutation() {
        let mut catalog = catalog();
        let ids: Vec<_> = catalog.meters().iter().rev().map(|m| m.id).collect();
        assert!(catalog.reorder(&ids));
        assert_eq!(catalog.meters()[0].name, "Break");
        assert_eq!(catalog.meters()[0].display_order, 0);
        assert_eq!(catalog.meters()[1].display_order, 1);
    }

    #[test]
    fn reorder_ignores_non_permutations() {
        let mut catalog = catalog();
        let before = catalog.clone();
        let first = catalog.meters()[0].id;

        assert!(!catalog.reorder(&[first]));
        assert!(!catalog.reorder(&[first, first]));
        assert!(!catalog.reorder(&[first, MeterId::new()]));
        assert_eq!(catalog, before);
    }

    #[test]
    fn from_meters_truncates_by_display_order() {
        let meters: Vec<Meter> = (0..10)
            .rev()
            .map(|order| Meter {
                id: MeterId::new(),
                name: format!("M{order}"),
                factor: 1.0,
                display_order: order,
            })
            .collect();
        let catalog = MeterCatalog::from_meters(AccountKind::Meter, meters);
        assert_eq!(catalog.len(), MAX_METERS);
        assert_eq!(catalog.meters()[0].name, "M0");
        assert_eq!(catalog.meters()[7].name, "M7");
    }

    #[test]
    fn from_meters_repairs_names() {
        let meters: Vec<Meter> = [" Work ", "", &"x".repeat(100)]
            .into_iter()
            .zip(0..)
            .map(|(name, order)| Meter {
                id: MeterId::new(),
                name: name.to_string(),
                factor: 1.0,
                display_order: order,
            })
            .collect();
        let catalog = MeterCatalog::from_meters(AccountKind::Meter, meters);
        let names: Vec<_> = catalog.meters().iter().map(|m| m.name.clone()).collect();
        assert_eq!(names, ["Work".to_string(), "Meter 2".to_string(), "x".repeat(MAX_NAME_LEN)]);
    }

    #[test]
    fn meter_accepts_pascal_case_fields() {
        let json = r#"{"Id":"5f0c6c1e-8a8b-4f6e-9c43-0a4a3c7d2b11","Name":"+1x","Factor":1.0,"DisplayOrder":3}"#;
        let meter: Meter = serde_json::from_str(json).unwrap();
        assert_eq!(meter.name, "+1x");
        assert_eq!(meter.display_order, 3);
    }
}
