//! Meter management commands.

use std::io::Write;

use anyhow::{Context, Result};
use tb_core::{AccountController, AccountKind};

use super::util::resolve_meter;

/// Lists meters in display order, marking the running one.
pub fn list<W: Write>(writer: &mut W, controller: &AccountController, ids: bool) -> Result<()> {
    let meters = controller.meters().meters();
    if meters.is_empty() {
        writeln!(writer, "No meters.")?;
        return Ok(());
    }

    let active = controller.active_meter().map(|m| m.id);
    let show_factor = controller.kind() == AccountKind::Meter;
    let width = meters.iter().map(|m| m.name.chars().count()).max().unwrap_or(0);
    for (index, meter) in meters.iter().enumerate() {
        write!(writer, "{}. ", index + 1)?;
        if show_factor {
            write!(writer, "{:<width$}  {:+.2}x", meter.name, meter.factor)?;
        } else {
            write!(writer, "{}", meter.name)?;
        }
        if ids {
            write!(writer, "  {}", meter.id)?;
        }
        if Some(meter.id) == active {
            write!(writer, "  [running]")?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

pub fn add<W: Write>(
    writer: &mut W,
    controller: &mut AccountController,
    name: &str,
    factor: Option<f64>,
) -> Result<()> {
    let id = controller.add_meter(name, factor)?;
    let meter = controller.meters().get(id).context("added meter vanished")?;
    writeln!(writer, "Added {} ({:+.2}x)", meter.name, meter.factor)?;
    Ok(())
}

pub fn rename<W: Write>(
    writer: &mut W,
    controller: &mut AccountController,
    key: &str,
    name: &str,
) -> Result<()> {
    let id = resolve_meter(controller.meters(), key)?;
    controller.rename_meter(id, name)?;
    let meter = controller.meters().get(id).context("renamed meter vanished")?;
    writeln!(writer, "Renamed to {}", meter.name)?;
    Ok(())
}

pub fn remove<W: Write>(writer: &mut W, controller: &mut AccountController, key: &str) -> Result<()> {
    let id = resolve_meter(controller.meters(), key)?;
    let removed = controller.remove_meter(id)?;
    writeln!(writer, "Removed {}", removed.name)?;
    Ok(())
}

/// Applies a new display order given as meter keys.
pub fn reorder<W: Write>(
    writer: &mut W,
    controller: &mut AccountController,
    keys: &[String],
) -> Result<()> {
    let ordered = keys
        .iter()
        .map(|key| resolve_meter(controller.meters(), key))
        .collect::<Result<Vec<_>>>()?;
    if !controller.reorder_meters(&ordered) {
        anyhow::bail!(
            "reorder needs every meter exactly once ({} given, {} exist)",
            ordered.len(),
            controller.meters().len()
        );
    }
    list(writer, controller, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;

    use crate::commands::testing::{controller, render};

    #[test]
    fn list_marks_the_running_meter() {
        let (mut controller, _clock) = controller(AccountKind::Meter);
        let pause = controller.meters().at_position(1).unwrap().id;
        controller.activate(pause, None).unwrap();

        let output = render(|w| list(w, &controller, false));
        assert_snapshot!(output, @r"
        1. Work   +1.00x
        2. Break  -1.00x  [running]
        ");
    }

    #[test]
    fn activity_listing_omits_factors() {
        let (controller, _clock) = controller(AccountKind::Activity);
        let output = render(|w| list(w, &controller, false));
        assert_snapshot!(output, @r"
        1. Work
        2. Break
        ");
    }

    #[test]
    fn add_rename_remove() {
        let (mut controller, _clock) = controller(AccountKind::Meter);

        let output = render(|w| add(w, &mut controller, " Reading ", Some(0.5)));
        assert_snapshot!(output, @"Added Reading (+0.50x)");

        let output = render(|w| rename(w, &mut controller, "reading", "Books"));
        assert_snapshot!(output, @"Renamed to Books");

        let output = render(|w| remove(w, &mut controller, "3"));
        assert_snapshot!(output, @"Removed Books");
        assert_eq!(controller.meters().len(), 2);
    }

    #[test]
    fn add_rejects_out_of_range_factor() {
        let (mut controller, _clock) = controller(AccountKind::Meter);
        let mut output = Vec::new();
        assert!(add(&mut output, &mut controller, "Turbo", Some(11.0)).is_err());
        assert_eq!(controller.meters().len(), 2);
    }

    #[test]
    fn reorder_by_name() {
        let (mut controller, _clock) = controller(AccountKind::Meter);
        let keys = ["Break".to_string(), "Work".to_string()];
        let output = render(|w| reorder(w, &mut controller, &keys));
        assert_snapshot!(output, @r"
        1. Break  -1.00x
        2. Work   +1.00x
        ");
    }

    #[test]
    fn partial_reorder_is_refused() {
        let (mut controller, _clock) = controller(AccountKind::Meter);
        let mut output = Vec::new();
        let err = reorder(&mut output, &mut controller, &["Break".to_string()]).unwrap_err();
        assert!(err.to_string().contains("every meter exactly once"));
        assert_eq!(controller.meters().at_position(0).unwrap().name, "Work");
    }
}
