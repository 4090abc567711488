//! Start and stop commands.

use std::io::Write;

use anyhow::{Context, Result};
use tb_core::AccountController;

use super::util::{format_duration, resolve_meter};

pub fn start<W: Write>(
    writer: &mut W,
    controller: &mut AccountController,
    key: &str,
    comment: Option<&str>,
) -> Result<()> {
    let meter = resolve_meter(controller.meters(), key)?;
    let previous = controller.active_event().map(|e| e.meter_name.clone());
    let event = controller.activate(meter, comment)?;
    let started = controller
        .events()
        .get(event)
        .context("started event vanished")?;

    if let Some(previous) = previous {
        writeln!(writer, "Stopped {previous}")?;
    }
    writeln!(writer, "Started {}", started.meter_name)?;
    Ok(())
}

pub fn stop<W: Write>(writer: &mut W, controller: &mut AccountController) -> Result<()> {
    let now = controller.now();
    let Some(id) = controller.deactivate() else {
        writeln!(writer, "Nothing is running.")?;
        return Ok(());
    };
    let event = controller.events().get(id).context("stopped event vanished")?;
    writeln!(
        writer,
        "Stopped {} after {}",
        event.meter_name,
        format_duration(event.duration(now))
    )?;
    Ok(())
}
