//! Status command for showing the balance and the running meter.

use std::io::Write;

use anyhow::Result;
use tb_core::{AccountController, format_period};

use super::util::{format_duration, format_time};

pub fn run<W: Write>(writer: &mut W, controller: &AccountController) -> Result<()> {
    let now = controller.now();

    writeln!(writer, "Time bank ({})", controller.kind())?;
    writeln!(
        writer,
        "Balance: {}",
        format_duration(controller.current_balance())
    )?;

    match controller.active_event() {
        Some(event) => {
            let comment = event
                .comment
                .as_deref()
                .map(|c| format!(" ({c})"))
                .unwrap_or_default();
            writeln!(
                writer,
                "Running: {}{comment} since {} ({})",
                event.meter_name,
                format_time(event.start_time),
                format_duration(event.duration(now))
            )?;
        }
        None => writeln!(writer, "Running: nothing")?,
    }

    writeln!(
        writer,
        "Meters: {}, events: {}",
        controller.meters().len(),
        controller.events().len()
    )?;
    writeln!(
        writer,
        "Timeline period: {}",
        format_period(controller.timeline_period())
    )?;

    Ok(())
}
