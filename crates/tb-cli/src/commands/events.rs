//! Event listing and correction commands.

use std::io::Write;

use anyhow::Result;
use tb_core::AccountController;

use super::util::{format_duration, format_time, parse_datetime, resolve_event};

/// Lists events oldest first, numbered for `edit` and `delete`.
pub fn list<W: Write>(
    writer: &mut W,
    controller: &AccountController,
    limit: Option<usize>,
    ids: bool,
) -> Result<()> {
    let events = controller.events().events();
    if events.is_empty() {
        writeln!(writer, "No events recorded.")?;
        return Ok(());
    }

    let now = controller.now();
    let skip = limit.map_or(0, |limit| events.len().saturating_sub(limit));
    for (index, event) in events.iter().enumerate().skip(skip) {
        let end = event
            .end_time
            .map_or_else(|| "running".to_string(), |end| end.format("%H:%M").to_string());
        write!(
            writer,
            "{}. {} - {end}  {}  {:+.2}x  {}",
            index + 1,
            format_time(event.start_time),
            event.meter_name,
            event.factor,
            format_duration(event.contribution(now))
        )?;
        if let Some(comment) = &event.comment {
            write!(writer, "  \"{comment}\"")?;
        }
        if ids {
            write!(writer, "  {}", event.id)?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

pub fn edit<W: Write>(
    writer: &mut W,
    controller: &mut AccountController,
    key: &str,
    start: &str,
    end: &str,
) -> Result<()> {
    let id = resolve_event(controller.events(), key)?;
    let now = controller.now();
    let start = parse_datetime(start, now)?;
    let end = parse_datetime(end, now)?;
    controller.update_event_times(id, start, end)?;
    writeln!(
        writer,
        "Event now runs {} - {}",
        format_time(start),
        format_time(end)
    )?;
    Ok(())
}

pub fn delete<W: Write>(writer: &mut W, controller: &mut AccountController, key: &str) -> Result<()> {
    let id = resolve_event(controller.events(), key)?;
    let event = controller.delete_event(id)?;
    writeln!(
        writer,
        "Deleted {} event from {}",
        event.meter_name,
        format_time(event.start_time)
    )?;
    Ok(())
}
