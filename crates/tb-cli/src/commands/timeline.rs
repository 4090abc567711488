//! Timeline command for charting the balance over a recent window.

use std::io::Write;

use anyhow::Result;
use chrono::Duration;
use tb_core::AccountController;

use super::util::format_time;

pub fn run<W: Write>(
    writer: &mut W,
    controller: &AccountController,
    hours: Option<u32>,
    json: bool,
) -> Result<()> {
    let points = match hours {
        Some(0) => anyhow::bail!("--hours must be positive"),
        Some(hours) => controller.timeline_for(Duration::hours(i64::from(hours))),
        None => controller.timeline(),
    };

    if json {
        serde_json::to_writer_pretty(&mut *writer, &points)?;
        writeln!(writer)?;
        return Ok(());
    }

    for point in &points {
        writeln!(
            writer,
            "{}  {:+.2}h",
            format_time(point.timestamp),
            point.balance_hours
        )?;
    }
    Ok(())
}
