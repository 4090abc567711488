//! Timeline period command.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::Duration;
use tb_core::{AccountController, format_period, parse_period};

/// Parses `48`, `1.5` (hours) or `[d.]hh:mm:ss`.
pub fn parse_period_arg(value: &str) -> Result<Duration> {
    if let Ok(hours) = value.trim().parse::<f64>() {
        anyhow::ensure!(hours.is_finite(), "period must be a finite number of hours");
        #[allow(clippy::cast_possible_truncation)]
        let millis = (hours * 3_600_000.0).round() as i64;
        return Duration::try_milliseconds(millis).context("period is out of range");
    }
    parse_period(value).context("period must be hours or [d.]hh:mm:ss")
}

/// Prints the period, setting it first when `value` is given.
pub fn run<W: Write>(
    writer: &mut W,
    controller: &mut AccountController,
    value: Option<&str>,
) -> Result<()> {
    if let Some(value) = value {
        let period = parse_period_arg(value)?;
        controller.set_timeline_period(period)?;
    }
    writeln!(
        writer,
        "Timeline period: {}",
        format_period(controller.timeline_period())
    )?;
    Ok(())
}
