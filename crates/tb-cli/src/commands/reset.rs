//! Reset command.

use std::io::Write;

use anyhow::{Context, Result};
use tb_core::AccountController;

pub fn run<W: Write>(writer: &mut W, controller: &mut AccountController, confirmed: bool) -> Result<()> {
    if !confirmed {
        anyhow::bail!("reset deletes every event; pass --yes to confirm");
    }
    controller.reset_data().context("failed to reset account")?;
    writeln!(
        writer,
        "Reset to {} default meters",
        controller.meters().len()
    )?;
    Ok(())
}
