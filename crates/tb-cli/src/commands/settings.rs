//! Settings command.

use std::io::Write;

use anyhow::Result;
use tb_core::AccountController;

/// Requested settings changes. `None` leaves a value alone.
#[derive(Debug, Default, Clone)]
pub struct SettingsUpdate {
    pub language: Option<String>,
    pub notifications: Option<bool>,
    pub tutorial_completed: Option<bool>,
}

pub fn run<W: Write>(
    writer: &mut W,
    controller: &mut AccountController,
    update: SettingsUpdate,
) -> Result<()> {
    if let Some(language) = &update.language {
        anyhow::ensure!(!language.trim().is_empty(), "language must not be blank");
    }

    let settings = controller.settings_mut();
    if let Some(language) = update.language {
        settings.set_language(language.trim());
    }
    if let Some(enabled) = update.notifications {
        settings.set_notifications_enabled(enabled);
    }
    if let Some(completed) = update.tutorial_completed {
        settings.set_tutorial_completed(completed);
    }

    let settings = controller.settings();
    writeln!(writer, "Language: {}", settings.language)?;
    writeln!(
        writer,
        "Notifications: {}",
        if settings.browser_notifications_enabled { "on" } else { "off" }
    )?;
    writeln!(
        writer,
        "Tutorial completed: {}",
        if settings.tutorial_completed { "yes" } else { "no" }
    )?;
    Ok(())
}
