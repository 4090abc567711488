//! Export command.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tb_core::AccountController;

/// Writes the export JSON to `writer`.
pub fn run<W: Write>(writer: &mut W, controller: &AccountController) -> Result<()> {
    let json = controller.export_data().context("failed to export data")?;
    writeln!(writer, "{json}")?;
    Ok(())
}

/// Writes the export JSON to a file.
pub fn to_file(path: &Path, controller: &AccountController) -> Result<()> {
    let json = controller.export_data().context("failed to export data")?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "data exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use tb_core::{AccountKind, ExportData};

    use crate::commands::testing::{controller, render};

    #[test]
    fn export_is_camel_case_json() {
        let (mut controller, _clock) = controller(AccountKind::Meter);
        let work = controller.meters().at_position(0).unwrap().id;
        controller.activate(work, Some("focus")).unwrap();

        let output = render(|w| run(w, &controller));
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["language"], "en");
        assert_eq!(value["tutorialCompleted"], false);
        assert_eq!(value["meters"][0]["displayOrder"], 0);
        assert_eq!(value["events"][0]["meterName"], "Work");
        assert!(value["exportedAt"].is_string());

        let data: ExportData = serde_json::from_str(&output).unwrap();
        assert_eq!(data.meters.len(), 2);
        assert_eq!(data.events.len(), 1);
    }

    #[test]
    fn export_to_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("backup.json");
        let (controller, _clock) = controller(AccountKind::Meter);

        to_file(&path, &controller).unwrap();
        let data: ExportData =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(data.meters[1].name, "Break");
    }
}
