//! Import command.

use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tb_core::AccountController;

/// Reads the payload from `path`, or from stdin when `path` is `-`.
pub fn read_payload(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut payload = String::new();
        std::io::stdin()
            .read_to_string(&mut payload)
            .context("failed to read stdin")?;
        return Ok(payload);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Replaces the account with `payload`.
pub fn run<W: Write>(writer: &mut W, controller: &mut AccountController, payload: &str) -> Result<()> {
    controller
        .import_data(payload)
        .context("import rejected, existing data kept")?;
    writeln!(
        writer,
        "Imported {} meters and {} events",
        controller.meters().len(),
        controller.events().len()
    )?;
    if let Some(event) = controller.active_event() {
        writeln!(writer, "Running: {}", event.meter_name)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use tb_core::AccountKind;

    use crate::commands::testing::{controller, render};

    const LEGACY_EXPORT: &str = r#"{
        "ExportedAt": "2025-04-01T20:00:00Z",
        "Language": "de",
        "TutorialCompleted": true,
        "Meters": [
            {"Id": "6f1c1c1e-4f7e-4a53-9d43-0d5e8f7f0a01", "Name": "Focus", "Factor": 2.0, "DisplayOrder": 3},
            {"Id": "6f1c1c1e-4f7e-4a53-9d43-0d5e8f7f0a02", "Name": "Slack", "Factor": -1.0, "DisplayOrder": 7}
        ],
        "Events": [
            {"Id": "0b7a2d8e-2f43-4d0a-8d55-93a6a7f5c001", "StartTime": "2025-04-01T09:00:00Z",
             "EndTime": "2025-04-01T10:00:00Z", "Factor": 2.0, "MeterName": "Focus"},
            {"Id": "0b7a2d8e-2f43-4d0a-8d55-93a6a7f5c002", "StartTime": "2025-04-02T07:30:00Z",
             "EndTime": null, "Factor": -1.0, "MeterName": "Slack"}
        ]
    }"#;

    #[test]
    fn import_replaces_everything() {
        let (mut controller, _clock) = controller(AccountKind::Meter);
        let output = render(|w| run(w, &mut controller, LEGACY_EXPORT));
        assert_snapshot!(output, @r"
        Imported 2 meters and 2 events
        Running: Slack
        ");
        assert_eq!(controller.meters().at_position(0).unwrap().name, "Focus");
        assert_eq!(controller.settings().language, "de");
        assert!(controller.settings().tutorial_completed);
    }

    #[test]
    fn rejected_import_keeps_existing_data() {
        let (mut controller, _clock) = controller(AccountKind::Meter);
        let mut output = Vec::new();

        let err = run(&mut output, &mut controller, "{not json").unwrap_err();
        assert!(err.to_string().contains("existing data kept"));

        assert!(run(&mut output, &mut controller, r#"{"meters": [], "events": []}"#).is_err());
        assert_eq!(controller.meters().len(), 2);
    }

    #[test]
    fn read_payload_from_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("export.json");
        std::fs::write(&path, LEGACY_EXPORT).unwrap();
        assert_eq!(read_payload(&path).unwrap(), LEGACY_EXPORT);
        assert!(read_payload(&temp.path().join("missing.json")).is_err());
    }
}
