//! One-shot backup commands.

use std::io::Write;

use anyhow::{Context, Result};
use tb_sync::{SharedController, SyncProvider};

pub async fn push<W: Write>(
    writer: &mut W,
    controller: &SharedController,
    provider: &dyn SyncProvider,
) -> Result<()> {
    tb_sync::push(controller, provider)
        .await
        .with_context(|| format!("failed to upload to {}", provider.name()))?;
    writeln!(writer, "Uploaded backup to {}", provider.name())?;
    Ok(())
}

pub async fn pull<W: Write>(
    writer: &mut W,
    controller: &SharedController,
    provider: &dyn SyncProvider,
) -> Result<()> {
    let restored = tb_sync::pull(controller, provider)
        .await
        .with_context(|| format!("failed to restore from {}", provider.name()))?;
    if restored {
        writeln!(writer, "Restored backup from {}", provider.name())?;
    } else {
        writeln!(writer, "No backup found at {}", provider.name())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Arc, Mutex};

    use insta::assert_snapshot;
    use tb_core::AccountKind;
    use tb_sync::DirectorySyncProvider;

    use crate::commands::testing::controller;

    fn shared(kind: AccountKind) -> SharedController {
        Arc::new(Mutex::new(controller(kind).0))
    }

    #[tokio::test]
    async fn push_then_pull_through_a_directory() {
        let temp = tempfile::tempdir().unwrap();
        let provider = DirectorySyncProvider::new(temp.path());

        let target = shared(AccountKind::Meter);
        let mut output = Vec::new();
        pull(&mut output, &target, &provider).await.unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @"No backup found at directory");

        let source = shared(AccountKind::Meter);
        source
            .lock()
            .unwrap()
            .add_meter("Reading", Some(0.5))
            .unwrap();
        let mut output = Vec::new();
        push(&mut output, &source, &provider).await.unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @"Uploaded backup to directory");

        let mut output = Vec::new();
        pull(&mut output, &target, &provider).await.unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @"Restored backup from directory");
        assert_eq!(target.lock().unwrap().meters().len(), 3);
    }

    #[tokio::test]
    async fn missing_directory_is_reported() {
        let temp = tempfile::tempdir().unwrap();
        let provider = DirectorySyncProvider::new(temp.path().join("absent"));
        let mut output = Vec::new();
        let err = push(&mut output, &shared(AccountKind::Meter), &provider)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("not signed in to directory"));
    }
}
