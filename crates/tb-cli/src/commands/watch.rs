//! Watch command: device signals from a line stream, with auto-sync.

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use tb_core::device::{DeviceSignal, apply_device_signal};
use tb_core::storage::SharedStore;
use tb_sync::{AutoSync, AutoSyncConfig, SharedController, SyncProvider};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Auto-sync settings for [`serve`].
pub struct SyncSetup {
    pub provider: Arc<dyn SyncProvider>,
    pub store: SharedStore,
    pub timing: AutoSyncConfig,
}

/// Applies every signal line from `reader` until it ends.
///
/// Blank lines and lines starting with `#` are skipped. Bad lines and
/// rejected signals are reported and do not stop the loop. Returns the number
/// of signals applied.
pub async fn run<R, W>(reader: R, writer: &mut W, controller: &SharedController) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = reader.lines();
    let mut applied = 0;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let signal = match line.parse::<DeviceSignal>() {
            Ok(signal) => signal,
            Err(err) => {
                tracing::warn!(line, %err, "skipping device line");
                writeln!(writer, "{line} -> {err}")?;
                continue;
            }
        };

        let outcome = {
            let mut guard = controller
                .lock()
                .map_err(|_| anyhow::anyhow!("account controller lock poisoned"))?;
            apply_device_signal(&mut guard, signal)
        };
        match outcome {
            Ok(outcome) => {
                applied += 1;
                tracing::debug!(?signal, %outcome, "device signal applied");
                writeln!(writer, "{line} -> {outcome}")?;
            }
            Err(err) => {
                tracing::warn!(?signal, %err, "device signal rejected");
                writeln!(writer, "{line} -> error: {err}")?;
            }
        }
        writer.flush()?;
    }
    Ok(applied)
}

/// Runs [`run`], with auto-sync alongside when `sync` is given.
///
/// A provider that is not signed in leaves sync off; signals are still
/// applied.
pub async fn serve<R, W>(
    reader: R,
    writer: &mut W,
    controller: &SharedController,
    sync: Option<SyncSetup>,
) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let handle = match sync {
        Some(setup) => {
            let name = setup.provider.name().to_string();
            match AutoSync::start(
                Arc::clone(controller),
                setup.provider,
                setup.store,
                setup.timing,
            )
            .await
            {
                Ok(handle) => {
                    writeln!(writer, "auto-sync with {name} started")?;
                    Some(handle)
                }
                Err(err) => {
                    tracing::warn!(provider = %name, %err, "auto-sync not started");
                    writeln!(writer, "auto-sync disabled: {err}")?;
                    None
                }
            }
        }
        None => None,
    };

    let result = run(reader, writer, controller).await;

    if let Some(handle) = handle {
        let status = handle.status();
        handle.stop().await;
        tracing::info!(?status, "auto-sync stopped");
    }
    result
}
