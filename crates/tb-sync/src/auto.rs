//! Automatic backup and restore.
//!
//! Local changes are debounced and then uploaded. Independently, the remote
//! modification time is polled; when it moves more than a second past the
//! last known value the remote backup is imported. Imports performed by the
//! service set a `restoring` flag so that their own change notifications do
//! not trigger an upload.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tb_core::SubscriptionId;
use tb_core::storage::{SharedStore, lock};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::{SharedController, SyncError, SyncProvider, lock_controller};

const LAST_SYNC_KEY_PREFIX: &str = "timebank_autosync_lastsync_";

/// Milliseconds the remote time must move past the last known one to count
/// as a remote change.
const REMOTE_TOLERANCE_MS: i64 = 1_000;

/// Storage key holding the last successful sync time for `provider`.
pub fn last_sync_key(provider: &str) -> String {
    format!("{LAST_SYNC_KEY_PREFIX}{provider}")
}

/// Timing of the auto-sync loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoSyncConfig {
    /// Quiet period after the last local change before uploading.
    pub debounce: Duration,
    /// Interval between remote change checks.
    pub poll_interval: Duration,
}

impl Default for AutoSyncConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(1),
            poll_interval: Duration::from_secs(30),
        }
    }
}

/// Outcome of the most recent sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Idle,
    Syncing,
    Success,
    Failed,
}

/// Entry point for the auto-sync service.
pub struct AutoSync;

impl AutoSync {
    /// Starts syncing `controller` with `provider`.
    ///
    /// Fails when the provider is not signed in. The returned handle stops
    /// the service when dropped or when [`AutoSyncHandle::stop`] is awaited.
    pub async fn start(
        controller: SharedController,
        provider: Arc<dyn SyncProvider>,
        store: SharedStore,
        config: AutoSyncConfig,
    ) -> Result<AutoSyncHandle, SyncError> {
        if !provider.is_authenticated().await {
            return Err(SyncError::NotAuthenticated {
                provider: provider.name().to_string(),
            });
        }

        let last_sync = read_last_sync(&store, provider.name());
        let last_remote = match last_sync {
            Some(at) => Some(at),
            // Never synced: only remote changes from now on count.
            None => provider.last_modified().await.unwrap_or_else(|error| {
                tracing::warn!(provider = provider.name(), %error, "failed to read remote time");
                None
            }),
        };

        let restoring = Arc::new(AtomicBool::new(false));
        let (changes_tx, changes_rx) = mpsc::unbounded_channel();
        let subscription = {
            let restoring = restoring.clone();
            lock_controller(&controller)?.subscribe(move |_| {
                if !restoring.load(Ordering::SeqCst) {
                    let _ = changes_tx.send(());
                }
            })
        };

        let (status_tx, status_rx) = watch::channel(SyncStatus::Idle);
        let shutdown = CancellationToken::new();
        let worker = Worker {
            controller: controller.clone(),
            provider,
            store,
            config,
            status: status_tx,
            restoring,
            last_sync,
            last_remote,
            changes: changes_rx,
            shutdown: shutdown.clone(),
        };
        tracing::info!(provider = worker.provider.name(), ?last_sync, "auto-sync enabled");
        let task = tokio::spawn(worker.run());

        Ok(AutoSyncHandle {
            status: status_rx,
            guard: shutdown.drop_guard(),
            task,
            controller,
            subscription,
        })
    }
}

/// Running auto-sync service.
pub struct AutoSyncHandle {
    status: watch::Receiver<SyncStatus>,
    guard: DropGuard,
    task: JoinHandle<()>,
    controller: SharedController,
    subscription: SubscriptionId,
}

impl AutoSyncHandle {
    pub fn status(&self) -> SyncStatus {
        *self.status.borrow()
    }

    /// `false` once the service gave up, e.g. after losing authentication.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops both loops and detaches from the controller.
    pub async fn stop(self) {
        let Self {
            guard,
            task,
            controller,
            subscription,
            ..
        } = self;
        drop(guard);
        if let Err(error) = task.await {
            tracing::warn!(%error, "auto-sync task ended abnormally");
        }
        match lock_controller(&controller) {
            Ok(mut controller) => {
                controller.unsubscribe(subscription);
            }
            Err(error) => tracing::warn!(%error, "could not unsubscribe auto-sync"),
        }
    }
}

fn read_last_sync(store: &SharedStore, provider: &str) -> Option<DateTime<Utc>> {
    let raw = match lock(store).and_then(|guard| guard.get(&last_sync_key(provider))) {
        Ok(raw) => raw?,
        Err(error) => {
            tracing::warn!(provider, %error, "failed to read last sync time");
            return None;
        }
    };
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .inspect_err(|error| tracing::warn!(provider, %error, "ignoring stored last sync time"))
        .ok()
}

struct Worker {
    controller: SharedController,
    provider: Arc<dyn SyncProvider>,
    store: SharedStore,
    config: AutoSyncConfig,
    status: watch::Sender<SyncStatus>,
    restoring: Arc<AtomicBool>,
    last_sync: Option<DateTime<Utc>>,
    last_remote: Option<DateTime<Utc>>,
    changes: mpsc::UnboundedReceiver<()>,
    shutdown: CancellationToken,
}

impl Worker {
    async fn run(mut self) {
        let mut poll = tokio::time::interval_at(
            Instant::now() + self.config.poll_interval,
            self.config.poll_interval,
        );
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut upload_at: Option<Instant> = None;

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                Some(()) = self.changes.recv() => {
                    upload_at = Some(Instant::now() + self.config.debounce);
                }
                () = tokio::time::sleep_until(upload_at.unwrap_or_else(Instant::now)), if upload_at.is_some() => {
                    upload_at = None;
                    if !self.upload().await {
                        break;
                    }
                }
                _ = poll.tick() => self.check_remote().await,
            }
        }
        tracing::debug!(
            provider = self.provider.name(),
            last_sync = ?self.last_sync,
            "auto-sync stopped"
        );
    }

    fn set_status(&self, status: SyncStatus) {
        self.status.send_replace(status);
    }

    /// Uploads the current export. Returns `false` when the service must stop.
    async fn upload(&mut self) -> bool {
        if self.restoring.load(Ordering::SeqCst) {
            return true;
        }
        self.set_status(SyncStatus::Syncing);

        if !self.provider.is_authenticated().await {
            tracing::warn!(provider = self.provider.name(), "signed out, disabling auto-sync");
            self.set_status(SyncStatus::Failed);
            return false;
        }

        let exported = lock_controller(&self.controller).and_then(|c| Ok(c.export_data()?));
        let result = match exported {
            Ok(json) => self.provider.upload(&json).await,
            Err(error) => Err(error),
        };
        if let Err(error) = result {
            tracing::warn!(provider = self.provider.name(), %error, "auto-sync upload failed");
            self.set_status(SyncStatus::Failed);
            return true;
        }

        match self.provider.last_modified().await {
            Ok(Some(modified)) => self.last_remote = Some(modified),
            Ok(None) => {}
            Err(error) => tracing::debug!(%error, "remote time unavailable after upload"),
        }
        self.record_sync();
        self.set_status(SyncStatus::Success);
        tracing::info!(provider = self.provider.name(), "backup uploaded");
        true
    }

    async fn check_remote(&mut self) {
        if self.restoring.load(Ordering::SeqCst) || !self.provider.is_authenticated().await {
            return;
        }
        let remote = match self.provider.last_modified().await {
            Ok(Some(remote)) => remote,
            Ok(None) => return,
            Err(error) => {
                tracing::warn!(provider = self.provider.name(), %error, "remote check failed");
                return;
            }
        };
        let tolerance = chrono::Duration::milliseconds(REMOTE_TOLERANCE_MS);
        let newer = self
            .last_remote
            .is_none_or(|known| remote > known + tolerance);
        if newer {
            tracing::info!(?remote, known = ?self.last_remote, "remote backup changed");
            self.restore(remote).await;
        }
    }

    async fn restore(&mut self, remote: DateTime<Utc>) {
        self.restoring.store(true, Ordering::SeqCst);
        self.set_status(SyncStatus::Syncing);

        let result = match self.provider.download().await {
            Ok(Some(json)) => lock_controller(&self.controller)
                .and_then(|mut c| Ok(c.import_data(&json)?))
                .map(|()| true),
            Ok(None) => Ok(false),
            Err(error) => Err(error),
        };

        match result {
            Ok(true) => {
                self.last_remote = Some(remote);
                self.record_sync();
                self.set_status(SyncStatus::Success);
                tracing::info!(provider = self.provider.name(), "backup restored");
            }
            Ok(false) => self.set_status(SyncStatus::Idle),
            Err(error) => {
                tracing::warn!(provider = self.provider.name(), %error, "restore failed");
                self.set_status(SyncStatus::Failed);
            }
        }
        self.restoring.store(false, Ordering::SeqCst);
    }

    fn record_sync(&mut self) {
        let now = Utc::now();
        self.last_sync = Some(now);
        let key = last_sync_key(self.provider.name());
        let value = now.to_rfc3339();
        if let Err(error) = lock(&self.store).and_then(|mut guard| guard.set(&key, &value)) {
            tracing::warn!(%error, "failed to persist last sync time");
        }
    }
}
