//! Remote backup for timebank.
//!
//! Providers store one export blob somewhere else: an HTTP endpoint or a
//! directory that some other tool keeps in sync. [`AutoSync`] uploads after
//! local changes settle and restores when the remote copy moves ahead.
//!
//! The account controller is shared as `Arc<std::sync::Mutex<_>>`. Its
//! guard is never held across an `.await`.

mod auto;
mod directory;
mod http;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tb_core::{AccountController, AccountError};
use thiserror::Error;

pub use auto::{AutoSync, AutoSyncConfig, AutoSyncHandle, SyncStatus, last_sync_key};
pub use directory::{BACKUP_FILE_NAME, DirectorySyncProvider};
pub use http::HttpSyncProvider;

/// Sync errors.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The provider has no credentials or target.
    #[error("not signed in to {provider}")]
    NotAuthenticated { provider: String },
    /// No provider with this name is registered.
    #[error("sync provider {0:?} not found")]
    UnknownProvider(String),
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The remote answered with an error status.
    #[error("{method} {url} returned {status}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
    },
    /// Reading or writing the backup file failed.
    #[error("backup file error: {0}")]
    Io(#[from] std::io::Error),
    /// The account rejected the data.
    #[error(transparent)]
    Account(#[from] AccountError),
    /// The remote reported an unreadable modification time.
    #[error("invalid remote timestamp {value:?}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    /// Another holder of the controller panicked.
    #[error("account controller lock poisoned")]
    ControllerPoisoned,
}

/// A remote location holding one backup.
#[async_trait]
pub trait SyncProvider: Send + Sync {
    /// Name used in configuration and in sync bookkeeping keys.
    fn name(&self) -> &str;

    async fn is_authenticated(&self) -> bool;

    /// The stored backup, or `None` when there is none.
    async fn download(&self) -> Result<Option<String>, SyncError>;

    async fn upload(&self, json: &str) -> Result<(), SyncError>;

    /// When the backup last changed, or `None` when there is none.
    async fn last_modified(&self) -> Result<Option<DateTime<Utc>>, SyncError>;
}

/// The controller as shared between the CLI and the sync tasks.
pub type SharedController = Arc<Mutex<AccountController>>;

pub(crate) fn lock_controller(
    controller: &SharedController,
) -> Result<MutexGuard<'_, AccountController>, SyncError> {
    controller.lock().map_err(|_| SyncError::ControllerPoisoned)
}

/// Providers addressable by name.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn SyncProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a provider, replacing any with the same name.
    pub fn register(&mut self, provider: Arc<dyn SyncProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn SyncProvider>, SyncError> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| SyncError::UnknownProvider(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}

async fn ensure_authenticated(provider: &dyn SyncProvider) -> Result<(), SyncError> {
    if provider.is_authenticated().await {
        Ok(())
    } else {
        Err(SyncError::NotAuthenticated {
            provider: provider.name().to_string(),
        })
    }
}

/// Uploads the current export once.
pub async fn push(controller: &SharedController, provider: &dyn SyncProvider) -> Result<(), SyncError> {
    ensure_authenticated(provider).await?;
    let json = lock_controller(controller)?.export_data()?;
    provider.upload(&json).await?;
    tracing::info!(provider = provider.name(), bytes = json.len(), "backup uploaded");
    Ok(())
}

/// Replaces the account with the remote backup once.
///
/// Returns `false` when the remote holds no backup.
pub async fn pull(controller: &SharedController, provider: &dyn SyncProvider) -> Result<bool, SyncError> {
    ensure_authenticated(provider).await?;
    let Some(json) = provider.download().await?.filter(|s| !s.trim().is_empty()) else {
        tracing::info!(provider = provider.name(), "no remote backup");
        return Ok(false);
    };
    lock_controller(controller)?.import_data(&json)?;
    tracing::info!(provider = provider.name(), "backup restored");
    Ok(true)
}


#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::Utc;
    use tb_core::storage::{MemoryStore, shared};

    use super::testing::MemoryProvider;
    use super::*;

    fn controller() -> SharedController {
        let mut controller = AccountController::builder(shared(MemoryStore::new())).build();
        controller.load().unwrap();
        Arc::new(Mutex::new(controller))
    }

    #[tokio::test]
    async fn push_then_pull_moves_meters() {
        let source = controller();
        lock_controller(&source)
            .unwrap()
            .add_meter("Reading", Some(0.5))
            .unwrap();
        let provider = MemoryProvider::new();

        push(&source, &provider).await.unwrap();
        assert_eq!(provider.uploads(), 1);

        let target = controller();
        assert!(pull(&target, &provider).await.unwrap());
        let target = lock_controller(&target).unwrap();
        assert!(target.meters().find_by_name("Reading").is_some());
    }

    #[tokio::test]
    async fn pull_without_backup_changes_nothing() {
        let target = controller();
        let provider = MemoryProvider::new();
        assert!(!pull(&target, &provider).await.unwrap());
    }

    #[tokio::test]
    async fn unauthenticated_provider_is_refused() {
        let provider = MemoryProvider::new();
        provider.set_authenticated(false);
        let err = push(&controller(), &provider).await.unwrap_err();
        assert!(matches!(err, SyncError::NotAuthenticated { .. }));
    }

    #[tokio::test]
    async fn corrupt_remote_is_a_format_error() {
        let provider = MemoryProvider::new();
        provider.set_remote("{oops", Utc::now());
        let err = pull(&controller(), &provider).await.unwrap_err();
        assert!(matches!(err, SyncError::Account(AccountError::Format(_))));
    }

    #[test]
    fn registry_resolves_by_name() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(MemoryProvider::new()));
        assert!(registry.get("memory").is_ok());
        assert!(matches!(
            registry.get("drive"),
            Err(SyncError::UnknownProvider(name)) if name == "drive"
        ));
        assert_eq!(registry.names().collect::<Vec<_>>(), ["memory"]);
    }
}
