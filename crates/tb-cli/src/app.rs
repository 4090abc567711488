//! Wiring of storage, controller and sync provider from configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use tb_core::AccountController;
use tb_core::defaults::StaticDefaults;
use tb_core::settings::{SettingsProvider, StoredSettings};
use tb_core::storage::{SharedStore, shared};
use tb_db::SqliteStore;
use tb_sync::{DirectorySyncProvider, HttpSyncProvider, ProviderRegistry, SyncProvider};

use crate::config::{Config, SyncConfig};
use crate::notifier::ConsoleNotifier;

/// An opened account.
pub struct App {
    pub controller: AccountController,
    pub store: SharedStore,
}

impl App {
    /// Opens the database named by `config` and loads the account.
    pub fn open(config: &Config) -> Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create database directory")?;
        }
        let db = SqliteStore::open(&config.database_path).with_context(|| {
            format!("failed to open {}", config.database_path.display())
        })?;
        Self::with_store(config, shared(db))
    }

    /// Loads the account from an already opened store.
    pub fn with_store(config: &Config, store: SharedStore) -> Result<Self> {
        let mut settings = StoredSettings::load(Arc::clone(&store));
        let notifier = console_notifier(config, &mut settings);

        let mut builder = AccountController::builder(Arc::clone(&store))
            .kind(config.kind)
            .settings(settings)
            .notifier(notifier);
        if !config.meters.is_empty() {
            builder = builder.defaults(StaticDefaults::new(config.meters.clone()));
        }

        let mut controller = builder.build();
        controller.load().context("failed to load account")?;
        Ok(Self { controller, store })
    }
}

/// Notifier enabled by the config or the stored setting. Unless the config
/// forces it on, later setting changes switch it.
fn console_notifier(config: &Config, settings: &mut StoredSettings) -> ConsoleNotifier {
    let stored = settings.settings().browser_notifications_enabled;
    let notifier = ConsoleNotifier::new(config.notifications || stored);
    if !config.notifications {
        let switch = notifier.clone();
        settings.on_change(move |settings| {
            tracing::debug!(
                enabled = settings.browser_notifications_enabled,
                "notification setting changed"
            );
            switch.set_enabled(settings.browser_notifications_enabled);
        });
    }
    notifier
}

/// Registers every provider `config` describes.
pub fn provider_registry(config: &SyncConfig) -> Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();
    if let Some(url) = &config.url {
        let provider = HttpSyncProvider::new(url.clone(), config.token.clone())
            .context("failed to set up HTTP sync")?;
        registry.register(Arc::new(provider));
    }
    if let Some(dir) = &config.directory {
        registry.register(Arc::new(DirectorySyncProvider::new(dir.clone())));
    }
    Ok(registry)
}

/// The provider to sync with, or `None` when nothing is configured.
pub fn selected_provider(config: &SyncConfig) -> Result<Option<Arc<dyn SyncProvider>>> {
    let registry = provider_registry(config)?;
    let name = match &config.provider {
        Some(name) => name.clone(),
        None => match registry.names().next() {
            Some(name) => name.to_string(),
            None => return Ok(None),
        },
    };
    let provider = registry.get(&name)?;
    Ok(Some(provider))
}
