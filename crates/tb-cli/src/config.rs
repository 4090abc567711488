//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use tb_core::{AccountKind, MeterTemplate};
use tb_sync::AutoSyncConfig;

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// Which flavour of account to keep.
    #[serde(default)]
    pub kind: AccountKind,

    /// Print notifications to stderr.
    #[serde(default)]
    pub notifications: bool,

    /// Meters created for a fresh account. Empty means the built-in set.
    #[serde(default)]
    pub meters: Vec<MeterTemplate>,

    #[serde(default)]
    pub sync: SyncConfig,
}

/// Backup settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Provider name. When unset, the only configured provider is used.
    pub provider: Option<String>,

    /// Backup URL for the HTTP provider.
    pub url: Option<String>,

    /// Bearer token for the HTTP provider.
    pub token: Option<String>,

    /// Synced directory for the directory provider.
    pub directory: Option<PathBuf>,

    pub debounce_ms: u64,

    pub poll_interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let timing = AutoSyncConfig::default();
        Self {
            provider: None,
            url: None,
            token: None,
            directory: None,
            debounce_ms: u64::try_from(timing.debounce.as_millis()).unwrap_or(1_000),
            poll_interval_secs: timing.poll_interval.as_secs(),
        }
    }
}

impl SyncConfig {
    /// `true` when any provider is configured.
    pub const fn is_configured(&self) -> bool {
        self.url.is_some() || self.directory.is_some()
    }

    pub const fn timing(&self) -> AutoSyncConfig {
        AutoSyncConfig {
            debounce: Duration::from_millis(self.debounce_ms),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
        }
    }
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("provider", &self.provider)
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("directory", &self.directory)
            .field("debounce_ms", &self.debounce_ms)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .finish()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("kind", &self.kind)
            .field("notifications", &self.notifications)
            .field("meters", &self.meters)
            .field("sync", &self.sync)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("tb.db"),
            kind: AccountKind::default(),
            notifications: false,
            meters: Vec::new(),
            sync: SyncConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Later sources win: defaults, `~/.config/tb/config.toml`, the given
    /// file, then `TB_*` variables (`TB_SYNC__TOKEN` for nested keys).
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("TB_").split("__"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for tb.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tb"))
}

/// Returns the platform-specific data directory for tb.
///
/// On Linux: `~/.local/share/tb`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("tb"))
}
