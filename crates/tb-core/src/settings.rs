//! User settings carried alongside the account.

use serde::{Deserialize, Serialize};

use crate::storage::{SETTINGS_KEY, SharedStore, lock};

/// Language used when none is set.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Persisted settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    #[serde(alias = "Language")]
    pub language: String,
    #[serde(alias = "TutorialCompleted")]
    pub tutorial_completed: bool,
    #[serde(alias = "BrowserNotificationsEnabled")]
    pub browser_notifications_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            tutorial_completed: false,
            browser_notifications_enabled: false,
        }
    }
}

/// Source of user settings consulted by export and import.
pub trait SettingsProvider: Send {
    fn settings(&self) -> Settings;

    fn set_language(&mut self, language: &str);

    fn set_tutorial_completed(&mut self, completed: bool);

    fn set_notifications_enabled(&mut self, enabled: bool);
}

type SettingsListener = Box<dyn Fn(&Settings) + Send>;

/// Settings persisted as one JSON blob in the key-value store.
pub struct StoredSettings {
    store: SharedStore,
    current: Settings,
    listeners: Vec<SettingsListener>,
}

impl StoredSettings {
    /// Reads settings from `store`. Missing or unreadable data yields defaults.
    pub fn load(store: SharedStore) -> Self {
        let current = match lock(&store).and_then(|guard| guard.get(SETTINGS_KEY)) {
            Ok(Some(json)) => serde_json::from_str::<Settings>(&json).unwrap_or_else(|error| {
                tracing::warn!(%error, "stored settings unreadable, using defaults");
                Settings::default()
            }),
            Ok(None) => Settings::default(),
            Err(error) => {
                tracing::warn!(%error, "failed to read settings, using defaults");
                Settings::default()
            }
        };
        let mut current = current;
        if current.language.trim().is_empty() {
            current.language = DEFAULT_LANGUAGE.to_string();
        }
        Self {
            store,
            current,
            listeners: Vec::new(),
        }
    }

    /// Registers a callback run after every effective change.
    pub fn on_change(&mut self, listener: impl Fn(&Settings) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn update(&mut self, apply: impl FnOnce(&mut Settings)) {
        let before = self.current.clone();
        apply(&mut self.current);
        if before == self.current {
            return;
        }
        self.save();
        for listener in &self.listeners {
            listener(&self.current);
        }
    }

    fn save(&self) {
        let json = match serde_json::to_string(&self.current) {
            Ok(json) => json,
            Err(error) => {
                tracing::warn!(%error, "failed to serialize settings");
                return;
            }
        };
        if let Err(error) = lock(&self.store).and_then(|mut guard| guard.set(SETTINGS_KEY, &json)) {
            tracing::warn!(%error, "failed to persist settings");
        }
    }
}

impl SettingsProvider for StoredSettings {
    fn settings(&self) -> Settings {
        self.current.clone()
    }

    fn set_language(&mut self, language: &str) {
        let language = language.trim();
        let language = if language.is_empty() {
            DEFAULT_LANGUAGE
        } else {
            language
        };
        self.update(|s| s.language = language.to_string());
    }

    fn set_tutorial_completed(&mut self, completed: bool) {
        self.update(|s| s.tutorial_completed = completed);
    }

    fn set_notifications_enabled(&mut self, enabled: bool) {
        self.update(|s| s.browser_notifications_enabled = enabled);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::storage::{MemoryStore, shared};

    #[test]
    fn missing_settings_use_defaults() {
        let settings = StoredSettings::load(shared(MemoryStore::new()));
        assert_eq!(settings.settings(), Settings::default());
    }

    #[test]
    fn corrupt_settings_use_defaults() {
        let store = shared(MemoryStore::with_entry(SETTINGS_KEY, "{not json"));
        let settings = StoredSettings::load(store);
        assert_eq!(settings.settings().language, "en");
    }

    #[test]
    fn changes_persist_and_notify_once() {
        let store = shared(MemoryStore::new());
        let mut settings = StoredSettings::load(store.clone());
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        settings.on_change(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        settings.set_language("de");
        settings.set_language("de");
        settings.set_tutorial_completed(true);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let reloaded = StoredSettings::load(store);
        assert_eq!(reloaded.settings().language, "de");
        assert!(reloaded.settings().tutorial_completed);
    }

    #[test]
    fn blank_language_falls_back_to_default() {
        let mut settings = StoredSettings::load(shared(MemoryStore::new()));
        settings.set_language("fr");
        settings.set_language("  ");
        assert_eq!(settings.settings().language, "en");
    }
}
