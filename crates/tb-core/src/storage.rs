//! Key-value storage contract used for snapshots and settings.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

/// Key under which the account snapshot is stored.
pub const ACCOUNT_KEY: &str = "timebank_account";

/// Key under which settings are stored.
pub const SETTINGS_KEY: &str = "timebank_settings";

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing store failed.
    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Another holder of the store panicked.
    #[error("storage lock poisoned")]
    Poisoned,
}

/// String blobs under fixed keys.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// A store shared between the controller, the save worker and settings.
pub type SharedStore = Arc<Mutex<dyn KeyValueStore>>;

/// Wraps a store for sharing.
pub fn shared<S: KeyValueStore + 'static>(store: S) -> SharedStore {
    Arc::new(Mutex::new(store))
}

/// Locks a shared store, mapping poisoning to [`StorageError::Poisoned`].
pub fn lock(store: &SharedStore) -> Result<MutexGuard<'_, dyn KeyValueStore + 'static>, StorageError> {
    store.lock().map_err(|_| StorageError::Poisoned)
}

/// Volatile store, mostly for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with one entry.
    pub fn with_entry(key: &str, value: &str) -> Self {
        let mut store = Self::new();
        store.entries.insert(key.to_string(), value.to_string());
        store
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}
