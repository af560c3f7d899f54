use std::sync::Arc;

use location_state_kv::Storage;
use serde_json::Value;
use tracing::warn;

use super::{Store, StoreCore, Subscription};
use crate::config::DEFAULT_STORAGE_PREFIX;
use crate::defer::Defer;
use crate::error::Result;
use crate::serializer::{JsonSerializer, Serializer};
use crate::value::{Listener, StateMap};

/// Store persisted to a `Storage` under `prefix + navigation key`.
///
/// Writes go through on every `set` and on `save`. Unreadable entries and
/// storage failures are logged and treated as empty state.
pub struct StorageStore {
    core: StoreCore,
    storage: Arc<dyn Storage>,
    serializer: Arc<dyn Serializer>,
    prefix: String,
}

impl StorageStore {
    /// Store over `storage` with the default prefix and JSON encoding.
    pub fn new(storage: Arc<dyn Storage>, defer: Arc<dyn Defer>) -> Self {
        Self {
            core: StoreCore::new(defer),
            storage,
            serializer: Arc::new(JsonSerializer),
            prefix: DEFAULT_STORAGE_PREFIX.to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = serializer;
        self
    }

    /// Storage key for navigation key `key`.
    pub fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn read(&self, key: &str) -> Result<StateMap> {
        match self.storage.get_item(&self.storage_key(key))? {
            Some(raw) => self.serializer.deserialize(&raw),
            None => Ok(StateMap::new()),
        }
    }

    fn write(&self, key: &str, state: &StateMap) -> Result<()> {
        let storage_key = self.storage_key(key);
        if state.is_empty() {
            self.storage.remove_item(&storage_key)?;
        } else {
            let raw = self.serializer.serialize(state)?;
            self.storage.set_item(&storage_key, &raw)?;
        }
        Ok(())
    }
}

impl Store for StorageStore {
    fn get(&self, name: &str) -> Option<Value> {
        self.core.get(name)
    }

    fn set(&self, name: &str, value: Option<Value>) {
        self.core.put(name, value);
        self.save();
        self.core.notify(name);
    }

    fn subscribe(&self, name: &str, listener: Listener) -> Subscription {
        self.core.subscribe(name, listener)
    }

    fn load(&self, key: Option<&str>) {
        let Some(key) = key else { return };
        if !self.core.swap_key(key) {
            return;
        }
        let state = self.read(key).unwrap_or_else(|e| {
            warn!(
                "StorageStore: discarding state of {}: {e}",
                self.storage_key(key)
            );
            StateMap::new()
        });
        self.core.replace(state);
        self.core.notify_all_deferred();
    }

    fn save(&self) {
        let Some(key) = self.core.loaded_key() else {
            return;
        };
        if let Err(e) = self.write(&key, &self.core.snapshot()) {
            warn!(
                "StorageStore: failed to save {}: {e}",
                self.storage_key(&key)
            );
        }
    }

    fn snapshot(&self) -> StateMap {
        self.core.snapshot()
    }

    fn loaded_key(&self) -> Option<String> {
        self.core.loaded_key()
    }
}
