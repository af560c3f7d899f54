use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::error::KVError;
use crate::traits::Storage;

/// MemoryStorage keeps entries for the lifetime of the process, like a
/// browser tab's session storage. Entries are lost on restart.
#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().unwrap().keys().cloned().collect()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, KVError> {
        Ok(self.entries.read().unwrap().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), KVError> {
        self.entries
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), KVError> {
        self.entries.write().unwrap().remove(key);
        Ok(())
    }
}
