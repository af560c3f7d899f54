//! Navigation-scoped slice containers.
//!
//! Every backend implements `Store`; the provider selects them by name.
//!
//! - `set(name, value)` updates a slice and notifies its listeners at once.
//! - `load(key)` swaps in the state saved for a navigation key and notifies
//!   every listener through the store's `Defer`.
//! - `save()` writes the state back under the loaded key.

pub mod memory;
pub mod storage;
pub mod url;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use serde_json::Value;

use crate::defer::Defer;
use crate::value::{Listener, StateMap, SubscriptionId, listener_addr};

pub use memory::MemoryStore;
pub use storage::StorageStore;
pub use url::UrlStore;

/// Shared contract of every store backend.
pub trait Store: Send + Sync {
    /// Current value of slice `name`.
    fn get(&self, name: &str) -> Option<Value>;

    /// Assign slice `name`; `None` removes it. Listeners of `name` fire
    /// synchronously in both cases.
    fn set(&self, name: &str, value: Option<Value>);

    fn subscribe(&self, name: &str, listener: Listener) -> Subscription;

    /// Switch to navigation key `key`. Loading the key that is already
    /// loaded does nothing.
    fn load(&self, key: Option<&str>);

    /// Persist the current state under the loaded key.
    fn save(&self);

    /// Copy of the in-process state.
    fn snapshot(&self) -> StateMap;

    /// Key of the last `load`, if any.
    fn loaded_key(&self) -> Option<String>;
}

/// Registration handle returned by `Store::subscribe`.
///
/// Dropping it keeps the listener registered; call `unsubscribe`.
#[derive(Debug)]
pub struct Subscription {
    listeners: Weak<Listeners>,
    name: String,
    id: SubscriptionId,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn unsubscribe(self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.remove(&self.name, self.id);
        }
    }
}

/// Per-store listener registry: slice name to its set of listeners.
#[derive(Default)]
pub(crate) struct Listeners {
    by_name: RwLock<HashMap<String, Vec<(SubscriptionId, Listener)>>>,
    next_id: AtomicU64,
}

impl Listeners {
    fn add(self: &Arc<Self>, name: &str, listener: Listener) -> Subscription {
        let mut by_name = self.by_name.write().unwrap();
        let set = by_name.entry(name.to_string()).or_default();
        let id = match set
            .iter()
            .find(|(_, l)| listener_addr(l) == listener_addr(&listener))
        {
            Some((id, _)) => *id,
            None => {
                let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
                set.push((id, listener));
                id
            }
        };
        Subscription {
            listeners: Arc::downgrade(self),
            name: name.to_string(),
            id,
        }
    }

    fn remove(&self, name: &str, id: SubscriptionId) {
        let mut by_name = self.by_name.write().unwrap();
        if let Some(set) = by_name.get_mut(name) {
            set.retain(|(i, _)| *i != id);
            if set.is_empty() {
                by_name.remove(name);
            }
        }
    }

    fn notify(&self, name: &str) {
        let listeners: Vec<Listener> = match self.by_name.read().unwrap().get(name) {
            Some(set) => set.iter().map(|(_, l)| Arc::clone(l)).collect(),
            None => return,
        };
        for listener in listeners {
            listener();
        }
    }

    fn notify_all(&self) {
        let listeners: Vec<Listener> = self
            .by_name
            .read()
            .unwrap()
            .values()
            .flat_map(|set| set.iter().map(|(_, l)| Arc::clone(l)))
            .collect();
        for listener in listeners {
            listener();
        }
    }

    /// Number of slice names with at least one listener.
    #[cfg(test)]
    pub(crate) fn names(&self) -> usize {
        self.by_name.read().unwrap().len()
    }

    #[cfg(test)]
    pub(crate) fn count(&self, name: &str) -> usize {
        self.by_name
            .read()
            .unwrap()
            .get(name)
            .map_or(0, |set| set.len())
    }
}

/// State, loaded key and listeners shared by all backends.
pub(crate) struct StoreCore {
    state: RwLock<StateMap>,
    key: RwLock<Option<String>>,
    listeners: Arc<Listeners>,
    defer: Arc<dyn Defer>,
}

impl StoreCore {
    pub(crate) fn new(defer: Arc<dyn Defer>) -> Self {
        Self {
            state: RwLock::new(StateMap::new()),
            key: RwLock::new(None),
            listeners: Arc::new(Listeners::default()),
            defer,
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<Value> {
        self.state.read().unwrap().get(name).cloned()
    }

    /// Update the slice without notifying.
    pub(crate) fn put(&self, name: &str, value: Option<Value>) {
        let mut state = self.state.write().unwrap();
        match value {
            Some(value) => {
                state.insert(name.to_string(), value);
            }
            None => {
                state.remove(name);
            }
        }
    }

    pub(crate) fn notify(&self, name: &str) {
        self.listeners.notify(name);
    }

    /// Notify every listener once the current call stack has unwound.
    pub(crate) fn notify_all_deferred(&self) {
        let listeners = Arc::clone(&self.listeners);
        self.defer.defer(Box::new(move || listeners.notify_all()));
    }

    pub(crate) fn subscribe(&self, name: &str, listener: Listener) -> Subscription {
        self.listeners.add(name, listener)
    }

    pub(crate) fn replace(&self, state: StateMap) {
        *self.state.write().unwrap() = state;
    }

    pub(crate) fn snapshot(&self) -> StateMap {
        self.state.read().unwrap().clone()
    }

    pub(crate) fn loaded_key(&self) -> Option<String> {
        self.key.read().unwrap().clone()
    }

    /// Record `key` as loaded. Returns false if it already was.
    pub(crate) fn swap_key(&self, key: &str) -> bool {
        let mut current = self.key.write().unwrap();
        if current.as_deref() == Some(key) {
            return false;
        }
        *current = Some(key.to_string());
        true
    }

    #[cfg(test)]
    pub(crate) fn listeners(&self) -> &Listeners {
        &self.listeners
    }
}
