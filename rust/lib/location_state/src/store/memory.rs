use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use super::{Store, StoreCore, Subscription};
use crate::defer::Defer;
use crate::value::{Listener, StateMap};

/// Store whose backing medium is a map owned by the store itself.
///
/// State survives navigation within the process but not a restart. Useful
/// for ephemeral scoping and as a test double.
pub struct MemoryStore {
    core: StoreCore,
    entries: RwLock<HashMap<String, StateMap>>,
}

impl MemoryStore {
    pub fn new(defer: Arc<dyn Defer>) -> Self {
        Self {
            core: StoreCore::new(defer),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Saved state for `key`.
    pub fn entry(&self, key: &str) -> Option<StateMap> {
        self.entries.read().unwrap().get(key).cloned()
    }
}

impl Store for MemoryStore {
    fn get(&self, name: &str) -> Option<Value> {
        self.core.get(name)
    }

    fn set(&self, name: &str, value: Option<Value>) {
        self.core.put(name, value);
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
        let state = self.entry(key).unwrap_or_default();
        self.core.replace(state);
        self.core.notify_all_deferred();
    }

    fn save(&self) {
        let Some(key) = self.core.loaded_key() else {
            return;
        };
        let state = self.core.snapshot();
        let mut entries = self.entries.write().unwrap();
        if state.is_empty() {
            entries.remove(&key);
        } else {
            entries.insert(key, state);
        }
    }

    fn snapshot(&self) -> StateMap {
        self.core.snapshot()
    }

    fn loaded_key(&self) -> Option<String> {
        self.core.loaded_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defer::MicrotaskQueue;
    use crate::value::listener;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn setup() -> (Arc<MicrotaskQueue>, MemoryStore) {
        let queue = Arc::new(MicrotaskQueue::new());
        let store = MemoryStore::new(queue.clone());
        (queue, store)
    }

    fn count_calls(store: &MemoryStore, name: &str) -> Arc<AtomicU64> {
        let count = Arc::new(AtomicU64::new(0));
        let count_c = count.clone();
        let _ = store.subscribe(
            name,
            listener(move || {
                count_c.fetch_add(1, Ordering::Relaxed);
            }),
        );
        count
    }

    // ========================================================================
    // get / set
    // ========================================================================

    #[test]
    fn get_missing_is_none() {
        let (_queue, store) = setup();
        assert_eq!(store.get("foo"), None);
    }

    #[test]
    fn set_then_get() {
        let (_queue, store) = setup();
        store.set("foo", Some(json!({"a": [1, 2]})));
        assert_eq!(store.get("foo"), Some(json!({"a": [1, 2]})));
    }

    #[test]
    fn set_notifies_synchronously() {
        let (_queue, store) = setup();
        let calls = count_calls(&store, "foo");
        let other = count_calls(&store, "bar");

        store.set("foo", Some(json!(1)));
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(other.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn set_none_deletes_and_notifies() {
        let (_queue, store) = setup();
        store.set("foo", Some(json!("v")));
        let calls = count_calls(&store, "foo");

        store.set("foo", None);
        assert_eq!(store.get("foo"), None);
        assert!(!store.snapshot().contains_key("foo"));
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let (_queue, store) = setup();
        let count = Arc::new(AtomicU64::new(0));
        let count_c = count.clone();
        let sub = store.subscribe(
            "foo",
            listener(move || {
                count_c.fetch_add(1, Ordering::Relaxed);
            }),
        );

        store.set("foo", Some(json!(1)));
        sub.unsubscribe();
        store.set("foo", Some(json!(2)));
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    // ========================================================================
    // load / save
    // ========================================================================

    #[test]
    fn save_then_load_restores_per_key() {
        let (_queue, store) = setup();
        store.load(Some("k1"));
        store.set("foo", Some(json!("one")));
        store.save();

        store.load(Some("k2"));
        assert_eq!(store.get("foo"), None);
        store.set("foo", Some(json!("two")));
        store.save();

        store.load(Some("k1"));
        assert_eq!(store.get("foo"), Some(json!("one")));
        store.load(Some("k2"));
        assert_eq!(store.get("foo"), Some(json!("two")));
    }

    #[test]
    fn load_is_idempotent() {
        let (queue, store) = setup();
        let calls = count_calls(&store, "foo");

        store.load(Some("k1"));
        store.load(Some("k1"));
        queue.run_pending();
        assert_eq!(calls.load(Ordering::Relaxed), 1);

        store.load(Some("k1"));
        assert_eq!(queue.run_pending(), 0);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn load_notification_is_deferred() {
        let (queue, store) = setup();
        let calls = count_calls(&store, "foo");

        store.load(Some("k1"));
        assert_eq!(calls.load(Ordering::Relaxed), 0);
        queue.run_pending();
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn save_of_empty_state_removes_entry() {
        let (_queue, store) = setup();
        store.load(Some("k1"));
        store.set("foo", Some(json!(1)));
        store.save();
        assert!(store.entry("k1").is_some());

        store.set("foo", None);
        store.save();
        assert_eq!(store.entry("k1"), None);
    }

    #[test]
    fn save_without_load_is_noop() {
        let (_queue, store) = setup();
        store.set("foo", Some(json!(1)));
        store.save();
        assert_eq!(store.loaded_key(), None);
        assert_eq!(store.entry(""), None);
    }

    #[test]
    fn load_none_keeps_state() {
        let (_queue, store) = setup();
        store.set("foo", Some(json!(1)));
        store.load(None);
        assert_eq!(store.get("foo"), Some(json!(1)));
    }
}
