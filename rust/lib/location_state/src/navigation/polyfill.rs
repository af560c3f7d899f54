use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{
    CurrentEntryChangeEvent, EntryChangeHandler, Navigation, NavigationHistoryEntry,
    NavigationType, fresh_key,
};
use crate::error::Result;
use crate::event::EventListeners;
use crate::history::{History, Location, PopStateEvent, PopStateHandler};

/// Hidden field of the history state that carries the entry key.
pub const NAVIGATION_KEY_FIELD: &str = "__location_state_navigation_key";

const USER_STATE_FIELD: &str = "state";

/// Navigation primitive synthesized over a plain `History`.
///
/// Every entry's history state is wrapped as
/// `{ "__location_state_navigation_key": key, "state": <caller state> }`.
/// Push assigns a fresh key, replace keeps the current one, and traversal
/// reads it back from the wrapped state, so keys survive back/forward and a
/// reload of the host page.
///
/// All history mutation must go through the polyfill (it implements
/// `History` itself) for push/replace events to fire.
pub struct NavigationPolyfill {
    history: Arc<dyn History>,
    current: Mutex<NavigationHistoryEntry>,
    entries: Mutex<HashMap<String, NavigationHistoryEntry>>,
    entry_listeners: EventListeners<CurrentEntryChangeEvent>,
    pop_state_listeners: EventListeners<PopStateEvent>,
    signal: CancellationToken,
}

impl NavigationPolyfill {
    /// Wrap `history`, stamping the current entry with a key if it has none.
    pub fn new(history: Arc<dyn History>) -> Arc<Self> {
        let (key, user_state) = unwrap_state(history.state());
        let key = match key {
            Some(key) => key,
            None => {
                let key = fresh_key();
                debug!("NavigationPolyfill: stamping current entry with key {key}");
                if let Err(e) = history.replace_state(wrap_state(&key, user_state), None) {
                    warn!("NavigationPolyfill: failed to stamp current entry: {e}");
                }
                key
            }
        };
        let current = NavigationHistoryEntry {
            key: key.clone(),
            url: history.href(),
        };

        let signal = CancellationToken::new();
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            history.add_pop_state_listener(
                Arc::new(move |event: &PopStateEvent| {
                    if let Some(this) = weak.upgrade() {
                        this.on_pop_state(event);
                    }
                }),
                signal.clone(),
            );
            Self {
                history,
                current: Mutex::new(current.clone()),
                entries: Mutex::new(HashMap::from([(key, current)])),
                entry_listeners: EventListeners::new(),
                pop_state_listeners: EventListeners::new(),
                signal,
            }
        })
    }

    /// Announce a reload of the current entry. Hosts call this when the page
    /// is restored by a reload; the key is unchanged.
    pub fn reload(&self) {
        let from = self.current.lock().unwrap().clone();
        self.entry_listeners.dispatch(&CurrentEntryChangeEvent {
            navigation_type: NavigationType::Reload,
            from,
        });
    }

    /// Entry last seen under `key`.
    pub fn entry(&self, key: &str) -> Option<NavigationHistoryEntry> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn current_key(&self) -> Option<String> {
        unwrap_state(self.history.state()).0
    }

    /// Record the entry now current and return the one it replaced.
    fn advance(&self, key: String) -> NavigationHistoryEntry {
        let entry = NavigationHistoryEntry {
            key: key.clone(),
            url: self.history.href(),
        };
        self.entries.lock().unwrap().insert(key, entry.clone());
        std::mem::replace(&mut *self.current.lock().unwrap(), entry)
    }

    fn on_pop_state(&self, event: &PopStateEvent) {
        let (key, user_state) = unwrap_state(event.state.clone());
        let key = key.unwrap_or_else(|| {
            // An entry created behind the polyfill's back: adopt it.
            let key = fresh_key();
            if let Err(e) = self
                .history
                .replace_state(wrap_state(&key, user_state.clone()), None)
            {
                warn!("NavigationPolyfill: failed to stamp traversed entry: {e}");
            }
            key
        });
        let from = self.advance(key);
        self.entry_listeners.dispatch(&CurrentEntryChangeEvent {
            navigation_type: NavigationType::Traverse,
            from,
        });
        self.pop_state_listeners.dispatch(&PopStateEvent { state: user_state });
    }
}

impl Drop for NavigationPolyfill {
    fn drop(&mut self) {
        self.signal.cancel();
    }
}

impl Navigation for NavigationPolyfill {
    fn current_entry(&self) -> Option<NavigationHistoryEntry> {
        let key = self.current_key()?;
        Some(NavigationHistoryEntry {
            key,
            url: self.history.href(),
        })
    }

    fn add_current_entry_change_listener(
        &self,
        handler: EntryChangeHandler,
        signal: CancellationToken,
    ) {
        self.entry_listeners.add(handler, signal);
    }
}

impl Location for NavigationPolyfill {
    fn href(&self) -> String {
        self.history.href()
    }
}

impl History for NavigationPolyfill {
    fn state(&self) -> Value {
        unwrap_state(self.history.state()).1
    }

    fn push_state(&self, state: Value, url: Option<&str>) -> Result<()> {
        let key = fresh_key();
        self.history.push_state(wrap_state(&key, state), url)?;
        let from = self.advance(key);
        self.entry_listeners.dispatch(&CurrentEntryChangeEvent {
            navigation_type: NavigationType::Push,
            from,
        });
        Ok(())
    }

    fn replace_state(&self, state: Value, url: Option<&str>) -> Result<()> {
        let key = self.current_key().unwrap_or_else(fresh_key);
        self.history.replace_state(wrap_state(&key, state), url)?;
        let from = self.advance(key);
        self.entry_listeners.dispatch(&CurrentEntryChangeEvent {
            navigation_type: NavigationType::Replace,
            from,
        });
        Ok(())
    }

    fn go(&self, delta: isize) {
        self.history.go(delta);
    }

    fn add_pop_state_listener(&self, handler: PopStateHandler, signal: CancellationToken) {
        self.pop_state_listeners.add(handler, signal);
    }
}

fn wrap_state(key: &str, state: Value) -> Value {
    let mut map = Map::new();
    map.insert(NAVIGATION_KEY_FIELD.to_string(), Value::String(key.to_string()));
    map.insert(USER_STATE_FIELD.to_string(), state);
    Value::Object(map)
}

/// Split a history state into (key, caller state).
fn unwrap_state(state: Value) -> (Option<String>, Value) {
    match state {
        Value::Object(mut map) => match map.get(NAVIGATION_KEY_FIELD) {
            Some(Value::String(key)) => {
                let key = key.clone();
                let user = map.remove(USER_STATE_FIELD).unwrap_or(Value::Null);
                (Some(key), user)
            }
            _ => (None, Value::Object(map)),
        },
        other => (None, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryHistory;
    use serde_json::json;

    fn setup() -> (Arc<MemoryHistory>, Arc<NavigationPolyfill>) {
        let history = Arc::new(MemoryHistory::new("http://localhost/").unwrap());
        let polyfill = NavigationPolyfill::new(history.clone());
        (history, polyfill)
    }

    fn key(polyfill: &NavigationPolyfill) -> String {
        polyfill.current_entry().unwrap().key
    }

    fn record(polyfill: &NavigationPolyfill) -> Arc<Mutex<Vec<NavigationType>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_c = seen.clone();
        polyfill.add_current_entry_change_listener(
            Arc::new(move |e: &CurrentEntryChangeEvent| {
                seen_c.lock().unwrap().push(e.navigation_type)
            }),
            CancellationToken::new(),
        );
        seen
    }

    // ========================================================================
    // Key assignment
    // ========================================================================

    #[test]
    fn stamps_initial_entry() {
        let (history, polyfill) = setup();
        let key = key(&polyfill);
        assert_eq!(history.state()[NAVIGATION_KEY_FIELD], json!(key));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn keeps_existing_key_on_construction() {
        let history = Arc::new(MemoryHistory::new("http://localhost/").unwrap());
        history
            .replace_state(wrap_state("restored", json!(1)), None)
            .unwrap();
        let polyfill = NavigationPolyfill::new(history.clone());
        assert_eq!(key(&polyfill), "restored");
        assert_eq!(polyfill.state(), json!(1));
    }

    #[test]
    fn push_assigns_fresh_key_replace_preserves() {
        let (_history, polyfill) = setup();
        let first = key(&polyfill);

        polyfill.push_state(json!({"a": 1}), Some("/next")).unwrap();
        let second = key(&polyfill);
        assert_ne!(first, second);

        polyfill.replace_state(json!({"a": 2}), Some("/next?x=1")).unwrap();
        assert_eq!(key(&polyfill), second);
        assert_eq!(polyfill.href(), "http://localhost/next?x=1");
    }

    #[test]
    fn state_is_unwrapped_for_callers() {
        let (_history, polyfill) = setup();
        polyfill.push_state(json!({"page": 2}), None).unwrap();
        assert_eq!(polyfill.state(), json!({"page": 2}));
    }

    // ========================================================================
    // Events
    // ========================================================================

    #[test]
    fn push_replace_traverse_reload_events() {
        let (_history, polyfill) = setup();
        let seen = record(&polyfill);

        polyfill.push_state(Value::Null, Some("/2")).unwrap();
        polyfill.replace_state(Value::Null, None).unwrap();
        polyfill.back();
        polyfill.reload();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                NavigationType::Push,
                NavigationType::Replace,
                NavigationType::Traverse,
                NavigationType::Reload,
            ]
        );
    }

    #[test]
    fn traversal_restores_key_and_reports_from() {
        let (_history, polyfill) = setup();
        let first = key(&polyfill);
        polyfill.push_state(Value::Null, Some("/2")).unwrap();
        let second = key(&polyfill);

        let from = Arc::new(Mutex::new(None));
        let from_c = from.clone();
        polyfill.add_current_entry_change_listener(
            Arc::new(move |e: &CurrentEntryChangeEvent| {
                *from_c.lock().unwrap() = Some(e.from.key.clone());
            }),
            CancellationToken::new(),
        );

        polyfill.back();
        assert_eq!(key(&polyfill), first);
        assert_eq!(from.lock().unwrap().clone(), Some(second.clone()));
        assert_eq!(polyfill.entry(&second).unwrap().url, "http://localhost/2");
    }

    #[test]
    fn pop_state_listeners_receive_unwrapped_state() {
        let (_history, polyfill) = setup();
        polyfill.replace_state(json!("one"), None).unwrap();
        polyfill.push_state(json!("two"), Some("/2")).unwrap();

        let states = Arc::new(Mutex::new(Vec::new()));
        let states_c = states.clone();
        polyfill.add_pop_state_listener(
            Arc::new(move |e: &PopStateEvent| states_c.lock().unwrap().push(e.state.clone())),
            CancellationToken::new(),
        );
        polyfill.back();
        assert_eq!(*states.lock().unwrap(), vec![json!("one")]);
    }

    #[test]
    fn dropping_polyfill_detaches_from_history() {
        let (history, polyfill) = setup();
        polyfill.push_state(Value::Null, Some("/2")).unwrap();
        drop(polyfill);
        // The weak handler is gone; traversal must not panic.
        history.back();
        assert_eq!(history.index(), 0);
    }

    #[test]
    fn unwrap_plain_state() {
        assert_eq!(unwrap_state(json!(5)), (None, json!(5)));
        assert_eq!(
            unwrap_state(json!({"other": 1})),
            (None, json!({"other": 1}))
        );
    }
}
