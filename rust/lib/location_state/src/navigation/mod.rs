//! Host navigation primitive: which history entry is current, and a change
//! event carrying the navigation type.
//!
//! The trait has the shape of a native navigation API (`currentEntry.key`,
//! `currententrychange`). Two realizations ship here:
//!
//! - `MemoryNavigation` — a native-shaped, in-process navigation history.
//! - `NavigationPolyfill` — synthesizes the same surface over any `History`
//!   when the host has no navigation primitive.

pub mod polyfill;

use std::sync::Mutex;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

use crate::error::Result;
use crate::event::{EventHandler, EventListeners};
use crate::history::{History, Location, PopStateEvent, PopStateHandler, resolve_url};

pub use polyfill::{NAVIGATION_KEY_FIELD, NavigationPolyfill};

/// How the current entry changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationType {
    Push,
    Replace,
    Reload,
    Traverse,
}

/// One history entry as seen by the navigation primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationHistoryEntry {
    /// Stable identity of the entry's slot in history.
    pub key: String,
    pub url: String,
}

/// Payload of the current-entry-change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentEntryChangeEvent {
    pub navigation_type: NavigationType,
    /// The entry that was current before the change.
    pub from: NavigationHistoryEntry,
}

pub type EntryChangeHandler = EventHandler<CurrentEntryChangeEvent>;

/// Native-shaped navigation primitive.
pub trait Navigation: Send + Sync {
    fn current_entry(&self) -> Option<NavigationHistoryEntry>;

    /// Register `handler` for current-entry changes until `signal` is
    /// cancelled.
    fn add_current_entry_change_listener(
        &self,
        handler: EntryChangeHandler,
        signal: CancellationToken,
    );
}

/// History behavior of `MemoryNavigation::navigate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavigationHistoryBehavior {
    #[default]
    Push,
    Replace,
}

pub(crate) fn fresh_key() -> String {
    Uuid::new_v4().to_string()
}

struct Entry {
    key: String,
    url: Url,
    state: Value,
}

impl Entry {
    fn to_history_entry(&self) -> NavigationHistoryEntry {
        NavigationHistoryEntry {
            key: self.key.clone(),
            url: self.url.to_string(),
        }
    }
}

struct Entries {
    list: Vec<Entry>,
    index: usize,
}

impl Entries {
    fn current(&self) -> &Entry {
        &self.list[self.index]
    }
}

/// In-process navigation history with native key semantics: push creates a
/// fresh key, replace keeps the key of the slot it replaces, reload and
/// traversal re-enter an existing key.
///
/// Also implements `History`, so a `NavigationSyncer` can rewrite the URL
/// through it.
pub struct MemoryNavigation {
    entries: Mutex<Entries>,
    entry_listeners: EventListeners<CurrentEntryChangeEvent>,
    pop_state_listeners: EventListeners<PopStateEvent>,
}

impl MemoryNavigation {
    /// Start with a single entry at `initial_url` (must be absolute).
    pub fn new(initial_url: &str) -> Result<Self> {
        let url = resolve_url(initial_url, None)?;
        Ok(Self {
            entries: Mutex::new(Entries {
                list: vec![Entry {
                    key: fresh_key(),
                    url,
                    state: Value::Null,
                }],
                index: 0,
            }),
            entry_listeners: EventListeners::new(),
            pop_state_listeners: EventListeners::new(),
        })
    }

    /// Navigate to `url` (relative to the current address).
    pub fn navigate(&self, url: &str, behavior: NavigationHistoryBehavior) -> Result<()> {
        match behavior {
            NavigationHistoryBehavior::Push => self.push_state(Value::Null, Some(url)),
            NavigationHistoryBehavior::Replace => self.replace_state(Value::Null, Some(url)),
        }
    }

    /// Reload the current entry. Its key is unchanged.
    pub fn reload(&self) {
        let from = self.entries.lock().unwrap().current().to_history_entry();
        self.entry_listeners.dispatch(&CurrentEntryChangeEvent {
            navigation_type: NavigationType::Reload,
            from,
        });
    }

    /// Traverse to the entry with `key`. Returns false if there is none.
    pub fn traverse_to(&self, key: &str) -> bool {
        let target = {
            let entries = self.entries.lock().unwrap();
            entries.list.iter().position(|e| e.key == key)
        };
        match target {
            Some(index) => self.traverse(index),
            None => false,
        }
    }

    /// Snapshot of all entries, oldest first.
    pub fn entries(&self) -> Vec<NavigationHistoryEntry> {
        self.entries
            .lock()
            .unwrap()
            .list
            .iter()
            .map(Entry::to_history_entry)
            .collect()
    }

    fn traverse(&self, index: usize) -> bool {
        let (from, state) = {
            let mut entries = self.entries.lock().unwrap();
            if index >= entries.list.len() || index == entries.index {
                return false;
            }
            let from = entries.current().to_history_entry();
            entries.index = index;
            (from, entries.current().state.clone())
        };
        self.entry_listeners.dispatch(&CurrentEntryChangeEvent {
            navigation_type: NavigationType::Traverse,
            from,
        });
        self.pop_state_listeners.dispatch(&PopStateEvent { state });
        true
    }
}

impl Navigation for MemoryNavigation {
    fn current_entry(&self) -> Option<NavigationHistoryEntry> {
        Some(self.entries.lock().unwrap().current().to_history_entry())
    }

    fn add_current_entry_change_listener(
        &self,
        handler: EntryChangeHandler,
        signal: CancellationToken,
    ) {
        self.entry_listeners.add(handler, signal);
    }
}

impl Location for MemoryNavigation {
    fn href(&self) -> String {
        self.entries.lock().unwrap().current().url.to_string()
    }
}

impl History for MemoryNavigation {
    fn state(&self) -> Value {
        self.entries.lock().unwrap().current().state.clone()
    }

    fn push_state(&self, state: Value, url: Option<&str>) -> Result<()> {
        let from = {
            let mut entries = self.entries.lock().unwrap();
            let url = resolve_url(entries.current().url.as_str(), url)?;
            let from = entries.current().to_history_entry();
            let next = entries.index + 1;
            entries.list.truncate(next);
            entries.list.push(Entry {
                key: fresh_key(),
                url,
                state,
            });
            entries.index = next;
            from
        };
        self.entry_listeners.dispatch(&CurrentEntryChangeEvent {
            navigation_type: NavigationType::Push,
            from,
        });
        Ok(())
    }

    fn replace_state(&self, state: Value, url: Option<&str>) -> Result<()> {
        let from = {
            let mut entries = self.entries.lock().unwrap();
            let url = resolve_url(entries.current().url.as_str(), url)?;
            let from = entries.current().to_history_entry();
            let index = entries.index;
            entries.list[index] = Entry {
                key: from.key.clone(),
                url,
                state,
            };
            from
        };
        self.entry_listeners.dispatch(&CurrentEntryChangeEvent {
            navigation_type: NavigationType::Replace,
            from,
        });
        Ok(())
    }

    fn go(&self, delta: isize) {
        let target = {
            let entries = self.entries.lock().unwrap();
            entries.index as isize + delta
        };
        if target >= 0 {
            self.traverse(target as usize);
        }
    }

    fn add_pop_state_listener(&self, handler: PopStateHandler, signal: CancellationToken) {
        self.pop_state_listeners.add(handler, signal);
    }
}
