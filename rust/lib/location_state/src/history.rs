//! Host session-history surface: the current URL, the entry's state, and
//! push/replace/traverse.
//!
//! `MemoryHistory` is an in-process implementation used by native hosts and
//! tests; a browser host implements `History` over its own history object.

use std::sync::Mutex;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use url::Url;

use crate::error::{LocationStateError, Result};
use crate::event::{EventHandler, EventListeners};

/// Read access to the current address.
pub trait Location: Send + Sync {
    fn href(&self) -> String;
}

/// Fired when the current entry changes by traversal (back/forward/go).
#[derive(Debug, Clone, PartialEq)]
pub struct PopStateEvent {
    pub state: Value,
}

pub type PopStateHandler = EventHandler<PopStateEvent>;

/// Session history of the host.
///
/// `push_state` and `replace_state` change the address without loading a
/// page; `url` may be relative to the current address, and `None` keeps it.
pub trait History: Location {
    fn state(&self) -> Value;

    fn push_state(&self, state: Value, url: Option<&str>) -> Result<()>;

    fn replace_state(&self, state: Value, url: Option<&str>) -> Result<()>;

    /// Move `delta` entries through history. Out-of-range moves are ignored.
    fn go(&self, delta: isize);

    fn back(&self) {
        self.go(-1);
    }

    fn forward(&self) {
        self.go(1);
    }

    fn add_pop_state_listener(&self, handler: PopStateHandler, signal: CancellationToken);
}

/// Resolve `url` against `base`; `None` yields `base` itself.
pub(crate) fn resolve_url(base: &str, url: Option<&str>) -> Result<Url> {
    let base = Url::parse(base).map_err(|e| LocationStateError::InvalidUrl(format!("{base}: {e}")))?;
    match url {
        None => Ok(base),
        Some(url) => base
            .join(url)
            .map_err(|e| LocationStateError::InvalidUrl(format!("{url}: {e}"))),
    }
}

struct HistoryEntry {
    url: Url,
    state: Value,
}

struct Entries {
    list: Vec<HistoryEntry>,
    index: usize,
}

impl Entries {
    fn current(&self) -> &HistoryEntry {
        &self.list[self.index]
    }
}

/// In-process session history: a list of entries and a cursor.
pub struct MemoryHistory {
    entries: Mutex<Entries>,
    pop_state_listeners: EventListeners<PopStateEvent>,
}

impl MemoryHistory {
    /// Start with a single entry at `initial_url` (must be absolute).
    pub fn new(initial_url: &str) -> Result<Self> {
        let url = Url::parse(initial_url)
            .map_err(|e| LocationStateError::InvalidUrl(format!("{initial_url}: {e}")))?;
        Ok(Self {
            entries: Mutex::new(Entries {
                list: vec![HistoryEntry {
                    url,
                    state: Value::Null,
                }],
                index: 0,
            }),
            pop_state_listeners: EventListeners::new(),
        })
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of the current entry.
    pub fn index(&self) -> usize {
        self.entries.lock().unwrap().index
    }
}

impl Location for MemoryHistory {
    fn href(&self) -> String {
        self.entries.lock().unwrap().current().url.to_string()
    }
}

impl History for MemoryHistory {
    fn state(&self) -> Value {
        self.entries.lock().unwrap().current().state.clone()
    }

    fn push_state(&self, state: Value, url: Option<&str>) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        let url = resolve_url(entries.current().url.as_str(), url)?;
        let next = entries.index + 1;
        entries.list.truncate(next);
        entries.list.push(HistoryEntry { url, state });
        entries.index = next;
        Ok(())
    }

    fn replace_state(&self, state: Value, url: Option<&str>) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        let url = resolve_url(entries.current().url.as_str(), url)?;
        let index = entries.index;
        entries.list[index] = HistoryEntry { url, state };
        Ok(())
    }

    fn go(&self, delta: isize) {
        let event = {
            let mut entries = self.entries.lock().unwrap();
            let target = entries.index as isize + delta;
            if delta == 0 || target < 0 || target >= entries.list.len() as isize {
                if delta != 0 {
                    warn!("MemoryHistory: go({delta}) out of range, ignoring");
                }
                return;
            }
            entries.index = target as usize;
            PopStateEvent {
                state: entries.current().state.clone(),
            }
        };
        self.pop_state_listeners.dispatch(&event);
    }

    fn add_pop_state_listener(&self, handler: PopStateHandler, signal: CancellationToken) {
        self.pop_state_listeners.add(handler, signal);
    }
}
