//! Location state — UI state scoped to a navigation history entry.
//!
//! State lives in named slices inside stores. Each store keeps one state
//! map per navigation key, so going back, forward or reloading restores
//! what the user left on that entry.
//!
//! # Pieces
//!
//! - `Store` — slice container: `get`, `set`, `subscribe`, `load(key)`, `save()`.
//!   Backends: `MemoryStore`, `StorageStore` (any `location_state_kv::Storage`),
//!   `UrlStore` (a query parameter of the current URL).
//! - `Syncer` — reports the current navigation key and calls back when it
//!   changes. `NavigationSyncer` works over a `Navigation` primitive; hosts
//!   with only a `History` wrap it in `NavigationPolyfill`.
//! - `Provider` — named stores plus one syncer. Mounting it loads every
//!   store and saves/reloads them on each navigation.
//! - `hooks` — typed access to one slice (`LocationState<T>`,
//!   `use_location_state`).
//!
//! # Example
//!
//! ```ignore
//! use location_state::*;
//!
//! let nav = Arc::new(MemoryNavigation::new("http://localhost/")?);
//! let syncer = Arc::new(NavigationSyncer::new(Some(nav.clone() as Arc<dyn Navigation>), nav.clone()));
//! let provider = Provider::with_default_stores(
//!     &LocationStateConfig::default(),
//!     syncer,
//!     Arc::new(MemoryStorage::new()),
//!     nav.clone(),
//!     Arc::new(TokioDefer),
//! );
//! let _mount = provider.mount(unload_token);
//!
//! let (count, set_count) =
//!     use_location_state(LocationStateDefinition::new("count", 0u32, "session"))?;
//! set_count.update(|n| n + 1);
//! ```

pub mod config;
pub mod defer;
pub mod error;
mod event;
pub mod history;
pub mod hooks;
pub mod navigation;
pub mod provider;
pub mod serializer;
pub mod store;
pub mod syncer;
pub mod throttle;
pub mod value;

// Re-export primary types at crate root.
pub use config::{LocationStateConfig, ThrottleConfig};
pub use defer::{Defer, MicrotaskQueue, TokioDefer};
pub use error::{LocationStateError, Result};
pub use event::EventHandler;
pub use history::{History, Location, MemoryHistory, PopStateEvent};
pub use hooks::{
    LocationGetState, LocationSetState, LocationState, LocationStateDefinition, SetStateAction,
    use_location_get_state, use_location_key, use_location_set_state, use_location_state,
};
pub use location_state_kv::{KVError, MemoryStorage, RedbStorage, Storage};
pub use navigation::{
    CurrentEntryChangeEvent, MemoryNavigation, Navigation, NavigationHistoryBehavior,
    NavigationHistoryEntry, NavigationPolyfill, NavigationType,
};
pub use provider::{Provider, ProviderBuilder, ProviderCell, ProviderMount};
pub use serializer::{FnSerializer, JsonSerializer, Serializer};
pub use store::{MemoryStore, StorageStore, Store, Subscription, UrlStore};
pub use syncer::{NavigationSyncer, Syncer};
pub use throttle::Throttle;
pub use value::{Listener, StateMap, SubscriptionId, listener};
