use std::cell::RefCell;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::{Arc, OnceLock};

use location_state_kv::Storage;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::LocationStateConfig;
use crate::defer::Defer;
use crate::error::{LocationStateError, Result};
use crate::history::Location;
use crate::store::{StorageStore, Store, UrlStore};
use crate::syncer::{KeyListener, Syncer};

/// Name of the storage-backed store registered by `with_default_stores`.
pub const SESSION_STORE: &str = "session";

/// Name of the URL-backed store registered by `with_default_stores`.
pub const URL_STORE: &str = "url";

thread_local! {
    static CURRENT: RefCell<Vec<Arc<Provider>>> = const { RefCell::new(Vec::new()) };
}

/// Registry of named stores bound to one navigation syncer.
///
/// A provider does nothing until mounted:
///
/// ```ignore
/// let provider = Provider::builder(syncer)
///     .store("session", session_store)
///     .build();
///
/// let unload = CancellationToken::new();
/// let mount = provider.mount(unload.clone());
///
/// // Navigation now saves and reloads every store. Cancelling `unload`
/// // flushes them; dropping `mount` stops both.
/// ```
pub struct Provider {
    syncer: Arc<dyn Syncer>,
    stores: BTreeMap<String, Arc<dyn Store>>,
}

impl Provider {
    pub fn builder(syncer: Arc<dyn Syncer>) -> ProviderBuilder {
        ProviderBuilder {
            syncer,
            stores: BTreeMap::new(),
        }
    }

    /// Provider with the two stores a browser app normally uses:
    /// `"session"` over `storage` and `"url"` over `location`.
    pub fn with_default_stores(
        config: &LocationStateConfig,
        syncer: Arc<dyn Syncer>,
        storage: Arc<dyn Storage>,
        location: Arc<dyn Location>,
        defer: Arc<dyn Defer>,
    ) -> Arc<Self> {
        let session = StorageStore::new(storage, Arc::clone(&defer))
            .with_prefix(config.storage_prefix.clone());
        let url = UrlStore::new(Arc::clone(&syncer), location, defer)
            .with_param(config.url_param.clone());
        Self::builder(syncer)
            .store(SESSION_STORE, Arc::new(session))
            .store(URL_STORE, Arc::new(url))
            .build()
    }

    /// The innermost provider mounted on this thread.
    pub fn current() -> Option<Arc<Provider>> {
        CURRENT.with(|stack| stack.borrow().last().cloned())
    }

    pub fn store(&self, name: &str) -> Result<Arc<dyn Store>> {
        self.stores
            .get(name)
            .cloned()
            .ok_or_else(|| LocationStateError::MissingStore(name.to_string()))
    }

    pub fn store_names(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }

    pub fn syncer(&self) -> &Arc<dyn Syncer> {
        &self.syncer
    }

    /// Current navigation key.
    pub fn key(&self) -> Option<String> {
        self.syncer.key()
    }

    /// Save every store under its loaded key.
    pub fn flush(&self) {
        for store in self.stores.values() {
            store.save();
        }
    }

    fn navigate(&self, key: &str) {
        debug!("Provider: navigation to {key}, reloading {} stores", self.stores.len());
        for store in self.stores.values() {
            store.save();
            store.load(Some(key));
        }
    }

    /// Load every store for the current key and follow navigation until the
    /// returned mount is dropped. Cancelling `unload` flushes all stores.
    ///
    /// While mounted, the provider is `Provider::current()` on this thread.
    pub fn mount(self: &Arc<Self>, unload: CancellationToken) -> ProviderMount {
        let key = self.syncer.key();
        debug!("Provider: mounting at key {key:?}");
        for store in self.stores.values() {
            store.load(key.as_deref());
        }

        let cancel = CancellationToken::new();
        let weak = Arc::downgrade(self);
        let listener: KeyListener = Arc::new(move |key: &str| {
            if let Some(provider) = weak.upgrade() {
                provider.navigate(key);
            }
        });
        self.syncer.sync(listener, cancel.clone());

        match Handle::try_current() {
            Ok(handle) => {
                let weak = Arc::downgrade(self);
                let cancel = cancel.clone();
                handle.spawn(async move {
                    tokio::select! {
                        _ = unload.cancelled() => {
                            if let Some(provider) = weak.upgrade() {
                                debug!("Provider: unloading, flushing stores");
                                provider.flush();
                            }
                        }
                        _ = cancel.cancelled() => {}
                    }
                });
            }
            Err(_) => debug!("Provider: no runtime, flush on unload disabled"),
        }

        CURRENT.with(|stack| stack.borrow_mut().push(Arc::clone(self)));
        ProviderMount {
            provider: Arc::clone(self),
            cancel,
            _thread: PhantomData,
        }
    }
}

/// Collects stores for a `Provider`.
pub struct ProviderBuilder {
    syncer: Arc<dyn Syncer>,
    stores: BTreeMap<String, Arc<dyn Store>>,
}

impl ProviderBuilder {
    /// Register `store` under `name`, replacing any earlier one.
    pub fn store(mut self, name: impl Into<String>, store: Arc<dyn Store>) -> Self {
        self.stores.insert(name.into(), store);
        self
    }

    pub fn build(self) -> Arc<Provider> {
        Arc::new(Provider {
            syncer: self.syncer,
            stores: self.stores,
        })
    }
}

/// Active registration of a mounted provider. Dropping it stops navigation
/// tracking and the unload flush, and pops the provider off this thread's
/// context.
pub struct ProviderMount {
    provider: Arc<Provider>,
    cancel: CancellationToken,
    _thread: PhantomData<Rc<()>>,
}

impl ProviderMount {
    pub fn provider(&self) -> &Arc<Provider> {
        &self.provider
    }
}

impl Drop for ProviderMount {
    fn drop(&mut self) {
        debug!("Provider: unmounting");
        self.cancel.cancel();
        CURRENT.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack.iter().rposition(|p| Arc::ptr_eq(p, &self.provider)) {
                stack.remove(pos);
            }
        });
    }
}

/// Builds a provider once; later calls return the same instance.
#[derive(Default)]
pub struct ProviderCell {
    cell: OnceLock<Arc<Provider>>,
}

impl ProviderCell {
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    pub fn get_or_init<F>(&self, init: F) -> Arc<Provider>
    where
        F: FnOnce() -> Arc<Provider>,
    {
        Arc::clone(self.cell.get_or_init(init))
    }

    pub fn get(&self) -> Option<Arc<Provider>> {
        self.cell.get().cloned()
    }
}
