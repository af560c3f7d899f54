use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::{Store, StoreCore, Subscription};
use crate::config::DEFAULT_URL_PARAM;
use crate::defer::Defer;
use crate::error::{LocationStateError, Result};
use crate::history::Location;
use crate::serializer::{JsonSerializer, Serializer};
use crate::syncer::Syncer;
use crate::value::{Listener, StateMap};

/// Store kept in a query parameter of the current URL.
///
/// There is one parameter per URL, so the navigation key passed to `load`
/// is ignored; the URL itself is the key.
pub struct UrlStore {
    core: StoreCore,
    syncer: Arc<dyn Syncer>,
    location: Arc<dyn Location>,
    serializer: Arc<dyn Serializer>,
    param: String,
    // Raw parameter value last read or written.
    last_raw: Mutex<Option<String>>,
}

impl UrlStore {
    pub fn new(
        syncer: Arc<dyn Syncer>,
        location: Arc<dyn Location>,
        defer: Arc<dyn Defer>,
    ) -> Self {
        Self {
            core: StoreCore::new(defer),
            syncer,
            location,
            serializer: Arc::new(JsonSerializer),
            param: DEFAULT_URL_PARAM.to_string(),
            last_raw: Mutex::new(None),
        }
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = param.into();
        self
    }

    pub fn with_serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = serializer;
        self
    }

    fn current_url(&self) -> Result<Url> {
        let href = self.location.href();
        Url::parse(&href).map_err(|e| LocationStateError::InvalidUrl(format!("{href}: {e}")))
    }

    fn read_param(&self, url: &Url) -> Option<String> {
        url.query_pairs()
            .find(|(name, _)| name == self.param.as_str())
            .map(|(_, value)| value.into_owned())
    }

    /// Rewrite the parameter to `raw` (`None` removes it), keeping every
    /// other query pair in order.
    fn write_param(&self, raw: Option<&str>) -> Result<()> {
        let mut url = self.current_url()?;
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(name, _)| name != self.param.as_str())
            .map(|(name, value)| (name.into_owned(), value.into_owned()))
            .collect();

        if kept.is_empty() && raw.is_none() {
            url.set_query(None);
        } else {
            let mut pairs = url.query_pairs_mut();
            pairs.clear().extend_pairs(&kept);
            if let Some(raw) = raw {
                pairs.append_pair(&self.param, raw);
            }
        }

        *self.last_raw.lock().unwrap() = raw.map(str::to_string);
        self.syncer.update_url(url.as_str());
        Ok(())
    }

    fn write_state(&self) -> Result<()> {
        let state = self.core.snapshot();
        let raw = if state.is_empty() {
            None
        } else {
            Some(self.serializer.serialize(&state)?)
        };
        self.write_param(raw.as_deref())
    }
}

impl Store for UrlStore {
    fn get(&self, name: &str) -> Option<Value> {
        self.core.get(name)
    }

    fn set(&self, name: &str, value: Option<Value>) {
        self.core.put(name, value);
        if let Err(e) = self.write_state() {
            warn!("UrlStore: failed to write {}: {e}", self.param);
        }
        self.core.notify(name);
    }

    fn subscribe(&self, name: &str, listener: Listener) -> Subscription {
        self.core.subscribe(name, listener)
    }

    fn load(&self, _key: Option<&str>) {
        let url = match self.current_url() {
            Ok(url) => url,
            Err(e) => {
                warn!("UrlStore: {e}");
                return;
            }
        };
        let raw = self.read_param(&url);
        {
            let mut last = self.last_raw.lock().unwrap();
            if *last == raw {
                return;
            }
            *last = raw.clone();
        }

        let state = match raw.as_deref() {
            None => StateMap::new(),
            Some(raw) => match self.serializer.deserialize(raw) {
                Ok(state) => state,
                Err(e) => {
                    warn!("UrlStore: discarding {} parameter: {e}", self.param);
                    if let Err(e) = self.write_param(None) {
                        warn!("UrlStore: failed to strip {}: {e}", self.param);
                    }
                    StateMap::new()
                }
            },
        };
        debug!("UrlStore: loaded {} slices from {}", state.len(), self.param);
        self.core.replace(state);
        self.core.notify_all_deferred();
    }

    fn save(&self) {}

    fn snapshot(&self) -> StateMap {
        self.core.snapshot()
    }

    fn loaded_key(&self) -> Option<String> {
        None
    }
}
