//! Navigation identity tracking.

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ThrottleConfig;
use crate::history::History;
use crate::navigation::{CurrentEntryChangeEvent, Navigation, NavigationType};
use crate::throttle::Throttle;

/// Callback receiving the new navigation key.
pub type KeyListener = Arc<dyn Fn(&str) + Send + Sync>;

/// "Which navigation entry am I on, and tell me when it changes."
pub trait Syncer: Send + Sync {
    /// Current navigation key; `None` when the host has no navigation
    /// primitive.
    fn key(&self) -> Option<String>;

    /// Call `listener` with the new key on every push, replace or traverse
    /// that changes the key, until `cancel` fires. Reloads never call it,
    /// and a key equal to the previously reported one is suppressed.
    fn sync(&self, listener: KeyListener, cancel: CancellationToken);

    /// Replace the address bar with `url` without creating a history entry
    /// or notifying `sync` listeners.
    fn update_url(&self, url: &str);
}

/// `Syncer` over a host `Navigation` primitive and its `History`.
///
/// URL rewrites go through a `Throttle`, so bursts of `update_url` collapse
/// into a bounded number of `replace_state` calls, the last one always
/// applied.
pub struct NavigationSyncer {
    navigation: Option<Arc<dyn Navigation>>,
    history: Arc<dyn History>,
    throttle: Throttle,
}

impl NavigationSyncer {
    pub fn new(navigation: Option<Arc<dyn Navigation>>, history: Arc<dyn History>) -> Self {
        Self::with_throttle(navigation, history, &ThrottleConfig::default())
    }

    pub fn with_throttle(
        navigation: Option<Arc<dyn Navigation>>,
        history: Arc<dyn History>,
        throttle: &ThrottleConfig,
    ) -> Self {
        if navigation.is_none() {
            debug!("NavigationSyncer: no navigation primitive, navigation restore disabled");
        }
        Self {
            navigation,
            history,
            throttle: Throttle::new(throttle),
        }
    }
}

impl Syncer for NavigationSyncer {
    fn key(&self) -> Option<String> {
        self.navigation.as_ref()?.current_entry().map(|entry| entry.key)
    }

    fn sync(&self, listener: KeyListener, cancel: CancellationToken) {
        let Some(navigation) = &self.navigation else {
            return;
        };

        let last_key = Mutex::new(navigation.current_entry().map(|entry| entry.key));
        let weak = Arc::downgrade(navigation);
        let signal = cancel.clone();
        let handler = Arc::new(move |event: &CurrentEntryChangeEvent| {
            if signal.is_cancelled() || event.navigation_type == NavigationType::Reload {
                return;
            }
            let Some(key) = weak
                .upgrade()
                .and_then(|navigation| navigation.current_entry())
                .map(|entry| entry.key)
            else {
                return;
            };
            {
                let mut last_key = last_key.lock().unwrap();
                if last_key.as_deref() == Some(key.as_str()) {
                    return;
                }
                *last_key = Some(key.clone());
            }
            debug!(
                "NavigationSyncer: {:?} navigation to key {key}",
                event.navigation_type
            );
            listener(&key);
        });
        navigation.add_current_entry_change_listener(handler, cancel);
    }

    fn update_url(&self, url: &str) {
        let history = Arc::clone(&self.history);
        let url = url.to_string();
        self.throttle.schedule(move || {
            let state = history.state();
            if let Err(e) = history.replace_state(state, Some(&url)) {
                warn!("NavigationSyncer: failed to update url: {e}");
            }
        });
    }
}
