use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Storage key prefix for per-navigation-entry state.
pub const DEFAULT_STORAGE_PREFIX: &str = "__location_state_";

/// Query parameter holding URL-backed state.
pub const DEFAULT_URL_PARAM: &str = "location-state";

/// Configuration for the default stores a provider builds.
///
/// All fields have defaults, so hosts can deserialize a partial document
/// (or use `LocationStateConfig::default()`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationStateConfig {
    /// Prefix prepended to the navigation key for storage-backed stores.
    pub storage_prefix: String,

    /// Name of the query parameter used by the URL-backed store.
    pub url_param: String,

    /// Backoff used when rewriting the URL.
    pub throttle: ThrottleConfig,
}

impl Default for LocationStateConfig {
    fn default() -> Self {
        Self {
            storage_prefix: DEFAULT_STORAGE_PREFIX.to_string(),
            url_param: DEFAULT_URL_PARAM.to_string(),
            throttle: ThrottleConfig::default(),
        }
    }
}

/// Backoff sequence for the URL rewrite throttle.
///
/// Delays are walked in order; the last one is the plateau that repeats
/// until a tick finds nothing pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    pub delays_ms: Vec<u64>,
}

impl ThrottleConfig {
    pub fn delays(&self) -> Vec<Duration> {
        if self.delays_ms.is_empty() {
            return Self::default().delays();
        }
        self.delays_ms
            .iter()
            .map(|ms| Duration::from_millis(*ms))
            .collect()
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            delays_ms: vec![50, 100, 200, 500, 1000],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LocationStateConfig::default();
        assert_eq!(config.storage_prefix, "__location_state_");
        assert_eq!(config.url_param, "location-state");
        assert_eq!(config.throttle.delays_ms, vec![50, 100, 200, 500, 1000]);
    }

    #[test]
    fn partial_document_keeps_defaults() {
        let config: LocationStateConfig =
            serde_json::from_str(r#"{"url_param":"s"}"#).unwrap();
        assert_eq!(config.url_param, "s");
        assert_eq!(config.storage_prefix, DEFAULT_STORAGE_PREFIX);
        assert_eq!(config.throttle, ThrottleConfig::default());
    }

    #[test]
    fn empty_delays_fall_back_to_default() {
        let config = ThrottleConfig { delays_ms: vec![] };
        assert_eq!(config.delays().len(), 5);
        assert_eq!(config.delays()[4], Duration::from_millis(1000));
    }
}
