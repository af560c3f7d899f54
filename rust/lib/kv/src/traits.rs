use crate::error::KVError;

/// Storage is the string key/value primitive a persistent location-state
/// store writes through to.
///
/// It mirrors the shape of a browser's session storage: one string value per
/// key, no scanning, no transactions. Keys are namespaced by the caller
/// (`__location_state_{navigation_key}`).
pub trait Storage: Send + Sync {
    /// Get the value for a key. Returns None if the key does not exist.
    fn get_item(&self, key: &str) -> Result<Option<String>, KVError>;

    /// Set a key-value pair, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> Result<(), KVError>;

    /// Remove a key. Removing a missing key is not an error.
    fn remove_item(&self, key: &str) -> Result<(), KVError>;
}
