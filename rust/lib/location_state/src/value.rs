use std::sync::Arc;

use serde_json::{Map, Value};

/// In-process state of one store: slice name to value.
///
/// A slice that is "unset" is absent from the map. `Value::Null` is a real
/// value and is kept.
pub type StateMap = Map<String, Value>;

/// Zero-argument change callback registered against one slice name.
///
/// Listeners are compared by identity (the `Arc` allocation), so registering
/// the same `Arc` twice for a name keeps a single registration.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Wrap a closure as a `Listener`.
pub fn listener<F>(f: F) -> Listener
where
    F: Fn() + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Unique handle for a listener registration, carried by `Subscription`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

/// Identity of a listener: the address of its allocation, vtable ignored.
pub(crate) fn listener_addr(listener: &Listener) -> *const () {
    Arc::as_ptr(listener) as *const ()
}
