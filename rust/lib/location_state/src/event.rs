use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

/// Handler type for host events of type `E`.
pub type EventHandler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Listener list for one host event, with `CancellationToken`-based removal
/// (the `{ signal }` option of an event target).
///
/// A cancelled handler is never invoked again, even if its token fires while
/// a dispatch is already iterating.
pub(crate) struct EventListeners<E> {
    handlers: Mutex<Vec<(CancellationToken, EventHandler<E>)>>,
}

impl<E> EventListeners<E> {
    pub(crate) fn new() -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn add(&self, handler: EventHandler<E>, signal: CancellationToken) {
        if signal.is_cancelled() {
            return;
        }
        self.handlers.lock().unwrap().push((signal, handler));
    }

    /// Invoke every live handler. The lock is released before any handler
    /// runs, so handlers may add listeners or trigger nested dispatches.
    pub(crate) fn dispatch(&self, event: &E) {
        let handlers: Vec<(CancellationToken, EventHandler<E>)> = {
            let mut handlers = self.handlers.lock().unwrap();
            handlers.retain(|(signal, _)| !signal.is_cancelled());
            handlers.clone()
        };
        for (signal, handler) in handlers {
            if !signal.is_cancelled() {
                handler(event);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        let mut handlers = self.handlers.lock().unwrap();
        handlers.retain(|(signal, _)| !signal.is_cancelled());
        handlers.len()
    }
}
