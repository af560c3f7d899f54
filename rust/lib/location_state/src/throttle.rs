//! Throttle with exponential backoff for the URL rewrite path.
//!
//! The first call of an idle period runs immediately. Later calls park in a
//! single pending slot (newest wins) that a timer drains on each backoff
//! tick: 50, 100, 200, 500, then 1000 ms repeating. A plateau tick that finds
//! the slot empty ends the cycle.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::debug;

use crate::config::ThrottleConfig;

type Callback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Slot {
    running: bool,
    pending: Option<Callback>,
}

/// Walks a backoff sequence, repeating the last delay forever.
#[derive(Debug, Clone)]
pub struct BackoffDelays {
    delays: Arc<[Duration]>,
    index: usize,
}

impl BackoffDelays {
    pub fn new(delays: Arc<[Duration]>) -> Self {
        Self { delays, index: 0 }
    }

    /// The repeating delay at the end of the sequence.
    pub fn plateau(&self) -> Duration {
        self.delays.last().copied().unwrap_or_default()
    }
}

impl Iterator for BackoffDelays {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.delays.is_empty() {
            return None;
        }
        let delay = self.delays[self.index.min(self.delays.len() - 1)];
        self.index = self.index.saturating_add(1);
        Some(delay)
    }
}

/// Rate limiter for a side-effecting callback. Each instance owns its own
/// timer and pending slot.
pub struct Throttle {
    slot: Arc<Mutex<Slot>>,
    delays: Arc<[Duration]>,
}

impl Throttle {
    pub fn new(config: &ThrottleConfig) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::default())),
            delays: config.delays().into(),
        }
    }

    /// Whether a backoff cycle is active.
    pub fn is_running(&self) -> bool {
        self.slot.lock().unwrap().running
    }

    /// Run `callback` now if idle, otherwise replace the pending callback.
    ///
    /// Outside a tokio runtime there is no timer to drain the slot, so every
    /// callback runs immediately.
    pub fn schedule<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut slot = self.slot.lock().unwrap();
            if slot.running {
                slot.pending = Some(Box::new(callback));
                return;
            }
            slot.running = true;
        }

        match Handle::try_current() {
            Ok(handle) => {
                let delays = BackoffDelays::new(Arc::clone(&self.delays));
                let guard = CycleGuard::new(Arc::clone(&self.slot));
                handle.spawn(run_cycle(guard, delays));
            }
            Err(_) => {
                debug!("Throttle: no runtime, running callback unthrottled");
                self.slot.lock().unwrap().running = false;
            }
        }
        callback();
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(&ThrottleConfig::default())
    }
}

/// Owns the `running` flag for one cycle. If the cycle task is dropped
/// before it finishes (runtime shutdown, abort), the flag is released and
/// the pending callback runs.
struct CycleGuard {
    slot: Arc<Mutex<Slot>>,
    finished: bool,
}

impl CycleGuard {
    fn new(slot: Arc<Mutex<Slot>>) -> Self {
        Self {
            slot,
            finished: false,
        }
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let pending = match self.slot.lock() {
            Ok(mut slot) => {
                slot.running = false;
                slot.pending.take()
            }
            Err(_) => return,
        };
        if let Some(callback) = pending {
            debug!("Throttle: cycle dropped, running pending callback");
            callback();
        }
    }
}

async fn run_cycle(mut guard: CycleGuard, mut delays: BackoffDelays) {
    let slot = Arc::clone(&guard.slot);
    let plateau = delays.plateau();
    while let Some(delay) = delays.next() {
        tokio::time::sleep(delay).await;

        let pending = {
            let mut slot = slot.lock().unwrap();
            match slot.pending.take() {
                Some(callback) => callback,
                None if delay >= plateau => {
                    slot.running = false;
                    guard.finished = true;
                    return;
                }
                None => continue,
            }
        };
        pending();
    }
}
