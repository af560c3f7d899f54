//! Deferred execution: "run after the current call stack unwinds, before any
//! timer-based callback".
//!
//! Stores use this to batch the notifications fired by `load()`, so a
//! navigation handler that reloads several stores finishes before any
//! listener re-reads them.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::debug;

/// A deferred unit of work.
pub type Task = Box<dyn FnOnce() + Send>;

/// Post-callback scheduling primitive.
///
/// Implementations must run every task exactly once, in submission order,
/// after the caller of `defer` has returned and before the next timer
/// callback of the host loop.
pub trait Defer: Send + Sync {
    fn defer(&self, task: Task);
}

/// Defers onto the current tokio runtime.
///
/// On a current-thread runtime the spawned task runs as soon as the calling
/// task yields, ahead of timers that become due in the same turn. Without a
/// runtime the task runs inline.
///
/// The ordering guarantee of `Defer` holds only on a current-thread runtime.
/// On a multi-thread runtime another worker may pick the task up while the
/// caller is still running; hosts there should use `MicrotaskQueue`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioDefer;

impl Defer for TokioDefer {
    fn defer(&self, task: Task) {
        match Handle::try_current() {
            Ok(handle) => {
                if handle.runtime_flavor() != RuntimeFlavor::CurrentThread {
                    debug!("TokioDefer: multi-thread runtime, task may run before the caller returns");
                }
                handle.spawn(async move { task() });
            }
            Err(_) => {
                debug!("TokioDefer: no runtime, running task inline");
                task();
            }
        }
    }
}

/// An explicit microtask queue for hosts that drive their own event loop.
///
/// Tasks accumulate until the host calls `run_pending()` at the end of its
/// current callback.
#[derive(Default)]
pub struct MicrotaskQueue {
    tasks: Mutex<VecDeque<Task>>,
}

impl MicrotaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run queued tasks until the queue is empty, including tasks queued by
    /// the tasks themselves. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let task = self.tasks.lock().unwrap().pop_front();
            match task {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Defer for MicrotaskQueue {
    fn defer(&self, task: Task) {
        self.tasks.lock().unwrap().push_back(task);
    }
}
