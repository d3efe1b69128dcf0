//! Completion signalling for the crawl loop

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// Set-once flag that wakes everyone waiting on it
///
/// Unlike a bare [`Notify`], a waiter that arrives after [`set`](Self::set)
/// returns immediately.
#[derive(Debug, Default)]
pub struct CompletionSignal {
    done: AtomicBool,
    notify: Notify,
}

impl CompletionSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the signal complete
    ///
    /// # Returns
    ///
    /// `true` for the call that actually completed it
    pub fn set(&self) -> bool {
        let first = !self.done.swap(true, Ordering::SeqCst);
        if first {
            self.notify.notify_waiters();
        }
        first
    }

    pub fn is_set(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// Waits until [`set`](Self::set) has been called
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent set() is not missed
            notified.as_mut().enable();

            if self.is_set() {
                return;
            }
            notified.await;
        }
    }
}
