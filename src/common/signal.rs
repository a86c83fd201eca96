//! One-shot, resettable notification flag.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// A flag that tasks can await.
///
/// Used for the run-wide cancellation signal and the per-step flags of the
/// stepwise gate. Once fired it stays fired until [`Signal::reset`].
#[derive(Debug, Default)]
pub struct Signal {
    fired: AtomicBool,
    notify: Notify,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal and wake every task waiting on it.
    pub fn fire(&self) {
        if !self.fired.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.fired.store(false, Ordering::SeqCst);
    }

    /// Suspend until the signal is fired. Returns immediately if it already is.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // register before checking the flag so a concurrent `fire` is not lost
            notified.as_mut().enable();

            if self.is_fired() {
                return;
            }
            notified.await;
        }
    }
}
