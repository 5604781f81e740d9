//! Cooperative cancellation.

use tokio::sync::watch;

/// A write-once abort request.
///
/// The restart coordinator sets it; the process polls it at syscall
/// boundaries and suspended syscalls wait on it so a sleeping routine wakes
/// as soon as the request lands.
#[derive(Debug)]
pub struct AbortSignal {
    tx: watch::Sender<Option<String>>,
}

impl AbortSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Record an abort request made at `at`.
    ///
    /// Returns `false` if a request was already recorded; the first
    /// timestamp is kept.
    pub fn request(&self, at: String) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(at);
            true
        })
    }

    /// When the abort was requested, if it was.
    pub fn requested_at(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    pub fn is_requested(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Resolve once an abort has been requested.
    pub async fn requested(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|at| at.is_some()).await;
    }
}

impl Default for AbortSignal {
    fn default() -> Self {
        Self::new()
    }
}
