//! Readiness flag for stores that load persisted state at startup.

use std::sync::Arc;

use tokio::sync::watch;

/// Flips once from "loading" to "ready" after persisted state has been read.
///
/// Clones observe the same flag, so a store can hand one out to UI code that
/// needs to wait before rendering.
#[derive(Debug, Clone)]
pub struct HydrationSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for HydrationSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl HydrationSignal {
    /// A signal that has not hydrated yet.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// A signal that is already ready (nothing to load).
    pub fn ready() -> Self {
        let signal = Self::new();
        signal.mark_hydrated();
        signal
    }

    /// Mark hydration as complete and wake all waiters.
    pub fn mark_hydrated(&self) {
        self.tx.send_replace(true);
    }

    /// Whether hydration has completed.
    pub fn is_hydrated(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until hydration has completed. Returns immediately if it already has.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so the channel cannot close here.
        let _ = rx.wait_for(|hydrated| *hydrated).await;
    }
}
