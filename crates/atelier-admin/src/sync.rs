//! Outcomes of background writes: handles, events and divergences.

use atelier_commerce::RecordId;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::oneshot;

use crate::error::SyncError;
use crate::remote::EntityKind;

/// The kind of remote write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOp {
    Create,
    Update,
    Delete,
}

impl SyncOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOp::Create => "create",
            SyncOp::Update => "update",
            SyncOp::Delete => "delete",
        }
    }
}

impl fmt::Display for SyncOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Published on the store's event stream as background writes settle.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A create landed and the record now carries its server id.
    Confirmed {
        kind: EntityKind,
        provisional: RecordId,
        confirmed: RecordId,
    },
    /// An update or delete landed.
    Synced {
        kind: EntityKind,
        record_id: RecordId,
        op: SyncOp,
    },
    /// A write failed; the local change stays in place.
    Failed {
        kind: EntityKind,
        record_id: RecordId,
        op: SyncOp,
        error: SyncError,
    },
}

/// A record whose local state is known not to match the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Divergence {
    pub kind: EntityKind,
    pub record_id: RecordId,
    /// The write that failed.
    pub op: SyncOp,
    /// Rendered error of the last failure.
    pub error: String,
    /// When the failure was recorded (millis).
    pub at: i64,
}

/// An optimistically created record and the eventual server copy.
///
/// Dropping a `Pending` does not cancel the write.
#[derive(Debug)]
pub struct Pending<T> {
    local: T,
    rx: oneshot::Receiver<Result<T, SyncError>>,
}

impl<T> Pending<T> {
    pub(crate) fn new(local: T, rx: oneshot::Receiver<Result<T, SyncError>>) -> Self {
        Self { local, rx }
    }

    /// The record as applied locally, under its provisional id.
    pub fn local(&self) -> &T {
        &self.local
    }

    /// Wait for the create to settle and return the authoritative record.
    pub async fn confirmed(self) -> Result<T, SyncError> {
        self.rx.await.unwrap_or(Err(SyncError::Dropped))
    }
}

/// Completion of an update or delete.
///
/// Dropping a `SyncHandle` does not cancel the write.
#[derive(Debug)]
pub struct SyncHandle {
    rx: oneshot::Receiver<Result<(), SyncError>>,
}

impl SyncHandle {
    pub(crate) fn channel() -> (oneshot::Sender<Result<(), SyncError>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// A handle that has already settled.
    pub(crate) fn ready(result: Result<(), SyncError>) -> Self {
        let (tx, handle) = Self::channel();
        let _ = tx.send(result);
        handle
    }

    /// Wait for the write to settle.
    pub async fn outcome(self) -> Result<(), SyncError> {
        self.rx.await.unwrap_or(Err(SyncError::Dropped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ready_handle() {
        assert_eq!(SyncHandle::ready(Ok(())).outcome().await, Ok(()));
    }

    #[tokio::test]
    async fn test_dropped_sender_reports_dropped() {
        let (tx, handle) = SyncHandle::channel();
        drop(tx);
        assert_eq!(handle.outcome().await, Err(SyncError::Dropped));
    }

    #[tokio::test]
    async fn test_pending_exposes_local_then_confirmed() {
        let (tx, rx) = oneshot::channel();
        let pending = Pending::new("local".to_string(), rx);
        assert_eq!(pending.local(), "local");
        tx.send(Ok("server".to_string())).unwrap();
        assert_eq!(pending.confirmed().await.unwrap(), "server");
    }
}
