//! Admin sync error types.

use atelier_commerce::RecordId;
use thiserror::Error;

use crate::remote::EntityKind;
use crate::sync::SyncOp;

/// Errors returned by a [`RemoteStore`](crate::RemoteStore).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    /// Failed to reach the remote store.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Request timed out.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// HTTP error response.
    #[error("HTTP {status} for {url}: {message}")]
    Http {
        status: u16,
        url: String,
        message: String,
    },

    /// The addressed row does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    /// The store answered with something that is not a record.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The store is refusing writes (offline, injected failure).
    #[error("Remote unavailable: {0}")]
    Unavailable(String),
}

impl RemoteError {
    /// Whether trying the same request again could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Connection(_) | RemoteError::Timeout(_) | RemoteError::Unavailable(_) => {
                true
            }
            RemoteError::Http { status, .. } => *status == 429 || (500..600).contains(status),
            RemoteError::NotFound { .. } | RemoteError::InvalidResponse(_) => false,
        }
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(e: serde_json::Error) -> Self {
        RemoteError::InvalidResponse(e.to_string())
    }
}

/// Why a background write did not land.
///
/// Delivered through [`Pending`](crate::Pending), [`SyncHandle`](crate::SyncHandle)
/// and [`SyncEvent::Failed`](crate::SyncEvent).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    /// The remote store rejected the write, after any retries.
    #[error("{op} of {kind} {record_id} failed after {attempts} attempt(s): {source}")]
    Remote {
        kind: EntityKind,
        record_id: RecordId,
        op: SyncOp,
        attempts: u32,
        #[source]
        source: RemoteError,
    },

    /// The record never got a server id, so the write could not be sent.
    #[error("{kind} {record_id} was never confirmed by the remote store")]
    Unconfirmed { kind: EntityKind, record_id: RecordId },

    /// A record could not be converted to or from its JSON form.
    #[error("Could not encode {kind} record: {message}")]
    Encode { kind: EntityKind, message: String },

    /// The background task went away without reporting.
    #[error("Sync task ended without a result")]
    Dropped,
}

impl SyncError {
    /// The remote failure underneath, if any.
    pub fn remote_error(&self) -> Option<&RemoteError> {
        match self {
            SyncError::Remote { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(RemoteError::Timeout("5s".into()).is_retryable());
        assert!(RemoteError::Unavailable("offline".into()).is_retryable());
        assert!(RemoteError::Http { status: 503, url: String::new(), message: String::new() }.is_retryable());
        assert!(RemoteError::Http { status: 429, url: String::new(), message: String::new() }.is_retryable());
        assert!(!RemoteError::Http { status: 409, url: String::new(), message: String::new() }.is_retryable());
        assert!(!RemoteError::NotFound { kind: EntityKind::Product, id: "x".into() }.is_retryable());
    }

    #[test]
    fn test_sync_error_message() {
        let err = SyncError::Remote {
            kind: EntityKind::Category,
            record_id: RecordId::confirmed("c1"),
            op: SyncOp::Delete,
            attempts: 2,
            source: RemoteError::Connection("refused".into()),
        };
        assert_eq!(
            err.to_string(),
            "delete of category c1 failed after 2 attempt(s): Connection failed: refused"
        );
        assert!(err.remote_error().is_some());
    }
}
