//! Process-local remote store for tests, demos and offline use.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::RemoteError;
use crate::remote::{EntityKind, RemoteStore};
use crate::sync::SyncOp;

/// One call received by an [`InMemoryRemote`].
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCall {
    pub kind: EntityKind,
    pub op: SyncOp,
    /// Target id for updates and deletes.
    pub id: Option<String>,
    /// Record or patch body.
    pub body: Option<Value>,
}

#[derive(Debug, Default)]
struct RemoteState {
    tables: HashMap<EntityKind, BTreeMap<String, Value>>,
    calls: Vec<RemoteCall>,
    fail_next: u32,
    offline: bool,
    latency: Duration,
}

/// A [`RemoteStore`] that keeps rows in memory and assigns UUID ids.
///
/// Failures and latency can be injected to exercise the sync paths.
#[derive(Debug, Default)]
pub struct InMemoryRemote {
    state: Mutex<RemoteState>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.lock().latency = latency;
        self
    }

    /// Make the next `count` calls fail with a retryable error.
    pub fn fail_next(&self, count: u32) {
        self.lock().fail_next = count;
    }

    /// Fail every call until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Insert a row directly, bypassing the call log. Returns its id.
    pub fn seed(&self, kind: EntityKind, mut row: Value) -> String {
        let id = match row.get("id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };
        row["id"] = Value::String(id.clone());
        self.lock().tables.entry(kind).or_default().insert(id.clone(), row);
        id
    }

    /// A stored row.
    pub fn row(&self, kind: EntityKind, id: &str) -> Option<Value> {
        self.lock().tables.get(&kind).and_then(|t| t.get(id)).cloned()
    }

    /// All stored rows of a kind, ordered by id.
    pub fn rows(&self, kind: EntityKind) -> Vec<Value> {
        self.lock()
            .tables
            .get(&kind)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.lock().tables.get(&kind).map_or(0, BTreeMap::len)
    }

    /// Every call received so far, including failed ones.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, RemoteState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Log the call and decide whether it fails. Returns the latency to apply.
    fn begin(&self, call: RemoteCall) -> Result<Duration, RemoteError> {
        let mut state = self.lock();
        state.calls.push(call);
        if state.offline {
            return Err(RemoteError::Unavailable("remote store is offline".into()));
        }
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(RemoteError::Unavailable("injected failure".into()));
        }
        Ok(state.latency)
    }

    async fn delay(latency: Duration) {
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemote {
    async fn create(&self, kind: EntityKind, record: Value) -> Result<Value, RemoteError> {
        let latency = self.begin(RemoteCall {
            kind,
            op: SyncOp::Create,
            id: None,
            body: Some(record.clone()),
        })?;
        Self::delay(latency).await;

        let Value::Object(mut row) = record else {
            return Err(RemoteError::InvalidResponse(format!("{kind} record is not an object")));
        };
        let id = Uuid::new_v4().to_string();
        row.insert("id".into(), Value::String(id.clone()));
        let row = Value::Object(row);
        self.lock().tables.entry(kind).or_default().insert(id, row.clone());
        Ok(row)
    }

    async fn update(&self, kind: EntityKind, id: &str, patch: Value) -> Result<(), RemoteError> {
        let latency = self.begin(RemoteCall {
            kind,
            op: SyncOp::Update,
            id: Some(id.to_string()),
            body: Some(patch.clone()),
        })?;
        Self::delay(latency).await;

        let mut state = self.lock();
        let row = state
            .tables
            .get_mut(&kind)
            .and_then(|t| t.get_mut(id))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| RemoteError::NotFound {
                kind,
                id: id.to_string(),
            })?;
        if let Value::Object(fields) = patch {
            for (key, value) in fields {
                row.insert(key, value);
            }
        }
        Ok(())
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<(), RemoteError> {
        let latency = self.begin(RemoteCall {
            kind,
            op: SyncOp::Delete,
            id: Some(id.to_string()),
            body: None,
        })?;
        Self::delay(latency).await;

        if let Some(table) = self.lock().tables.get_mut(&kind) {
            table.remove(id);
        }
        Ok(())
    }

    async fn list(&self, kind: EntityKind) -> Result<Vec<Value>, RemoteError> {
        let latency = {
            let state = self.lock();
            if state.offline {
                return Err(RemoteError::Unavailable("remote store is offline".into()));
            }
            state.latency
        };
        Self::delay(latency).await;
        Ok(self.rows(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_assigns_id() {
        let remote = InMemoryRemote::new();
        let row = remote
            .create(EntityKind::Category, json!({"name": "Knitwear"}))
            .await
            .unwrap();
        let id = row["id"].as_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
        assert_eq!(remote.row(EntityKind::Category, id), Some(row.clone()));
        assert_eq!(remote.count(EntityKind::Category), 1);
    }

    #[tokio::test]
    async fn test_update_merges_and_reports_missing() {
        let remote = InMemoryRemote::new();
        let id = remote.seed(EntityKind::Order, json!({"status": "pending", "total": 100}));
        remote
            .update(EntityKind::Order, &id, json!({"status": "shipped"}))
            .await
            .unwrap();
        assert_eq!(
            remote.row(EntityKind::Order, &id),
            Some(json!({"id": id, "status": "shipped", "total": 100}))
        );

        let err = remote
            .update(EntityKind::Order, "missing", json!({"status": "shipped"}))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let remote = InMemoryRemote::new();
        remote.fail_next(1);
        assert!(remote.delete(EntityKind::Review, "r").await.is_err());
        assert!(remote.delete(EntityKind::Review, "r").await.is_ok());

        remote.set_offline(true);
        assert!(remote.create(EntityKind::Review, json!({})).await.is_err());
        assert!(remote.list(EntityKind::Review).await.is_err());
        remote.set_offline(false);
        assert!(remote.create(EntityKind::Review, json!({})).await.is_ok());

        let ops: Vec<SyncOp> = remote.calls().iter().map(|c| c.op).collect();
        assert_eq!(ops, vec![SyncOp::Delete, SyncOp::Delete, SyncOp::Create, SyncOp::Create]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency() {
        let remote = InMemoryRemote::new().with_latency(Duration::from_secs(2));
        let started = tokio::time::Instant::now();
        remote.create(EntityKind::Product, json!({})).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}
