//! Versioned snapshots of client-side state.

use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{Cache, CacheError};

/// A persisted copy of some state, with a monotonically increasing version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot<T> {
    /// Store key the snapshot lives under.
    pub key: String,
    /// The persisted state.
    pub data: T,
    /// Incremented on every save, starting at 1.
    pub version: u64,
    /// When the snapshot was written (Unix timestamp).
    pub saved_at: u64,
}

#[derive(Serialize)]
struct SnapshotRef<'a, T> {
    key: &'a str,
    data: &'a T,
    version: u64,
    saved_at: u64,
}

#[derive(Deserialize)]
struct SnapshotHeader {
    version: u64,
}

/// Reads and writes one [`Snapshot`] under a fixed key.
///
/// # Example
///
/// ```rust,ignore
/// let store = SnapshotStore::<Vec<CartLineItem>>::new(cache, "cart:items");
/// store.save(&items)?;
/// let restored = store.load()?.unwrap_or_default();
/// ```
pub struct SnapshotStore<T> {
    cache: Cache,
    key: String,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> Clone for SnapshotStore<T> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            key: self.key.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for SnapshotStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore").field("key", &self.key).finish()
    }
}

impl<T> SnapshotStore<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Create a snapshot store for `key` on top of `cache`.
    pub fn new(cache: Cache, key: impl Into<String>) -> Self {
        Self {
            cache,
            key: key.into(),
            _phantom: PhantomData,
        }
    }

    /// The key this store writes to.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the stored state, if any.
    pub fn load(&self) -> Result<Option<T>, CacheError> {
        Ok(self.load_versioned()?.map(|s| s.data))
    }

    /// Load the stored state together with its version metadata.
    pub fn load_versioned(&self) -> Result<Option<Snapshot<T>>, CacheError> {
        self.cache.get::<Snapshot<T>>(&self.key)
    }

    /// Persist `data`, returning the new version.
    pub fn save(&self, data: &T) -> Result<u64, CacheError> {
        let version = self
            .cache
            .get::<SnapshotHeader>(&self.key)
            .ok()
            .flatten()
            .map(|h| h.version + 1)
            .unwrap_or(1);

        let snapshot = SnapshotRef {
            key: &self.key,
            data,
            version,
            saved_at: current_timestamp(),
        };
        self.cache.set(&self.key, &snapshot)?;
        Ok(version)
    }

    /// Remove the stored snapshot.
    pub fn clear(&self) -> Result<(), CacheError> {
        self.cache.delete(&self.key)
    }
}

fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load() {
        let store = SnapshotStore::<Vec<String>>::new(Cache::in_memory(), "cart:items");
        assert_eq!(store.load().unwrap(), None);

        let items = vec!["a".to_string(), "b".to_string()];
        store.save(&items).unwrap();
        assert_eq!(store.load().unwrap(), Some(items));
    }

    #[test]
    fn test_version_increments() {
        let store = SnapshotStore::<u32>::new(Cache::in_memory(), "counter");
        assert_eq!(store.save(&1).unwrap(), 1);
        assert_eq!(store.save(&2).unwrap(), 2);
        assert_eq!(store.save(&3).unwrap(), 3);

        let snap = store.load_versioned().unwrap().unwrap();
        assert_eq!(snap.version, 3);
        assert_eq!(snap.data, 3);
        assert_eq!(snap.key, "counter");
    }

    #[test]
    fn test_clear_resets_version() {
        let store = SnapshotStore::<u32>::new(Cache::in_memory(), "counter");
        store.save(&1).unwrap();
        store.save(&1).unwrap();
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        assert_eq!(store.save(&1).unwrap(), 1);
    }

    #[test]
    fn test_survives_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SnapshotStore::<Vec<u32>>::new(Cache::open_dir(dir.path()).unwrap(), "nums");
            store.save(&vec![3, 1, 2]).unwrap();
        }
        let store = SnapshotStore::<Vec<u32>>::new(Cache::open_dir(dir.path()).unwrap(), "nums");
        assert_eq!(store.load().unwrap(), Some(vec![3, 1, 2]));
    }
}
