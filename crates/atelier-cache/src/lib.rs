//! Durable client-side storage for Atelier.
//!
//! Provides a small, typed key-value API with automatic JSON serialization,
//! versioned snapshots of whole-store state, and a hydration signal that
//! tells dependent code when persisted state has been loaded.
//!
//! # Example
//!
//! ```rust,ignore
//! use atelier_cache::{Cache, SnapshotStore};
//!
//! let cache = Cache::open_dir("/var/lib/atelier")?;
//!
//! // Store a value
//! cache.set("cart:items", &items)?;
//!
//! // Retrieve a value
//! let items: Option<Vec<CartLineItem>> = cache.get("cart:items")?;
//!
//! // Versioned snapshots
//! let snapshots = SnapshotStore::<AdminState>::new(cache.clone(), "admin:state");
//! snapshots.save(&state)?;
//! ```

mod backend;
mod error;
mod hydration;
mod kv;
mod snapshot;

pub use backend::{FileBackend, KvBackend, MemoryBackend};
pub use error::CacheError;
pub use hydration::HydrationSignal;
pub use kv::Cache;
pub use snapshot::{Snapshot, SnapshotStore};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{Cache, CacheError, HydrationSignal, Snapshot, SnapshotStore};
}
