//! Back-office entity store for Atelier.
//!
//! Products, categories, collections, orders and reviews are edited
//! optimistically: the local copy changes immediately and the remote write
//! follows in the background.
//!
//! - **AdminStore**: local state, provisional ids, background sync
//! - **RemoteStore**: the database contract, with an HTTP and an in-memory
//!   implementation
//! - **Sync outcomes**: per-write handles, an event stream and a divergence
//!   list for writes that did not land
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use atelier_admin::{AdminStore, RestConfig, RestRemote};
//! use atelier_commerce::prelude::*;
//!
//! let remote = RestRemote::new(RestConfig::new(url, key))?;
//! let store = AdminStore::builder(Arc::new(remote)).build();
//!
//! let pending = store.add_category(CategoryDraft::new("Knitwear"));
//! println!("shown at once as {}", pending.local().id);
//! let category = pending.confirmed().await?;
//! ```

mod entity;
mod error;
mod memory;
mod remote;
mod rest;
mod retry;
mod state;
mod store;
mod sync;

pub use entity::Entity;
pub use error::{RemoteError, SyncError};
pub use memory::{InMemoryRemote, RemoteCall};
pub use remote::{EntityKind, RemoteStore};
pub use rest::{RestConfig, RestRemote};
pub use retry::{BackoffStrategy, RetryPolicy};
pub use state::AdminState;
pub use store::{AdminStore, AdminStoreBuilder, ADMIN_STORAGE_KEY};
pub use sync::{Divergence, Pending, SyncEvent, SyncHandle, SyncOp};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        AdminState, AdminStore, EntityKind, InMemoryRemote, RemoteStore, RestConfig, RestRemote,
        RetryPolicy, SyncError, SyncEvent, SyncHandle,
    };
}
