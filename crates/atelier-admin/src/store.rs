//! Optimistic admin entity store.
//!
//! Every mutation is applied to the local state and returned to the caller
//! at once; the matching remote write runs on the Tokio runtime in the
//! background. Its outcome arrives through the returned handle, the event
//! stream and [`AdminStore::divergences`]. Local changes are never rolled
//! back.
//!
//! Mutating methods spawn tasks and must be called from within a Tokio
//! runtime.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use atelier_cache::{Cache, CacheError, HydrationSignal, SnapshotStore};
use atelier_commerce::catalog::{
    Category, CategoryDraft, Collection, CollectionDraft, Product, ProductDraft, Review,
    ReviewDraft,
};
use atelier_commerce::orders::{Order, OrderDraft, OrderStatus};
use atelier_commerce::{Clock, RecordId, SystemClock};
use futures::future::join_all;
use serde_json::{Map, Value};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::entity::{create_payload, decode, diff_fields, to_object, Entity};
use crate::error::{RemoteError, SyncError};
use crate::remote::{EntityKind, RemoteStore};
use crate::retry::RetryPolicy;
use crate::state::{membership_patch, AdminState, Reference, ReferenceChange};
use crate::sync::{Divergence, Pending, SyncEvent, SyncHandle, SyncOp};

/// Storage key of the admin snapshot.
pub const ADMIN_STORAGE_KEY: &str = "admin:state";

const EVENT_CAPACITY: usize = 256;

type Waiter = oneshot::Sender<Result<(), SyncError>>;

/// Bookkeeping for a create that has not settled yet.
#[derive(Default)]
struct PendingCreate {
    /// Local edits were made after the create was sent.
    edited: bool,
    /// Collection membership was set after the create was sent.
    membership_dirty: bool,
    /// The record was deleted locally after the create was sent.
    deleted: bool,
    /// Handles of writes held back until the create settles.
    waiters: Vec<Waiter>,
}

#[derive(Default)]
struct Shared {
    data: AdminState,
    pending: HashMap<RecordId, PendingCreate>,
}

/// A remote write ready to be spawned.
struct WriteJob {
    kind: EntityKind,
    id: RecordId,
    op: SyncOp,
    patch: Map<String, Value>,
    waiters: Vec<Waiter>,
}

impl WriteJob {
    fn update(kind: EntityKind, id: RecordId, patch: Map<String, Value>) -> Self {
        Self {
            kind,
            id,
            op: SyncOp::Update,
            patch,
            waiters: Vec::new(),
        }
    }

    fn delete(kind: EntityKind, id: RecordId) -> Self {
        Self {
            kind,
            id,
            op: SyncOp::Delete,
            patch: Map::new(),
            waiters: Vec::new(),
        }
    }
}

struct Inner {
    shared: RwLock<Shared>,
    remote: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    storage: Option<SnapshotStore<AdminState>>,
    events: broadcast::Sender<SyncEvent>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    hydration: HydrationSignal,
}

/// Builder for [`AdminStore`].
pub struct AdminStoreBuilder {
    remote: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    storage: Option<SnapshotStore<AdminState>>,
}

impl AdminStoreBuilder {
    /// Time source for timestamps and provisional ids.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Retry policy for remote writes.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Persist the local state in `cache` under [`ADMIN_STORAGE_KEY`].
    pub fn storage(mut self, cache: Cache) -> Self {
        self.storage = Some(SnapshotStore::new(cache, ADMIN_STORAGE_KEY));
        self
    }

    pub fn build(self) -> AdminStore {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let hydration = if self.storage.is_some() {
            HydrationSignal::new()
        } else {
            HydrationSignal::ready()
        };
        AdminStore {
            inner: Arc::new(Inner {
                shared: RwLock::new(Shared::default()),
                remote: self.remote,
                clock: self.clock,
                retry: self.retry,
                storage: self.storage,
                events,
                tasks: Mutex::new(Vec::new()),
                hydration,
            }),
        }
    }
}

/// Handle to the admin store. Clones share the same state.
#[derive(Clone)]
pub struct AdminStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for AdminStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.read();
        f.debug_struct("AdminStore")
            .field("records", &shared.data.record_count())
            .field("pending_creates", &shared.pending.len())
            .field("divergences", &shared.data.divergences.len())
            .finish()
    }
}

impl AdminStore {
    /// Start building a store that writes through `remote`.
    pub fn builder(remote: Arc<dyn RemoteStore>) -> AdminStoreBuilder {
        AdminStoreBuilder {
            remote,
            clock: Arc::new(SystemClock),
            retry: RetryPolicy::default(),
            storage: None,
        }
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Load the persisted snapshot, replacing the local state.
    ///
    /// The hydration signal flips to ready whatever the outcome. Returns the
    /// number of records loaded.
    pub fn hydrate(&self) -> Result<usize, CacheError> {
        let result = self.load_snapshot();
        self.inner.hydration.mark_hydrated();
        result
    }

    fn load_snapshot(&self) -> Result<usize, CacheError> {
        let Some(storage) = &self.inner.storage else {
            return Ok(0);
        };
        let Some(data) = storage.load()? else {
            return Ok(0);
        };
        let count = data.record_count();
        self.write().data = data;
        debug!(count, key = storage.key(), "hydrated admin store");
        Ok(count)
    }

    /// Signal that flips once the snapshot has been loaded.
    pub fn hydration(&self) -> HydrationSignal {
        self.inner.hydration.clone()
    }

    /// Replace the confirmed records with what the remote store holds.
    ///
    /// Records still waiting for a server id are kept, and so are records
    /// whose create confirmed while the listing was in flight. Rows that do
    /// not parse are skipped with a warning.
    pub async fn refresh(&self) -> Result<usize, SyncError> {
        let confirmed_before: HashSet<RecordId> =
            self.read().data.aliases.values().cloned().collect();
        let remote = self.inner.remote.clone();
        let mut rows = HashMap::new();
        for kind in EntityKind::ALL {
            let fetched = remote.list(kind).await.map_err(|source| SyncError::Remote {
                kind,
                record_id: RecordId::confirmed("*"),
                op: SyncOp::Update,
                attempts: 1,
                source,
            })?;
            rows.insert(kind, fetched);
        }

        let mut shared = self.write();
        let data = &mut shared.data;
        // Creates that landed after the listing started: the local copy wins.
        let landed: HashSet<RecordId> = data
            .aliases
            .values()
            .filter(|id| !confirmed_before.contains(*id))
            .cloned()
            .collect();
        let mut memberships = HashMap::new();
        if let Some(collections) = rows.get(&EntityKind::Collection) {
            for row in collections {
                let Some(id) = row.get("id").and_then(Value::as_str) else {
                    continue;
                };
                let members: Vec<RecordId> = row
                    .get("product_ids")
                    .and_then(Value::as_array)
                    .map(|ids| ids.iter().filter_map(Value::as_str).map(RecordId::from).collect())
                    .unwrap_or_default();
                let id = RecordId::from(id);
                if !landed.contains(&id) {
                    memberships.insert(id, members);
                }
            }
        }
        data.collection_products
            .retain(|id, _| id.is_provisional() || landed.contains(id));
        data.collection_products.extend(memberships);

        let mut count = 0;
        count += replace_confirmed::<Product>(data, rows.remove(&EntityKind::Product), &landed);
        count += replace_confirmed::<Category>(data, rows.remove(&EntityKind::Category), &landed);
        count += replace_confirmed::<Collection>(data, rows.remove(&EntityKind::Collection), &landed);
        count += replace_confirmed::<Order>(data, rows.remove(&EntityKind::Order), &landed);
        count += replace_confirmed::<Review>(data, rows.remove(&EntityKind::Review), &landed);
        data.divergences
            .retain(|d| d.record_id.is_provisional() || landed.contains(&d.record_id));
        self.persist(data);
        info!(count, "refreshed admin store from remote");
        Ok(count)
    }

    /// Push local state for every diverged record again.
    ///
    /// Provisional records get a fresh create, deleted records a fresh
    /// delete, everything else its full current field set.
    pub fn resync(&self) -> Vec<SyncHandle> {
        let mut handles = Vec::new();
        let mut jobs = Vec::new();
        let mut creates: Vec<(EntityKind, RecordId)> = Vec::new();
        let mut stale: Vec<(EntityKind, RecordId)> = Vec::new();
        {
            let shared = self.read();
            let data = &shared.data;
            for (kind, id) in data.provisional_ids() {
                if !shared.pending.contains_key(&id) {
                    creates.push((kind, id));
                }
            }
            for divergence in &data.divergences {
                let (kind, id) = (divergence.kind, divergence.record_id.clone());
                if id.is_provisional() {
                    continue;
                }
                match divergence.op {
                    SyncOp::Delete => jobs.push(WriteJob::delete(kind, id)),
                    SyncOp::Create | SyncOp::Update => match full_patch(data, kind, &id) {
                        Some(patch) => jobs.push(WriteJob::update(kind, id, patch)),
                        None => stale.push((kind, id)),
                    },
                }
            }
        }

        if !stale.is_empty() {
            let mut shared = self.write();
            for (kind, id) in &stale {
                shared.data.clear_divergence(*kind, id);
                warn!(
                    kind = %kind,
                    record_id = %id,
                    "dropping divergence of a record no longer held locally"
                );
            }
            self.persist(&shared.data);
        }

        for (kind, id) in creates {
            let handle = match kind {
                EntityKind::Product => self.recreate::<Product>(&id),
                EntityKind::Category => self.recreate::<Category>(&id),
                EntityKind::Collection => self.recreate::<Collection>(&id),
                EntityKind::Order => self.recreate::<Order>(&id),
                EntityKind::Review => self.recreate::<Review>(&id),
            };
            handles.extend(handle);
        }
        for job in jobs {
            handles.push(self.spawn_write(job));
        }
        info!(writes = handles.len(), "resync issued");
        handles
    }

    /// Wait until every background write, including follow-ups, has settled.
    pub async fn flush(&self) {
        loop {
            let tasks = std::mem::take(&mut *self.tasks());
            if tasks.is_empty() {
                break;
            }
            for result in join_all(tasks).await {
                if let Err(e) = result {
                    warn!(error = %e, "sync task did not complete");
                }
            }
        }
    }

    /// Stream of settled writes.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    /// Records whose last remote write failed.
    pub fn divergences(&self) -> Vec<Divergence> {
        self.read().data.divergences.clone()
    }

    /// Number of creates still waiting for a server id.
    pub fn pending_creates(&self) -> usize {
        self.read().pending.len()
    }

    /// A copy of the whole local state.
    pub fn snapshot(&self) -> AdminState {
        self.read().data.clone()
    }

    /// The id a record is known by now; provisional ids that were confirmed
    /// map to their server id.
    pub fn resolve_id(&self, id: &RecordId) -> RecordId {
        self.read().data.resolve(id)
    }

    // ---------------------------------------------------------------------
    // Products
    // ---------------------------------------------------------------------

    pub fn add_product(&self, draft: ProductDraft) -> Pending<Product> {
        self.create(|id, now| Product::from_draft(id, draft, now))
    }

    pub fn update_product(&self, id: &RecordId, f: impl FnOnce(&mut Product)) -> SyncHandle {
        self.update::<Product>(id, f)
    }

    /// Delete a product and drop it from every collection locally. The
    /// remote store removes membership rows itself.
    pub fn delete_product(&self, id: &RecordId) -> SyncHandle {
        self.delete::<Product>(id, |data, id, _| {
            data.prune_product(id);
            Vec::new()
        })
    }

    pub fn products(&self) -> Vec<Product> {
        self.read().data.products.clone()
    }

    pub fn product(&self, id: &RecordId) -> Option<Product> {
        self.find::<Product>(id)
    }

    // ---------------------------------------------------------------------
    // Categories
    // ---------------------------------------------------------------------

    pub fn add_category(&self, draft: CategoryDraft) -> Pending<Category> {
        self.create(|id, now| Category::from_draft(id, draft, now))
    }

    pub fn update_category(&self, id: &RecordId, f: impl FnOnce(&mut Category)) -> SyncHandle {
        self.update::<Category>(id, f)
    }

    /// Delete a category. Products in it become uncategorized, locally and
    /// through a `category_id: null` patch each.
    pub fn delete_category(&self, id: &RecordId) -> SyncHandle {
        self.delete::<Category>(id, |data, id, now| data.uncategorize(id, now))
    }

    pub fn categories(&self) -> Vec<Category> {
        self.read().data.categories.clone()
    }

    pub fn category(&self, id: &RecordId) -> Option<Category> {
        self.find::<Category>(id)
    }

    // ---------------------------------------------------------------------
    // Collections
    // ---------------------------------------------------------------------

    pub fn add_collection(&self, draft: CollectionDraft) -> Pending<Collection> {
        self.create(|id, now| Collection::from_draft(id, draft, now))
    }

    pub fn update_collection(&self, id: &RecordId, f: impl FnOnce(&mut Collection)) -> SyncHandle {
        self.update::<Collection>(id, f)
    }

    pub fn delete_collection(&self, id: &RecordId) -> SyncHandle {
        self.delete::<Collection>(id, |data, id, _| {
            data.collection_products.remove(id);
            Vec::new()
        })
    }

    /// Replace a collection's ordered product list. Duplicates are dropped,
    /// keeping the first occurrence.
    pub fn set_collection_products(&self, id: &RecordId, product_ids: Vec<RecordId>) -> SyncHandle {
        let mut shared = self.write();
        let Shared { data, pending } = &mut *shared;
        let id = data.resolve(id);
        if !data.collections.iter().any(|c| c.id == id) {
            debug!(kind = %EntityKind::Collection, record_id = %id, "membership change on missing record ignored");
            return SyncHandle::ready(Ok(()));
        }

        let mut members: Vec<RecordId> = Vec::with_capacity(product_ids.len());
        for product_id in product_ids {
            let product_id = data.resolve(&product_id);
            if !members.contains(&product_id) {
                members.push(product_id);
            }
        }
        debug!(record_id = %id, members = members.len(), "set collection products");
        let patch = membership_patch(&members);
        data.collection_products.insert(id.clone(), members);
        self.persist(data);

        if id.is_provisional() {
            return hold_until_confirmed(pending, EntityKind::Collection, id, |p| {
                p.membership_dirty = true
            });
        }
        drop(shared);
        self.spawn_write(WriteJob::update(EntityKind::Collection, id, patch))
    }

    pub fn collection_products(&self, id: &RecordId) -> Vec<RecordId> {
        let shared = self.read();
        let id = shared.data.resolve(id);
        shared.data.collection_products.get(&id).cloned().unwrap_or_default()
    }

    /// Products of a collection in display order, skipping unknown ids.
    pub fn products_in_collection(&self, id: &RecordId) -> Vec<Product> {
        let shared = self.read();
        let id = shared.data.resolve(id);
        shared
            .data
            .collection_products
            .get(&id)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|pid| shared.data.products.iter().find(|p| &p.id == pid).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn collections(&self) -> Vec<Collection> {
        self.read().data.collections.clone()
    }

    pub fn collection(&self, id: &RecordId) -> Option<Collection> {
        self.find::<Collection>(id)
    }

    // ---------------------------------------------------------------------
    // Orders
    // ---------------------------------------------------------------------

    pub fn add_order(&self, draft: OrderDraft) -> Pending<Order> {
        self.create(|id, now| Order::from_draft(id, draft, now))
    }

    /// Set an order's status and, if given, its tracking number. Any
    /// status may follow any other.
    pub fn update_order_status(
        &self,
        id: &RecordId,
        status: OrderStatus,
        tracking_number: Option<String>,
    ) -> SyncHandle {
        let now = self.now();
        self.update::<Order>(id, |order| order.set_status(status, tracking_number, now))
    }

    pub fn delete_order(&self, id: &RecordId) -> SyncHandle {
        self.delete::<Order>(id, |_, _, _| Vec::new())
    }

    pub fn orders(&self) -> Vec<Order> {
        self.read().data.orders.clone()
    }

    pub fn order(&self, id: &RecordId) -> Option<Order> {
        self.find::<Order>(id)
    }

    // ---------------------------------------------------------------------
    // Reviews
    // ---------------------------------------------------------------------

    pub fn add_review(&self, draft: ReviewDraft) -> Pending<Review> {
        self.create(|id, now| Review::from_draft(id, draft, now))
    }

    pub fn approve_review(&self, id: &RecordId) -> SyncHandle {
        self.update::<Review>(id, |review| review.is_approved = true)
    }

    pub fn reject_review(&self, id: &RecordId) -> SyncHandle {
        self.update::<Review>(id, |review| review.is_approved = false)
    }

    pub fn set_review_featured(&self, id: &RecordId, featured: bool) -> SyncHandle {
        self.update::<Review>(id, |review| review.is_featured = featured)
    }

    pub fn delete_review(&self, id: &RecordId) -> SyncHandle {
        self.delete::<Review>(id, |_, _, _| Vec::new())
    }

    pub fn reviews(&self) -> Vec<Review> {
        self.read().data.reviews.clone()
    }

    pub fn review(&self, id: &RecordId) -> Option<Review> {
        self.find::<Review>(id)
    }

    pub fn reviews_for_product(&self, product_id: &RecordId) -> Vec<Review> {
        let shared = self.read();
        let product_id = shared.data.resolve(product_id);
        shared
            .data
            .reviews
            .iter()
            .filter(|r| r.product_id == product_id)
            .cloned()
            .collect()
    }

    // ---------------------------------------------------------------------
    // Generic mutation paths
    // ---------------------------------------------------------------------

    fn create<T: Entity>(&self, build: impl FnOnce(RecordId, i64) -> T) -> Pending<T> {
        let now = self.now();
        let id = RecordId::provisional(T::KIND.id_prefix(), self.inner.clock.as_ref());
        let record = build(id.clone(), now);
        {
            let mut shared = self.write();
            T::records_mut(&mut shared.data).push(record.clone());
            shared.pending.insert(id.clone(), PendingCreate::default());
            self.persist(&shared.data);
        }
        debug!(kind = %T::KIND, record_id = %id, op = "create", "applied locally");
        self.spawn_create(record)
    }

    /// Send a create for a provisional record that has none in flight.
    fn recreate<T: Entity>(&self, id: &RecordId) -> Option<SyncHandle> {
        let record = {
            let mut shared = self.write();
            let record = T::records(&shared.data).iter().find(|r| r.id() == id).cloned()?;
            shared.pending.insert(id.clone(), PendingCreate::default());
            record
        };
        let pending = self.spawn_create(record);
        let (tx, handle) = SyncHandle::channel();
        self.spawn(async move {
            let _ = tx.send(pending.confirmed().await.map(|_| ()));
        });
        Some(handle)
    }

    fn spawn_create<T: Entity>(&self, record: T) -> Pending<T> {
        let (tx, rx) = oneshot::channel();
        let store = self.clone();
        let provisional = record.id().clone();
        let payload = create_payload(&record);
        self.spawn(async move {
            let result = store.run_create::<T>(provisional, payload).await;
            let _ = tx.send(result);
        });
        Pending::new(record, rx)
    }

    async fn run_create<T: Entity>(
        &self,
        provisional: RecordId,
        payload: Result<Value, SyncError>,
    ) -> Result<T, SyncError> {
        let kind = T::KIND;
        let remote = self.inner.remote.clone();
        let outcome = match payload {
            Ok(payload) => {
                self.with_retry(kind, &provisional, SyncOp::Create, || {
                    remote.create(kind, payload.clone())
                })
                .await
            }
            Err(e) => Err(e),
        };

        match outcome.and_then(decode::<T>) {
            Ok(server) => Ok(self.confirm_create(provisional, server)),
            Err(err) => {
                self.fail_create(kind, &provisional, &err);
                Err(err)
            }
        }
    }

    /// Swap a provisional record for the server's copy and rewrite every
    /// reference to it.
    fn confirm_create<T: Entity>(&self, provisional: RecordId, server: T) -> T {
        let kind = T::KIND;
        let confirmed = server.id().clone();
        let mut jobs = Vec::new();

        let result = {
            let mut shared = self.write();
            let Shared { data, pending } = &mut *shared;
            let state = pending.remove(&provisional).unwrap_or_default();
            data.aliases.insert(provisional.clone(), confirmed.clone());
            data.clear_divergence(kind, &provisional);

            let result = if state.deleted {
                T::records_mut(data).retain(|r| r.id() != &confirmed);
                jobs.push(WriteJob {
                    waiters: state.waiters,
                    ..WriteJob::delete(kind, confirmed.clone())
                });
                server
            } else {
                let mut patch = Map::new();
                let records = T::records_mut(data);
                if records.iter().any(|r| r.id() == &provisional) {
                    // A refresh may have listed the new row already.
                    records.retain(|r| r.id() != &confirmed);
                }
                let result = match records.iter_mut().find(|r| r.id() == &provisional) {
                    Some(local) if state.edited => {
                        local.set_id(confirmed.clone());
                        if let (Ok(ours), Ok(theirs)) = (to_object(&*local), to_object(&server)) {
                            patch = diff_fields(&theirs, &ours);
                        }
                        local.clone()
                    }
                    Some(local) => {
                        *local = server.clone();
                        server
                    }
                    None => server,
                };
                if state.membership_dirty {
                    let members = data.collection_products.get(&provisional).cloned().unwrap_or_default();
                    patch.extend(membership_patch(&members));
                }
                if patch.is_empty() {
                    for waiter in state.waiters {
                        let _ = waiter.send(Ok(()));
                    }
                } else {
                    jobs.push(WriteJob {
                        waiters: state.waiters,
                        ..WriteJob::update(kind, confirmed.clone(), patch)
                    });
                }
                result
            };

            let references = data.rewrite_references(kind, &provisional, &confirmed);
            jobs.extend(self.reference_jobs(pending, references));
            self.persist(data);
            result
        };

        info!(kind = %kind, provisional = %provisional, record_id = %confirmed, "create confirmed");
        self.emit(SyncEvent::Confirmed {
            kind,
            provisional,
            confirmed,
        });
        for job in jobs {
            self.spawn_write(job);
        }
        result
    }

    fn fail_create(&self, kind: EntityKind, provisional: &RecordId, err: &SyncError) {
        let now = self.now();
        let deleted = {
            let mut shared = self.write();
            let state = shared.pending.remove(provisional).unwrap_or_default();
            if state.deleted {
                // Gone locally and never stored remotely: nothing diverged.
                for waiter in state.waiters {
                    let _ = waiter.send(Ok(()));
                }
            } else {
                for waiter in state.waiters {
                    let _ = waiter.send(Err(SyncError::Unconfirmed {
                        kind,
                        record_id: provisional.clone(),
                    }));
                }
                shared.data.record_divergence(Divergence {
                    kind,
                    record_id: provisional.clone(),
                    op: SyncOp::Create,
                    error: err.to_string(),
                    at: now,
                });
            }
            self.persist(&shared.data);
            state.deleted
        };

        if !deleted {
            error!(kind = %kind, record_id = %provisional, op = "create", error = %err, "remote write failed");
            self.emit(SyncEvent::Failed {
                kind,
                record_id: provisional.clone(),
                op: SyncOp::Create,
                error: err.clone(),
            });
        }
    }

    fn update<T: Entity>(&self, id: &RecordId, f: impl FnOnce(&mut T)) -> SyncHandle {
        let kind = T::KIND;
        let now = self.now();
        let mut shared = self.write();
        let Shared { data, pending } = &mut *shared;
        let id = data.resolve(id);

        let Some(record) = T::records_mut(data).iter_mut().find(|r| r.id() == &id) else {
            debug!(kind = %kind, record_id = %id, "update on missing record ignored");
            return SyncHandle::ready(Ok(()));
        };
        let before = match to_object(&*record) {
            Ok(before) => before,
            Err(e) => return SyncHandle::ready(Err(e)),
        };
        f(record);
        let after = match to_object(&*record) {
            Ok(after) => after,
            Err(e) => return SyncHandle::ready(Err(e)),
        };
        let mut patch = diff_fields(&before, &after);
        if patch.is_empty() {
            return SyncHandle::ready(Ok(()));
        }
        record.touch(now);
        patch.insert("updated_at".into(), Value::from(now));
        debug!(kind = %kind, record_id = %id, op = "update", fields = patch.len(), "applied locally");
        self.persist(data);

        if id.is_provisional() {
            return hold_until_confirmed(pending, kind, id, |p| p.edited = true);
        }
        drop(shared);
        self.spawn_write(WriteJob::update(kind, id, patch))
    }

    fn delete<T: Entity>(
        &self,
        id: &RecordId,
        cascade: impl FnOnce(&mut AdminState, &RecordId, i64) -> Vec<Reference>,
    ) -> SyncHandle {
        let kind = T::KIND;
        let now = self.now();
        let mut shared = self.write();
        let Shared { data, pending } = &mut *shared;
        let id = data.resolve(id);

        let records = T::records_mut(data);
        let Some(position) = records.iter().position(|r| r.id() == &id) else {
            debug!(kind = %kind, record_id = %id, "delete on missing record ignored");
            return SyncHandle::ready(Ok(()));
        };
        records.remove(position);
        let references = cascade(data, &id, now);
        debug!(kind = %kind, record_id = %id, op = "delete", cascaded = references.len(), "applied locally");
        let jobs = self.reference_jobs(pending, references);

        let main = if id.is_provisional() {
            if pending.contains_key(&id) {
                Err(hold_until_confirmed(pending, kind, id, |p| p.deleted = true))
            } else {
                // Never reached the remote store; nothing left to diverge.
                data.clear_divergence(kind, &id);
                Err(SyncHandle::ready(Ok(())))
            }
        } else {
            Ok(WriteJob::delete(kind, id))
        };
        self.persist(data);
        drop(shared);

        for job in jobs {
            self.spawn_write(job);
        }
        match main {
            Ok(job) => self.spawn_write(job),
            Err(handle) => handle,
        }
    }

    /// Turn rewritten references into remote writes. References held by
    /// provisional records ride along with their create's follow-up.
    fn reference_jobs(
        &self,
        pending: &mut HashMap<RecordId, PendingCreate>,
        references: Vec<Reference>,
    ) -> Vec<WriteJob> {
        let mut jobs = Vec::new();
        for reference in references {
            if reference.id.is_provisional() {
                if let Some(p) = pending.get_mut(&reference.id) {
                    match reference.change {
                        ReferenceChange::Fields(_) => p.edited = true,
                        ReferenceChange::Membership(_) => p.membership_dirty = true,
                    }
                }
                continue;
            }
            let patch = match reference.change {
                ReferenceChange::Fields(patch) => patch,
                ReferenceChange::Membership(members) => membership_patch(&members),
            };
            jobs.push(WriteJob::update(reference.kind, reference.id, patch));
        }
        jobs
    }

    // ---------------------------------------------------------------------
    // Background writes
    // ---------------------------------------------------------------------

    fn spawn_write(&self, job: WriteJob) -> SyncHandle {
        let (tx, handle) = SyncHandle::channel();
        let store = self.clone();
        self.spawn(async move {
            let WriteJob {
                kind,
                id,
                op,
                patch,
                waiters,
            } = job;
            let remote = store.inner.remote.clone();
            let result = match op {
                SyncOp::Delete => {
                    store
                        .with_retry(kind, &id, op, || remote.delete(kind, id.as_str()))
                        .await
                }
                SyncOp::Create | SyncOp::Update => {
                    let patch = Value::Object(patch);
                    store
                        .with_retry(kind, &id, op, || remote.update(kind, id.as_str(), patch.clone()))
                        .await
                }
            };
            store.settle(kind, &id, op, &result);
            for waiter in waiters {
                let _ = waiter.send(result.clone());
            }
            let _ = tx.send(result);
        });
        handle
    }

    /// Record the outcome of an update or delete.
    fn settle(&self, kind: EntityKind, id: &RecordId, op: SyncOp, result: &Result<(), SyncError>) {
        match result {
            Ok(()) => {
                let mut shared = self.write();
                if shared.data.clear_divergence(kind, id) {
                    self.persist(&shared.data);
                }
                drop(shared);
                debug!(kind = %kind, record_id = %id, op = %op, "remote write landed");
                self.emit(SyncEvent::Synced {
                    kind,
                    record_id: id.clone(),
                    op,
                });
            }
            Err(err) => {
                let now = self.now();
                {
                    let mut shared = self.write();
                    shared.data.record_divergence(Divergence {
                        kind,
                        record_id: id.clone(),
                        op,
                        error: err.to_string(),
                        at: now,
                    });
                    self.persist(&shared.data);
                }
                error!(kind = %kind, record_id = %id, op = %op, error = %err, "remote write failed");
                self.emit(SyncEvent::Failed {
                    kind,
                    record_id: id.clone(),
                    op,
                    error: err.clone(),
                });
            }
        }
    }

    async fn with_retry<T, F, Fut>(
        &self,
        kind: EntityKind,
        id: &RecordId,
        op: SyncOp,
        mut call: F,
    ) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let retry = &self.inner.retry;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if retry.should_retry(&e, attempt) => {
                    warn!(kind = %kind, record_id = %id, op = %op, attempt, error = %e, "remote write failed, retrying");
                    tokio::time::sleep(retry.delay_after(attempt)).await;
                }
                Err(source) => {
                    return Err(SyncError::Remote {
                        kind,
                        record_id: id.clone(),
                        op,
                        attempts: attempt,
                        source,
                    })
                }
            }
        }
    }

    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        let mut tasks = self.tasks();
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    fn find<T: Entity>(&self, id: &RecordId) -> Option<T> {
        let shared = self.read();
        let id = shared.data.resolve(id);
        T::records(&shared.data).iter().find(|r| r.id() == &id).cloned()
    }

    fn persist(&self, data: &AdminState) {
        let Some(storage) = &self.inner.storage else {
            return;
        };
        if let Err(e) = storage.save(data) {
            warn!(error = %e, key = storage.key(), "failed to persist admin state");
        }
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    fn now(&self) -> i64 {
        self.inner.clock.now_millis()
    }

    fn read(&self) -> RwLockReadGuard<'_, Shared> {
        self.inner.shared.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Shared> {
        self.inner.shared.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn tasks(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Park a write against a provisional record until its create settles.
fn hold_until_confirmed(
    pending: &mut HashMap<RecordId, PendingCreate>,
    kind: EntityKind,
    id: RecordId,
    mark: impl FnOnce(&mut PendingCreate),
) -> SyncHandle {
    match pending.get_mut(&id) {
        Some(p) => {
            mark(p);
            let (tx, handle) = SyncHandle::channel();
            p.waiters.push(tx);
            handle
        }
        None => SyncHandle::ready(Err(SyncError::Unconfirmed { kind, record_id: id })),
    }
}

/// Every field of a record except its id, as a patch.
fn full_patch(data: &AdminState, kind: EntityKind, id: &RecordId) -> Option<Map<String, Value>> {
    fn fields<T: Entity>(data: &AdminState, id: &RecordId) -> Option<Map<String, Value>> {
        let record = T::records(data).iter().find(|r| r.id() == id)?;
        let mut map = to_object(record).ok()?;
        map.remove("id");
        Some(map)
    }
    let mut patch = match kind {
        EntityKind::Product => fields::<Product>(data, id),
        EntityKind::Category => fields::<Category>(data, id),
        EntityKind::Collection => fields::<Collection>(data, id),
        EntityKind::Order => fields::<Order>(data, id),
        EntityKind::Review => fields::<Review>(data, id),
    }?;
    if kind == EntityKind::Collection {
        if let Some(members) = data.collection_products.get(id) {
            patch.extend(membership_patch(members));
        }
    }
    Some(patch)
}

/// Swap the confirmed records of one kind for remote rows. Records in
/// `landed` keep their local copy.
fn replace_confirmed<T: Entity>(
    data: &mut AdminState,
    rows: Option<Vec<Value>>,
    landed: &HashSet<RecordId>,
) -> usize {
    let mut fresh: Vec<T> = Vec::new();
    for row in rows.unwrap_or_default() {
        match decode::<T>(row) {
            Ok(record) if landed.contains(record.id()) => {}
            Ok(record) => fresh.push(record),
            Err(e) => warn!(kind = %T::KIND, error = %e, "skipping unreadable remote row"),
        }
    }
    let records = T::records_mut(data);
    records.retain(|r| r.id().is_provisional() || landed.contains(r.id()));
    let count = fresh.len() + records.iter().filter(|r| landed.contains(r.id())).count();
    records.extend(fresh);
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryRemote;
    use crate::retry::BackoffStrategy;
    use atelier_commerce::{ManualClock, Money};
    use serde_json::json;
    use std::time::Duration;

    fn store_with(remote: &Arc<InMemoryRemote>) -> AdminStore {
        AdminStore::builder(remote.clone())
            .clock(Arc::new(ManualClock::new(1_700_000_000_000)))
            .build()
    }

    fn product(id: &str, category: Option<&RecordId>) -> Product {
        let mut draft = ProductDraft::new("Silk Slip Dress", Money::gbp(12000)).with_stock(4);
        draft.category_id = category.cloned();
        Product::from_draft(RecordId::confirmed(id), draft, 0)
    }

    fn seed<T: Entity>(remote: &InMemoryRemote, record: &T) {
        remote.seed(T::KIND, serde_json::to_value(record).unwrap());
    }

    #[tokio::test]
    async fn test_create_swaps_in_server_id() {
        let remote = Arc::new(InMemoryRemote::new());
        let store = store_with(&remote);

        let pending = store.add_category(CategoryDraft::new("Outerwear"));
        let provisional = pending.local().id.clone();
        assert!(provisional.is_provisional());
        assert_eq!(store.categories().len(), 1);
        assert_eq!(store.pending_creates(), 1);

        let confirmed = pending.confirmed().await.unwrap();
        assert!(confirmed.id.is_confirmed());
        assert_eq!(confirmed.name, "Outerwear");

        let categories = store.categories();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].id, confirmed.id);
        assert_eq!(store.pending_creates(), 0);
        assert_eq!(store.resolve_id(&provisional), confirmed.id);
        assert_eq!(store.category(&provisional).map(|c| c.id), Some(confirmed.id.clone()));
        assert_eq!(remote.count(EntityKind::Category), 1);
    }

    #[tokio::test]
    async fn test_delete_category_uncategorizes_products() {
        let cat = RecordId::confirmed("cat-1");
        let category = Category::from_draft(cat.clone(), CategoryDraft::new("Dresses"), 0);
        let products = vec![
            product("p1", Some(&cat)),
            product("p2", Some(&cat)),
            product("p3", None),
        ];

        let remote = Arc::new(InMemoryRemote::new());
        seed(&remote, &category);
        products.iter().for_each(|p| seed(&remote, p));

        let cache = Cache::in_memory();
        SnapshotStore::<AdminState>::new(cache.clone(), ADMIN_STORAGE_KEY)
            .save(&AdminState {
                categories: vec![category],
                products,
                ..Default::default()
            })
            .unwrap();

        let store = AdminStore::builder(remote.clone()).storage(cache).build();
        assert!(!store.hydration().is_hydrated());
        assert_eq!(store.hydrate().unwrap(), 4);
        assert!(store.hydration().is_hydrated());

        store.delete_category(&cat).outcome().await.unwrap();
        store.flush().await;

        assert!(store.categories().is_empty());
        assert!(store.products().iter().all(|p| p.category_id.is_none()));
        assert_eq!(remote.count(EntityKind::Category), 0);
        for id in ["p1", "p2"] {
            assert_eq!(remote.row(EntityKind::Product, id).unwrap()["category_id"], Value::Null);
        }
        assert!(store.divergences().is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_keeps_local_change_and_reports() {
        let remote = Arc::new(InMemoryRemote::new());
        let store = store_with(&remote);
        let p1 = product("p1", None);
        seed(&remote, &p1);
        store.write().data.products.push(p1.clone());

        let mut events = store.subscribe();
        remote.set_offline(true);
        let result = store
            .update_product(&p1.id, |p| p.name = "Silk Slip Dress (Ivory)".into())
            .outcome()
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.remote_error(), Some(&RemoteError::Unavailable("remote store is offline".into())));
        assert_eq!(store.product(&p1.id).unwrap().name, "Silk Slip Dress (Ivory)");

        match events.recv().await.unwrap() {
            SyncEvent::Failed { kind, record_id, op, .. } => {
                assert_eq!((kind, record_id, op), (EntityKind::Product, p1.id.clone(), SyncOp::Update));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        let divergences = store.divergences();
        assert_eq!(divergences.len(), 1);
        assert_eq!(divergences[0].op, SyncOp::Update);

        // A later successful write clears the divergence.
        remote.set_offline(false);
        store.update_product(&p1.id, |p| p.stock_quantity = 9).outcome().await.unwrap();
        assert!(store.divergences().is_empty());
    }

    #[tokio::test]
    async fn test_failed_create_keeps_provisional_record() {
        let remote = Arc::new(InMemoryRemote::new());
        let store = store_with(&remote);
        remote.set_offline(true);

        let pending = store.add_order(OrderDraft::new("Ada Lovelace", "ada@example.com"));
        let id = pending.local().id.clone();
        let err = pending.confirmed().await.unwrap_err();
        assert!(matches!(err, SyncError::Remote { op: SyncOp::Create, .. }));

        assert_eq!(store.order(&id).map(|o| o.id), Some(id.clone()));
        assert_eq!(store.divergences()[0].record_id, id);

        // Writes against it cannot be sent until it exists remotely.
        let held = store.update_order_status(&id, OrderStatus::Processing, None);
        assert!(matches!(held.outcome().await, Err(SyncError::Unconfirmed { .. })));

        remote.set_offline(false);
        for handle in store.resync() {
            handle.outcome().await.unwrap();
        }
        store.flush().await;
        assert_eq!(remote.count(EntityKind::Order), 1);
        assert!(store.divergences().is_empty());
        let orders = store.orders();
        assert_eq!(orders.len(), 1);
        assert!(orders[0].id.is_confirmed());
        assert_eq!(orders[0].status, OrderStatus::Processing);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failures() {
        let remote = Arc::new(InMemoryRemote::new());
        let store = AdminStore::builder(remote.clone())
            .retry(RetryPolicy::new(2).with_backoff(BackoffStrategy::None))
            .build();
        remote.fail_next(2);

        let review = store
            .add_review(ReviewDraft::new(RecordId::confirmed("p1"), "Grace", 4, "Runs small"))
            .confirmed()
            .await
            .unwrap();
        assert!(review.id.is_confirmed());
        let creates = remote.calls().iter().filter(|c| c.op == SyncOp::Create).count();
        assert_eq!(creates, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_while_provisional_follows_up() {
        let remote = Arc::new(InMemoryRemote::new().with_latency(Duration::from_millis(50)));
        let store = store_with(&remote);

        let pending = store.add_product(ProductDraft::new("Wool Coat", Money::gbp(24000)));
        let provisional = pending.local().id.clone();
        let edit = store.update_product(&provisional, |p| p.stock_quantity = 7);

        let confirmed = pending.confirmed().await.unwrap();
        assert_eq!(confirmed.stock_quantity, 7);
        edit.outcome().await.unwrap();
        store.flush().await;

        let products = store.products();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].id, confirmed.id);
        let row = remote.row(EntityKind::Product, confirmed.id.as_str()).unwrap();
        assert_eq!(row["stock_quantity"], json!(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_while_provisional_deletes_remotely() {
        let remote = Arc::new(InMemoryRemote::new().with_latency(Duration::from_millis(50)));
        let store = store_with(&remote);

        let pending = store.add_collection(CollectionDraft::new("Resort"));
        let provisional = pending.local().id.clone();
        let delete = store.delete_collection(&provisional);
        assert!(store.collections().is_empty());

        pending.confirmed().await.unwrap();
        delete.outcome().await.unwrap();
        store.flush().await;

        assert!(store.collections().is_empty());
        assert_eq!(remote.count(EntityKind::Collection), 0);
        let ops: Vec<SyncOp> = remote.calls().iter().map(|c| c.op).collect();
        assert_eq!(ops, vec![SyncOp::Create, SyncOp::Delete]);
    }

    #[tokio::test]
    async fn test_delete_of_never_sent_record_is_local() {
        let remote = Arc::new(InMemoryRemote::new());
        let store = store_with(&remote);
        remote.set_offline(true);
        let pending = store.add_category(CategoryDraft::new("Knitwear"));
        let id = pending.local().id.clone();
        assert!(pending.confirmed().await.is_err());

        store.delete_category(&id).outcome().await.unwrap();
        assert!(store.categories().is_empty());
        assert!(store.divergences().is_empty());
        assert_eq!(remote.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_references_follow_confirmed_ids() {
        let remote = Arc::new(InMemoryRemote::new().with_latency(Duration::from_millis(20)));
        let store = store_with(&remote);

        let category = store.add_category(CategoryDraft::new("Tailoring"));
        let cat_local = category.local().id.clone();
        let product = store.add_product(
            ProductDraft::new("Double-Breasted Blazer", Money::gbp(21000)).with_category(cat_local),
        );
        let product_local = product.local().id.clone();
        let collection = store.add_collection(CollectionDraft::new("Workwear"));
        let membership =
            store.set_collection_products(&collection.local().id.clone(), vec![product_local.clone()]);

        let cat_id = category.confirmed().await.unwrap().id;
        let product_id = product.confirmed().await.unwrap().id;
        let collection_id = collection.confirmed().await.unwrap().id;
        membership.outcome().await.unwrap();
        store.flush().await;

        let stored = store.product(&product_id).unwrap();
        assert_eq!(stored.category_id, Some(cat_id.clone()));
        assert_eq!(store.collection_products(&collection_id), vec![product_id.clone()]);
        assert_eq!(store.products_in_collection(&collection_id)[0].id, product_id);

        let row = remote.row(EntityKind::Product, product_id.as_str()).unwrap();
        assert_eq!(row["category_id"], json!(cat_id.as_str()));
        let row = remote.row(EntityKind::Collection, collection_id.as_str()).unwrap();
        assert_eq!(row["product_ids"], json!([product_id.as_str()]));
    }

    #[tokio::test]
    async fn test_noop_and_missing_updates_send_nothing() {
        let remote = Arc::new(InMemoryRemote::new());
        let store = store_with(&remote);
        let p1 = product("p1", None);
        store.write().data.products.push(p1.clone());

        store.update_product(&p1.id, |p| p.stock_quantity = 4).outcome().await.unwrap();
        store
            .update_product(&RecordId::confirmed("missing"), |p| p.stock_quantity = 1)
            .outcome()
            .await
            .unwrap();
        store.delete_review(&RecordId::confirmed("missing")).outcome().await.unwrap();
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_order_status_and_review_moderation() {
        let remote = Arc::new(InMemoryRemote::new());
        let store = store_with(&remote);
        let order = store
            .add_order(OrderDraft::new("Ada Lovelace", "ada@example.com"))
            .confirmed()
            .await
            .unwrap();
        let review = store
            .add_review(ReviewDraft::new(RecordId::confirmed("p1"), "Grace", 5, "Lovely"))
            .confirmed()
            .await
            .unwrap();

        store
            .update_order_status(&order.id, OrderStatus::Shipped, Some("RM123456789GB".into()))
            .outcome()
            .await
            .unwrap();
        store.approve_review(&review.id).outcome().await.unwrap();
        store.set_review_featured(&review.id, true).outcome().await.unwrap();

        let row = remote.row(EntityKind::Order, order.id.as_str()).unwrap();
        assert_eq!(row["status"], json!("shipped"));
        assert_eq!(row["tracking_number"], json!("RM123456789GB"));
        let stored = store.review(&review.id).unwrap();
        assert!(stored.is_approved && stored.is_featured);
        assert_eq!(store.reviews_for_product(&RecordId::confirmed("p1")).len(), 1);

        store.reject_review(&review.id).outcome().await.unwrap();
        assert_eq!(remote.row(EntityKind::Review, review.id.as_str()).unwrap()["is_approved"], json!(false));
    }

    #[tokio::test]
    async fn test_set_collection_products_dedups() {
        let remote = Arc::new(InMemoryRemote::new());
        let store = store_with(&remote);
        let collection = store
            .add_collection(CollectionDraft::new("Edit"))
            .confirmed()
            .await
            .unwrap();
        let (a, b) = (RecordId::confirmed("a"), RecordId::confirmed("b"));
        store
            .set_collection_products(&collection.id, vec![b.clone(), a.clone(), b.clone()])
            .outcome()
            .await
            .unwrap();
        assert_eq!(store.collection_products(&collection.id), vec![b, a]);
        // Unknown product ids are kept in the mapping but not listed.
        assert!(store.products_in_collection(&collection.id).is_empty());
    }

    #[tokio::test]
    async fn test_refresh_replaces_confirmed_keeps_provisional() {
        let remote = Arc::new(InMemoryRemote::new());
        let store = store_with(&remote);
        seed(&remote, &product("p1", None));
        remote.seed(EntityKind::Collection, json!({
            "id": "c1", "name": "Edit", "slug": "edit", "description": null, "image_url": null,
            "is_featured": false, "position": 0, "created_at": 0, "updated_at": 0,
            "product_ids": ["p1"]
        }));
        store.write().data.products.push(product("stale", None));

        remote.set_offline(true);
        let local = store.add_product(ProductDraft::new("Draft Tee", Money::gbp(2500)));
        let local_id = local.local().id.clone();
        assert!(local.confirmed().await.is_err());
        remote.set_offline(false);

        assert_eq!(store.refresh().await.unwrap(), 2);
        let ids: Vec<RecordId> = store.products().into_iter().map(|p| p.id).collect();
        assert!(ids.contains(&RecordId::confirmed("p1")));
        assert!(ids.contains(&local_id));
        assert!(!ids.contains(&RecordId::confirmed("stale")));
        assert_eq!(
            store.collection_products(&RecordId::confirmed("c1")),
            vec![RecordId::confirmed("p1")]
        );
        // The failed create is still outstanding.
        assert_eq!(store.divergences().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_confirmed_during_refresh_is_kept() {
        let remote = Arc::new(InMemoryRemote::new().with_latency(Duration::from_millis(50)));
        let store = store_with(&remote);

        let refreshing = {
            let store = store.clone();
            tokio::spawn(async move { store.refresh().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let pending = store.add_product(ProductDraft::new("Linen Shirt", Money::gbp(6500)));
        let provisional = pending.local().id.clone();
        let confirmed = pending.confirmed().await.unwrap();
        refreshing.await.unwrap().unwrap();

        assert_eq!(remote.count(EntityKind::Product), 1);
        let products = store.products();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].id, confirmed.id);
        assert_eq!(store.product(&provisional).map(|p| p.id), Some(confirmed.id));
    }

    /// Holds each create response until the test lets it through.
    struct HeldCreates {
        inner: InMemoryRemote,
        gate: tokio::sync::Semaphore,
    }

    #[async_trait::async_trait]
    impl RemoteStore for HeldCreates {
        async fn create(&self, kind: EntityKind, record: Value) -> Result<Value, RemoteError> {
            let row = self.inner.create(kind, record).await?;
            let _permit = self.gate.acquire().await;
            Ok(row)
        }

        async fn update(&self, kind: EntityKind, id: &str, patch: Value) -> Result<(), RemoteError> {
            self.inner.update(kind, id, patch).await
        }

        async fn delete(&self, kind: EntityKind, id: &str) -> Result<(), RemoteError> {
            self.inner.delete(kind, id).await
        }

        async fn list(&self, kind: EntityKind) -> Result<Vec<Value>, RemoteError> {
            self.inner.list(kind).await
        }
    }

    #[tokio::test]
    async fn test_refresh_listing_new_row_before_confirm_leaves_one_copy() {
        let remote = Arc::new(HeldCreates {
            inner: InMemoryRemote::new(),
            gate: tokio::sync::Semaphore::new(0),
        });
        let store = AdminStore::builder(remote.clone())
            .clock(Arc::new(ManualClock::new(1_700_000_000_000)))
            .build();

        let pending = store.add_product(ProductDraft::new("Linen Shirt", Money::gbp(6500)));
        while remote.inner.count(EntityKind::Product) == 0 {
            tokio::task::yield_now().await;
        }
        store.refresh().await.unwrap();
        assert_eq!(store.products().len(), 2);

        remote.gate.add_permits(1);
        let confirmed = pending.confirmed().await.unwrap();
        store.flush().await;

        let products = store.products();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].id, confirmed.id);
    }

    #[tokio::test]
    async fn test_resync_drops_divergence_of_missing_record() {
        let remote = Arc::new(InMemoryRemote::new());
        seed(&remote, &product("p1", None));
        let store = store_with(&remote);
        store.refresh().await.unwrap();

        remote.set_offline(true);
        let update = store.update_product(&RecordId::confirmed("p1"), |p| p.stock_quantity = 0);
        assert!(update.outcome().await.is_err());
        assert_eq!(store.divergences().len(), 1);
        remote.set_offline(false);

        store.write().data.products.clear();
        let calls = remote.calls().len();
        assert!(store.resync().is_empty());
        assert!(store.divergences().is_empty());
        assert_eq!(remote.calls().len(), calls);
    }

    #[tokio::test]
    async fn test_state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let remote = Arc::new(InMemoryRemote::new());

        let first = AdminStore::builder(remote.clone())
            .storage(Cache::open_dir(dir.path()).unwrap())
            .build();
        first.hydrate().unwrap();
        let category = first
            .add_category(CategoryDraft::new("Accessories"))
            .confirmed()
            .await
            .unwrap();
        first.flush().await;

        let second = AdminStore::builder(remote)
            .storage(Cache::open_dir(dir.path()).unwrap())
            .build();
        assert_eq!(second.hydrate().unwrap(), 1);
        assert_eq!(second.categories(), vec![category]);
        assert_eq!(second.snapshot(), first.snapshot());
    }

    #[tokio::test]
    async fn test_store_without_storage_is_hydrated() {
        let store = store_with(&Arc::new(InMemoryRemote::new()));
        assert!(store.hydration().is_hydrated());
        assert_eq!(store.hydrate().unwrap(), 0);
    }
}
