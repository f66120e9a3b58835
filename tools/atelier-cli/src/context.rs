//! CLI execution context.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use atelier_admin::{
    AdminState, AdminStore, Entity, InMemoryRemote, RemoteStore, RestRemote, ADMIN_STORAGE_KEY,
};
use atelier_commerce::catalog::{Category, Collection, Product, Review};
use atelier_commerce::orders::Order;
use atelier_cache::{Cache, SnapshotStore};
use atelier_commerce::cart::{CartStore, CART_STORAGE_KEY};

use crate::config::{AtelierConfig, RemoteKind};
use crate::output::Output;

/// Execution context for CLI commands.
pub struct Context {
    /// CLI configuration.
    pub config: AtelierConfig,
    /// File the configuration came from, if any.
    pub config_path: Option<PathBuf>,
    /// Output handler.
    pub output: Output,
    /// Working directory.
    pub cwd: PathBuf,
}

impl Context {
    /// Load context from an explicit config file or the nearest one found.
    pub fn load(config_path: Option<&str>, output: Output) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;

        let config_path = match config_path {
            Some(path) => Some(resolve(&cwd, path)),
            None => AtelierConfig::discover(&cwd),
        };
        let config = match &config_path {
            Some(path) => AtelierConfig::load(path)?,
            None => AtelierConfig::default(),
        };

        Ok(Self {
            config,
            config_path,
            output,
            cwd,
        })
    }

    /// Directory holding the cart and admin snapshots.
    pub fn data_dir(&self) -> PathBuf {
        resolve(&self.cwd, &self.config.storage.data_dir)
    }

    /// File-backed cache over the data directory.
    pub fn cache(&self) -> Result<Cache> {
        let dir = self.data_dir();
        Cache::open_dir(&dir).with_context(|| format!("Failed to open data directory: {}", dir.display()))
    }

    /// The shopper's cart, loaded from disk.
    pub fn cart(&self) -> Result<CartStore> {
        let storage = SnapshotStore::new(self.cache()?, CART_STORAGE_KEY);
        let mut cart = CartStore::with_storage(self.config.cart_policy()?, storage);
        let loaded = cart.hydrate().context("Failed to load cart")?;
        self.output.debug(&format!("Loaded {loaded} cart line(s)"));
        Ok(cart)
    }

    /// The admin store over the configured remote, loaded from disk.
    pub fn admin(&self) -> Result<AdminStore> {
        let store = AdminStore::builder(self.remote()?)
            .retry(self.config.retry_policy())
            .storage(self.cache()?)
            .build();
        let loaded = store.hydrate().context("Failed to load admin data")?;
        self.output.debug(&format!("Loaded {loaded} admin record(s)"));
        Ok(store)
    }

    /// The admin records last saved on this machine, without connecting to
    /// the remote.
    pub fn catalog(&self) -> Result<AdminState> {
        let snapshots = SnapshotStore::<AdminState>::new(self.cache()?, ADMIN_STORAGE_KEY);
        Ok(snapshots.load().context("Failed to load admin data")?.unwrap_or_default())
    }

    fn remote(&self) -> Result<Arc<dyn RemoteStore>> {
        Ok(match self.config.remote.kind {
            RemoteKind::Memory => {
                let remote = InMemoryRemote::new();
                let state = self.catalog()?;
                seed::<Product>(&remote, &state)?;
                seed::<Category>(&remote, &state)?;
                seed::<Collection>(&remote, &state)?;
                seed::<Order>(&remote, &state)?;
                seed::<Review>(&remote, &state)?;
                Arc::new(remote)
            }
            RemoteKind::Rest => {
                let config = self.config.rest_config()?;
                self.output.debug(&format!("Using remote {}", config.base_url));
                Arc::new(RestRemote::new(config).context("Failed to build HTTP client")?)
            }
        })
    }

    /// Wait for background writes and report any that did not land.
    pub async fn settle(&self, store: &AdminStore) {
        let spinner = self.output.spinner("Syncing with remote...");
        store.flush().await;
        spinner.finish_and_clear();

        let divergences = store.divergences();
        if divergences.is_empty() {
            return;
        }
        self.output.warn(&format!(
            "{} record(s) are not in sync with the remote; run `atelier sync push` to retry",
            divergences.len()
        ));
        for d in &divergences {
            self.output.debug(&format!("{} {} ({}): {}", d.kind, d.record_id, d.op, d.error));
        }
    }
}

/// Copy the confirmed records of one kind into a memory remote.
fn seed<T: Entity>(remote: &InMemoryRemote, state: &AdminState) -> Result<()> {
    for record in T::records(state).iter().filter(|r| !r.id().is_provisional()) {
        let mut row = serde_json::to_value(record)?;
        if let Some(members) = state.collection_products.get(record.id()) {
            row["product_ids"] = serde_json::to_value(members)?;
        }
        remote.seed(T::KIND, row);
    }
    Ok(())
}

/// Resolve a path relative to `base`.
fn resolve(base: &Path, path: &str) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}
