//! Cart store and line item types.

use atelier_cache::{HydrationSignal, SnapshotStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cart::{CartPolicy, CartSummary};
use crate::catalog::Product;
use crate::error::CommerceError;
use crate::ids::LineItemId;
use crate::money::Money;

/// Storage key the item list is persisted under.
pub const CART_STORAGE_KEY: &str = "cart:items";

/// Size and colour chosen when adding a product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedOptions {
    pub size: Option<String>,
    pub color: Option<String>,
}

impl SelectedOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

/// A line in the cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartLineItem {
    /// Merge key: product, size and colour.
    pub id: LineItemId,
    /// Snapshot of the product when it was added. Later catalog edits do
    /// not reach into the cart.
    pub product: Product,
    /// Always within `1..=max_quantity`.
    pub quantity: u32,
    pub selected_size: Option<String>,
    pub selected_color: Option<String>,
}

impl CartLineItem {
    /// Effective unit price of the snapshotted product.
    pub fn unit_price(&self) -> Money {
        self.product.effective_price()
    }

    /// Unit price times quantity.
    pub fn line_total(&self) -> Money {
        self.unit_price().times(self.quantity)
    }
}

/// The shopper's cart.
///
/// Mutations never fail: quantities are clamped and unknown line ids are
/// ignored. When backed by storage, the item list is saved after every
/// mutation; the drawer flag is never saved.
#[derive(Debug)]
pub struct CartStore {
    items: Vec<CartLineItem>,
    policy: CartPolicy,
    drawer_open: bool,
    storage: Option<SnapshotStore<Vec<CartLineItem>>>,
    hydration: HydrationSignal,
}

impl Default for CartStore {
    fn default() -> Self {
        Self::new(CartPolicy::default())
    }
}

impl CartStore {
    /// An in-memory cart with nothing to load.
    pub fn new(policy: CartPolicy) -> Self {
        Self {
            items: Vec::new(),
            policy,
            drawer_open: false,
            storage: None,
            hydration: HydrationSignal::ready(),
        }
    }

    /// A cart persisted through `storage`. Call [`hydrate`](Self::hydrate)
    /// before use; until then the hydration signal reports not ready.
    pub fn with_storage(policy: CartPolicy, storage: SnapshotStore<Vec<CartLineItem>>) -> Self {
        Self {
            items: Vec::new(),
            policy,
            drawer_open: false,
            storage: Some(storage),
            hydration: HydrationSignal::new(),
        }
    }

    /// Load the persisted item list, replacing the current one.
    ///
    /// The hydration signal flips to ready whatever the outcome, so a
    /// failed load leaves an empty, usable cart.
    pub fn hydrate(&mut self) -> Result<usize, CommerceError> {
        let result = self.load_items();
        self.drawer_open = false;
        self.hydration.mark_hydrated();
        result
    }

    fn load_items(&mut self) -> Result<usize, CommerceError> {
        let Some(storage) = &self.storage else {
            return Ok(0);
        };
        let mut items = storage.load()?.unwrap_or_default();
        let max = self.policy.max_quantity.max(1);
        let currency = self.policy.currency;
        items.retain(|item| {
            let priced_in = item.unit_price().currency;
            if priced_in != currency {
                warn!(
                    line = %item.id,
                    currency = priced_in.code(),
                    expected = currency.code(),
                    "dropping saved cart line priced in another currency"
                );
            }
            priced_in == currency
        });
        for item in &mut items {
            item.quantity = item.quantity.clamp(1, max);
        }
        debug!(count = items.len(), key = storage.key(), "hydrated cart");
        self.items = items;
        Ok(self.items.len())
    }

    /// Signal that flips once persisted items have been loaded.
    pub fn hydration(&self) -> HydrationSignal {
        self.hydration.clone()
    }

    pub fn policy(&self) -> &CartPolicy {
        &self.policy
    }

    /// Add `quantity` of a product with the chosen options.
    ///
    /// An existing line with the same product, size and colour is
    /// incremented instead; the result is capped at `max_quantity`.
    /// Returns the line id. Products priced in a currency other than the
    /// policy's are rejected with [`CommerceError::CurrencyMismatch`].
    pub fn add_item(
        &mut self,
        product: &Product,
        quantity: i64,
        options: SelectedOptions,
    ) -> Result<LineItemId, CommerceError> {
        let price = product.effective_price();
        if price.currency != self.policy.currency {
            return Err(CommerceError::CurrencyMismatch {
                expected: self.policy.currency.code().to_string(),
                got: price.currency.code().to_string(),
            });
        }

        let id = LineItemId::for_selection(&product.id, options.size.as_deref(), options.color.as_deref());
        let requested = self.policy.clamp_quantity(quantity);
        let max = self.policy.max_quantity.max(1);

        if let Some(existing) = self.items.iter_mut().find(|i| i.id == id) {
            existing.quantity = existing.quantity.saturating_add(requested).min(max);
            debug!(line = %id, quantity = existing.quantity, "incremented cart line");
        } else {
            self.items.push(CartLineItem {
                id: id.clone(),
                product: product.clone(),
                quantity: requested,
                selected_size: options.size,
                selected_color: options.color,
            });
            debug!(line = %id, quantity = requested, "added cart line");
        }

        self.persist();
        Ok(id)
    }

    /// Remove a line. Unknown ids are ignored.
    pub fn remove_item(&mut self, id: &LineItemId) {
        let len_before = self.items.len();
        self.items.retain(|i| &i.id != id);
        if self.items.len() < len_before {
            debug!(line = %id, "removed cart line");
            self.persist();
        }
    }

    /// Set a line's quantity. Anything below 1 removes the line.
    pub fn update_quantity(&mut self, id: &LineItemId, quantity: i64) {
        if quantity < 1 {
            self.remove_item(id);
            return;
        }

        let clamped = self.policy.clamp_quantity(quantity);
        if let Some(item) = self.items.iter_mut().find(|i| &i.id == id) {
            item.quantity = clamped;
            debug!(line = %id, quantity = clamped, "updated cart line");
            self.persist();
        }
    }

    /// Clear all items from the cart.
    pub fn clear_cart(&mut self) {
        self.items.clear();
        self.persist();
    }

    /// Totals for the current items.
    pub fn summary(&self) -> CartSummary {
        CartSummary::compute(&self.items, &self.policy)
    }

    /// Get total item count (sum of quantities).
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Get number of distinct lines.
    pub fn unique_item_count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    pub fn get_item(&self, id: &LineItemId) -> Option<&CartLineItem> {
        self.items.iter().find(|i| &i.id == id)
    }

    pub fn open(&mut self) {
        self.drawer_open = true;
    }

    pub fn close(&mut self) {
        self.drawer_open = false;
    }

    pub fn toggle(&mut self) {
        self.drawer_open = !self.drawer_open;
    }

    /// Whether the cart drawer is showing.
    pub fn is_open(&self) -> bool {
        self.drawer_open
    }

    fn persist(&self) {
        let Some(storage) = &self.storage else {
            return;
        };
        if let Err(e) = storage.save(&self.items) {
            warn!(error = %e, key = storage.key(), "failed to persist cart");
        }
    }
}
