//! The admin store's local copy of remote data.

use std::collections::HashMap;

use atelier_commerce::catalog::{Category, Collection, Product, Review};
use atelier_commerce::orders::Order;
use atelier_commerce::RecordId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::remote::EntityKind;
use crate::sync::Divergence;

/// Everything the admin store holds, as persisted in its snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminState {
    pub products: Vec<Product>,
    pub categories: Vec<Category>,
    pub collections: Vec<Collection>,
    /// Ordered product ids of each collection.
    pub collection_products: HashMap<RecordId, Vec<RecordId>>,
    pub orders: Vec<Order>,
    pub reviews: Vec<Review>,
    /// Records whose last remote write failed.
    pub divergences: Vec<Divergence>,
    /// Provisional ids that have since been confirmed, and what they became.
    pub aliases: HashMap<RecordId, RecordId>,
}

/// A record whose reference to a re-identified record was rewritten.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Reference {
    pub kind: EntityKind,
    pub id: RecordId,
    pub change: ReferenceChange,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ReferenceChange {
    /// Top-level fields that changed.
    Fields(Map<String, Value>),
    /// A collection's membership list changed.
    Membership(Vec<RecordId>),
}

impl AdminState {
    /// Follow a confirmed alias; ids without one are returned unchanged.
    pub fn resolve(&self, id: &RecordId) -> RecordId {
        self.aliases.get(id).cloned().unwrap_or_else(|| id.clone())
    }

    /// Total number of entity records.
    pub fn record_count(&self) -> usize {
        self.products.len()
            + self.categories.len()
            + self.collections.len()
            + self.orders.len()
            + self.reviews.len()
    }

    /// Ids of records still waiting for a server id.
    pub fn provisional_ids(&self) -> Vec<(EntityKind, RecordId)> {
        fn collect<'a>(
            kind: EntityKind,
            ids: impl Iterator<Item = &'a RecordId>,
            out: &mut Vec<(EntityKind, RecordId)>,
        ) {
            out.extend(ids.filter(|id| id.is_provisional()).map(|id| (kind, id.clone())));
        }
        let mut out = Vec::new();
        collect(EntityKind::Product, self.products.iter().map(|r| &r.id), &mut out);
        collect(EntityKind::Category, self.categories.iter().map(|r| &r.id), &mut out);
        collect(EntityKind::Collection, self.collections.iter().map(|r| &r.id), &mut out);
        collect(EntityKind::Order, self.orders.iter().map(|r| &r.id), &mut out);
        collect(EntityKind::Review, self.reviews.iter().map(|r| &r.id), &mut out);
        out
    }

    /// Record a failed write, replacing any earlier entry for the record.
    pub fn record_divergence(&mut self, divergence: Divergence) {
        self.clear_divergence(divergence.kind, &divergence.record_id);
        self.divergences.push(divergence);
    }

    /// Forget a failed write. Returns whether there was one.
    pub fn clear_divergence(&mut self, kind: EntityKind, id: &RecordId) -> bool {
        let before = self.divergences.len();
        self.divergences
            .retain(|d| !(d.kind == kind && &d.record_id == id));
        self.divergences.len() != before
    }

    /// Clear `category_id` on every product in `category_id`, stamping
    /// `updated_at`. Returns the products touched.
    pub(crate) fn uncategorize(&mut self, category_id: &RecordId, now: i64) -> Vec<Reference> {
        let mut touched = Vec::new();
        for product in &mut self.products {
            if product.category_id.as_ref() == Some(category_id) {
                product.category_id = None;
                product.updated_at = now;
                let mut patch = Map::new();
                patch.insert("category_id".into(), Value::Null);
                patch.insert("updated_at".into(), json!(now));
                touched.push(Reference {
                    kind: EntityKind::Product,
                    id: product.id.clone(),
                    change: ReferenceChange::Fields(patch),
                });
            }
        }
        touched
    }

    /// Drop a product from every collection's membership. Returns the
    /// collections touched.
    pub(crate) fn prune_product(&mut self, product_id: &RecordId) -> Vec<RecordId> {
        let mut touched = Vec::new();
        for (collection_id, members) in &mut self.collection_products {
            let before = members.len();
            members.retain(|id| id != product_id);
            if members.len() != before {
                touched.push(collection_id.clone());
            }
        }
        touched
    }

    /// Replace every reference to `old` with `new` after a create of `kind`
    /// was confirmed. Returns the referencing records that changed.
    pub(crate) fn rewrite_references(
        &mut self,
        kind: EntityKind,
        old: &RecordId,
        new: &RecordId,
    ) -> Vec<Reference> {
        let mut changed = Vec::new();
        match kind {
            EntityKind::Product => {
                for review in &mut self.reviews {
                    if &review.product_id == old {
                        review.product_id = new.clone();
                        changed.push(field_reference(EntityKind::Review, &review.id, "product_id", new));
                    }
                }
                for (collection_id, members) in &mut self.collection_products {
                    let mut hit = false;
                    for member in members.iter_mut().filter(|m| *m == old) {
                        *member = new.clone();
                        hit = true;
                    }
                    if hit {
                        changed.push(Reference {
                            kind: EntityKind::Collection,
                            id: collection_id.clone(),
                            change: ReferenceChange::Membership(members.clone()),
                        });
                    }
                }
            }
            EntityKind::Category => {
                for product in &mut self.products {
                    if product.category_id.as_ref() == Some(old) {
                        product.category_id = Some(new.clone());
                        changed.push(field_reference(EntityKind::Product, &product.id, "category_id", new));
                    }
                }
                for category in &mut self.categories {
                    if category.parent_id.as_ref() == Some(old) {
                        category.parent_id = Some(new.clone());
                        changed.push(field_reference(EntityKind::Category, &category.id, "parent_id", new));
                    }
                }
            }
            EntityKind::Collection => {
                if let Some(members) = self.collection_products.remove(old) {
                    self.collection_products.insert(new.clone(), members);
                }
            }
            EntityKind::Order | EntityKind::Review => {}
        }
        changed
    }
}

fn field_reference(kind: EntityKind, id: &RecordId, field: &str, value: &RecordId) -> Reference {
    let mut patch = Map::new();
    patch.insert(field.to_string(), json!(value));
    Reference {
        kind,
        id: id.clone(),
        change: ReferenceChange::Fields(patch),
    }
}

/// Remote patch replacing a collection's membership.
pub(crate) fn membership_patch(members: &[RecordId]) -> Map<String, Value> {
    let mut patch = Map::new();
    patch.insert("product_ids".into(), json!(members));
    patch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::SyncOp;
    use atelier_commerce::catalog::{CategoryDraft, ProductDraft, ReviewDraft};
    use atelier_commerce::Money;

    fn product(id: RecordId, category: Option<&RecordId>) -> Product {
        let mut draft = ProductDraft::new("Knit Vest", Money::gbp(4500));
        draft.category_id = category.cloned();
        Product::from_draft(id, draft, 0)
    }

    #[test]
    fn test_uncategorize() {
        let cat = RecordId::confirmed("cat-1");
        let mut state = AdminState {
            categories: vec![Category::from_draft(cat.clone(), CategoryDraft::new("Dresses"), 0)],
            products: vec![
                product(RecordId::confirmed("p1"), Some(&cat)),
                product(RecordId::confirmed("p2"), Some(&cat)),
                product(RecordId::confirmed("p3"), None),
            ],
            ..Default::default()
        };

        let touched = state.uncategorize(&cat, 99);
        assert_eq!(touched.len(), 2);
        assert!(state.products.iter().all(|p| p.category_id.is_none()));
        assert_eq!(state.products[0].updated_at, 99);
        assert_eq!(state.products[2].updated_at, 0);
    }

    #[test]
    fn test_rewrite_product_references() {
        let old = RecordId::Provisional("prod-1".into());
        let new = RecordId::confirmed("u-1");
        let col = RecordId::confirmed("col-a");
        let mut state = AdminState::default();
        state
            .collection_products
            .insert(col.clone(), vec![RecordId::confirmed("p0"), old.clone()]);
        state.reviews.push(Review::from_draft(
            RecordId::confirmed("r1"),
            ReviewDraft::new(old.clone(), "Sam", 5, "Perfect fit"),
            0,
        ));

        let changed = state.rewrite_references(EntityKind::Product, &old, &new);
        assert_eq!(changed.len(), 2);
        assert_eq!(state.reviews[0].product_id, new);
        assert_eq!(state.collection_products[&col], vec![RecordId::confirmed("p0"), new.clone()]);
        assert!(changed.iter().any(|r| r.kind == EntityKind::Collection
            && r.change == ReferenceChange::Membership(vec![RecordId::confirmed("p0"), new.clone()])));
    }

    #[test]
    fn test_rewrite_collection_key() {
        let old = RecordId::Provisional("col-1".into());
        let new = RecordId::confirmed("c-9");
        let mut state = AdminState::default();
        state.collection_products.insert(old.clone(), vec![RecordId::confirmed("p1")]);

        assert!(state.rewrite_references(EntityKind::Collection, &old, &new).is_empty());
        assert!(!state.collection_products.contains_key(&old));
        assert_eq!(state.collection_products[&new], vec![RecordId::confirmed("p1")]);
    }

    #[test]
    fn test_prune_product() {
        let p = RecordId::confirmed("p1");
        let mut state = AdminState::default();
        state.collection_products.insert(RecordId::confirmed("a"), vec![p.clone()]);
        state.collection_products.insert(RecordId::confirmed("b"), vec![RecordId::confirmed("p2")]);

        assert_eq!(state.prune_product(&p), vec![RecordId::confirmed("a")]);
        assert!(state.collection_products[&RecordId::confirmed("a")].is_empty());
    }

    #[test]
    fn test_divergence_upsert_and_clear() {
        let id = RecordId::confirmed("o1");
        let mut state = AdminState::default();
        for at in [1, 2] {
            state.record_divergence(Divergence {
                kind: EntityKind::Order,
                record_id: id.clone(),
                op: SyncOp::Update,
                error: "boom".into(),
                at,
            });
        }
        assert_eq!(state.divergences.len(), 1);
        assert_eq!(state.divergences[0].at, 2);
        assert!(state.clear_divergence(EntityKind::Order, &id));
        assert!(!state.clear_divergence(EntityKind::Order, &id));
    }

    #[test]
    fn test_snapshot_round_trip_keeps_provisional_tags() {
        let mut state = AdminState::default();
        state.products.push(product(RecordId::Provisional("prod-5".into()), None));
        state
            .aliases
            .insert(RecordId::Provisional("cat-2".into()), RecordId::confirmed("c2"));

        let json = serde_json::to_string(&state).unwrap();
        let back: AdminState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
        assert_eq!(back.provisional_ids(), vec![(EntityKind::Product, RecordId::Provisional("prod-5".into()))]);
    }
}
