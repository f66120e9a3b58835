//! The contract the admin store needs from its remote database.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::RemoteError;

/// The kinds of record the admin store manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Product,
    Category,
    Collection,
    Order,
    Review,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Product,
        EntityKind::Category,
        EntityKind::Collection,
        EntityKind::Order,
        EntityKind::Review,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Product => "product",
            EntityKind::Category => "category",
            EntityKind::Collection => "collection",
            EntityKind::Order => "order",
            EntityKind::Review => "review",
        }
    }

    /// Remote table holding this kind.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Product => "products",
            EntityKind::Category => "categories",
            EntityKind::Collection => "collections",
            EntityKind::Order => "orders",
            EntityKind::Review => "reviews",
        }
    }

    /// Prefix of provisional ids for this kind.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            EntityKind::Product => "prod",
            EntityKind::Category => "cat",
            EntityKind::Collection => "col",
            EntityKind::Order => "ord",
            EntityKind::Review => "rev",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s || k.table() == s)
            .ok_or_else(|| format!("unknown entity kind: {s}"))
    }
}

/// Remote persistence keyed by entity kind.
///
/// Records travel as JSON objects. `create` receives a record without an
/// `id` and returns the stored row including the server-assigned `id`.
/// `update` applies a partial patch of top-level fields. For collections a
/// `product_ids` array in the patch replaces the collection's ordered
/// membership.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Insert a record and return the authoritative row.
    async fn create(&self, kind: EntityKind, record: Value) -> Result<Value, RemoteError>;

    /// Apply a partial patch to the row with `id`.
    async fn update(&self, kind: EntityKind, id: &str, patch: Value) -> Result<(), RemoteError>;

    /// Delete the row with `id`.
    async fn delete(&self, kind: EntityKind, id: &str) -> Result<(), RemoteError>;

    /// Fetch every row of a kind. Collection rows carry their `product_ids`.
    async fn list(&self, kind: EntityKind) -> Result<Vec<Value>, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(EntityKind::Category.table(), "categories");
        assert_eq!(EntityKind::Review.id_prefix(), "rev");
        assert_eq!("orders".parse::<EntityKind>().unwrap(), EntityKind::Order);
        assert_eq!("product".parse::<EntityKind>().unwrap(), EntityKind::Product);
        assert!("widgets".parse::<EntityKind>().is_err());
    }
}
