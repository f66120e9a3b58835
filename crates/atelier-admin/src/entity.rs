//! What the store needs to know about each record type.

use atelier_commerce::catalog::{Category, Collection, Product, Review};
use atelier_commerce::orders::Order;
use atelier_commerce::RecordId;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::error::SyncError;
use crate::remote::EntityKind;
use crate::state::AdminState;

/// A record kept in [`AdminState`] and mirrored to the remote store.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> &RecordId;

    fn set_id(&mut self, id: RecordId);

    /// Stamp `updated_at`.
    fn touch(&mut self, now: i64);

    fn records(state: &AdminState) -> &Vec<Self>;

    fn records_mut(state: &mut AdminState) -> &mut Vec<Self>;
}

macro_rules! impl_entity {
    ($ty:ty, $kind:expr, $field:ident) => {
        impl Entity for $ty {
            const KIND: EntityKind = $kind;

            fn id(&self) -> &RecordId {
                &self.id
            }

            fn set_id(&mut self, id: RecordId) {
                self.id = id;
            }

            fn touch(&mut self, now: i64) {
                self.updated_at = now;
            }

            fn records(state: &AdminState) -> &Vec<Self> {
                &state.$field
            }

            fn records_mut(state: &mut AdminState) -> &mut Vec<Self> {
                &mut state.$field
            }
        }
    };
}

impl_entity!(Product, EntityKind::Product, products);
impl_entity!(Category, EntityKind::Category, categories);
impl_entity!(Collection, EntityKind::Collection, collections);
impl_entity!(Order, EntityKind::Order, orders);
impl_entity!(Review, EntityKind::Review, reviews);

/// JSON object form of a record.
pub(crate) fn to_object<T: Entity>(record: &T) -> Result<Map<String, Value>, SyncError> {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(SyncError::Encode {
            kind: T::KIND,
            message: format!("expected an object, got {other}"),
        }),
        Err(e) => Err(SyncError::Encode {
            kind: T::KIND,
            message: e.to_string(),
        }),
    }
}

/// Body of a create: the record without its provisional id.
pub(crate) fn create_payload<T: Entity>(record: &T) -> Result<Value, SyncError> {
    let mut map = to_object(record)?;
    map.remove("id");
    Ok(Value::Object(map))
}

/// Parse a row returned by the remote store.
pub(crate) fn decode<T: Entity>(row: Value) -> Result<T, SyncError> {
    serde_json::from_value(row).map_err(|e| SyncError::Encode {
        kind: T::KIND,
        message: e.to_string(),
    })
}

/// Top-level fields of `after` whose value differs from `before`.
///
/// Fields dropped in `after` appear as `null`. `id` is never part of a patch.
pub(crate) fn diff_fields(before: &Map<String, Value>, after: &Map<String, Value>) -> Map<String, Value> {
    let mut patch = Map::new();
    for (key, value) in after {
        if key != "id" && before.get(key) != Some(value) {
            patch.insert(key.clone(), value.clone());
        }
    }
    for key in before.keys() {
        if key != "id" && !after.contains_key(key) {
            patch.insert(key.clone(), Value::Null);
        }
    }
    patch
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_commerce::catalog::ProductDraft;
    use atelier_commerce::Money;
    use serde_json::json;

    fn product() -> Product {
        Product::from_draft(
            RecordId::Provisional("prod-1".into()),
            ProductDraft::new("Trench Coat", Money::gbp(18000)),
            5,
        )
    }

    #[test]
    fn test_create_payload_drops_id() {
        let payload = create_payload(&product()).unwrap();
        assert!(payload.get("id").is_none());
        assert_eq!(payload["name"], json!("Trench Coat"));
    }

    #[test]
    fn test_diff_fields() {
        let before = product();
        let mut after = before.clone();
        after.name = "Belted Trench Coat".into();
        after.stock_quantity = 12;
        after.set_id(RecordId::confirmed("abc"));

        let patch = diff_fields(&to_object(&before).unwrap(), &to_object(&after).unwrap());
        assert_eq!(patch.len(), 2);
        assert_eq!(patch["name"], json!("Belted Trench Coat"));
        assert_eq!(patch["stock_quantity"], json!(12));
    }

    #[test]
    fn test_diff_nulls_removed_fields() {
        let before = json!({"id": "1", "a": 1, "b": 2});
        let after = json!({"id": "1", "a": 1});
        let patch = diff_fields(before.as_object().unwrap(), after.as_object().unwrap());
        assert_eq!(Value::Object(patch), json!({"b": null}));
    }

    #[test]
    fn test_decode_server_row() {
        let mut row = create_payload(&product()).unwrap();
        row["id"] = json!("7d1e");
        let decoded: Product = decode(row).unwrap();
        assert_eq!(decoded.id, RecordId::confirmed("7d1e"));
        assert!(decode::<Product>(json!({"id": "x"})).is_err());
    }
}
