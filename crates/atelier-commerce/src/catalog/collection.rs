//! Curated collections ("Summer Edit", "Workwear").
//!
//! Which products belong to a collection, and in what order, is tracked
//! separately by the admin store rather than on the record itself.

use crate::catalog::slugify;
use crate::ids::RecordId;
use serde::{Deserialize, Serialize};

/// A merchandising collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Collection {
    pub id: RecordId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_featured: bool,
    /// Sort order on the collections page.
    pub position: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Collection {
    pub fn from_draft(id: RecordId, draft: CollectionDraft, now: i64) -> Self {
        let slug = draft.slug.unwrap_or_else(|| slugify(&draft.name));
        Self {
            id,
            name: draft.name,
            slug,
            description: draft.description,
            image_url: draft.image_url,
            is_featured: draft.is_featured,
            position: draft.position,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Fields for a new collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CollectionDraft {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_featured: bool,
    pub position: i32,
}

impl CollectionDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}
