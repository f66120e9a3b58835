//! Category types for product organization.

use crate::catalog::slugify;
use crate::ids::RecordId;
use serde::{Deserialize, Serialize};

/// A product category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    /// Unique category identifier.
    pub id: RecordId,
    /// Category name.
    pub name: String,
    /// URL-friendly slug.
    pub slug: String,
    /// Category description.
    pub description: Option<String>,
    /// Category image URL.
    pub image_url: Option<String>,
    /// Parent category ID (None for root categories).
    pub parent_id: Option<RecordId>,
    /// Sort order position within parent.
    pub position: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Category {
    pub fn from_draft(id: RecordId, draft: CategoryDraft, now: i64) -> Self {
        let slug = draft.slug.unwrap_or_else(|| slugify(&draft.name));
        Self {
            id,
            name: draft.name,
            slug,
            description: draft.description,
            image_url: draft.image_url,
            parent_id: draft.parent_id,
            position: draft.position,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if this is a root category.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Fields for a new category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CategoryDraft {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub parent_id: Option<RecordId>,
    pub position: i32,
}

impl CategoryDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_draft() {
        let draft = CategoryDraft {
            slug: Some("frocks".into()),
            ..CategoryDraft::new("Dresses")
        };
        let cat = Category::from_draft(RecordId::confirmed("cat-1"), draft, 7);
        assert_eq!(cat.slug, "frocks");
        assert!(cat.is_root());
        assert_eq!(cat.updated_at, 7);
    }
}
