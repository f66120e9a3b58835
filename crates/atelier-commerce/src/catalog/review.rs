//! Customer product reviews.

use crate::ids::RecordId;
use serde::{Deserialize, Serialize};

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// A product review awaiting or past moderation.
///
/// `is_approved` and `is_featured` are independent: an unapproved review
/// may still be featured.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub id: RecordId,
    pub product_id: RecordId,
    pub author_name: String,
    /// Star rating, 1 to 5.
    pub rating: u8,
    pub title: Option<String>,
    pub body: String,
    pub is_approved: bool,
    pub is_featured: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Review {
    pub fn from_draft(id: RecordId, draft: ReviewDraft, now: i64) -> Self {
        Self {
            id,
            product_id: draft.product_id,
            author_name: draft.author_name,
            rating: clamp_rating(draft.rating),
            title: draft.title,
            body: draft.body,
            is_approved: false,
            is_featured: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Fields for a new review. New reviews start unapproved and unfeatured.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewDraft {
    pub product_id: RecordId,
    pub author_name: String,
    pub rating: u8,
    pub title: Option<String>,
    pub body: String,
}

impl ReviewDraft {
    pub fn new(
        product_id: RecordId,
        author_name: impl Into<String>,
        rating: u8,
        body: impl Into<String>,
    ) -> Self {
        Self {
            product_id,
            author_name: author_name.into(),
            rating,
            title: None,
            body: body.into(),
        }
    }
}

/// Clamp a rating into 1..=5.
pub fn clamp_rating(rating: u8) -> u8 {
    rating.clamp(MIN_RATING, MAX_RATING)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_clamped() {
        let pid = RecordId::confirmed("p1");
        let high = Review::from_draft(RecordId::confirmed("r1"), ReviewDraft::new(pid.clone(), "Ana", 9, "Lovely"), 0);
        let low = Review::from_draft(RecordId::confirmed("r2"), ReviewDraft::new(pid, "Ben", 0, "Meh"), 0);
        assert_eq!(high.rating, 5);
        assert_eq!(low.rating, 1);
        assert!(!high.is_approved);
        assert!(!high.is_featured);
    }
}
