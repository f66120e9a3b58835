//! Product records.

use crate::catalog::slugify;
use crate::error::CommerceError;
use crate::ids::RecordId;
use crate::money::Money;
use crate::pricing;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Product status in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    /// Product is in draft mode, not visible to customers.
    Draft,
    /// Product is active and visible.
    #[default]
    Active,
    /// Product is archived, not visible but data preserved.
    Archived,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Draft => "draft",
            ProductStatus::Active => "active",
            ProductStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductStatus {
    type Err = CommerceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(ProductStatus::Draft),
            "active" => Ok(ProductStatus::Active),
            "archived" => Ok(ProductStatus::Archived),
            _ => Err(CommerceError::UnknownProductStatus(s.to_string())),
        }
    }
}

/// A product in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    /// Unique product identifier.
    pub id: RecordId,
    /// Product name.
    pub name: String,
    /// URL-friendly slug.
    pub slug: String,
    /// Full description.
    pub description: Option<String>,
    /// List price.
    pub price: Money,
    /// Sale price, when the product is discounted.
    pub sale_price: Option<Money>,
    /// Category this product belongs to (None = uncategorized).
    pub category_id: Option<RecordId>,
    /// Image URLs, first is the primary image.
    #[serde(default)]
    pub images: Vec<String>,
    /// Available sizes (e.g. "XS".."XL").
    #[serde(default)]
    pub sizes: Vec<String>,
    /// Available colours.
    #[serde(default)]
    pub colors: Vec<String>,
    /// Units in stock.
    pub stock_quantity: u32,
    /// At or below this (and above zero) the product counts as low stock.
    pub low_stock_threshold: u32,
    pub is_featured: bool,
    pub is_new: bool,
    /// Product visibility status.
    pub status: ProductStatus,
    /// Tags for filtering.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Unix timestamp (millis) of creation.
    pub created_at: i64,
    /// Unix timestamp (millis) of last update.
    pub updated_at: i64,
}

impl Product {
    /// Build a product from a draft.
    pub fn from_draft(id: RecordId, draft: ProductDraft, now: i64) -> Self {
        let slug = draft.slug.unwrap_or_else(|| slugify(&draft.name));
        Self {
            id,
            name: draft.name,
            slug,
            description: draft.description,
            price: draft.price,
            sale_price: draft.sale_price,
            category_id: draft.category_id,
            images: draft.images,
            sizes: draft.sizes,
            colors: draft.colors,
            stock_quantity: draft.stock_quantity,
            low_stock_threshold: draft.low_stock_threshold,
            is_featured: draft.is_featured,
            is_new: draft.is_new,
            status: draft.status,
            tags: draft.tags,
            created_at: now,
            updated_at: now,
        }
    }

    /// The price actually charged: sale price when set, else list price.
    pub fn effective_price(&self) -> Money {
        pricing::effective_price(self)
    }

    /// Check if the sale price undercuts the list price.
    pub fn is_on_sale(&self) -> bool {
        pricing::is_on_sale(self)
    }

    pub fn is_low_stock(&self) -> bool {
        pricing::is_low_stock(self.stock_quantity, self.low_stock_threshold)
    }

    pub fn is_in_stock(&self) -> bool {
        self.stock_quantity > 0
    }

    /// Check if the product is available for purchase.
    pub fn is_available(&self) -> bool {
        self.status == ProductStatus::Active && self.is_in_stock()
    }

    /// Primary image, if any.
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    /// Add a tag to this product.
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }
}

/// Fields for a new product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProductDraft {
    pub name: String,
    /// Derived from the name when absent.
    pub slug: Option<String>,
    pub description: Option<String>,
    pub price: Money,
    pub sale_price: Option<Money>,
    pub category_id: Option<RecordId>,
    pub images: Vec<String>,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub stock_quantity: u32,
    pub low_stock_threshold: u32,
    pub is_featured: bool,
    pub is_new: bool,
    pub status: ProductStatus,
    pub tags: Vec<String>,
}

impl ProductDraft {
    pub fn new(name: impl Into<String>, price: Money) -> Self {
        Self {
            name: name.into(),
            price,
            low_stock_threshold: 5,
            ..Default::default()
        }
    }

    pub fn with_sale_price(mut self, sale_price: Money) -> Self {
        self.sale_price = Some(sale_price);
        self
    }

    pub fn with_category(mut self, category_id: RecordId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_stock(mut self, quantity: u32) -> Self {
        self.stock_quantity = quantity;
        self
    }

    pub fn with_sizes<I, S>(mut self, sizes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sizes = sizes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_colors<I, S>(mut self, colors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.colors = colors.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dress() -> Product {
        let draft = ProductDraft::new("Linen Midi Dress", Money::gbp(8900))
            .with_stock(3)
            .with_sizes(["S", "M", "L"]);
        Product::from_draft(RecordId::confirmed("p1"), draft, 1_000)
    }

    #[test]
    fn test_from_draft_derives_slug() {
        let p = dress();
        assert_eq!(p.slug, "linen-midi-dress");
        assert_eq!(p.created_at, 1_000);
        assert_eq!(p.updated_at, 1_000);
        assert_eq!(p.sizes, vec!["S", "M", "L"]);
    }

    #[test]
    fn test_effective_price_prefers_sale() {
        let mut p = dress();
        assert_eq!(p.effective_price(), Money::gbp(8900));
        assert!(!p.is_on_sale());

        p.sale_price = Some(Money::gbp(6500));
        assert_eq!(p.effective_price(), Money::gbp(6500));
        assert!(p.is_on_sale());
    }

    #[test]
    fn test_stock_flags() {
        let mut p = dress();
        assert!(p.is_low_stock());
        assert!(p.is_available());

        p.stock_quantity = 0;
        assert!(!p.is_low_stock());
        assert!(!p.is_available());

        p.stock_quantity = 40;
        assert!(!p.is_low_stock());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("Draft".parse::<ProductStatus>().unwrap(), ProductStatus::Draft);
        assert!("deleted".parse::<ProductStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&ProductStatus::Archived).unwrap(),
            "\"archived\""
        );
    }

    #[test]
    fn test_add_tag_dedupes() {
        let mut p = dress();
        p.add_tag("summer");
        p.add_tag("summer");
        assert_eq!(p.tags, vec!["summer"]);
    }
}
