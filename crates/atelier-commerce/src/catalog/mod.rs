//! Catalog records managed from the admin back-office.
//!
//! Products, categories, collections and reviews. Each record type has a
//! matching draft carrying the caller-provided fields for a create; the id
//! and timestamps are filled in by whoever creates the record.

mod category;
mod collection;
mod product;
mod review;

pub use category::{Category, CategoryDraft};
pub use collection::{Collection, CollectionDraft};
pub use product::{Product, ProductDraft, ProductStatus};
pub use review::{Review, ReviewDraft};

/// Derive a URL slug from a display name: `"Linen Midi Dress"` becomes
/// `"linen-midi-dress"`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}
