//! Commerce error types.

use thiserror::Error;

/// Errors that can occur in storefront operations.
///
/// Cart mutations never fail: over-limit quantities are clamped and missing
/// line items are ignored. These errors come from parsing input and from
/// the persistence layer.
#[derive(Error, Debug)]
pub enum CommerceError {
    /// Currency mismatch.
    #[error("Currency mismatch: expected {expected}, got {got}")]
    CurrencyMismatch { expected: String, got: String },

    /// Unknown currency code.
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// A money amount could not be parsed.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Unknown product status.
    #[error("Unknown product status: {0}")]
    UnknownProductStatus(String),

    /// Unknown order status.
    #[error("Unknown order status: {0}")]
    UnknownOrderStatus(String),

    /// Local storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] atelier_cache::CacheError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for CommerceError {
    fn from(e: serde_json::Error) -> Self {
        CommerceError::SerializationError(e.to_string())
    }
}
