//! Address types.

use serde::{Deserialize, Serialize};

/// A postal shipping address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Address {
    /// Recipient name.
    pub name: String,
    /// Address line 1.
    pub line1: String,
    /// Address line 2 (flat, building, etc.).
    pub line2: Option<String>,
    /// Town or city.
    pub city: String,
    /// County or region.
    pub region: Option<String>,
    /// Postcode.
    pub postcode: String,
    /// Country code (e.g., "GB").
    pub country_code: String,
    /// Phone number.
    pub phone: Option<String>,
}

impl Address {
    /// Create a new address.
    pub fn new(
        name: impl Into<String>,
        line1: impl Into<String>,
        city: impl Into<String>,
        postcode: impl Into<String>,
        country_code: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            line1: line1.into(),
            city: city.into(),
            postcode: postcode.into(),
            country_code: country_code.into(),
            ..Default::default()
        }
    }

    /// Format as single line.
    pub fn one_line(&self) -> String {
        let mut parts = vec![self.line1.as_str()];
        if let Some(ref line2) = self.line2 {
            parts.push(line2);
        }
        parts.push(&self.city);
        if let Some(ref region) = self.region {
            parts.push(region);
        }
        parts.push(&self.postcode);
        parts.push(&self.country_code);
        parts.join(", ")
    }

    /// Format as multi-line.
    pub fn multi_line(&self) -> String {
        let mut lines = vec![self.name.clone(), self.line1.clone()];
        if let Some(ref line2) = self.line2 {
            lines.push(line2.clone());
        }
        lines.push(self.city.clone());
        if let Some(ref region) = self.region {
            lines.push(region.clone());
        }
        lines.push(self.postcode.clone());
        lines.push(self.country_code.clone());
        lines.join("\n")
    }

    /// Check if address is complete.
    pub fn is_complete(&self) -> bool {
        !self.name.is_empty()
            && !self.line1.is_empty()
            && !self.city.is_empty()
            && !self.postcode.is_empty()
            && !self.country_code.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_line() {
        let mut addr = Address::new("Jo Price", "12 Mill Lane", "Leeds", "LS1 4AB", "GB");
        assert_eq!(addr.one_line(), "12 Mill Lane, Leeds, LS1 4AB, GB");
        addr.line2 = Some("Flat 3".into());
        assert_eq!(addr.one_line(), "12 Mill Lane, Flat 3, Leeds, LS1 4AB, GB");
    }

    #[test]
    fn test_is_complete() {
        assert!(Address::new("Jo", "1 A St", "York", "YO1 1AA", "GB").is_complete());
        assert!(!Address::default().is_complete());
    }
}
