//! Identifiers for records and cart lines.
//!
//! A record created locally gets a provisional id until the remote store
//! assigns the real one. The two states are distinct variants so code never
//! has to guess from the shape of a string.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::Mutex;

use crate::clock::Clock;

/// Marker prepended to provisional ids in their serialized form.
const PROVISIONAL_MARKER: &str = "tmp:";

/// Identifier of an admin entity record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordId {
    /// Synthesised locally; the create has not been confirmed.
    Provisional(String),
    /// Assigned by the remote store.
    Confirmed(String),
}

impl RecordId {
    /// Wrap a server-assigned id.
    pub fn confirmed(id: impl Into<String>) -> Self {
        RecordId::Confirmed(id.into())
    }

    /// Synthesise a provisional id of the form `<prefix>-<millis>`.
    ///
    /// When the clock has not moved past the newest id handed out, the id
    /// gets a `-<n>` suffix from a process-wide sequence instead.
    pub fn provisional(prefix: &str, clock: &dyn Clock) -> Self {
        // (newest millis issued, last suffix issued)
        static LAST: Mutex<(i64, u64)> = Mutex::new((i64::MIN, 0));

        let now = clock.now_millis();
        let mut last = LAST.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if now > last.0 {
            last.0 = now;
            return RecordId::Provisional(format!("{prefix}-{now}"));
        }
        last.1 += 1;
        RecordId::Provisional(format!("{prefix}-{now}-{}", last.1))
    }

    /// The raw id, without any marker.
    pub fn as_str(&self) -> &str {
        match self {
            RecordId::Provisional(s) | RecordId::Confirmed(s) => s,
        }
    }

    pub fn is_provisional(&self) -> bool {
        matches!(self, RecordId::Provisional(_))
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, RecordId::Confirmed(_))
    }

    /// Parse the serialized form back into a tagged id.
    pub fn parse(s: &str) -> Self {
        match s.strip_prefix(PROVISIONAL_MARKER) {
            Some(rest) => RecordId::Provisional(rest.to_string()),
            None => RecordId::Confirmed(s.to_string()),
        }
    }

    fn encoded(&self) -> String {
        match self {
            RecordId::Provisional(s) => format!("{PROVISIONAL_MARKER}{s}"),
            RecordId::Confirmed(s) => s.clone(),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId::parse(s)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        RecordId::parse(&s)
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encoded())
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(RecordId::parse(&s))
    }
}

/// Cart line identifier, also the merge key for adds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineItemId(String);

impl LineItemId {
    /// Build the key for a product and selected options.
    ///
    /// Missing options read as `default`, so `(p, None, None)` and
    /// `(p, Some("default"), None)` share a line.
    pub fn for_selection(product_id: &RecordId, size: Option<&str>, color: Option<&str>) -> Self {
        Self(format!(
            "{}-{}-{}",
            product_id.as_str(),
            size.unwrap_or("default"),
            color.unwrap_or("default")
        ))
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LineItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LineItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::collections::HashMap;

    #[test]
    fn test_provisional_id_shape() {
        let clock = ManualClock::new(1_700_000_000_000);
        let id = RecordId::provisional("prod", &clock);
        assert!(id.is_provisional());
        assert!(id.as_str().starts_with("prod-1700000000000"));
    }

    #[test]
    fn test_provisional_ids_unique_within_millisecond() {
        let clock = ManualClock::new(42);
        let a = RecordId::provisional("rev", &clock);
        let b = RecordId::provisional("rev", &clock);
        let c = RecordId::provisional("rev", &clock);
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
    }

    #[test]
    fn test_serialized_form_keeps_tag() {
        let tmp = RecordId::Provisional("cat-1".into());
        let real = RecordId::confirmed("b7c1");

        assert_eq!(serde_json::to_string(&tmp).unwrap(), "\"tmp:cat-1\"");
        assert_eq!(serde_json::to_string(&real).unwrap(), "\"b7c1\"");

        let back: RecordId = serde_json::from_str("\"tmp:cat-1\"").unwrap();
        assert_eq!(back, tmp);
        let back: RecordId = serde_json::from_str("\"b7c1\"").unwrap();
        assert_eq!(back, real);
    }

    #[test]
    fn test_record_id_as_map_key() {
        let mut map = HashMap::new();
        map.insert(RecordId::Provisional("col-1".into()), vec![RecordId::confirmed("p1")]);
        let json = serde_json::to_string(&map).unwrap();
        let back: HashMap<RecordId, Vec<RecordId>> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_display_omits_marker() {
        assert_eq!(RecordId::Provisional("x-1".into()).to_string(), "x-1");
    }

    #[test]
    fn test_line_item_key() {
        let pid = RecordId::confirmed("p1");
        assert_eq!(
            LineItemId::for_selection(&pid, Some("M"), Some("Black")).as_str(),
            "p1-M-Black"
        );
        assert_eq!(
            LineItemId::for_selection(&pid, None, None).as_str(),
            "p1-default-default"
        );
    }
}
