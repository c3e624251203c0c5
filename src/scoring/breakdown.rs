//! Insertion-ordered risk breakdown.
//!
//! A breakdown maps signal names to signed integer points, in the order the
//! signals were applied; bookkeeping entries are prefixed `_` and may carry
//! strings. JSON maps sort their keys under serde_json's default map type,
//! so this type keeps a Vec and hand-rolls Serialize/Deserialize to make
//! order survive the round trip.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Ordered signal → value map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Breakdown {
    entries: Vec<(String, Value)>,
}

impl Breakdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a signal contribution. Zero contributions are not recorded.
    pub fn add(&mut self, key: &str, points: i64) {
        if points != 0 {
            self.entries.push((key.to_string(), Value::from(points)));
        }
    }

    /// Record a bookkeeping entry (callers use `_`-prefixed keys).
    pub fn note(&mut self, key: &str, value: impl Into<Value>) {
        self.entries.push((key.to_string(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn get_points(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Signal entries only (bookkeeping keys skipped), in insertion order.
    pub fn signals(&self) -> impl Iterator<Item = (&str, i64)> {
        self.entries.iter().filter_map(|(k, v)| {
            if k.starts_with('_') {
                None
            } else {
                v.as_i64().map(|points| (k.as_str(), points))
            }
        })
    }

    /// Sum of all signal points (bookkeeping keys skipped).
    pub fn additive_total(&self) -> i64 {
        self.signals().map(|(_, points)| points).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parse from a stored JSON value.
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    /// Serialize to a JSON value for storage.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for Breakdown {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Breakdown {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BreakdownVisitor;

        impl<'de> Visitor<'de> for BreakdownVisitor {
            type Value = Breakdown;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a map of signal names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, Value>()? {
                    entries.push((key, value));
                }
                Ok(Breakdown { entries })
            }
        }

        deserializer.deserialize_map(BreakdownVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_preserved_through_json() {
        let mut b = Breakdown::new();
        b.add("gap_duration_24h_plus", 45);
        b.add("vessel_age_15_20y", 12);
        b.add("flag_state_medium_risk", 5);
        b.note("_additive_subtotal", 62);
        b.note("_corridor_multiplier", 1.5);

        let json = serde_json::to_string(&b).unwrap();
        // Keys appear in insertion order, not alphabetically.
        let gap_pos = json.find("gap_duration_24h_plus").unwrap();
        let age_pos = json.find("vessel_age_15_20y").unwrap();
        let flag_pos = json.find("flag_state_medium_risk").unwrap();
        assert!(gap_pos < age_pos && age_pos < flag_pos);

        let back: Breakdown = serde_json::from_str(&json).unwrap();
        assert_eq!(back, b);
    }

    #[test]
    fn test_zero_contributions_dropped() {
        let mut b = Breakdown::new();
        b.add("vessel_age_10_15y", 0);
        assert!(b.is_empty());
    }

    #[test]
    fn test_additive_total_skips_bookkeeping() {
        let mut b = Breakdown::new();
        b.add("gap_duration_24h_plus", 45);
        b.add("dark_zone_deduction", -10);
        b.note("_final_score", 100);
        b.note("_voyage_window_fallback", "default_30d_used");
        assert_eq!(b.additive_total(), 35);
    }

    #[test]
    fn test_signals_iterator_skips_strings() {
        let mut b = Breakdown::new();
        b.add("watchlist_active", 40);
        b.note("_watchlist_source", "OFAC");
        let signals: Vec<_> = b.signals().collect();
        assert_eq!(signals, vec![("watchlist_active", 40)]);
    }
}
