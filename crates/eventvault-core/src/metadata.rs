//! Event metadata.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ordered key/value metadata attached to every event.
///
/// Keys keep their insertion order; setting an existing key replaces its
/// value in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    /// Creates empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style [`Metadata::set`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns `true` if `key` is present, even when its value is `null`.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Removes `key`. Removing a missing key does nothing.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Serializes to a JSON object; empty metadata becomes `{}`.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be rendered as JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }

    /// Parses metadata from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not a JSON object.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json).map(Self)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut metadata = Self::new();
        for (key, value) in iter {
            metadata.set(key, value);
        }
        metadata
    }
}

impl<'a> IntoIterator for &'a Metadata {
    type Item = (&'a String, &'a Value);
    type IntoIter = serde_json::map::Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_empty_metadata_serializes_as_empty_object() {
        let metadata = Metadata::new();

        assert!(metadata.is_empty());
        assert_eq!(metadata.to_json().unwrap(), "{}");
    }

    #[test]
    fn test_set_keeps_null_and_false_values() {
        let mut metadata = Metadata::new();

        metadata.set("name", "value");
        metadata.set("null", Value::Null);
        metadata.set("false", false);

        assert_eq!(metadata.get("name"), Some(&json!("value")));
        assert!(metadata.has("null"));
        assert_eq!(metadata.get("null"), Some(&Value::Null));
        assert_eq!(metadata.get("false"), Some(&json!(false)));
        assert!(!metadata.has("foo"));
        assert_eq!(metadata.get("foo"), None);
    }

    #[test]
    fn test_set_existing_key_replaces_value_in_place() {
        let mut metadata: Metadata = [("a", 1), ("b", 2), ("c", 3)].into_iter().collect();

        metadata.set("b", 20);

        let keys: Vec<&str> = metadata.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["a", "b", "c"]);
        assert_eq!(metadata.get("b"), Some(&json!(20)));
        assert_eq!(metadata.len(), 3);
    }

    #[test]
    fn test_remove_preserves_order_and_ignores_missing_keys() {
        let mut metadata: Metadata = [("name1", "value1"), ("name2", "value2"), ("name3", "value3")]
            .into_iter()
            .collect();

        metadata.remove("name2");
        metadata.remove("non_existing_key");

        let keys: Vec<&str> = metadata.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["name1", "name3"]);
    }

    #[test]
    fn test_json_round_trip_keeps_insertion_order() {
        let metadata = Metadata::new()
            .with("zeta", "last letter")
            .with("alpha", json!({"nested": [1, 2]}));

        let json = metadata.to_json().unwrap();
        assert_eq!(json, r#"{"zeta":"last letter","alpha":{"nested":[1,2]}}"#);
        assert_eq!(Metadata::from_json(&json).unwrap(), metadata);
        assert!(Metadata::from_json("[1]").is_err());
    }
}
