//! # Parameters
//!
//! Immutable, cheaply cloneable string-keyed arguments of a bridge call,
//! with typed getters.
//!
//! Optional getters (`get_*`) return `None` for an absent key, a `Null`
//! value or a value of the wrong type. Required getters (`require_*`) turn
//! all three cases into `Error::BadArgumentType(name)`, which is what every
//! handler reports to the caller.
//!
//! `get` distinguishes "absent" (`None`) from "present but null"
//! (`Some(Value::Null)`), which matters for `echo`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::value::Value;

/// Arguments of a bridge call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters(Arc<BTreeMap<String, Value>>);

impl Parameters {
    /// Empty parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode parameters from a JSON object
    ///
    /// A root that is not an object is a bad `arguments` parameter.
    pub fn from_json(json: &str) -> Result<Self> {
        match Value::from_json(json)? {
            Value::Map(map) => Ok(map),
            Value::Null => Ok(Self::new()),
            _ => Err(Error::bad_argument("arguments")),
        }
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a value, copying the map first if it is shared
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        Arc::make_mut(&mut self.0).insert(key.into(), value.into());
    }

    /// Raw lookup: `None` when absent, `Some(Value::Null)` when explicitly null
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether the key is present (even if null)
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Whether the key is absent or explicitly null
    pub fn is_null_or_absent(&self, key: &str) -> bool {
        self.get(key).map_or(true, Value::is_null)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Iterate keys in order
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    // ========================================================================
    // Optional getters
    // ========================================================================

    /// String value, if present and a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Integer value, if present and integral
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    /// Number value, if present and numeric
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    /// Boolean value, if present and a boolean
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Nested map, if present and a map
    pub fn get_map(&self, key: &str) -> Option<&Parameters> {
        self.get(key).and_then(Value::as_map)
    }

    /// List, if present and a list
    pub fn get_list(&self, key: &str) -> Option<&[Value]> {
        self.get(key).and_then(Value::as_list)
    }

    /// List of strings, if present and every element is a string
    pub fn get_string_list(&self, key: &str) -> Option<Vec<String>> {
        self.get_list(key)?
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect()
    }

    // ========================================================================
    // Required getters
    // ========================================================================

    /// Any non-null value
    pub fn require(&self, key: &str) -> Result<&Value> {
        match self.get(key) {
            Some(Value::Null) | None => Err(Error::bad_argument(key)),
            Some(v) => Ok(v),
        }
    }

    /// Required string
    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.get_str(key).ok_or_else(|| Error::bad_argument(key))
    }

    /// Required integer
    pub fn require_i64(&self, key: &str) -> Result<i64> {
        self.get_i64(key).ok_or_else(|| Error::bad_argument(key))
    }

    /// Required number
    pub fn require_f64(&self, key: &str) -> Result<f64> {
        self.get_f64(key).ok_or_else(|| Error::bad_argument(key))
    }

    /// Required boolean
    pub fn require_bool(&self, key: &str) -> Result<bool> {
        self.get_bool(key).ok_or_else(|| Error::bad_argument(key))
    }

    /// Required map
    pub fn require_map(&self, key: &str) -> Result<&Parameters> {
        self.get_map(key).ok_or_else(|| Error::bad_argument(key))
    }

    /// Required list
    pub fn require_list(&self, key: &str) -> Result<&[Value]> {
        self.get_list(key).ok_or_else(|| Error::bad_argument(key))
    }

    /// Required list of strings
    pub fn require_string_list(&self, key: &str) -> Result<Vec<String>> {
        self.get_string_list(key).ok_or_else(|| Error::bad_argument(key))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(Arc::new(iter.into_iter().map(|(k, v)| (k.into(), v)).collect()))
    }
}

impl From<BTreeMap<String, Value>> for Parameters {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(Arc::new(map))
    }
}

impl From<HashMap<String, Value>> for Parameters {
    fn from(map: HashMap<String, Value>) -> Self {
        map.into_iter().collect()
    }
}

impl Serialize for Parameters {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.as_ref().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Parameters {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        BTreeMap::<String, Value>::deserialize(deserializer).map(Self::from)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Parameters {
        Parameters::from_json(
            r#"{"name": "x", "count": 3, "ratio": 0.5, "flag": true, "nothing": null,
                "tags": ["a", "b"], "mixed": ["a", 1], "nested": {"k": "v"}}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_optional_getters() {
        let p = sample();
        assert_eq!(p.get_str("name"), Some("x"));
        assert_eq!(p.get_i64("count"), Some(3));
        assert_eq!(p.get_f64("count"), Some(3.0));
        assert_eq!(p.get_f64("ratio"), Some(0.5));
        assert_eq!(p.get_bool("flag"), Some(true));
        assert_eq!(p.get_string_list("tags"), Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(p.get_string_list("mixed"), None);
        assert_eq!(p.get_map("nested").and_then(|m| m.get_str("k")), Some("v"));
        assert_eq!(p.get_str("count"), None);
    }

    #[test]
    fn test_absent_versus_null() {
        let p = sample();
        assert_eq!(p.get("nothing"), Some(&Value::Null));
        assert_eq!(p.get("missing"), None);
        assert!(p.contains_key("nothing"));
        assert!(p.is_null_or_absent("nothing"));
        assert!(p.is_null_or_absent("missing"));
        assert!(!p.is_null_or_absent("name"));
    }

    #[test]
    fn test_required_getters_name_the_argument() {
        let p = sample();
        assert_eq!(p.require_str("missing"), Err(Error::bad_argument("missing")));
        assert_eq!(p.require_str("count"), Err(Error::bad_argument("count")));
        assert_eq!(p.require("nothing"), Err(Error::bad_argument("nothing")));
        assert_eq!(p.require_i64("count"), Ok(3));
    }

    #[test]
    fn test_non_object_root_is_rejected() {
        assert_eq!(Parameters::from_json("[1, 2]"), Err(Error::bad_argument("arguments")));
        assert!(Parameters::from_json("null").unwrap().is_empty());
    }

    #[test]
    fn test_clone_on_write() {
        let a = Parameters::new().with("k", 1);
        let mut b = a.clone();
        b.insert("k", 2);
        assert_eq!(a.get_i64("k"), Some(1));
        assert_eq!(b.get_i64("k"), Some(2));
    }
}
