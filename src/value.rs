//! # Bridge Values
//!
//! The closed set of values that can cross the bridge.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Value                                                       │
//! │  ├── Null                                                    │
//! │  ├── Bool(bool)                                              │
//! │  ├── Int(i64)          JSON integers                         │
//! │  ├── Double(f64)       JSON numbers with a fraction/exponent │
//! │  ├── String(String)                                          │
//! │  ├── List(Vec<Value>)                                        │
//! │  └── Map(Parameters)   string keys only                      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Values serialize untagged, so a `Value` is wire-identical to the JSON
//! the host runtime sends.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::params::Parameters;

/// A value that can cross the bridge
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absent / null
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Whole number
    Int(i64),
    /// Floating point number
    Double(f64),
    /// UTF-8 string
    String(String),
    /// Ordered list
    List(Vec<Value>),
    /// String-keyed map
    Map(Parameters),
}

impl Value {
    /// Whether this is `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Read as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Read as a whole number
    ///
    /// Doubles with no fractional part are accepted, since some hosts only
    /// have one number type.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Double(d) if d.fract() == 0.0 && d.is_finite() => Some(*d as i64),
            _ => None,
        }
    }

    /// Read as a floating point number (integers widen)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Borrow as a list
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Borrow as a map
    pub fn as_map(&self) -> Option<&Parameters> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Short name of the variant, used in log lines
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// Parse a JSON document into a value
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encode this value as JSON
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<BTreeMap<String, T>> for Value {
    fn from(v: BTreeMap<String, T>) -> Self {
        Value::Map(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl From<Parameters> for Value {
    fn from(v: Parameters) -> Self {
        Value::Map(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Double).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::from(i),
            Value::Double(d) => serde_json::Number::from_f64(d)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::List(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v.clone())))
                    .collect(),
            ),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_decoding() {
        let value = Value::from_json(r#"{"a": 1, "b": 1.5, "c": [true, null, "x"]}"#).unwrap();
        let map = value.as_map().unwrap();
        assert_eq!(map.get("a"), Some(&Value::Int(1)));
        assert_eq!(map.get("b"), Some(&Value::Double(1.5)));
        assert_eq!(
            map.get("c"),
            Some(&Value::List(vec![Value::Bool(true), Value::Null, Value::from("x")]))
        );
    }

    #[test]
    fn test_numeric_widening() {
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::Double(4.0).as_i64(), Some(4));
        assert_eq!(Value::Double(4.5).as_i64(), None);
        assert_eq!(Value::from("4").as_i64(), None);
    }

    #[test]
    fn test_json_value_conversion() {
        let json = serde_json::json!({"name": "x", "tags": ["a"], "n": 2});
        let value = Value::from(json.clone());
        assert_eq!(serde_json::Value::from(value), json);
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Value::from(None::<String>), Value::Null);
        assert_eq!(Value::from(Some("id")), Value::from("id"));
    }
}
