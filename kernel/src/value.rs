//! The tagged-variant payload type shared by transition `params` and
//! history-tree snapshot `data`.
//!
//! `Value` is a thin newtype over [`serde_json::Value`]. This crate is built
//! without serde_json's `preserve_order` feature, so `serde_json::Map` is
//! backed by a `BTreeMap` and already iterates object entries in
//! lexicographic key order — the canonicalizer in [`crate::canonical`] relies
//! on that directly instead of re-sorting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An arbitrary structured value: null, bool, number, string, array, or an
/// object of string keys to further values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Value(pub serde_json::Value);

impl Value {
    /// The JSON `null` value.
    pub const NULL: Value = Value(serde_json::Value::Null);

    /// Wrap any serializable Rust value as a `Value`, going through JSON.
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Value(serde_json::to_value(value)?))
    }

    /// Build an object from `(key, value)` pairs.
    pub fn object(fields: impl IntoIterator<Item = (String, Value)>) -> Self {
        let map = fields.into_iter().map(|(k, v)| (k, v.0)).collect();
        Value(serde_json::Value::Object(map))
    }

    /// Borrow the inner `serde_json::Value`.
    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Value(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_field_order_is_sorted_on_iteration() {
        let v = Value(json!({"z": 1, "a": 2, "m": 3}));
        if let serde_json::Value::Object(map) = &v.0 {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            assert_eq!(keys, vec!["a", "m", "z"]);
        } else {
            panic!("expected object");
        }
    }
}
