//! Deterministic canonical serialization.
//!
//! `state_hash` and the history tree's save/load round trip both depend on
//! byte-for-byte reproducible serialization of a [`Value`]. Object keys are
//! sorted lexicographically, there is no insignificant whitespace, numbers
//! are emitted in `serde_json`'s shortest round-tripping decimal form, and
//! strings and arrays are emitted as given.
//!
//! `serde_json::Value` is used directly rather than a hand-written parser:
//! this crate does not enable the `preserve_order` feature, so
//! `serde_json::Map` is backed by a `BTreeMap` and `serde_json::to_vec`
//! already emits object keys in sorted order with no extra whitespace, and
//! `serde_json::Number` can never hold a non-finite float (its only public
//! constructor, `from_f64`, rejects NaN/Infinity) so there is no
//! canonicalization failure mode left for this function to guard against
//! once a value is already a `Value`.

use crate::config::KernelLimits;
use crate::error::KernelError;
use crate::value::Value;

/// Serialize `value` to its canonical byte representation.
pub fn canonicalize(value: &Value) -> Result<Vec<u8>, KernelError> {
    serde_json::to_vec(value.as_json())
        .map_err(|e| KernelError::Canonicalization(e.to_string()))
}

/// Serialize a transition descriptor (or any struct) to canonical bytes by
/// routing it through [`Value`] first.
pub fn canonicalize_serializable<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, KernelError> {
    let as_value =
        Value::from_serializable(value).map_err(|e| KernelError::Canonicalization(e.to_string()))?;
    canonicalize(&as_value)
}

/// Reject `value` before it is ever canonicalized if it exceeds the nesting
/// depth or object field-count ceilings in `limits`. Attacker-influenced
/// `params`/snapshot payloads are the only untrusted input this crate's
/// hashing path touches, so this is the one place those ceilings are
/// actually enforced.
fn check_shape(value: &serde_json::Value, limits: &KernelLimits, depth: usize) -> Result<(), KernelError> {
    if depth > limits.max_canonical_depth {
        return Err(KernelError::Canonicalization(format!(
            "nesting depth exceeds max_canonical_depth ({})",
            limits.max_canonical_depth
        )));
    }
    match value {
        serde_json::Value::Object(map) => {
            if map.len() > limits.max_object_fields {
                return Err(KernelError::Canonicalization(format!(
                    "object has {} fields, exceeds max_object_fields ({})",
                    map.len(),
                    limits.max_object_fields
                )));
            }
            for v in map.values() {
                check_shape(v, limits, depth + 1)?;
            }
            Ok(())
        }
        serde_json::Value::Array(items) => {
            for v in items {
                check_shape(v, limits, depth + 1)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Canonicalize `value`, first rejecting it if it violates `limits`'s
/// nesting-depth, field-count, or byte-size ceilings.
pub fn canonicalize_checked(value: &Value, limits: &KernelLimits) -> Result<Vec<u8>, KernelError> {
    check_shape(value.as_json(), limits, 0)?;
    let bytes = canonicalize(value)?;
    if bytes.len() > limits.max_canonical_bytes {
        return Err(KernelError::Canonicalization(format!(
            "canonical form is {} bytes, exceeds max_canonical_bytes ({})",
            bytes.len(),
            limits.max_canonical_bytes
        )));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_keys_are_sorted_in_output() {
        let v = Value(json!({"z": 1, "a": 2, "m": {"y": 1, "b": 2}}));
        let bytes = canonicalize(&v).unwrap();
        let s = String::from_utf8(bytes).unwrap();
        assert_eq!(s, r#"{"a":2,"m":{"b":2,"y":1},"z":1}"#);
    }

    #[test]
    fn no_insignificant_whitespace() {
        let v = Value(json!({"a": [1, 2, 3], "b": "x"}));
        let bytes = canonicalize(&v).unwrap();
        let s = String::from_utf8(bytes).unwrap();
        assert!(!s.contains(' '));
        assert!(!s.contains('\n'));
    }

    #[test]
    fn same_value_canonicalizes_identically_every_time() {
        let v = Value(json!({"foo": 1, "bar": [true, false, null]}));
        assert_eq!(canonicalize(&v).unwrap(), canonicalize(&v).unwrap());
    }

    #[test]
    fn distinct_values_canonicalize_differently() {
        let a = Value(json!({"x": 1}));
        let b = Value(json!({"x": 2}));
        assert_ne!(canonicalize(&a).unwrap(), canonicalize(&b).unwrap());
    }

    #[test]
    fn checked_rejects_excessive_nesting_depth() {
        let limits = KernelLimits::default().with_max_canonical_depth(2);
        let v = Value(json!({"a": {"b": {"c": 1}}}));
        assert!(canonicalize_checked(&v, &limits).is_err());
    }

    #[test]
    fn checked_rejects_excessive_field_count() {
        let limits = KernelLimits::default().with_max_object_fields(2);
        let v = Value(json!({"a": 1, "b": 2, "c": 3}));
        assert!(canonicalize_checked(&v, &limits).is_err());
    }

    #[test]
    fn checked_accepts_value_within_limits() {
        let limits = KernelLimits::default();
        let v = Value(json!({"a": 1, "b": [1, 2, 3]}));
        assert!(canonicalize_checked(&v, &limits).is_ok());
    }
}
