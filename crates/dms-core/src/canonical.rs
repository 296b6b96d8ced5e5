//! # Canonical Serialization — JCS Byte Production
//!
//! This module defines `CanonicalBytes`, the sole construction path for JSON
//! bytes used in digest computation across the schema engine.
//!
//! ## Determinism Invariant
//!
//! The `CanonicalBytes` newtype has a private inner field. The only way to
//! construct it is through `CanonicalBytes::new()`, which serializes with
//! `serde_jcs` (RFC 8785): object keys sorted by UTF-16 code unit, compact
//! separators, ECMAScript number formatting, no incidental whitespace.
//!
//! Two ApiSchema documents that differ only in key order or formatting
//! therefore produce identical canonical bytes, and any change to a value
//! produces different bytes.
//!
//! Unlike general-purpose content addressing, decimal numbers are accepted:
//! schema documents legitimately carry `minimum`/`maximum` bounds and
//! decimal precision metadata. JCS pins their textual form.

use serde::Serialize;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by JCS canonicalization.
///
/// # Invariants
///
/// - The only constructor is `CanonicalBytes::new()`.
/// - Object keys are sorted; separators are compact (RFC 8785).
/// - The byte sequence is valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns `CanonicalizationError::SerializationFailed` if the value
    /// cannot be represented as JSON.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        let s = serde_jcs::to_string(&value)?;
        Ok(Self(s.into_bytes()))
    }

    /// Access the canonical bytes for digest computation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// View the canonical form as text.
    pub fn as_str(&self) -> &str {
        // Constructed from a `String`, so always valid UTF-8.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    /// Returns the length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_bytes_sorted_keys() {
        let data = json!({"z": 1, "m": 2, "a": 3});
        let cb = CanonicalBytes::new(&data).expect("should canonicalize");
        assert_eq!(cb.as_str(), r#"{"a":3,"m":2,"z":1}"#);
    }

    #[test]
    fn test_canonical_bytes_nested_project_schema() {
        let data = json!({
            "projectSchema": {
                "projectVersion": "5.0.0",
                "projectName": "Ed-Fi",
                "resourceSchemas": {"schools": {"resourceName": "School"}}
            }
        });
        let cb = CanonicalBytes::new(&data).expect("should canonicalize");
        assert_eq!(
            cb.as_str(),
            r#"{"projectSchema":{"projectName":"Ed-Fi","projectVersion":"5.0.0","resourceSchemas":{"schools":{"resourceName":"School"}}}}"#
        );
    }

    #[test]
    fn test_canonical_bytes_accepts_decimals() {
        let data = json!({"minimum": 0.5, "maximum": 100});
        let cb = CanonicalBytes::new(&data).expect("decimals are permitted");
        assert_eq!(cb.as_str(), r#"{"maximum":100,"minimum":0.5}"#);
    }

    #[test]
    fn test_canonical_bytes_ignores_input_key_order() {
        let a: serde_json::Value =
            serde_json::from_str(r#"{"b": [1, 2], "a": {"y": true, "x": null}}"#).unwrap();
        let b: serde_json::Value =
            serde_json::from_str(r#"{"a":{"x":null,"y":true},"b":[1,2]}"#).unwrap();
        assert_eq!(
            CanonicalBytes::new(&a).unwrap(),
            CanonicalBytes::new(&b).unwrap()
        );
    }

    #[test]
    fn test_array_order_is_significant() {
        let a = CanonicalBytes::new(&json!(["$.a", "$.b"])).unwrap();
        let b = CanonicalBytes::new(&json!(["$.b", "$.a"])).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_unicode_passthrough() {
        let cb = CanonicalBytes::new(&json!({"description": "Écoles"})).unwrap();
        assert_eq!(cb.as_str(), r#"{"description":"Écoles"}"#);
    }

    #[test]
    fn test_empty_object() {
        let cb = CanonicalBytes::new(&json!({})).unwrap();
        assert_eq!(cb.as_bytes(), b"{}");
        assert!(!cb.is_empty());
        assert_eq!(cb.len(), 2);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;
        use std::collections::BTreeMap;

        proptest! {
            #[test]
            fn canonical_bytes_is_deterministic(
                entries in proptest::collection::btree_map("[a-zA-Z_]{1,8}", any::<i64>(), 0..12)
            ) {
                let a = CanonicalBytes::new(&entries).unwrap();
                let b = CanonicalBytes::new(&entries).unwrap();
                prop_assert_eq!(a, b);
            }

            #[test]
            fn canonical_bytes_ignores_insertion_order(
                entries in proptest::collection::vec(("[a-z]{1,6}", any::<i32>()), 0..10)
            ) {
                let mut forward = serde_json::Map::new();
                for (k, v) in &entries {
                    forward.insert(k.clone(), serde_json::json!(v));
                }
                let mut reverse = serde_json::Map::new();
                for (k, _) in entries.iter().rev() {
                    if let Some(v) = forward.get(k) {
                        reverse.insert(k.clone(), v.clone());
                    }
                }
                let expected: BTreeMap<_, _> = forward.clone().into_iter().collect();
                let a = CanonicalBytes::new(&serde_json::Value::Object(forward)).unwrap();
                let b = CanonicalBytes::new(&serde_json::Value::Object(reverse)).unwrap();
                let c = CanonicalBytes::new(&expected).unwrap();
                prop_assert_eq!(&a, &b);
                prop_assert_eq!(&a, &c);
            }
        }
    }
}
