//! # Canonical Serialization — Document Payloads and Canonical Bytes
//!
//! This module defines [`DocumentPayload`], the tagged representation of a
//! document handed to the seal subsystem, and [`CanonicalBytes`], the sole
//! construction path for bytes that get hashed, signed, or stamped.
//!
//! ## Security Invariant
//!
//! The `CanonicalBytes` newtype has a private inner field. The only ways to
//! construct it are [`CanonicalBytes::new()`] (any serializable value, RFC 8785
//! JCS output) and [`CanonicalBytes::from_payload()`] (one rule per payload
//! variant). Generation and validation both hash through these, so the same
//! logical document always produces the same digest.
//!
//! ## Canonicalization Rules
//!
//! | Variant | Canonical bytes |
//! |---|---|
//! | `Structured(value)` | JCS: sorted keys, compact separators, UTF-8 |
//! | `Text(s)` | the UTF-8 bytes of `s`, unchanged |
//! | `Binary(b)` | `b`, unchanged |
//!
//! Floats are permitted. Invoice amounts are decimals and JCS fixes their
//! textual form, so `1000.5` always serializes to the same bytes.

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CanonicalizationError;

/// A document as supplied by the ERP side of the platform.
///
/// Serializes with an explicit tag so that stored payloads round-trip into
/// the same variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum DocumentPayload {
    /// A JSON document (the usual invoice shape).
    Structured(Value),
    /// Plain text.
    Text(String),
    /// Opaque bytes (PDF renditions, XML blobs).
    Binary(Vec<u8>),
}

impl DocumentPayload {
    /// Wrap a JSON value.
    pub fn structured(value: Value) -> Self {
        Self::Structured(value)
    }

    /// Wrap a text document.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Wrap a binary document.
    pub fn binary(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Binary(bytes.into())
    }

    /// Short name of the variant, used in logs and seal verification data.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Structured(_) => "structured",
            Self::Text(_) => "text",
            Self::Binary(_) => "binary",
        }
    }

    /// Whether the payload carries no content at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Structured(Value::Null) => true,
            Self::Structured(Value::Object(map)) => map.is_empty(),
            Self::Structured(_) => false,
            Self::Text(s) => s.is_empty(),
            Self::Binary(b) => b.is_empty(),
        }
    }

    /// Structured view of the payload for field-level analysis.
    ///
    /// JSON text and UTF-8 JSON bytes are parsed. Other text becomes a JSON
    /// string; other bytes become a standard-base64 JSON string. This view is
    /// never used for hashing; see [`CanonicalBytes::from_payload`].
    pub fn to_value(&self) -> Value {
        match self {
            Self::Structured(value) => value.clone(),
            Self::Text(s) => {
                serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.clone()))
            }
            Self::Binary(bytes) => match std::str::from_utf8(bytes) {
                Ok(s) => serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.to_string())),
                Err(_) => Value::String(base64::engine::general_purpose::STANDARD.encode(bytes)),
            },
        }
    }
}

impl From<Value> for DocumentPayload {
    fn from(value: Value) -> Self {
        Self::Structured(value)
    }
}

impl From<String> for DocumentPayload {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for DocumentPayload {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Vec<u8>> for DocumentPayload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}

/// Bytes produced exclusively by the canonicalization rules above.
///
/// # Invariants
///
/// - Structured content is JCS-serialized (sorted keys, compact separators).
/// - Text and binary content is taken verbatim.
/// - The inner `Vec<u8>` is private; downstream code cannot fabricate it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// Used for seal payloads and envelopes as well as structured documents.
    ///
    /// # Errors
    ///
    /// Returns `CanonicalizationError::SerializationFailed` if the value cannot
    /// be represented as JSON (for example a map with non-string keys).
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        let s = serde_jcs::to_string(&value)?;
        Ok(Self(s.into_bytes()))
    }

    /// Canonicalize a document payload according to its variant.
    pub fn from_payload(payload: &DocumentPayload) -> Result<Self, CanonicalizationError> {
        match payload {
            DocumentPayload::Structured(value) => Self::new(value),
            DocumentPayload::Text(s) => Ok(Self(s.as_bytes().to_vec())),
            DocumentPayload::Binary(bytes) => Ok(Self(bytes.clone())),
        }
    }

    /// Access the canonical bytes for digest computation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume and return the inner byte vector.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
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
    use proptest::prelude::*;
    use serde_json::json;

    fn canonical_str(value: Value) -> String {
        let cb = CanonicalBytes::new(&value).expect("should canonicalize");
        String::from_utf8(cb.into_bytes()).unwrap()
    }

    #[test]
    fn structured_keys_are_sorted() {
        assert_eq!(
            canonical_str(json!({"z": 1, "m": 2, "a": 3})),
            r#"{"a":3,"m":2,"z":1}"#
        );
    }

    #[test]
    fn nested_objects_are_sorted() {
        assert_eq!(
            canonical_str(json!({"outer": {"b": 2, "a": 1}, "list": [3, 2, 1]})),
            r#"{"list":[3,2,1],"outer":{"a":1,"b":2}}"#
        );
    }

    #[test]
    fn floats_are_accepted_and_stable() {
        let a = canonical_str(json!({"total_amount": 1000.5}));
        let b = canonical_str(json!({"total_amount": 1000.50}));
        assert_eq!(a, b);
        assert_eq!(a, r#"{"total_amount":1000.5}"#);
    }

    #[test]
    fn text_payload_is_verbatim() {
        let cb = CanonicalBytes::from_payload(&DocumentPayload::text("INV-001|1000")).unwrap();
        assert_eq!(cb.as_bytes(), b"INV-001|1000");
    }

    #[test]
    fn binary_payload_is_verbatim() {
        let bytes = vec![0u8, 159, 146, 150];
        let cb = CanonicalBytes::from_payload(&DocumentPayload::binary(bytes.clone())).unwrap();
        assert_eq!(cb.as_bytes(), bytes.as_slice());
    }

    #[test]
    fn structured_payload_matches_value_canonicalization() {
        let value = json!({"invoice_number": "INV-001", "total_amount": 1000});
        let from_payload =
            CanonicalBytes::from_payload(&DocumentPayload::structured(value.clone())).unwrap();
        let direct = CanonicalBytes::new(&value).unwrap();
        assert_eq!(from_payload, direct);
    }

    #[test]
    fn to_value_parses_json_text() {
        let payload = DocumentPayload::text(r#"{"a": 1}"#);
        assert_eq!(payload.to_value(), json!({"a": 1}));
    }

    #[test]
    fn to_value_wraps_plain_text() {
        let payload = DocumentPayload::text("not json");
        assert_eq!(payload.to_value(), json!("not json"));
    }

    #[test]
    fn to_value_base64_encodes_non_utf8_bytes() {
        let payload = DocumentPayload::binary(vec![0xff, 0xfe]);
        assert_eq!(payload.to_value(), json!("//4="));
    }

    #[test]
    fn empty_detection() {
        assert!(DocumentPayload::structured(json!({})).is_empty());
        assert!(DocumentPayload::text("").is_empty());
        assert!(!DocumentPayload::binary(vec![1]).is_empty());
    }

    #[test]
    fn payload_serde_keeps_variant() {
        let payload = DocumentPayload::text("hello");
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"kind":"text","data":"hello"}"#);
        let back: DocumentPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }

    proptest! {
        #[test]
        fn key_order_never_changes_canonical_bytes(
            entries in proptest::collection::btree_map("[a-z]{1,8}", any::<i64>(), 1..12)
        ) {
            let forward: serde_json::Map<String, Value> =
                entries.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
            let reversed: serde_json::Map<String, Value> =
                entries.iter().rev().map(|(k, v)| (k.clone(), json!(v))).collect();
            let a = CanonicalBytes::new(&Value::Object(forward)).unwrap();
            let b = CanonicalBytes::new(&Value::Object(reversed)).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
