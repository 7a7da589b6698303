//! # Field Paths and Fingerprints
//!
//! Flattens nested JSON into leaf field paths: dot notation for object keys,
//! `[index]` for array elements (`lines[0].amount`). A scalar document has
//! the single path `$`. Empty objects and arrays are leaves.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use taxpoynt_core::{sha256_hex, sha256_raw_hex, CanonicalBytes, DocumentPayload};

use crate::error::IntegrityError;

/// Path of a scalar document.
pub const ROOT_PATH: &str = "$";

/// Collect every leaf of `value` keyed by its field path.
pub fn collect_fields(value: &Value) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    collect_into(value, String::new(), &mut out);
    out
}

fn collect_into(value: &Value, path: String, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                let child_path = if path.is_empty() { key.clone() } else { format!("{path}.{key}") };
                collect_into(child, child_path, out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (i, child) in items.iter().enumerate() {
                let child_path = if path.is_empty() { format!("[{i}]") } else { format!("{path}[{i}]") };
                collect_into(child, child_path, out);
            }
        }
        leaf => {
            let path = if path.is_empty() { ROOT_PATH.to_string() } else { path };
            out.insert(path, leaf.clone());
        }
    }
}

/// Look up a dot-notation path (`supplier.tin`) in a JSON value.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, key| current.get(key))
}

/// Last segment of a field path, without any index suffix.
pub fn leaf_name(path: &str) -> &str {
    let last = path.rsplit('.').next().unwrap_or(path);
    last.split('[').next().unwrap_or(last)
}

/// Short JSON type name.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Parse a date-like string: RFC 3339 or `YYYY-MM-DD`. Returns Unix seconds.
pub fn parse_date(value: &Value) -> Option<i64> {
    let s = value.as_str()?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}

/// Hash snapshot of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFingerprint {
    /// SHA-256 of the canonical document.
    pub document_hash: String,
    /// SHA-256 over the sorted `path:type` list. Changes when fields are
    /// added, removed, or change type.
    pub structure_hash: String,
    /// SHA-256 over the leaf values in path order, ignoring key names.
    pub content_hash: String,
    pub field_count: usize,
    /// Canonical length in bytes.
    pub document_size: usize,
}

impl DocumentFingerprint {
    pub fn compute(payload: &DocumentPayload) -> Result<Self, IntegrityError> {
        let canonical = CanonicalBytes::from_payload(payload)?;
        let fields = collect_fields(&payload.to_value());

        let structure: Vec<String> = fields
            .iter()
            .map(|(path, v)| format!("{path}:{}", type_name(v)))
            .collect();
        let values: Vec<&Value> = fields.values().collect();

        Ok(Self {
            document_hash: sha256_hex(&canonical),
            structure_hash: sha256_raw_hex(structure.join("\n").as_bytes()),
            content_hash: sha256_hex(&CanonicalBytes::new(&values)?),
            field_count: fields.len(),
            document_size: canonical.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_paths() {
        let doc = json!({
            "invoice_number": "INV-1",
            "supplier": {"tin": "123", "address": {"city": "Lagos"}},
            "lines": [{"amount": 10}, {"amount": 20}],
            "notes": [],
        });
        let fields = collect_fields(&doc);
        let paths: Vec<_> = fields.keys().map(String::as_str).collect();
        assert_eq!(
            paths,
            vec![
                "invoice_number",
                "lines[0].amount",
                "lines[1].amount",
                "notes",
                "supplier.address.city",
                "supplier.tin",
            ]
        );
        assert_eq!(fields["notes"], json!([]));
    }

    #[test]
    fn scalar_document_uses_root_path() {
        let fields = collect_fields(&json!("plain text"));
        assert_eq!(fields.get(ROOT_PATH), Some(&json!("plain text")));
    }

    #[test]
    fn lookup_and_leaf_name() {
        let doc = json!({"supplier": {"tin": "123"}});
        assert_eq!(lookup(&doc, "supplier.tin"), Some(&json!("123")));
        assert_eq!(lookup(&doc, "customer.name"), None);
        assert_eq!(leaf_name("supplier.tin"), "tin");
        assert_eq!(leaf_name("lines[3]"), "lines");
        assert_eq!(leaf_name("total_amount"), "total_amount");
    }

    #[test]
    fn parses_dates() {
        assert_eq!(parse_date(&json!("1970-01-02")), Some(86_400));
        assert_eq!(parse_date(&json!("1970-01-01T00:01:00Z")), Some(60));
        assert_eq!(parse_date(&json!("yesterday")), None);
        assert_eq!(parse_date(&json!(5)), None);
    }

    #[test]
    fn fingerprint_distinguishes_structure_and_content() {
        let a = DocumentFingerprint::compute(&json!({"a": 1, "b": 2}).into()).unwrap();
        let renamed = DocumentFingerprint::compute(&json!({"a": 1, "c": 2}).into()).unwrap();
        let changed = DocumentFingerprint::compute(&json!({"a": 1, "b": 3}).into()).unwrap();

        assert_ne!(a.structure_hash, renamed.structure_hash);
        assert_eq!(a.content_hash, renamed.content_hash);
        assert_eq!(a.structure_hash, changed.structure_hash);
        assert_ne!(a.content_hash, changed.content_hash);
        assert_eq!(a.field_count, 2);
        assert_eq!(a.document_size, br#"{"a":1,"b":2}"#.len());
    }

    #[test]
    fn fingerprint_ignores_key_order() {
        let a = DocumentFingerprint::compute(&json!({"a": 1, "b": {"x": 1, "y": 2}}).into()).unwrap();
        let b: Value = serde_json::from_str(r#"{"b": {"y": 2, "x": 1}, "a": 1}"#).unwrap();
        assert_eq!(a, DocumentFingerprint::compute(&b.into()).unwrap());
    }
}
