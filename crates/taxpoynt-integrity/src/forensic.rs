//! # Forensic Analysis
//!
//! Line-level diff of two documents plus heuristic detectors for the
//! tampering patterns seen on e-invoices:
//!
//! - **Amount inflation**: a monetary field grew by more than the configured
//!   ratio (10% by default).
//! - **Date manipulation**: a date field moved.
//! - **Entity substitution**: a supplier or customer identity field changed.
//!
//! The diff pretty-prints both documents with sorted keys, skips the common
//! leading and trailing lines, and aligns the rest by longest common
//! subsequence. Inputs beyond [`MAX_DIFF_LINES`] lines per side are
//! truncated, which bounds the LCS table at about 4 MB.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fields::{leaf_name, parse_date};

/// Lines per side considered by the diff.
pub const MAX_DIFF_LINES: usize = 1000;

/// Fields treated as monetary amounts by the inflation detector.
const AMOUNT_MARKERS: [&str; 4] = ["amount", "total", "price", "subtotal"];

/// Parties whose identity fields are watched for substitution.
const ENTITY_PREFIXES: [&str; 6] = ["supplier", "customer", "seller", "buyer", "vendor", "party"];

/// Identity fields of a party.
const ENTITY_FIELDS: [&str; 7] = ["name", "tin", "vat_number", "registration_number", "email", "id", "address"];

/// Detected tampering pattern kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    AmountInflation,
    DateManipulation,
    EntitySubstitution,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AmountInflation => "amount_inflation",
            Self::DateManipulation => "date_manipulation",
            Self::EntitySubstitution => "entity_substitution",
        }
    }
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detector hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TamperingPattern {
    pub kind: PatternKind,
    pub field_path: String,
    pub description: String,
}

/// Line diff statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineDiff {
    pub lines_added: usize,
    pub lines_removed: usize,
    pub lines_unchanged: usize,
    /// Unchanged lines over all lines of the longer side, 0.0 to 1.0.
    pub similarity: f64,
    /// `+ line` / `- line` entries in document order.
    pub changes: Vec<String>,
    pub truncated: bool,
}

/// Everything the FORENSIC level found.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForensicAnalysis {
    pub line_diff: LineDiff,
    pub patterns: Vec<TamperingPattern>,
}

/// Diff the sorted-key pretty renderings of two JSON values.
pub fn line_diff(current: &Value, reference: &Value) -> LineDiff {
    let render = |v: &Value| serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string());
    let cur_text = render(current);
    let ref_text = render(reference);
    let mut cur: Vec<&str> = cur_text.lines().collect();
    let mut reference_lines: Vec<&str> = ref_text.lines().collect();
    let truncated = cur.len() > MAX_DIFF_LINES || reference_lines.len() > MAX_DIFF_LINES;
    cur.truncate(MAX_DIFF_LINES);
    reference_lines.truncate(MAX_DIFF_LINES);

    let (n, m) = (reference_lines.len(), cur.len());
    let prefix = reference_lines
        .iter()
        .zip(&cur)
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = reference_lines[prefix..]
        .iter()
        .rev()
        .zip(cur[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();
    let old = &reference_lines[prefix..n - suffix];
    let new = &cur[prefix..m - suffix];

    let (rows, cols) = (old.len(), new.len());
    // lcs[i * (cols + 1) + j] = LCS length of old[i..] and new[j..].
    let width = cols + 1;
    let mut lcs = vec![0u32; (rows + 1) * width];
    for i in (0..rows).rev() {
        for j in (0..cols).rev() {
            lcs[i * width + j] = if old[i] == new[j] {
                lcs[(i + 1) * width + j + 1] + 1
            } else {
                lcs[(i + 1) * width + j].max(lcs[i * width + j + 1])
            };
        }
    }

    let mut diff = LineDiff {
        truncated,
        lines_unchanged: prefix + suffix,
        ..LineDiff::default()
    };
    let (mut i, mut j) = (0, 0);
    while i < rows && j < cols {
        if old[i] == new[j] {
            diff.lines_unchanged += 1;
            i += 1;
            j += 1;
        } else if lcs[(i + 1) * width + j] >= lcs[i * width + j + 1] {
            diff.lines_removed += 1;
            diff.changes.push(format!("- {}", old[i].trim()));
            i += 1;
        } else {
            diff.lines_added += 1;
            diff.changes.push(format!("+ {}", new[j].trim()));
            j += 1;
        }
    }
    for line in &old[i..] {
        diff.lines_removed += 1;
        diff.changes.push(format!("- {}", line.trim()));
    }
    for line in &new[j..] {
        diff.lines_added += 1;
        diff.changes.push(format!("+ {}", line.trim()));
    }

    let longest = n.max(m);
    diff.similarity = if longest == 0 {
        1.0
    } else {
        diff.lines_unchanged as f64 / longest as f64
    };
    diff
}

/// Monetary fields that grew by more than `threshold` (a ratio, 0.10 = 10%).
pub fn detect_amount_inflation(
    current: &BTreeMap<String, Value>,
    reference: &BTreeMap<String, Value>,
    threshold: f64,
) -> Vec<TamperingPattern> {
    let mut hits = Vec::new();
    for (path, ref_value) in reference {
        let name = leaf_name(path).to_ascii_lowercase();
        if !AMOUNT_MARKERS.iter().any(|m| name.contains(m)) {
            continue;
        }
        let (Some(before), Some(after)) = (
            ref_value.as_f64(),
            current.get(path).and_then(Value::as_f64),
        ) else {
            continue;
        };
        if before > 0.0 && after > before * (1.0 + threshold) {
            let pct = (after - before) / before * 100.0;
            hits.push(TamperingPattern {
                kind: PatternKind::AmountInflation,
                field_path: path.clone(),
                description: format!("{path} inflated by {pct:.1}% ({before} -> {after})"),
            });
        }
    }
    hits
}

/// Date fields whose value moved.
pub fn detect_date_manipulation(
    current: &BTreeMap<String, Value>,
    reference: &BTreeMap<String, Value>,
) -> Vec<TamperingPattern> {
    let mut hits = Vec::new();
    for (path, ref_value) in reference {
        let (Some(before), Some(after)) = (parse_date(ref_value), current.get(path).and_then(parse_date)) else {
            continue;
        };
        if before != after {
            let direction = if after < before { "backdated" } else { "postdated" };
            let days = (after - before).abs() / 86_400;
            hits.push(TamperingPattern {
                kind: PatternKind::DateManipulation,
                field_path: path.clone(),
                description: format!("{path} {direction} by {days} day(s)"),
            });
        }
    }
    hits
}

/// Party identity fields that changed value.
pub fn detect_entity_substitution(
    current: &BTreeMap<String, Value>,
    reference: &BTreeMap<String, Value>,
) -> Vec<TamperingPattern> {
    let mut hits = Vec::new();
    for (path, ref_value) in reference {
        if !is_entity_field(path) {
            continue;
        }
        match current.get(path) {
            Some(cur_value) if cur_value != ref_value => hits.push(TamperingPattern {
                kind: PatternKind::EntitySubstitution,
                field_path: path.clone(),
                description: format!("{path} changed from {ref_value} to {cur_value}"),
            }),
            _ => {}
        }
    }
    hits
}

fn is_entity_field(path: &str) -> bool {
    let mut segments = path.split('.');
    let Some(first) = segments.next() else {
        return false;
    };
    let party = first.split('[').next().unwrap_or(first).to_ascii_lowercase();
    if !ENTITY_PREFIXES.iter().any(|p| party.starts_with(p)) {
        return false;
    }
    // Address sub-fields (supplier.address.city) count as the address.
    segments.any(|seg| ENTITY_FIELDS.contains(&seg.split('[').next().unwrap_or(seg)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::collect_fields;
    use serde_json::json;

    #[test]
    fn identical_documents_have_no_diff() {
        let doc = json!({"a": 1, "b": [1, 2]});
        let diff = line_diff(&doc, &doc);
        assert_eq!(diff.lines_added + diff.lines_removed, 0);
        assert_eq!(diff.similarity, 1.0);
    }

    #[test]
    fn changed_line_is_one_add_one_remove() {
        let diff = line_diff(&json!({"a": 1, "b": 3}), &json!({"a": 1, "b": 2}));
        assert_eq!(diff.lines_added, 1);
        assert_eq!(diff.lines_removed, 1);
        assert_eq!(diff.changes, vec![r#"- "b": 2"#.to_string(), r#"+ "b": 3"#.to_string()]);
        assert!(diff.similarity < 1.0);
    }

    #[test]
    fn added_field_counts_lines() {
        let diff = line_diff(&json!({"a": 1, "b": 2, "c": 3}), &json!({"a": 1, "b": 2}));
        assert!(diff.lines_added >= 1);
        assert!(!diff.truncated);
    }

    fn wide(keys: usize, changed: Option<usize>) -> Value {
        let map: serde_json::Map<String, Value> = (0..keys)
            .map(|i| (format!("k{i:05}"), json!(if Some(i) == changed { 1 } else { 0 })))
            .collect();
        Value::Object(map)
    }

    #[test]
    fn single_change_in_a_long_document() {
        let diff = line_diff(&wide(600, Some(300)), &wide(600, None));
        assert_eq!(diff.lines_added, 1);
        assert_eq!(diff.lines_removed, 1);
        assert_eq!(diff.lines_unchanged, 601);
        assert_eq!(diff.changes, vec![r#"- "k00300": 0,"#.to_string(), r#"+ "k00300": 1,"#.to_string()]);
        assert!(!diff.truncated);
    }

    #[test]
    fn oversized_documents_are_truncated() {
        let diff = line_diff(&wide(MAX_DIFF_LINES + 200, Some(5)), &wide(MAX_DIFF_LINES + 200, None));
        assert!(diff.truncated);
        assert_eq!(diff.lines_added + diff.lines_removed + diff.lines_unchanged, MAX_DIFF_LINES + 1);
    }

    #[test]
    fn inflation_over_threshold() {
        let reference = collect_fields(&json!({"total_amount": 1000, "lines": [{"unit_price": 50}]}));
        let current = collect_fields(&json!({"total_amount": 1101, "lines": [{"unit_price": 54}]}));
        let hits = detect_amount_inflation(&current, &reference, 0.10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].field_path, "total_amount");
        assert_eq!(hits[0].kind, PatternKind::AmountInflation);
    }

    #[test]
    fn deflation_is_not_inflation() {
        let reference = collect_fields(&json!({"total_amount": 1000}));
        let current = collect_fields(&json!({"total_amount": 10}));
        assert!(detect_amount_inflation(&current, &reference, 0.10).is_empty());
    }

    #[test]
    fn backdating_detected() {
        let reference = collect_fields(&json!({"invoice_date": "2026-03-10", "note": "x"}));
        let current = collect_fields(&json!({"invoice_date": "2026-03-01", "note": "x"}));
        let hits = detect_date_manipulation(&current, &reference);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].description.contains("backdated by 9 day(s)"));
    }

    #[test]
    fn entity_substitution_detected() {
        let reference = collect_fields(&json!({
            "supplier": {"tin": "111", "address": {"city": "Lagos"}},
            "customer": {"name": "Acme"},
            "memo": "same"
        }));
        let current = collect_fields(&json!({
            "supplier": {"tin": "999", "address": {"city": "Abuja"}},
            "customer": {"name": "Acme"},
            "memo": "changed"
        }));
        let mut paths: Vec<_> = detect_entity_substitution(&current, &reference)
            .into_iter()
            .map(|p| p.field_path)
            .collect();
        paths.sort();
        assert_eq!(paths, vec!["supplier.address.city", "supplier.tin"]);
    }
}
