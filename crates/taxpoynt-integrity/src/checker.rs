//! # Integrity Checker
//!
//! Compares a document against a reference snapshot (or its latest
//! checkpoint) at one of four [`CheckLevel`]s and scores the result.
//!
//! ## Scoring
//!
//! Every check increments `total_checks`, and `passed_checks` when it
//! passes. The confidence score is
//!
//! ```text
//! passed / total * 100 - sum(severity penalty per violation)
//! ```
//!
//! floored at 0, with penalties critical 25, high 15, medium 5, low 1. The
//! status follows [`IntegrityStatus::from_confidence`]. A report with no
//! checks at all is `UNKNOWN` with confidence 0.
//!
//! ## Checkpoints
//!
//! Checkpoints are append-only per document. Only the latest one is used as
//! a baseline.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use taxpoynt_core::{sha256_hex, CanonicalBytes, DocumentPayload};
use taxpoynt_seal::{AuthenticationSeal, StampValidator, ValidationStatus};

use crate::error::IntegrityError;
use crate::fields::{collect_fields, leaf_name, type_name, DocumentFingerprint};
use crate::forensic::{
    detect_amount_inflation, detect_date_manipulation, detect_entity_substitution, line_diff,
    ForensicAnalysis, PatternKind,
};
use crate::report::{
    CheckLevel, IntegrityAnalysis, IntegrityCheckpoint, IntegrityMetrics, IntegrityReport,
    IntegrityStatus, IntegrityViolationDetail, Severity, ViolationType,
};

/// Path used for whole-document violations.
const DOCUMENT_PATH: &str = "$document";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrityConfig {
    /// Fields that must never differ.
    pub critical_fields: Vec<String>,
    /// Fields whose change is high severity.
    pub sensitive_fields: Vec<String>,
    /// Leaf names treated as timestamps, in addition to `*_at` and `*_date`.
    pub timestamp_fields: Vec<String>,
    /// Growth ratio above which an amount counts as inflated.
    pub amount_inflation_threshold: f64,
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        let owned = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect();
        Self {
            critical_fields: owned(&[
                "document_id",
                "document_type",
                "invoice_number",
                "invoice_date",
                "total_amount",
                "supplier.tin",
                "customer.name",
            ]),
            sensitive_fields: owned(&[
                "subtotal",
                "tax_amount",
                "vat.amount",
                "wht.amount",
                "supplier.name",
                "customer.address",
            ]),
            timestamp_fields: owned(&["timestamp", "issued", "created", "updated"]),
            amount_inflation_threshold: 0.10,
        }
    }
}

/// Running counters for one report.
#[derive(Default)]
struct Tally {
    total: u32,
    passed: u32,
    violations: Vec<IntegrityViolationDetail>,
}

impl Tally {
    fn check(&mut self, passed: bool) -> bool {
        self.total += 1;
        if passed {
            self.passed += 1;
        }
        passed
    }

    fn violate(&mut self, v: IntegrityViolationDetail) {
        let duplicate = self
            .violations
            .iter()
            .any(|e| e.violation_type == v.violation_type && e.field_path == v.field_path);
        if !duplicate {
            self.violations.push(v);
        }
    }

    fn has_violation_at(&self, path: &str) -> bool {
        self.violations.iter().any(|v| v.field_path == path)
    }

    fn has_violation_under(&self, key: &str) -> bool {
        self.violations.iter().any(|v| {
            v.field_path == key
                || v.field_path.starts_with(&format!("{key}."))
                || v.field_path.starts_with(&format!("{key}["))
        })
    }
}

fn violation(
    violation_type: ViolationType,
    field_path: &str,
    expected_value: Option<Value>,
    actual_value: Option<Value>,
    severity: Severity,
    description: String,
) -> IntegrityViolationDetail {
    IntegrityViolationDetail {
        violation_type,
        field_path: field_path.to_string(),
        expected_value,
        actual_value,
        severity,
        description,
    }
}

/// Detects document tampering.
pub struct IntegrityChecker {
    config: IntegrityConfig,
    validator: Option<Arc<StampValidator>>,
    checkpoints: RwLock<HashMap<String, Vec<IntegrityCheckpoint>>>,
    metrics: Mutex<IntegrityMetrics>,
}

impl IntegrityChecker {
    /// Without a validator, seals passed to
    /// [`verify_document_integrity`](Self::verify_document_integrity) are
    /// not checked.
    pub fn new(config: IntegrityConfig, validator: Option<Arc<StampValidator>>) -> Self {
        Self {
            config,
            validator,
            checkpoints: RwLock::new(HashMap::new()),
            metrics: Mutex::new(IntegrityMetrics::default()),
        }
    }

    pub fn config(&self) -> &IntegrityConfig {
        &self.config
    }

    /// Check `current` against `reference` at `level`.
    ///
    /// Without a reference the latest checkpoint is the hash baseline and
    /// the field-level checks are skipped.
    pub fn verify_document_integrity(
        &self,
        document_id: &str,
        current: &DocumentPayload,
        reference: Option<&DocumentPayload>,
        seals: &[AuthenticationSeal],
        level: CheckLevel,
    ) -> IntegrityReport {
        let started = Instant::now();
        let mut report = match self.analyze(document_id, current, reference, seals, level) {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(document_id, error = %e, "integrity check failed");
                let mut report = empty_report(document_id, level);
                report.metadata.insert("error".into(), Value::String(e.to_string()));
                report
            }
        };
        report.duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        {
            let mut m = self.metrics.lock();
            m.total_reports += 1;
            m.total_violations += report.violations.len() as u64;
            *m.by_status
                .entry(report.integrity_status.as_str().to_string())
                .or_default() += 1;
            let n = m.total_reports as f64;
            m.average_confidence += (report.confidence_score - m.average_confidence) / n;
        }
        tracing::debug!(
            document_id,
            level = %level,
            status = %report.integrity_status,
            confidence = report.confidence_score,
            violations = report.violations.len(),
            "integrity check complete"
        );
        report
    }

    fn analyze(
        &self,
        document_id: &str,
        current: &DocumentPayload,
        reference: Option<&DocumentPayload>,
        seals: &[AuthenticationSeal],
        level: CheckLevel,
    ) -> Result<IntegrityReport, IntegrityError> {
        let mut report = empty_report(document_id, level);
        let mut tally = Tally::default();
        let fingerprint = DocumentFingerprint::compute(current)?;

        // BASIC: hash against the reference or the latest checkpoint.
        let reference_fp = reference.map(DocumentFingerprint::compute).transpose()?;
        if let Some(ref_fp) = &reference_fp {
            report.reference_hash = Some(ref_fp.document_hash.clone());
            report.metadata.insert("baseline".into(), Value::from("reference"));
            if !tally.check(ref_fp.document_hash == fingerprint.document_hash) {
                tally.violate(violation(
                    ViolationType::HashMismatch,
                    DOCUMENT_PATH,
                    Some(Value::from(ref_fp.document_hash.clone())),
                    Some(Value::from(fingerprint.document_hash.clone())),
                    Severity::High,
                    "document hash differs from the reference".to_string(),
                ));
            }
        } else if let Some(checkpoint) = self.latest_checkpoint(document_id) {
            report.reference_hash = Some(checkpoint.fingerprint.document_hash.clone());
            report.metadata.insert("baseline".into(), Value::from("checkpoint"));
            if !tally.check(checkpoint.fingerprint.document_hash == fingerprint.document_hash) {
                tally.violate(violation(
                    ViolationType::CheckpointMismatch,
                    DOCUMENT_PATH,
                    Some(Value::from(checkpoint.fingerprint.document_hash.clone())),
                    Some(Value::from(fingerprint.document_hash.clone())),
                    Severity::High,
                    format!("document hash differs from checkpoint {}", checkpoint.checkpoint_id),
                ));
            }
        }

        // BASIC: seals.
        match &self.validator {
            Some(validator) => {
                for seal in seals {
                    let result = validator.validate_stamp(seal, current);
                    if !tally.check(result.is_valid) {
                        let severity = if result.status == ValidationStatus::Expired {
                            Severity::Medium
                        } else {
                            Severity::Critical
                        };
                        let errors: Vec<&str> = result.errors.iter().map(|e| e.as_str()).collect();
                        tally.violate(violation(
                            ViolationType::SealInvalid,
                            &format!("seal:{}", seal.seal_id),
                            None,
                            Some(Value::from(result.status.as_str())),
                            severity,
                            format!("{} seal failed validation: {}", seal.seal_type, errors.join(", ")),
                        ));
                    }
                    report.seal_results.push(result);
                }
            }
            None if !seals.is_empty() => {
                report
                    .metadata
                    .insert("seal_validation".into(), Value::from("skipped: no validator"));
            }
            None => {}
        }

        if level >= CheckLevel::Standard {
            match (reference, &reference_fp) {
                (Some(reference), Some(ref_fp)) => {
                    let cur_value = current.to_value();
                    let ref_value = reference.to_value();
                    let cur_fields = collect_fields(&cur_value);
                    let ref_fields = collect_fields(&ref_value);

                    self.standard_checks(&mut tally, &cur_fields, &ref_fields, &fingerprint, ref_fp);
                    if level >= CheckLevel::Comprehensive {
                        self.comprehensive_checks(&mut tally, &cur_value, &ref_value, &cur_fields, &ref_fields)?;
                    }
                    if level >= CheckLevel::Forensic {
                        report.forensic = Some(self.forensic_checks(
                            &mut tally,
                            &cur_value,
                            &ref_value,
                            &cur_fields,
                            &ref_fields,
                        ));
                    }
                }
                _ => {
                    report
                        .metadata
                        .insert("field_checks".into(), Value::from("skipped: no reference document"));
                }
            }
        }

        report.fingerprint = Some(fingerprint);
        finalize(&mut report, tally);
        Ok(report)
    }

    fn severity_for(&self, path: &str, default: Severity) -> Severity {
        if self.config.critical_fields.iter().any(|f| f == path) {
            Severity::Critical
        } else if self.config.sensitive_fields.iter().any(|f| f == path) {
            Severity::High
        } else {
            default
        }
    }

    fn is_timestamp_field(&self, path: &str) -> bool {
        let name = leaf_name(path);
        name.ends_with("_at")
            || name.ends_with("_date")
            || self.config.timestamp_fields.iter().any(|f| f == name)
    }

    fn change(&self, tally: &mut Tally, path: &str, expected: &Value, actual: &Value, severity: Severity) {
        let (kind, description) = if type_name(expected) != type_name(actual) {
            (
                ViolationType::TypeChange,
                format!("{path} changed type from {} to {}", type_name(expected), type_name(actual)),
            )
        } else {
            (ViolationType::ValueChange, format!("{path} changed from {expected} to {actual}"))
        };
        tally.violate(violation(
            kind,
            path,
            Some(expected.clone()),
            Some(actual.clone()),
            severity,
            description,
        ));
    }

    fn standard_checks(
        &self,
        tally: &mut Tally,
        cur: &BTreeMap<String, Value>,
        reference: &BTreeMap<String, Value>,
        fingerprint: &DocumentFingerprint,
        ref_fp: &DocumentFingerprint,
    ) {
        // Field set.
        let cur_keys: BTreeSet<&String> = cur.keys().collect();
        let ref_keys: BTreeSet<&String> = reference.keys().collect();
        let removed: Vec<&str> = ref_keys.difference(&cur_keys).map(|p| p.as_str()).collect();
        let added: Vec<&str> = cur_keys.difference(&ref_keys).map(|p| p.as_str()).collect();
        tally.check(removed.is_empty() && added.is_empty());
        for path in removed {
            tally.violate(violation(
                ViolationType::FieldRemoved,
                path,
                reference.get(path).cloned(),
                None,
                self.severity_for(path, Severity::Medium),
                format!("{path} was removed"),
            ));
        }
        for path in added {
            tally.violate(violation(
                ViolationType::FieldAdded,
                path,
                None,
                cur.get(path).cloned(),
                self.severity_for(path, Severity::Low),
                format!("{path} was added"),
            ));
        }

        // Critical fields.
        for path in &self.config.critical_fields {
            match (reference.get(path), cur.get(path)) {
                (None, None) => {}
                (Some(expected), Some(actual)) => {
                    if !tally.check(expected == actual) {
                        self.change(tally, path, expected, actual, Severity::Critical);
                    }
                }
                // Presence on one side only; reported by the field-set check.
                _ => {
                    tally.check(false);
                }
            }
        }

        // Size.
        if !tally.check(fingerprint.document_size == ref_fp.document_size) {
            tally.violate(violation(
                ViolationType::SizeChange,
                DOCUMENT_PATH,
                Some(Value::from(ref_fp.document_size)),
                Some(Value::from(fingerprint.document_size)),
                Severity::Low,
                format!(
                    "canonical size changed from {} to {} bytes",
                    ref_fp.document_size, fingerprint.document_size
                ),
            ));
        }
    }

    fn comprehensive_checks(
        &self,
        tally: &mut Tally,
        cur_value: &Value,
        ref_value: &Value,
        cur: &BTreeMap<String, Value>,
        reference: &BTreeMap<String, Value>,
    ) -> Result<(), IntegrityError> {
        let common: Vec<(&String, &Value, &Value)> = reference
            .iter()
            .filter_map(|(path, expected)| cur.get(path).map(|actual| (path, expected, actual)))
            .collect();

        for path in &self.config.sensitive_fields {
            if let (Some(expected), Some(actual)) = (reference.get(path), cur.get(path)) {
                if !tally.check(expected == actual) {
                    self.change(tally, path, expected, actual, Severity::High);
                }
            }
        }

        for (path, expected, actual) in common.iter().filter(|(p, _, _)| self.is_timestamp_field(p)) {
            if !tally.check(expected == actual) && !tally.has_violation_at(path) {
                tally.violate(violation(
                    ViolationType::TimestampChange,
                    path,
                    Some((*expected).clone()),
                    Some((*actual).clone()),
                    self.severity_for(path, Severity::Medium),
                    format!("{path} changed from {expected} to {actual}"),
                ));
            }
        }

        for (path, expected, actual) in &common {
            if !tally.check(expected == actual) && !tally.has_violation_at(path) {
                self.change(tally, path, expected, actual, self.severity_for(path, Severity::Medium));
            }
        }

        // Nested objects by hash.
        if let (Value::Object(cur_map), Value::Object(ref_map)) = (cur_value, ref_value) {
            for (key, ref_child) in ref_map {
                let Some(cur_child) = cur_map.get(key) else { continue };
                let nested = |v: &Value| matches!(v, Value::Object(_) | Value::Array(_));
                if !(nested(ref_child) && nested(cur_child)) {
                    continue;
                }
                let same = sha256_hex(&CanonicalBytes::new(ref_child)?) == sha256_hex(&CanonicalBytes::new(cur_child)?);
                if !tally.check(same) && !tally.has_violation_under(key) {
                    tally.violate(violation(
                        ViolationType::StructureChange,
                        key,
                        None,
                        None,
                        Severity::Low,
                        format!("nested object {key} changed"),
                    ));
                }
            }
        }
        Ok(())
    }

    fn forensic_checks(
        &self,
        tally: &mut Tally,
        cur_value: &Value,
        ref_value: &Value,
        cur: &BTreeMap<String, Value>,
        reference: &BTreeMap<String, Value>,
    ) -> ForensicAnalysis {
        let diff = line_diff(cur_value, ref_value);
        tally.check(diff.lines_added == 0 && diff.lines_removed == 0);

        let detectors = [
            detect_amount_inflation(cur, reference, self.config.amount_inflation_threshold),
            detect_date_manipulation(cur, reference),
            detect_entity_substitution(cur, reference),
        ];
        let mut patterns = Vec::new();
        for hits in detectors {
            tally.check(hits.is_empty());
            for hit in hits {
                let severity = match hit.kind {
                    PatternKind::AmountInflation | PatternKind::EntitySubstitution => Severity::High,
                    PatternKind::DateManipulation => Severity::Medium,
                };
                tally.violate(violation(
                    ViolationType::TamperingPattern,
                    &hit.field_path,
                    reference.get(&hit.field_path).cloned(),
                    cur.get(&hit.field_path).cloned(),
                    severity,
                    format!("{}: {}", hit.kind, hit.description),
                ));
                patterns.push(hit);
            }
        }
        ForensicAnalysis {
            line_diff: diff,
            patterns,
        }
    }

    // -----------------------------------------------------------------------
    // Checkpoints
    // -----------------------------------------------------------------------

    /// Append a checkpoint for `document_id`. Earlier checkpoints are kept.
    pub fn create_integrity_checkpoint(
        &self,
        document_id: &str,
        document: &DocumentPayload,
    ) -> Result<IntegrityCheckpoint, IntegrityError> {
        if document_id.is_empty() {
            return Err(IntegrityError::EmptyDocumentId);
        }
        let checkpoint = IntegrityCheckpoint {
            checkpoint_id: uuid::Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            fingerprint: DocumentFingerprint::compute(document)?,
            created_at: Utc::now(),
        };
        let count = {
            let mut store = self.checkpoints.write();
            let history = store.entry(document_id.to_string()).or_default();
            history.push(checkpoint.clone());
            history.len()
        };
        self.metrics.lock().checkpoints_created += 1;
        tracing::info!(
            document_id,
            checkpoint_id = %checkpoint.checkpoint_id,
            history = count,
            "integrity checkpoint created"
        );
        Ok(checkpoint)
    }

    /// Compare `current` with the latest checkpoint only.
    pub fn get_integrity_analysis(&self, document_id: &str, current: &DocumentPayload) -> IntegrityAnalysis {
        let history_len = self.checkpoints.read().get(document_id).map_or(0, Vec::len);
        let latest = self.latest_checkpoint(document_id);
        let current_hash = match CanonicalBytes::from_payload(current) {
            Ok(canonical) => Some(sha256_hex(&canonical)),
            Err(e) => {
                tracing::warn!(document_id, error = %e, "could not hash document for analysis");
                None
            }
        };
        let hash_matches = match (&latest, &current_hash) {
            (Some(cp), Some(hash)) => Some(cp.fingerprint.document_hash == *hash),
            _ => None,
        };
        let risk_score = match hash_matches {
            Some(true) => 0,
            Some(false) => 100,
            None => 50,
        };
        IntegrityAnalysis {
            document_id: document_id.to_string(),
            checkpoint_count: history_len,
            latest_checkpoint: latest,
            current_hash,
            hash_matches,
            risk_score,
            analysis_time: Utc::now(),
        }
    }

    /// Full checkpoint history, oldest first.
    pub fn get_checkpoints(&self, document_id: &str) -> Vec<IntegrityCheckpoint> {
        self.checkpoints.read().get(document_id).cloned().unwrap_or_default()
    }

    pub fn compute_fingerprint(&self, document: &DocumentPayload) -> Result<DocumentFingerprint, IntegrityError> {
        DocumentFingerprint::compute(document)
    }

    pub fn get_integrity_metrics(&self) -> IntegrityMetrics {
        self.metrics.lock().clone()
    }

    fn latest_checkpoint(&self, document_id: &str) -> Option<IntegrityCheckpoint> {
        self.checkpoints.read().get(document_id).and_then(|h| h.last().cloned())
    }
}

impl std::fmt::Debug for IntegrityChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrityChecker")
            .field("config", &self.config)
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}

fn empty_report(document_id: &str, level: CheckLevel) -> IntegrityReport {
    IntegrityReport {
        document_id: document_id.to_string(),
        check_level: level,
        integrity_status: IntegrityStatus::Unknown,
        is_intact: false,
        violations: Vec::new(),
        total_checks: 0,
        passed_checks: 0,
        failed_checks: 0,
        confidence_score: 0.0,
        fingerprint: None,
        reference_hash: None,
        seal_results: Vec::new(),
        forensic: None,
        verification_time: Utc::now(),
        duration_ms: 0.0,
        metadata: BTreeMap::new(),
    }
}

/// Compute the score and status from the tally.
fn finalize(report: &mut IntegrityReport, tally: Tally) {
    report.total_checks = tally.total;
    report.passed_checks = tally.passed;
    report.failed_checks = tally.total - tally.passed;
    if tally.total == 0 {
        report.integrity_status = IntegrityStatus::Unknown;
        report.confidence_score = 0.0;
    } else {
        let base = f64::from(tally.passed) / f64::from(tally.total) * 100.0;
        let penalty: f64 = tally.violations.iter().map(|v| v.severity.penalty()).sum();
        report.confidence_score = (base - penalty).clamp(0.0, 100.0);
        report.integrity_status = IntegrityStatus::from_confidence(report.confidence_score);
    }
    report.is_intact = report.integrity_status == IntegrityStatus::Intact;
    report.violations = tally.violations;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use taxpoynt_crypto::{fixtures, HmacKey, KeyMaterial};
    use taxpoynt_seal::{GeneratorConfig, SealGenerator, SealType, ValidatorConfig};

    fn checker() -> IntegrityChecker {
        IntegrityChecker::new(IntegrityConfig::default(), None)
    }

    fn doc(v: Value) -> DocumentPayload {
        DocumentPayload::structured(v)
    }

    fn invoice() -> Value {
        json!({
            "invoice_number": "INV-001",
            "invoice_date": "2026-03-10",
            "total_amount": 1000,
            "subtotal": 930,
            "tax_amount": 70,
            "supplier": {"name": "Dangote Ltd", "tin": "12345678-0001"},
            "customer": {"name": "Acme Nigeria", "address": "1 Marina, Lagos"},
            "lines": [{"description": "Cement", "amount": 930}],
            "updated_at": "2026-03-10T09:00:00Z"
        })
    }

    #[test]
    fn identical_document_is_intact_at_every_level() {
        let checker = checker();
        for level in [CheckLevel::Basic, CheckLevel::Standard, CheckLevel::Comprehensive, CheckLevel::Forensic] {
            let report = checker.verify_document_integrity("INV-001", &doc(invoice()), Some(&doc(invoice())), &[], level);
            assert_eq!(report.confidence_score, 100.0, "{level}");
            assert_eq!(report.integrity_status, IntegrityStatus::Intact);
            assert!(report.is_intact);
            assert!(report.total_checks > 0);
            assert!(report.violations.is_empty());
        }
    }

    #[test]
    fn levels_are_supersets() {
        let checker = checker();
        let counts: Vec<u32> = [CheckLevel::Basic, CheckLevel::Standard, CheckLevel::Comprehensive, CheckLevel::Forensic]
            .into_iter()
            .map(|level| {
                checker
                    .verify_document_integrity("INV-001", &doc(invoice()), Some(&doc(invoice())), &[], level)
                    .total_checks
            })
            .collect();
        assert!(counts.windows(2).all(|w| w[0] < w[1]), "{counts:?}");
    }

    #[test]
    fn critical_value_change_at_standard() {
        let report = checker().verify_document_integrity(
            "A",
            &doc(json!({"invoice_number": "A", "total_amount": 200})),
            Some(&doc(json!({"invoice_number": "A", "total_amount": 100}))),
            &[],
            CheckLevel::Standard,
        );
        let changes: Vec<_> = report.violations_of(ViolationType::ValueChange).collect();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field_path, "total_amount");
        assert_eq!(changes[0].severity, Severity::Critical);
        assert_eq!(changes[0].expected_value, Some(json!(100)));
        assert_ne!(report.integrity_status, IntegrityStatus::Intact);
        assert!(!report.is_intact);
    }

    #[test]
    fn no_checks_is_unknown() {
        let report = checker().verify_document_integrity("X", &doc(invoice()), None, &[], CheckLevel::Forensic);
        assert_eq!(report.integrity_status, IntegrityStatus::Unknown);
        assert_eq!(report.confidence_score, 0.0);
        assert_eq!(report.total_checks, 0);
        assert!(report.metadata.contains_key("field_checks"));
    }

    #[test]
    fn added_and_removed_fields() {
        let mut current = invoice();
        current["discount"] = json!(50);
        current["customer"].as_object_mut().unwrap().remove("name");
        let report = checker().verify_document_integrity(
            "INV-001",
            &doc(current),
            Some(&doc(invoice())),
            &[],
            CheckLevel::Standard,
        );
        let added: Vec<_> = report.violations_of(ViolationType::FieldAdded).collect();
        let removed: Vec<_> = report.violations_of(ViolationType::FieldRemoved).collect();
        assert_eq!(added[0].field_path, "discount");
        assert_eq!(added[0].severity, Severity::Low);
        assert_eq!(removed[0].field_path, "customer.name");
        assert_eq!(removed[0].severity, Severity::Critical);
    }

    #[test]
    fn type_change_detected() {
        let mut current = invoice();
        current["total_amount"] = json!("1000");
        let report = checker().verify_document_integrity(
            "INV-001",
            &doc(current),
            Some(&doc(invoice())),
            &[],
            CheckLevel::Standard,
        );
        assert_eq!(report.violations_of(ViolationType::TypeChange).count(), 1);
    }

    #[test]
    fn sensitive_and_timestamp_fields_at_comprehensive() {
        let mut current = invoice();
        current["tax_amount"] = json!(0);
        current["updated_at"] = json!("2026-03-11T09:00:00Z");
        current["lines"][0]["description"] = json!("Sand");
        let report = checker().verify_document_integrity(
            "INV-001",
            &doc(current),
            Some(&doc(invoice())),
            &[],
            CheckLevel::Comprehensive,
        );
        let by_path = |p: &str| report.violations.iter().find(|v| v.field_path == p).cloned().unwrap();
        assert_eq!(by_path("tax_amount").severity, Severity::High);
        assert_eq!(by_path("updated_at").violation_type, ViolationType::TimestampChange);
        assert_eq!(by_path("lines[0].description").severity, Severity::Medium);
        assert!(report.violations_of(ViolationType::StructureChange).next().is_none());
    }

    #[test]
    fn forensic_patterns_reported() {
        let mut current = invoice();
        current["total_amount"] = json!(5000);
        current["invoice_date"] = json!("2026-01-10");
        current["supplier"]["tin"] = json!("99999999-0001");
        let report = checker().verify_document_integrity(
            "INV-001",
            &doc(current),
            Some(&doc(invoice())),
            &[],
            CheckLevel::Forensic,
        );
        let forensic = report.forensic.clone().unwrap();
        let kinds: BTreeSet<_> = forensic.patterns.iter().map(|p| p.kind.as_str()).collect();
        assert_eq!(
            kinds,
            ["amount_inflation", "date_manipulation", "entity_substitution"].into_iter().collect()
        );
        assert!(forensic.line_diff.lines_added >= 3);
        assert_eq!(report.violations_of(ViolationType::TamperingPattern).count(), 3);
        assert_eq!(report.integrity_status, IntegrityStatus::Tampered);
        assert_eq!(report.confidence_score, 0.0);
    }

    #[test]
    fn non_structured_documents_compare_by_root() {
        let report = checker().verify_document_integrity(
            "TXT",
            &DocumentPayload::text("hello"),
            Some(&DocumentPayload::text("hellp")),
            &[],
            CheckLevel::Comprehensive,
        );
        assert!(report.violations.iter().any(|v| v.field_path == "$"));
        assert!(!report.is_intact);
    }

    #[test]
    fn checkpoint_is_baseline_without_reference() {
        let checker = checker();
        checker.create_integrity_checkpoint("INV-001", &doc(invoice())).unwrap();
        let intact = checker.verify_document_integrity("INV-001", &doc(invoice()), None, &[], CheckLevel::Basic);
        assert!(intact.is_intact);
        assert_eq!(intact.metadata.get("baseline"), Some(&json!("checkpoint")));

        let mut changed = invoice();
        changed["total_amount"] = json!(1);
        let report = checker.verify_document_integrity("INV-001", &doc(changed), None, &[], CheckLevel::Basic);
        assert_eq!(report.violations_of(ViolationType::CheckpointMismatch).count(), 1);
        assert_eq!(report.integrity_status, IntegrityStatus::Tampered);
    }

    #[test]
    fn checkpoint_history_and_risk() {
        let checker = checker();
        let v1 = doc(invoice());
        let mut changed = invoice();
        changed["total_amount"] = json!(2000);
        let v2 = doc(changed);

        assert_eq!(checker.get_integrity_analysis("INV-001", &v1).risk_score, 50);

        let first = checker.create_integrity_checkpoint("INV-001", &v1).unwrap();
        assert_eq!(checker.get_integrity_analysis("INV-001", &v1).risk_score, 0);
        assert_eq!(checker.get_integrity_analysis("INV-001", &v2).risk_score, 100);

        checker.create_integrity_checkpoint("INV-001", &v2).unwrap();
        let history = checker.get_checkpoints("INV-001");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], first);

        let analysis = checker.get_integrity_analysis("INV-001", &v2);
        assert_eq!(analysis.risk_score, 0);
        assert_eq!(analysis.checkpoint_count, 2);
        assert_eq!(checker.get_integrity_analysis("INV-001", &v1).risk_score, 100);
    }

    #[test]
    fn empty_document_id_rejected() {
        assert!(checker().create_integrity_checkpoint("", &doc(invoice())).is_err());
    }

    #[test]
    fn seals_are_validated_when_validator_present() {
        let keys = Arc::new(KeyMaterial::hmac_only(HmacKey::from_secret(fixtures::HMAC_SECRET).unwrap()));
        let generator = SealGenerator::new(GeneratorConfig::default(), keys.clone());
        let validator = Arc::new(StampValidator::new(ValidatorConfig::default(), keys));
        let checker = IntegrityChecker::new(IntegrityConfig::default(), Some(validator));

        let seal = generator
            .generate_seal("INV-001", &doc(invoice()), SealType::CryptographicStamp, None)
            .unwrap()
            .seal
            .unwrap();

        let ok = checker.verify_document_integrity("INV-001", &doc(invoice()), None, &[seal.clone()], CheckLevel::Basic);
        assert!(ok.is_intact);
        assert_eq!(ok.seal_results.len(), 1);

        let mut tampered = invoice();
        tampered["total_amount"] = json!(1);
        let bad = checker.verify_document_integrity("INV-001", &doc(tampered), None, &[seal], CheckLevel::Basic);
        let v = bad.violations_of(ViolationType::SealInvalid).next().unwrap();
        assert_eq!(v.severity, Severity::Critical);
        assert!(v.description.contains("HASH_MISMATCH"));
        assert_eq!(bad.integrity_status, IntegrityStatus::Tampered);
    }

    #[test]
    fn seals_skipped_without_validator() {
        let keys = Arc::new(KeyMaterial::hmac_only(HmacKey::generate()));
        let generator = SealGenerator::new(GeneratorConfig::default(), keys);
        let seal = generator
            .generate_seal("INV-001", &doc(invoice()), SealType::DocumentHash, None)
            .unwrap()
            .seal
            .unwrap();
        let report = checker().verify_document_integrity("INV-001", &doc(invoice()), None, &[seal], CheckLevel::Basic);
        assert!(report.metadata.contains_key("seal_validation"));
        assert_eq!(report.integrity_status, IntegrityStatus::Unknown);
    }

    #[test]
    fn metrics_accumulate() {
        let checker = checker();
        checker.verify_document_integrity("A", &doc(invoice()), Some(&doc(invoice())), &[], CheckLevel::Basic);
        checker.create_integrity_checkpoint("A", &doc(invoice())).unwrap();
        let m = checker.get_integrity_metrics();
        assert_eq!(m.total_reports, 1);
        assert_eq!(m.checkpoints_created, 1);
        assert_eq!(m.by_status.get("intact"), Some(&1));
        assert_eq!(m.average_confidence, 100.0);
    }
}
