//! # Integrity Report Types

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use taxpoynt_seal::ValidationResult;

use crate::fields::DocumentFingerprint;
use crate::forensic::ForensicAnalysis;

/// Depth of an integrity check. Each level runs every check of the levels
/// below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckLevel {
    /// Hash comparison and seal validation.
    Basic,
    /// Field-set diff, critical fields, size.
    Standard,
    /// Every field, sensitive and timestamp fields, nested object hashes.
    Comprehensive,
    /// Line diff and tampering-pattern detectors.
    Forensic,
}

impl CheckLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Standard => "standard",
            Self::Comprehensive => "comprehensive",
            Self::Forensic => "forensic",
        }
    }
}

impl std::fmt::Display for CheckLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CheckLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "standard" => Ok(Self::Standard),
            "comprehensive" => Ok(Self::Comprehensive),
            "forensic" => Ok(Self::Forensic),
            other => Err(format!("unknown check level '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityStatus {
    Intact,
    Modified,
    Corrupted,
    Tampered,
    Unknown,
}

impl IntegrityStatus {
    /// Status for a confidence score. Boundaries are inclusive on the lower
    /// edge: 95 is intact, 80 modified, 60 corrupted.
    pub fn from_confidence(score: f64) -> Self {
        if score >= 95.0 {
            Self::Intact
        } else if score >= 80.0 {
            Self::Modified
        } else if score >= 60.0 {
            Self::Corrupted
        } else {
            Self::Tampered
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intact => "intact",
            Self::Modified => "modified",
            Self::Corrupted => "corrupted",
            Self::Tampered => "tampered",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for IntegrityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationType {
    HashMismatch,
    SealInvalid,
    FieldAdded,
    FieldRemoved,
    ValueChange,
    TypeChange,
    SizeChange,
    TimestampChange,
    StructureChange,
    TamperingPattern,
    CheckpointMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Points subtracted from the confidence score per violation.
    pub fn penalty(&self) -> f64 {
        match self {
            Self::Critical => 25.0,
            Self::High => 15.0,
            Self::Medium => 5.0,
            Self::Low => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityViolationDetail {
    pub violation_type: ViolationType,
    pub field_path: String,
    pub expected_value: Option<Value>,
    pub actual_value: Option<Value>,
    pub severity: Severity,
    pub description: String,
}

/// Result of one integrity check.
///
/// `is_intact` holds exactly when `integrity_status` is `Intact`, which
/// holds exactly when `confidence_score >= 95`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub document_id: String,
    pub check_level: CheckLevel,
    pub integrity_status: IntegrityStatus,
    pub is_intact: bool,
    pub violations: Vec<IntegrityViolationDetail>,
    pub total_checks: u32,
    pub passed_checks: u32,
    pub failed_checks: u32,
    pub confidence_score: f64,
    pub fingerprint: Option<DocumentFingerprint>,
    pub reference_hash: Option<String>,
    pub seal_results: Vec<ValidationResult>,
    pub forensic: Option<ForensicAnalysis>,
    pub verification_time: DateTime<Utc>,
    pub duration_ms: f64,
    pub metadata: BTreeMap<String, Value>,
}

impl IntegrityReport {
    pub fn violations_of(&self, kind: ViolationType) -> impl Iterator<Item = &IntegrityViolationDetail> {
        self.violations.iter().filter(move |v| v.violation_type == kind)
    }
}

/// A recorded fingerprint of a document at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityCheckpoint {
    pub checkpoint_id: String,
    pub document_id: String,
    #[serde(flatten)]
    pub fingerprint: DocumentFingerprint,
    pub created_at: DateTime<Utc>,
}

/// Comparison of a document against its latest checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityAnalysis {
    pub document_id: String,
    pub checkpoint_count: usize,
    pub latest_checkpoint: Option<IntegrityCheckpoint>,
    pub current_hash: Option<String>,
    /// `None` when there is no checkpoint to compare with.
    pub hash_matches: Option<bool>,
    /// 0 on match, 100 on mismatch, 50 when unknown.
    pub risk_score: u8,
    pub analysis_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrityMetrics {
    pub total_reports: u64,
    pub by_status: BTreeMap<String, u64>,
    pub total_violations: u64,
    pub checkpoints_created: u64,
    pub average_confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_boundaries() {
        assert_eq!(IntegrityStatus::from_confidence(100.0), IntegrityStatus::Intact);
        assert_eq!(IntegrityStatus::from_confidence(95.0), IntegrityStatus::Intact);
        assert_eq!(IntegrityStatus::from_confidence(94.99), IntegrityStatus::Modified);
        assert_eq!(IntegrityStatus::from_confidence(80.0), IntegrityStatus::Modified);
        assert_eq!(IntegrityStatus::from_confidence(79.99), IntegrityStatus::Corrupted);
        assert_eq!(IntegrityStatus::from_confidence(60.0), IntegrityStatus::Corrupted);
        assert_eq!(IntegrityStatus::from_confidence(59.99), IntegrityStatus::Tampered);
        assert_eq!(IntegrityStatus::from_confidence(0.0), IntegrityStatus::Tampered);
    }

    #[test]
    fn penalties() {
        assert_eq!(Severity::Critical.penalty(), 25.0);
        assert_eq!(Severity::High.penalty(), 15.0);
        assert_eq!(Severity::Medium.penalty(), 5.0);
        assert_eq!(Severity::Low.penalty(), 1.0);
    }

    #[test]
    fn violation_type_wire_names() {
        assert_eq!(
            serde_json::to_value(ViolationType::ValueChange).unwrap(),
            serde_json::json!("VALUE_CHANGE")
        );
    }

    #[test]
    fn level_ordering_and_parsing() {
        assert!(CheckLevel::Basic < CheckLevel::Standard);
        assert!(CheckLevel::Comprehensive < CheckLevel::Forensic);
        assert_eq!("forensic".parse::<CheckLevel>().unwrap(), CheckLevel::Forensic);
        assert!("deep".parse::<CheckLevel>().is_err());
    }
}
