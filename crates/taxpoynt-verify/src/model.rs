//! # Verification Data Model

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use taxpoynt_core::DocumentPayload;
use taxpoynt_integrity::{CheckLevel, IntegrityReport};
use taxpoynt_seal::{AuthenticationSeal, SealAlgorithm, SealType, ValidationResult};

// ---------------------------------------------------------------------------
// Levels and verdicts
// ---------------------------------------------------------------------------

/// Thoroughness of a verification run. Each level runs every step of the
/// levels below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationLevel {
    Basic,
    Standard,
    Comprehensive,
    Forensic,
    Blockchain,
}

impl VerificationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Standard => "standard",
            Self::Comprehensive => "comprehensive",
            Self::Forensic => "forensic",
            Self::Blockchain => "blockchain",
        }
    }

    /// Integrity check depth used at this level.
    pub fn integrity_level(&self) -> CheckLevel {
        match self {
            Self::Basic => CheckLevel::Basic,
            Self::Standard => CheckLevel::Standard,
            Self::Comprehensive => CheckLevel::Comprehensive,
            Self::Forensic | Self::Blockchain => CheckLevel::Forensic,
        }
    }
}

impl std::fmt::Display for VerificationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VerificationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "standard" => Ok(Self::Standard),
            "comprehensive" => Ok(Self::Comprehensive),
            "forensic" => Ok(Self::Forensic),
            "blockchain" => Ok(Self::Blockchain),
            other => Err(format!("unknown verification level '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticityStatus {
    Authentic,
    Questionable,
    Compromised,
    Counterfeit,
    Unknown,
}

impl AuthenticityStatus {
    /// Verdict for a weighted confidence score.
    ///
    /// `>= minimum` authentic, `>= 60` questionable, `>= 20` compromised,
    /// `> 0` counterfeit, otherwise unknown. A minimum below 60 makes the
    /// questionable band unreachable.
    pub fn from_confidence(score: f64, minimum: f64) -> Self {
        if score >= minimum {
            Self::Authentic
        } else if score >= 60.0 {
            Self::Questionable
        } else if score >= 20.0 {
            Self::Compromised
        } else if score > 0.0 {
            Self::Counterfeit
        } else {
            Self::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authentic => "authentic",
            Self::Questionable => "questionable",
            Self::Compromised => "compromised",
            Self::Counterfeit => "counterfeit",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for AuthenticityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Evidence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    DigitalSignature,
    CryptographicStamp,
    HashVerification,
    Timestamp,
    IntegrityCheck,
    CrossReference,
    Forensic,
    Blockchain,
}

impl VerificationMethod {
    /// Weight of this method's evidence in the overall confidence.
    pub fn weight(&self) -> f64 {
        match self {
            Self::Blockchain => 0.30,
            Self::DigitalSignature => 0.25,
            Self::IntegrityCheck => 0.20,
            Self::CryptographicStamp => 0.15,
            Self::Timestamp => 0.05,
            Self::CrossReference => 0.05,
            Self::HashVerification | Self::Forensic => 0.10,
        }
    }

    /// The method a seal's validation counts as.
    pub fn for_seal(seal_type: SealType, algorithm: SealAlgorithm) -> Self {
        match seal_type {
            SealType::DigitalSignature | SealType::IntegritySeal => Self::DigitalSignature,
            SealType::CryptographicStamp => Self::CryptographicStamp,
            SealType::TimestampSeal => Self::Timestamp,
            SealType::DocumentHash => Self::HashVerification,
            SealType::CompositeSeal => {
                if algorithm.rsa_scheme().is_some() {
                    Self::DigitalSignature
                } else if algorithm.hmac().is_some() {
                    Self::CryptographicStamp
                } else {
                    Self::HashVerification
                }
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DigitalSignature => "digital_signature",
            Self::CryptographicStamp => "cryptographic_stamp",
            Self::HashVerification => "hash_verification",
            Self::Timestamp => "timestamp",
            Self::IntegrityCheck => "integrity_check",
            Self::CrossReference => "cross_reference",
            Self::Forensic => "forensic",
            Self::Blockchain => "blockchain",
        }
    }
}

impl std::fmt::Display for VerificationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of proof toward the verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationEvidence {
    pub method: VerificationMethod,
    /// Short outcome label (`valid`, `mismatch`, `expired`, ...).
    pub result: String,
    /// 0 to 100.
    pub confidence: f64,
    pub details: BTreeMap<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl VerificationEvidence {
    pub fn new(method: VerificationMethod, result: impl Into<String>, confidence: f64) -> Self {
        Self {
            method,
            result: result.into(),
            confidence: confidence.clamp(0.0, 100.0),
            details: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// Weighted mean of evidence confidences. Methods without evidence add
/// nothing to either side. `None` when there is no evidence.
pub fn weighted_confidence(evidence: &[VerificationEvidence]) -> Option<f64> {
    let (sum, weight) = evidence.iter().fold((0.0, 0.0), |(sum, weight), e| {
        let w = e.method.weight();
        (sum + e.confidence * w, weight + w)
    });
    (weight > 0.0).then(|| sum / weight)
}

// ---------------------------------------------------------------------------
// Context and policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationPolicy {
    /// Confidence at or above which a document is authentic.
    pub minimum_confidence: f64,
    /// Methods that must contribute evidence. Missing ones are warned about.
    pub required_methods: Vec<VerificationMethod>,
    /// Seal types the document must carry. Missing ones are warned about.
    pub required_seal_types: Vec<SealType>,
    /// Seals older than this are reported stale by the freshness check.
    pub max_seal_age_hours: Option<i64>,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            minimum_confidence: 85.0,
            required_methods: Vec::new(),
            required_seal_types: Vec::new(),
            max_seal_age_hours: None,
        }
    }
}

/// Caller input for one verification.
#[derive(Debug, Clone)]
pub struct VerificationContext {
    pub document_id: String,
    pub document_data: DocumentPayload,
    pub verification_level: VerificationLevel,
    pub reference_data: Option<DocumentPayload>,
    /// Ledger record to compare with at the BLOCKCHAIN level.
    pub blockchain_reference: Option<String>,
    /// Seals to verify. When empty, the document's seals are loaded from
    /// the repository.
    pub seals: Vec<AuthenticationSeal>,
    /// Advisory bound on network lookups. Falls back to the service default.
    pub verification_timeout: Option<Duration>,
    pub requester_id: Option<String>,
    /// Overrides the service policy for this call.
    pub policy: Option<VerificationPolicy>,
}

impl VerificationContext {
    pub fn new(document_id: impl Into<String>, document_data: DocumentPayload, level: VerificationLevel) -> Self {
        Self {
            document_id: document_id.into(),
            document_data,
            verification_level: level,
            reference_data: None,
            blockchain_reference: None,
            seals: Vec::new(),
            verification_timeout: None,
            requester_id: None,
            policy: None,
        }
    }

    pub fn with_reference(mut self, reference: DocumentPayload) -> Self {
        self.reference_data = Some(reference);
        self
    }

    pub fn with_seals(mut self, seals: Vec<AuthenticationSeal>) -> Self {
        self.seals = seals;
        self
    }

    pub fn with_blockchain_reference(mut self, reference: impl Into<String>) -> Self {
        self.blockchain_reference = Some(reference.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.verification_timeout = Some(timeout);
        self
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub verification_id: String,
    pub document_id: String,
    pub verification_level: VerificationLevel,
    pub authenticity_status: AuthenticityStatus,
    pub confidence_score: f64,
    /// Lower-level evidence always precedes higher-level evidence.
    pub evidence: Vec<VerificationEvidence>,
    pub seal_results: Vec<ValidationResult>,
    pub integrity_report: Option<IntegrityReport>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub verification_time: DateTime<Utc>,
    pub duration_ms: f64,
    pub from_cache: bool,
    pub metadata: BTreeMap<String, Value>,
}

impl VerificationResult {
    pub(crate) fn new(context: &VerificationContext) -> Self {
        Self {
            verification_id: uuid::Uuid::new_v4().to_string(),
            document_id: context.document_id.clone(),
            verification_level: context.verification_level,
            authenticity_status: AuthenticityStatus::Unknown,
            confidence_score: 0.0,
            evidence: Vec::new(),
            seal_results: Vec::new(),
            integrity_report: None,
            warnings: Vec::new(),
            errors: Vec::new(),
            verification_time: Utc::now(),
            duration_ms: 0.0,
            from_cache: false,
            metadata: BTreeMap::new(),
        }
    }

    pub fn is_authentic(&self) -> bool {
        self.authenticity_status == AuthenticityStatus::Authentic
    }

    /// Distinct methods that contributed evidence, in first-seen order.
    pub fn methods(&self) -> Vec<VerificationMethod> {
        let mut methods = Vec::new();
        for e in &self.evidence {
            if !methods.contains(&e.method) {
                methods.push(e.method);
            }
        }
        methods
    }
}

/// Flattened view of a [`VerificationResult`] for API responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub verification_id: String,
    pub document_id: String,
    pub verification_level: VerificationLevel,
    pub authenticity_status: AuthenticityStatus,
    pub confidence_score: f64,
    pub is_authentic: bool,
    pub seals_verified: usize,
    pub seals_valid: usize,
    pub integrity_status: Option<String>,
    pub methods: Vec<VerificationMethod>,
    pub evidence_count: usize,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub verification_time: DateTime<Utc>,
    pub from_cache: bool,
}

/// Immutable record of one `verify_document` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationAudit {
    pub audit_id: String,
    pub verification_id: String,
    pub document_id: String,
    pub verification_level: VerificationLevel,
    pub authenticity_status: AuthenticityStatus,
    pub confidence_score: f64,
    pub methods: Vec<VerificationMethod>,
    pub evidence_count: usize,
    pub warning_count: usize,
    pub error_count: usize,
    pub from_cache: bool,
    pub requester_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceStats {
    pub total_verifications: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_size: usize,
    pub audit_records: usize,
    pub by_status: BTreeMap<String, u64>,
    pub by_level: BTreeMap<String, u64>,
    pub seals_created: u64,
    pub average_confidence: f64,
    pub average_duration_ms: f64,
}
