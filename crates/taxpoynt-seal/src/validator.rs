//! # Stamp Validator
//!
//! Re-derives a seal from the original document and compares. Checks run
//! cheapest first and mirror the generator's construction:
//!
//! 1. Decode the envelope; a shape that does not match the declared type is
//!    `MALFORMED_STRUCTURE`.
//! 2. Recompute `data_hash`. A mismatch ends validation with exactly one
//!    error, `HASH_MISMATCH`.
//! 3. Algorithm consistency (`ALGORITHM_MISMATCH`).
//! 4. Freshness: the payload timestamp must lie within the tolerance window
//!    around now and the seal must not be past `expires_at`
//!    (`EXPIRED_TIMESTAMP`). Freshness is independent of the cryptographic
//!    checks; a perfectly signed stale seal is `EXPIRED`, never `VALID`.
//! 5. The proof: RSA signature (after certificate trust evaluation), HMAC
//!    stamp (constant-time), or digest. Composite seals check their
//!    composite hash first and then every layer.
//!
//! ## Failure reporting
//!
//! Validation never returns `Err` and never panics on input. Internal
//! errors become `MALFORMED_STRUCTURE` with the error text in
//! `metadata["error"]`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use taxpoynt_core::{md5_hex, sha256_hex, CanonicalBytes, DocumentPayload, Timestamp};
use taxpoynt_crypto::{verify_rsa, CertificateInfo, CertificateRejection, KeyMaterial, TrustStore};

use crate::envelope::{composite_hash, SealEnvelope, SealPayload};
use crate::error::SealError;
use crate::seal::{AuthenticationSeal, SealAlgorithm, SealType};

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Overall verdict of one validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Valid,
    Invalid,
    Expired,
    Revoked,
    Malformed,
    Unknown,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Invalid => "invalid",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
            Self::Malformed => "malformed",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Individual validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationError {
    InvalidSignature,
    ExpiredTimestamp,
    MalformedStructure,
    InvalidCertificate,
    HashMismatch,
    AlgorithmMismatch,
    KeyNotFound,
    RevokedCertificate,
    UntrustedIssuer,
}

impl ValidationError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::ExpiredTimestamp => "EXPIRED_TIMESTAMP",
            Self::MalformedStructure => "MALFORMED_STRUCTURE",
            Self::InvalidCertificate => "INVALID_CERTIFICATE",
            Self::HashMismatch => "HASH_MISMATCH",
            Self::AlgorithmMismatch => "ALGORITHM_MISMATCH",
            Self::KeyNotFound => "KEY_NOT_FOUND",
            Self::RevokedCertificate => "REVOKED_CERTIFICATE",
            Self::UntrustedIssuer => "UNTRUSTED_ISSUER",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of validating one seal against one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub seal_id: Option<String>,
    pub seal_type: Option<SealType>,
    pub is_valid: bool,
    pub status: ValidationStatus,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub issuer: Option<String>,
    pub certificate_thumbprint: Option<String>,
    pub algorithm: Option<SealAlgorithm>,
    /// Payload timestamp of the seal, if it carries one.
    pub sealed_at: Option<DateTime<Utc>>,
    pub validation_time: DateTime<Utc>,
    pub validation_duration_ms: f64,
    pub metadata: BTreeMap<String, Value>,
}

impl ValidationResult {
    pub fn has_error(&self, error: ValidationError) -> bool {
        self.errors.contains(&error)
    }
}

/// Status for a set of errors. Priority: malformed, revoked, invalid,
/// expired.
pub fn status_for(errors: &[ValidationError]) -> ValidationStatus {
    if errors.is_empty() {
        ValidationStatus::Valid
    } else if errors.contains(&ValidationError::MalformedStructure) {
        ValidationStatus::Malformed
    } else if errors.contains(&ValidationError::RevokedCertificate) {
        ValidationStatus::Revoked
    } else if errors.iter().any(|e| *e != ValidationError::ExpiredTimestamp) {
        ValidationStatus::Invalid
    } else {
        ValidationStatus::Expired
    }
}

// ---------------------------------------------------------------------------
// Configuration and metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Allowed distance between a seal's timestamp and now, either side.
    pub timestamp_tolerance_secs: i64,
    /// Issuer DNs accepted for embedded certificates. Empty disables the
    /// issuer check.
    pub trusted_issuers: Vec<String>,
    /// Revoked certificate thumbprints or serial numbers (hex).
    pub revoked_certificates: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            timestamp_tolerance_secs: 300,
            trusted_issuers: Vec::new(),
            revoked_certificates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub total_validations: u64,
    pub valid: u64,
    pub invalid: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_error: BTreeMap<String, u64>,
    pub average_validation_ms: f64,
}

// ---------------------------------------------------------------------------
// StampValidator
// ---------------------------------------------------------------------------

/// Accumulates findings while one seal is checked.
#[derive(Default)]
struct Findings {
    errors: Vec<ValidationError>,
    warnings: Vec<String>,
    issuer: Option<String>,
    thumbprint: Option<String>,
    algorithm: Option<SealAlgorithm>,
    expires_at: Option<DateTime<Utc>>,
    sealed_at: Option<DateTime<Utc>>,
    metadata: BTreeMap<String, Value>,
}

impl Findings {
    fn fail(&mut self, error: ValidationError) {
        if !self.errors.contains(&error) {
            self.errors.push(error);
        }
    }

    fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}

/// Validates seals against documents.
pub struct StampValidator {
    config: ValidatorConfig,
    keys: Arc<KeyMaterial>,
    trust: RwLock<TrustStore>,
    metrics: Mutex<ValidationMetrics>,
}

impl StampValidator {
    pub fn new(config: ValidatorConfig, keys: Arc<KeyMaterial>) -> Self {
        let mut trust = TrustStore::with_issuers(config.trusted_issuers.iter().cloned());
        for revoked in &config.revoked_certificates {
            trust.revoke(revoked.clone());
        }
        tracing::info!(
            tolerance_secs = config.timestamp_tolerance_secs,
            trusted_issuers = config.trusted_issuers.len(),
            revoked = config.revoked_certificates.len(),
            "stamp validator initialized"
        );
        Self {
            config,
            keys,
            trust: RwLock::new(trust),
            metrics: Mutex::new(ValidationMetrics::default()),
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate a seal record against the document it claims to cover.
    pub fn validate_stamp(&self, seal: &AuthenticationSeal, document: &DocumentPayload) -> ValidationResult {
        self.validate_stamp_at(seal, document, Utc::now())
    }

    /// [`validate_stamp`](Self::validate_stamp) with an explicit "now".
    pub fn validate_stamp_at(
        &self,
        seal: &AuthenticationSeal,
        document: &DocumentPayload,
        now: DateTime<Utc>,
    ) -> ValidationResult {
        let started = Instant::now();
        let mut findings = Findings::default();
        findings.metadata.insert("document_id".into(), Value::String(seal.document_id.clone()));
        let outcome = self.check(
            &seal.seal_value,
            seal.seal_type,
            Some(seal),
            document,
            &now,
            &mut findings,
        );
        self.finish(Some(seal.seal_id.clone()), Some(seal.seal_type), outcome, findings, now, started)
    }

    /// Validate a bare seal value of a declared type.
    pub fn validate_seal(
        &self,
        seal_value: &str,
        seal_type: SealType,
        document: &DocumentPayload,
    ) -> ValidationResult {
        let started = Instant::now();
        let now = Utc::now();
        let mut findings = Findings::default();
        let outcome = self.check(seal_value, seal_type, None, document, &now, &mut findings);
        self.finish(None, Some(seal_type), outcome, findings, now, started)
    }

    /// Validate several seals in order. One failure never stops the batch.
    pub fn validate_batch(&self, items: &[(AuthenticationSeal, DocumentPayload)]) -> Vec<ValidationResult> {
        items
            .iter()
            .map(|(seal, document)| self.validate_stamp(seal, document))
            .collect()
    }

    /// Evaluate a PEM certificate against the trust store on its own.
    pub fn validate_certificate(&self, pem: &str) -> ValidationResult {
        let started = Instant::now();
        let now = Utc::now();
        let mut findings = Findings::default();
        match CertificateInfo::from_pem(pem) {
            Ok(cert) => {
                findings.issuer = Some(cert.issuer.clone());
                findings.thumbprint = Some(cert.thumbprint.clone());
                findings.expires_at = Some(cert.not_after);
                findings
                    .metadata
                    .insert("subject".into(), Value::String(cert.subject.clone()));
                self.evaluate_certificate(&cert, &now, &mut findings);
            }
            Err(e) => {
                findings.fail(ValidationError::InvalidCertificate);
                findings.metadata.insert("error".into(), Value::String(e.to_string()));
            }
        }
        self.finish(None, None, Ok(()), findings, now, started)
    }

    /// Trust an additional certificate issuer DN.
    pub fn add_trusted_issuer(&self, issuer: impl Into<String>) {
        let issuer = issuer.into();
        tracing::info!(issuer = %issuer, "trusted issuer added");
        self.trust.write().add_trusted_issuer(issuer);
    }

    /// Revoke a certificate by thumbprint or serial number.
    pub fn revoke_certificate(&self, thumbprint_or_serial: impl Into<String>) {
        let id = thumbprint_or_serial.into();
        tracing::info!(certificate = %id, "certificate revoked");
        self.trust.write().revoke(id);
    }

    pub fn get_validation_metrics(&self) -> ValidationMetrics {
        self.metrics.lock().clone()
    }

    // -----------------------------------------------------------------------
    // Checks
    // -----------------------------------------------------------------------

    fn check(
        &self,
        seal_value: &str,
        seal_type: SealType,
        record: Option<&AuthenticationSeal>,
        document: &DocumentPayload,
        now: &DateTime<Utc>,
        findings: &mut Findings,
    ) -> Result<(), SealError> {
        let envelope = SealEnvelope::decode(seal_value, seal_type)?;
        let payload = envelope.payload()?;
        findings.algorithm = Some(payload.algorithm);
        findings.issuer = payload.issuer.clone();

        let canonical = CanonicalBytes::from_payload(document)?;
        let data_hash = sha256_hex(&canonical);
        if payload.data_hash != data_hash {
            findings.errors = vec![ValidationError::HashMismatch];
            findings
                .metadata
                .insert("failed_check".into(), Value::String("data_hash".into()));
            return Ok(());
        }

        if let Some(record) = record {
            if record.algorithm != payload.algorithm {
                findings.fail(ValidationError::AlgorithmMismatch);
            }
            if record.document_id != payload.document_id {
                findings.warn(format!(
                    "seal record document_id '{}' differs from sealed document_id '{}'",
                    record.document_id, payload.document_id
                ));
            }
        }
        if !seal_type.supports(payload.algorithm) {
            findings.fail(ValidationError::AlgorithmMismatch);
        }

        self.check_freshness(&payload, record, now, findings)?;

        if seal_type == SealType::CompositeSeal {
            self.check_composite(&envelope, &payload, &canonical, &data_hash, now, findings)
        } else {
            self.check_proof(&envelope, &payload, &canonical, now, findings)
        }
    }

    fn check_freshness(
        &self,
        payload: &SealPayload,
        record: Option<&AuthenticationSeal>,
        now: &DateTime<Utc>,
        findings: &mut Findings,
    ) -> Result<(), SealError> {
        match &payload.timestamp {
            Some(ts) => {
                let sealed_at = Timestamp::parse_lenient(ts)
                    .map_err(|e| SealError::malformed(format!("payload timestamp: {e}")))?;
                findings.sealed_at = Some(*sealed_at.as_datetime());
                let drift = sealed_at.abs_diff_secs(now);
                if drift > self.config.timestamp_tolerance_secs {
                    findings.fail(ValidationError::ExpiredTimestamp);
                    findings.metadata.insert("timestamp_drift_secs".into(), Value::from(drift));
                }
            }
            None => findings.warn("seal carries no timestamp; freshness not checked"),
        }

        let sealed_expiry = payload
            .expires_at
            .as_deref()
            .map(Timestamp::parse_lenient)
            .transpose()
            .map_err(|e| SealError::malformed(format!("payload expires_at: {e}")))?
            .map(|t| *t.as_datetime());
        findings.expires_at = sealed_expiry.or_else(|| record.and_then(|r| r.expires_at));
        let expired = [sealed_expiry, record.and_then(|r| r.expires_at)]
            .into_iter()
            .flatten()
            .any(|exp| exp < *now);
        if expired {
            findings.fail(ValidationError::ExpiredTimestamp);
        }
        Ok(())
    }

    fn check_composite(
        &self,
        envelope: &SealEnvelope,
        payload: &SealPayload,
        canonical: &CanonicalBytes,
        data_hash: &str,
        now: &DateTime<Utc>,
        findings: &mut Findings,
    ) -> Result<(), SealError> {
        let layers = envelope.layers()?;
        if composite_hash(&layers)? != envelope.string_field("composite_hash")? {
            findings.fail(ValidationError::HashMismatch);
            findings
                .metadata
                .insert("failed_check".into(), Value::String("composite_hash".into()));
            findings.metadata.insert("layers_checked".into(), Value::from(0));
            return Ok(());
        }

        let present: Vec<SealType> = layers.iter().map(SealEnvelope::seal_type).collect();
        if payload.layer_types.as_ref() != Some(&present) {
            findings.fail(ValidationError::MalformedStructure);
            findings.warn("composite layer_types do not match the layers present");
        }

        let mut layer_results = serde_json::Map::new();
        for layer in &layers {
            let before = findings.errors.len();
            let layer_payload = layer.payload()?;
            if layer_payload.data_hash != data_hash {
                findings.fail(ValidationError::HashMismatch);
            } else if !layer.seal_type().supports(layer_payload.algorithm) {
                findings.fail(ValidationError::AlgorithmMismatch);
            } else {
                self.check_proof(layer, &layer_payload, canonical, now, findings)?;
            }
            let ok = findings.errors.len() == before;
            layer_results.insert(layer.seal_type().as_str().to_string(), Value::Bool(ok));
        }
        findings
            .metadata
            .insert("layers_checked".into(), Value::from(layers.len()));
        findings.metadata.insert("layers".into(), Value::Object(layer_results));
        Ok(())
    }

    fn check_proof(
        &self,
        envelope: &SealEnvelope,
        payload: &SealPayload,
        canonical: &CanonicalBytes,
        now: &DateTime<Utc>,
        findings: &mut Findings,
    ) -> Result<(), SealError> {
        match envelope.seal_type() {
            SealType::DocumentHash => {
                let Some(digest) = payload.algorithm.digest() else {
                    findings.fail(ValidationError::AlgorithmMismatch);
                    return Ok(());
                };
                if digest.digest(canonical).hex != envelope.string_field("hash")? {
                    findings.fail(ValidationError::HashMismatch);
                }
            }
            SealType::CryptographicStamp | SealType::TimestampSeal => {
                self.check_hmac(envelope, payload, findings)?;
            }
            SealType::DigitalSignature | SealType::IntegritySeal => {
                if envelope.seal_type() == SealType::IntegritySeal {
                    let (Some(size), Some(md5)) = (payload.document_size, payload.checksum_md5.as_deref()) else {
                        return Err(SealError::malformed("integrity seal lacks document_size or checksum_md5"));
                    };
                    if size != canonical.len() || md5 != md5_hex(canonical) {
                        findings.fail(ValidationError::HashMismatch);
                        return Ok(());
                    }
                }
                self.check_signature(envelope, payload, now, findings)?;
            }
            SealType::CompositeSeal => {
                return Err(SealError::malformed("composite seal nested inside a composite seal"));
            }
        }
        Ok(())
    }

    fn check_hmac(
        &self,
        envelope: &SealEnvelope,
        payload: &SealPayload,
        findings: &mut Findings,
    ) -> Result<(), SealError> {
        let Some(algorithm) = payload.algorithm.hmac() else {
            findings.fail(ValidationError::AlgorithmMismatch);
            return Ok(());
        };
        let field = if envelope.seal_type() == SealType::TimestampSeal {
            let (Some(ts), Some(unix)) = (payload.timestamp.as_deref(), payload.unix_timestamp) else {
                return Err(SealError::malformed("timestamp seal lacks timestamp or unix_timestamp"));
            };
            let parsed = Timestamp::parse_lenient(ts)
                .map_err(|e| SealError::malformed(format!("payload timestamp: {e}")))?;
            if parsed.epoch_secs() != unix {
                findings.fail(ValidationError::MalformedStructure);
                findings.warn("timestamp and unix_timestamp disagree");
            }
            "timestamp_token"
        } else {
            "stamp"
        };

        if let Some(key_id) = payload.key_id.as_deref() {
            if key_id != self.keys.key_id {
                findings.fail(ValidationError::KeyNotFound);
                findings
                    .metadata
                    .insert("key_id".into(), Value::String(key_id.to_string()));
                return Ok(());
            }
        }

        let stamp = envelope.string_field(field)?;
        if !self.keys.hmac_key.verify(algorithm, &envelope.payload_bytes()?, stamp)? {
            findings.fail(ValidationError::InvalidSignature);
        }
        Ok(())
    }

    fn check_signature(
        &self,
        envelope: &SealEnvelope,
        payload: &SealPayload,
        now: &DateTime<Utc>,
        findings: &mut Findings,
    ) -> Result<(), SealError> {
        let Some(scheme) = payload.algorithm.rsa_scheme() else {
            findings.fail(ValidationError::AlgorithmMismatch);
            return Ok(());
        };

        let public_key = match envelope.certificate_pem() {
            Some(pem) => {
                let cert = match CertificateInfo::from_pem(pem) {
                    Ok(cert) => cert,
                    Err(e) => {
                        findings.fail(ValidationError::InvalidCertificate);
                        findings.metadata.insert("certificate_error".into(), Value::String(e.to_string()));
                        return Ok(());
                    }
                };
                findings.thumbprint = Some(cert.thumbprint.clone());
                if findings.issuer.is_none() {
                    findings.issuer = Some(cert.issuer.clone());
                }
                if !self.evaluate_certificate(&cert, now, findings) {
                    return Ok(());
                }
                cert.public_key
            }
            None => {
                let configured = self
                    .keys
                    .certificate
                    .as_ref()
                    .map(|c| c.public_key.clone())
                    .or_else(|| self.keys.signing_key.as_ref().map(|k| k.public_key()));
                match configured {
                    Some(key) => {
                        findings.warn("seal embeds no certificate; verified with the configured key");
                        key
                    }
                    None => {
                        findings.fail(ValidationError::KeyNotFound);
                        return Ok(());
                    }
                }
            }
        };

        let signature = match STANDARD.decode(envelope.string_field("signature")?) {
            Ok(sig) => sig,
            Err(_) => {
                findings.fail(ValidationError::InvalidSignature);
                return Ok(());
            }
        };
        if let Err(e) = verify_rsa(&public_key, scheme, &envelope.payload_bytes()?, &signature) {
            tracing::debug!(error = %e, "RSA signature rejected");
            findings.fail(ValidationError::InvalidSignature);
        }
        Ok(())
    }

    /// Returns `true` when the certificate is acceptable.
    fn evaluate_certificate(&self, cert: &CertificateInfo, now: &DateTime<Utc>, findings: &mut Findings) -> bool {
        let trust = self.trust.read();
        if !trust.issuer_check_enabled() {
            findings.warn("no trusted issuers configured; certificate issuer not checked");
        }
        match trust.evaluate(cert, now) {
            Ok(()) => true,
            Err(rejection) => {
                let error = match rejection {
                    CertificateRejection::Revoked { .. } => ValidationError::RevokedCertificate,
                    CertificateRejection::UntrustedIssuer { .. } => ValidationError::UntrustedIssuer,
                    CertificateRejection::Expired { .. } | CertificateRejection::NotYetValid { .. } => {
                        ValidationError::InvalidCertificate
                    }
                };
                findings.fail(error);
                findings
                    .metadata
                    .insert("certificate_error".into(), Value::String(rejection.to_string()));
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Result assembly
    // -----------------------------------------------------------------------

    fn finish(
        &self,
        seal_id: Option<String>,
        seal_type: Option<SealType>,
        outcome: Result<(), SealError>,
        mut findings: Findings,
        now: DateTime<Utc>,
        started: Instant,
    ) -> ValidationResult {
        if let Err(e) = outcome {
            tracing::debug!(seal_id = ?seal_id, error = %e, "seal could not be validated");
            findings.fail(ValidationError::MalformedStructure);
            findings.metadata.insert("error".into(), Value::String(e.to_string()));
        }
        let status = status_for(&findings.errors);
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        {
            let mut m = self.metrics.lock();
            m.total_validations += 1;
            if status == ValidationStatus::Valid {
                m.valid += 1;
            } else {
                m.invalid += 1;
            }
            *m.by_status.entry(status.as_str().to_string()).or_default() += 1;
            for e in &findings.errors {
                *m.by_error.entry(e.as_str().to_string()).or_default() += 1;
            }
            let n = m.total_validations as f64;
            m.average_validation_ms += (elapsed_ms - m.average_validation_ms) / n;
        }

        tracing::debug!(
            seal_id = ?seal_id,
            seal_type = ?seal_type,
            status = %status,
            errors = ?findings.errors,
            "seal validated"
        );

        ValidationResult {
            seal_id,
            seal_type,
            is_valid: status == ValidationStatus::Valid,
            status,
            errors: findings.errors,
            warnings: findings.warnings,
            expires_at: findings.expires_at,
            issuer: findings.issuer,
            certificate_thumbprint: findings.thumbprint,
            algorithm: findings.algorithm,
            sealed_at: findings.sealed_at,
            validation_time: now,
            validation_duration_ms: elapsed_ms,
            metadata: findings.metadata,
        }
    }
}

impl std::fmt::Debug for StampValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StampValidator")
            .field("config", &self.config)
            .field("key_id", &self.keys.key_id)
            .finish()
    }
}
