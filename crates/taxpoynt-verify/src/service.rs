//! # Verification Service
//!
//! Orchestrates the seal validator, the integrity checker, the repository
//! and an optional ledger into one authenticity verdict.
//!
//! ## Levels
//!
//! | Level | Adds |
//! |---|---|
//! | `basic` | reference hash match, first seal validated |
//! | `standard` | integrity check against the reference, every seal validated |
//! | `comprehensive` | per-seal freshness, cross-reference, policy warnings |
//! | `forensic` | metadata anomalies, tampering patterns, structural complexity |
//! | `blockchain` | ledger hash comparison |
//!
//! Evidence is appended in level order, so basic evidence always precedes
//! higher-level evidence.
//!
//! ## Verdict
//!
//! `confidence_score` is the weighted mean of evidence confidences (see
//! [`VerificationMethod::weight`]); the status follows
//! [`AuthenticityStatus::from_confidence`] against the policy minimum. No
//! evidence means `unknown`. Any internal error forces `unknown` while the
//! partial result is still returned and audited.
//!
//! ## Cache and Audit
//!
//! Results are cached for one hour under (document id, level, first 16 hex
//! characters of the document hash). Past 1000 entries the 100 oldest are
//! dropped. Every call, cached or not, appends one [`VerificationAudit`];
//! past 10000 records the log is cut to the newest 5000.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use taxpoynt_core::{sha256_hex, CanonicalBytes, DocumentPayload};
use taxpoynt_integrity::IntegrityChecker;
use taxpoynt_repository::SealRepository;
use taxpoynt_seal::{
    AuthenticationSeal, SealEnvelope, SealGenerator, SealType, StampValidator, ValidationStatus,
};

use crate::error::VerificationError;
use crate::ledger::BlockchainLedger;
use crate::model::{
    weighted_confidence, AuthenticityStatus, ServiceStats, VerificationAudit, VerificationContext,
    VerificationEvidence, VerificationLevel, VerificationMethod, VerificationPolicy,
    VerificationResult, VerificationSummary,
};

pub const CACHE_TTL: Duration = Duration::from_secs(3600);
pub const CACHE_MAX_ENTRIES: usize = 1000;
pub const CACHE_EVICT_BATCH: usize = 100;
pub const AUDIT_MAX_RECORDS: usize = 10_000;
pub const AUDIT_RETAIN_RECORDS: usize = 5_000;

/// Hex characters of the document hash used in cache keys.
const CACHE_HASH_PREFIX: usize = 16;

/// Clock skew tolerated before a seal counts as future-dated.
const FUTURE_SKEW_SECS: i64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub policy: VerificationPolicy,
    /// Default bound on ledger lookups.
    pub verification_timeout_secs: u64,
    pub enable_cache: bool,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            policy: VerificationPolicy::default(),
            verification_timeout_secs: 30,
            enable_cache: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    document_id: String,
    level: VerificationLevel,
    hash_prefix: String,
}

impl CacheKey {
    fn new(context: &VerificationContext, document_hash: &str) -> Self {
        Self {
            document_id: context.document_id.clone(),
            level: context.verification_level,
            hash_prefix: document_hash.chars().take(CACHE_HASH_PREFIX).collect(),
        }
    }
}

struct CacheEntry {
    result: VerificationResult,
    stored_at: Instant,
    /// Insertion order, breaks `stored_at` ties on eviction.
    seq: u64,
}

#[derive(Default)]
struct Counters {
    total: u64,
    cache_hits: u64,
    cache_misses: u64,
    by_status: BTreeMap<String, u64>,
    by_level: BTreeMap<String, u64>,
    seals_created: u64,
    confidence_sum: f64,
    duration_sum_ms: f64,
}

fn document_hash(payload: &DocumentPayload) -> Result<String, VerificationError> {
    Ok(sha256_hex(&CanonicalBytes::from_payload(payload)?))
}

/// Number of JSON nodes in a value.
fn structural_complexity(value: &Value) -> usize {
    1 + match value {
        Value::Object(map) => map.values().map(structural_complexity).sum(),
        Value::Array(items) => items.iter().map(structural_complexity).sum(),
        _ => 0,
    }
}

pub struct VerificationService {
    config: VerificationConfig,
    generator: Arc<SealGenerator>,
    validator: Arc<StampValidator>,
    integrity: Arc<IntegrityChecker>,
    repository: Arc<SealRepository>,
    ledger: Option<Arc<dyn BlockchainLedger>>,
    cache: Mutex<HashMap<CacheKey, CacheEntry>>,
    cache_seq: AtomicU64,
    audit: Mutex<Vec<VerificationAudit>>,
    counters: Mutex<Counters>,
}

impl VerificationService {
    pub fn new(
        config: VerificationConfig,
        generator: Arc<SealGenerator>,
        validator: Arc<StampValidator>,
        integrity: Arc<IntegrityChecker>,
        repository: Arc<SealRepository>,
    ) -> Self {
        Self {
            config,
            generator,
            validator,
            integrity,
            repository,
            ledger: None,
            cache: Mutex::new(HashMap::new()),
            cache_seq: AtomicU64::new(0),
            audit: Mutex::new(Vec::new()),
            counters: Mutex::new(Counters::default()),
        }
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn BlockchainLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn config(&self) -> &VerificationConfig {
        &self.config
    }

    pub fn generator(&self) -> &Arc<SealGenerator> {
        &self.generator
    }

    pub fn validator(&self) -> &Arc<StampValidator> {
        &self.validator
    }

    pub fn integrity_checker(&self) -> &Arc<IntegrityChecker> {
        &self.integrity
    }

    pub fn repository(&self) -> &Arc<SealRepository> {
        &self.repository
    }

    // -----------------------------------------------------------------------
    // Verification
    // -----------------------------------------------------------------------

    /// Verify a document at the context's level. Never fails: inspect
    /// `authenticity_status` and `errors`.
    pub async fn verify_document(&self, context: &VerificationContext) -> VerificationResult {
        let started = Instant::now();
        let policy = context.policy.clone().unwrap_or_else(|| self.config.policy.clone());
        let mut result = VerificationResult::new(context);
        let mut cache_key = None;

        match document_hash(&context.document_data) {
            Ok(hash) => {
                let key = CacheKey::new(context, &hash);
                if let Some(mut cached) = self.cached(&key) {
                    cached.from_cache = true;
                    self.counters.lock().cache_hits += 1;
                    self.append_audit(&cached, context);
                    self.record_stats(&cached);
                    tracing::debug!(document_id = %context.document_id, level = %context.verification_level, "verification served from cache");
                    return cached;
                }
                self.counters.lock().cache_misses += 1;
                result.metadata.insert("document_hash".into(), Value::from(hash.clone()));

                if let Err(e) = self.run_levels(context, &policy, &hash, &mut result).await {
                    tracing::warn!(document_id = %context.document_id, error = %e, "verification step failed");
                    result.errors.push(e.to_string());
                }
                cache_key = Some(key);
            }
            Err(e) => {
                tracing::warn!(document_id = %context.document_id, error = %e, "document could not be canonicalized");
                result.errors.push(e.to_string());
            }
        }

        conclude(&mut result, &policy);
        result.duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        if result.errors.is_empty() {
            if let Some(key) = cache_key {
                self.store_cached(key, &result);
            }
        }
        self.append_audit(&result, context);
        self.record_stats(&result);

        tracing::info!(
            document_id = %result.document_id,
            level = %result.verification_level,
            status = %result.authenticity_status,
            confidence = result.confidence_score,
            evidence = result.evidence.len(),
            "document verified"
        );
        result
    }

    /// Shorthand for [`verify_document`](Self::verify_document) without
    /// building a context by hand.
    pub async fn verify_document_authenticity(
        &self,
        document_id: &str,
        document_data: DocumentPayload,
        level: VerificationLevel,
        reference_data: Option<DocumentPayload>,
    ) -> VerificationResult {
        let mut context = VerificationContext::new(document_id, document_data, level);
        context.reference_data = reference_data;
        self.verify_document(&context).await
    }

    async fn run_levels(
        &self,
        context: &VerificationContext,
        policy: &VerificationPolicy,
        hash: &str,
        result: &mut VerificationResult,
    ) -> Result<(), VerificationError> {
        let level = context.verification_level;

        // BASIC
        if let Some(reference) = &context.reference_data {
            let reference_hash = document_hash(reference)?;
            let matched = reference_hash == hash;
            result.evidence.push(
                VerificationEvidence::new(
                    VerificationMethod::HashVerification,
                    if matched { "match" } else { "mismatch" },
                    if matched { 100.0 } else { 0.0 },
                )
                .with_detail("reference_hash", reference_hash),
            );
        }
        let seals = self.load_seals(context).await?;
        result.metadata.insert("seals_found".into(), Value::from(seals.len()));
        match seals.first() {
            Some(first) => self.seal_evidence(first, &context.document_data, result),
            None => result.warnings.push("no seals found for document".to_string()),
        }
        if level < VerificationLevel::Standard {
            return Ok(());
        }

        // STANDARD
        match &context.reference_data {
            Some(reference) => {
                let report = self.integrity.verify_document_integrity(
                    &context.document_id,
                    &context.document_data,
                    Some(reference),
                    &[],
                    level.integrity_level(),
                );
                result.evidence.push(
                    VerificationEvidence::new(
                        VerificationMethod::IntegrityCheck,
                        report.integrity_status.as_str(),
                        report.confidence_score,
                    )
                    .with_detail("violations", report.violations.len())
                    .with_detail("check_level", report.check_level.as_str()),
                );
                result.integrity_report = Some(report);
            }
            None => result
                .warnings
                .push("no reference data supplied; integrity check skipped".to_string()),
        }
        for seal in seals.iter().skip(1) {
            self.seal_evidence(seal, &context.document_data, result);
        }
        if level < VerificationLevel::Comprehensive {
            return Ok(());
        }

        // COMPREHENSIVE
        let now = Utc::now();
        for seal in &seals {
            result.evidence.push(freshness_evidence(seal, policy, now));
        }
        if !seals.is_empty() {
            result.evidence.push(cross_reference_evidence(&seals, &context.document_id, hash));
        }
        self.policy_warnings(policy, &seals, result);
        if level < VerificationLevel::Forensic {
            return Ok(());
        }

        // FORENSIC
        if seals.is_empty() && result.integrity_report.is_none() {
            result
                .warnings
                .push("nothing to analyse forensically: no seals and no reference data".to_string());
        } else {
            let evidence = forensic_evidence(&seals, result, now);
            result.evidence.push(evidence);
        }
        if level < VerificationLevel::Blockchain {
            return Ok(());
        }

        // BLOCKCHAIN
        self.ledger_evidence(context, hash, result).await;
        Ok(())
    }

    async fn load_seals(&self, context: &VerificationContext) -> Result<Vec<AuthenticationSeal>, VerificationError> {
        if !context.seals.is_empty() {
            return Ok(context.seals.clone());
        }
        Ok(self.repository.find_seals_by_document(&context.document_id).await?)
    }

    fn seal_evidence(&self, seal: &AuthenticationSeal, document: &DocumentPayload, result: &mut VerificationResult) {
        let validation = self.validator.validate_stamp(seal, document);
        let (label, confidence) = match validation.status {
            ValidationStatus::Valid => ("valid", 100.0),
            ValidationStatus::Expired => ("expired", 40.0),
            other => (other.as_str(), 0.0),
        };
        let errors: Vec<&str> = validation.errors.iter().map(|e| e.as_str()).collect();
        result.evidence.push(
            VerificationEvidence::new(VerificationMethod::for_seal(seal.seal_type, seal.algorithm), label, confidence)
                .with_detail("seal_id", seal.seal_id.clone())
                .with_detail("seal_type", seal.seal_type.as_str())
                .with_detail("errors", json!(errors)),
        );
        result.seal_results.push(validation);
    }

    fn policy_warnings(&self, policy: &VerificationPolicy, seals: &[AuthenticationSeal], result: &mut VerificationResult) {
        let methods = result.methods();
        for required in &policy.required_methods {
            if !methods.contains(required) {
                result
                    .warnings
                    .push(format!("policy requires {required} evidence but none was produced"));
            }
        }
        for required in &policy.required_seal_types {
            if !seals.iter().any(|s| s.seal_type == *required) {
                result
                    .warnings
                    .push(format!("policy requires a {required} seal but the document has none"));
            }
        }
    }

    async fn ledger_evidence(&self, context: &VerificationContext, hash: &str, result: &mut VerificationResult) {
        let Some(reference) = &context.blockchain_reference else {
            result
                .warnings
                .push("no blockchain reference supplied; ledger check skipped".to_string());
            return;
        };
        let Some(ledger) = &self.ledger else {
            result
                .warnings
                .push("no blockchain ledger configured; ledger check skipped".to_string());
            return;
        };
        let timeout = context
            .verification_timeout
            .unwrap_or(Duration::from_secs(self.config.verification_timeout_secs));

        match tokio::time::timeout(timeout, ledger.lookup(reference)).await {
            Err(_) => {
                tracing::warn!(reference = %reference, ?timeout, "ledger lookup timed out");
                result
                    .warnings
                    .push(format!("ledger lookup exceeded {} ms", timeout.as_millis()));
            }
            Ok(Err(e)) => {
                tracing::warn!(reference = %reference, error = %e, "ledger lookup failed");
                result.warnings.push(format!("ledger lookup failed: {e}"));
            }
            Ok(Ok(None)) => result.evidence.push(
                VerificationEvidence::new(VerificationMethod::Blockchain, "not_found", 0.0)
                    .with_detail("ledger", ledger.name())
                    .with_detail("reference", reference.clone()),
            ),
            Ok(Ok(Some(record))) => {
                let matched = record.document_hash == hash;
                result.evidence.push(
                    VerificationEvidence::new(
                        VerificationMethod::Blockchain,
                        if matched { "match" } else { "mismatch" },
                        if matched { 100.0 } else { 0.0 },
                    )
                    .with_detail("ledger", ledger.name())
                    .with_detail("reference", reference.clone())
                    .with_detail("anchored_at", record.anchored_at.to_rfc3339())
                    .with_detail("locator", record.locator.clone()),
                );
            }
        }
    }

    // -----------------------------------------------------------------------
    // Sealing
    // -----------------------------------------------------------------------

    /// Generate a seal and persist it. Cached verdicts for the document are
    /// dropped, as a new seal can change them.
    pub async fn seal_document(
        &self,
        document_id: &str,
        document: &DocumentPayload,
        seal_type: SealType,
    ) -> Result<AuthenticationSeal, VerificationError> {
        let generated = self.generator.generate_seal(document_id, document, seal_type, None)?;
        let seal = match (generated.success, generated.seal) {
            (true, Some(seal)) => seal,
            _ => {
                return Err(VerificationError::Generation(
                    generated.error_message.unwrap_or_else(|| "no seal produced".to_string()),
                ))
            }
        };
        if !self.repository.store_seal(&seal, None).await {
            return Err(VerificationError::Persistence(seal.seal_id));
        }
        self.cache.lock().retain(|key, _| key.document_id != document_id);
        self.counters.lock().seals_created += 1;
        tracing::info!(document_id, seal_id = %seal.seal_id, seal_type = %seal_type, "document sealed");
        Ok(seal)
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    pub fn get_verification_summary(&self, result: &VerificationResult) -> VerificationSummary {
        VerificationSummary {
            verification_id: result.verification_id.clone(),
            document_id: result.document_id.clone(),
            verification_level: result.verification_level,
            authenticity_status: result.authenticity_status,
            confidence_score: result.confidence_score,
            is_authentic: result.is_authentic(),
            seals_verified: result.seal_results.len(),
            seals_valid: result.seal_results.iter().filter(|r| r.is_valid).count(),
            integrity_status: result
                .integrity_report
                .as_ref()
                .map(|r| r.integrity_status.as_str().to_string()),
            methods: result.methods(),
            evidence_count: result.evidence.len(),
            warnings: result.warnings.clone(),
            errors: result.errors.clone(),
            verification_time: result.verification_time,
            from_cache: result.from_cache,
        }
    }

    /// Audit records for one document, oldest first.
    pub fn get_verification_history(&self, document_id: &str) -> Vec<VerificationAudit> {
        self.audit
            .lock()
            .iter()
            .filter(|a| a.document_id == document_id)
            .cloned()
            .collect()
    }

    /// Drop every cached result. Returns how many were dropped.
    pub fn clear_cache(&self) -> usize {
        let mut cache = self.cache.lock();
        let dropped = cache.len();
        cache.clear();
        dropped
    }

    pub fn get_service_stats(&self) -> ServiceStats {
        let counters = self.counters.lock();
        let total = counters.total;
        ServiceStats {
            total_verifications: counters.total,
            cache_hits: counters.cache_hits,
            cache_misses: counters.cache_misses,
            cache_size: self.cache.lock().len(),
            audit_records: self.audit.lock().len(),
            by_status: counters.by_status.clone(),
            by_level: counters.by_level.clone(),
            seals_created: counters.seals_created,
            average_confidence: if total == 0 {
                0.0
            } else {
                counters.confidence_sum / total as f64
            },
            average_duration_ms: if total == 0 {
                0.0
            } else {
                counters.duration_sum_ms / total as f64
            },
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn cached(&self, key: &CacheKey) -> Option<VerificationResult> {
        self.cached_at(key, Instant::now())
    }

    /// Cache lookup as of `now`. Entries at or past [`CACHE_TTL`] are dropped.
    fn cached_at(&self, key: &CacheKey, now: Instant) -> Option<VerificationResult> {
        if !self.config.enable_cache {
            return None;
        }
        let mut cache = self.cache.lock();
        match cache.get(key) {
            Some(entry) if now.saturating_duration_since(entry.stored_at) < CACHE_TTL => Some(entry.result.clone()),
            Some(_) => {
                cache.remove(key);
                None
            }
            None => None,
        }
    }

    fn store_cached(&self, key: CacheKey, result: &VerificationResult) {
        if !self.config.enable_cache {
            return;
        }
        let mut cache = self.cache.lock();
        cache.insert(
            key,
            CacheEntry {
                result: result.clone(),
                stored_at: Instant::now(),
                seq: self.cache_seq.fetch_add(1, Ordering::Relaxed),
            },
        );
        if cache.len() > CACHE_MAX_ENTRIES {
            let mut by_age: Vec<(CacheKey, Instant, u64)> =
                cache.iter().map(|(k, e)| (k.clone(), e.stored_at, e.seq)).collect();
            by_age.sort_by_key(|(_, stored_at, seq)| (*stored_at, *seq));
            for (k, _, _) in by_age.into_iter().take(CACHE_EVICT_BATCH) {
                cache.remove(&k);
            }
            tracing::debug!(remaining = cache.len(), "verification cache evicted");
        }
    }

    fn append_audit(&self, result: &VerificationResult, context: &VerificationContext) {
        let record = VerificationAudit {
            audit_id: uuid::Uuid::new_v4().to_string(),
            verification_id: result.verification_id.clone(),
            document_id: result.document_id.clone(),
            verification_level: result.verification_level,
            authenticity_status: result.authenticity_status,
            confidence_score: result.confidence_score,
            methods: result.methods(),
            evidence_count: result.evidence.len(),
            warning_count: result.warnings.len(),
            error_count: result.errors.len(),
            from_cache: result.from_cache,
            requester_id: context.requester_id.clone(),
            timestamp: Utc::now(),
        };
        let mut audit = self.audit.lock();
        audit.push(record);
        if audit.len() > AUDIT_MAX_RECORDS {
            let excess = audit.len() - AUDIT_RETAIN_RECORDS;
            audit.drain(..excess);
        }
    }

    fn record_stats(&self, result: &VerificationResult) {
        let mut counters = self.counters.lock();
        counters.total += 1;
        *counters
            .by_status
            .entry(result.authenticity_status.as_str().to_string())
            .or_default() += 1;
        *counters
            .by_level
            .entry(result.verification_level.as_str().to_string())
            .or_default() += 1;
        counters.confidence_sum += result.confidence_score;
        counters.duration_sum_ms += result.duration_ms;
    }
}

impl std::fmt::Debug for VerificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationService")
            .field("config", &self.config)
            .field("ledger", &self.ledger.as_ref().map(|l| l.name().to_string()))
            .finish()
    }
}

/// Set the score and verdict from the collected evidence.
fn conclude(result: &mut VerificationResult, policy: &VerificationPolicy) {
    match weighted_confidence(&result.evidence) {
        Some(score) => {
            result.confidence_score = score;
            result.authenticity_status = AuthenticityStatus::from_confidence(score, policy.minimum_confidence);
        }
        None => {
            result.confidence_score = 0.0;
            result.authenticity_status = AuthenticityStatus::Unknown;
        }
    }
    if !result.errors.is_empty() {
        result.authenticity_status = AuthenticityStatus::Unknown;
    }
}

fn freshness_evidence(
    seal: &AuthenticationSeal,
    policy: &VerificationPolicy,
    now: chrono::DateTime<Utc>,
) -> VerificationEvidence {
    let age_hours = (now - seal.created_at).num_hours();
    let (label, confidence) = if seal.is_expired_at(&now) {
        ("expired", 0.0)
    } else if (seal.created_at - now).num_seconds() > FUTURE_SKEW_SECS {
        ("future_dated", 0.0)
    } else if policy.max_seal_age_hours.is_some_and(|max| age_hours > max) {
        ("stale", 50.0)
    } else {
        ("fresh", 100.0)
    };
    VerificationEvidence::new(VerificationMethod::Timestamp, label, confidence)
        .with_detail("seal_id", seal.seal_id.clone())
        .with_detail("age_hours", age_hours)
}

fn cross_reference_evidence(seals: &[AuthenticationSeal], document_id: &str, hash: &str) -> VerificationEvidence {
    let inconsistent: Vec<&str> = seals
        .iter()
        .filter(|s| s.document_id != document_id || s.verification_data.data_hash != hash)
        .map(|s| s.seal_id.as_str())
        .collect();
    let consistent = seals.len() - inconsistent.len();
    let confidence = consistent as f64 / seals.len() as f64 * 100.0;
    VerificationEvidence::new(
        VerificationMethod::CrossReference,
        if inconsistent.is_empty() { "consistent" } else { "inconsistent" },
        confidence,
    )
    .with_detail("seals_checked", seals.len())
    .with_detail("inconsistent_seals", json!(inconsistent))
}

/// Metadata anomalies and tampering patterns, with a per-seal structural
/// complexity score.
fn forensic_evidence(
    seals: &[AuthenticationSeal],
    result: &VerificationResult,
    now: chrono::DateTime<Utc>,
) -> VerificationEvidence {
    let mut anomalies = Vec::new();
    let mut complexity = BTreeMap::new();
    for seal in seals {
        if seal.metadata.seal_id != seal.seal_id {
            anomalies.push(format!("{}: metadata seal_id differs", seal.seal_id));
        }
        if seal.metadata.algorithm != seal.algorithm {
            anomalies.push(format!("{}: metadata algorithm differs", seal.seal_id));
        }
        if (seal.created_at - now).num_seconds() > FUTURE_SKEW_SECS {
            anomalies.push(format!("{}: created in the future", seal.seal_id));
        }
        if seal.expires_at.is_some_and(|exp| exp < seal.created_at) {
            anomalies.push(format!("{}: expires before it was created", seal.seal_id));
        }
        if seal.updated_at < seal.created_at {
            anomalies.push(format!("{}: updated before it was created", seal.seal_id));
        }
        match SealEnvelope::decode(&seal.seal_value, seal.seal_type) {
            Ok(envelope) => {
                let body = Value::Object(envelope.body().clone());
                complexity.insert(seal.seal_id.clone(), structural_complexity(&body));
            }
            Err(e) => {
                anomalies.push(format!("{}: envelope undecodable: {e}", seal.seal_id));
                complexity.insert(seal.seal_id.clone(), 0);
            }
        }
    }

    let patterns: Vec<String> = result
        .integrity_report
        .as_ref()
        .and_then(|r| r.forensic.as_ref())
        .map(|f| f.patterns.iter().map(|p| format!("{}: {}", p.kind, p.description)).collect())
        .unwrap_or_default();

    let findings = anomalies.len() + patterns.len();
    let confidence = 100.0 - 20.0 * anomalies.len() as f64 - 15.0 * patterns.len() as f64;
    VerificationEvidence::new(
        VerificationMethod::Forensic,
        if findings == 0 { "clean" } else { "anomalies_found" },
        confidence,
    )
    .with_detail("anomalies", json!(anomalies))
    .with_detail("tampering_patterns", json!(patterns))
    .with_detail("seal_complexity", json!(complexity))
}
