//! # Seal Generator
//!
//! Builds [`AuthenticationSeal`]s for documents. Every seal type follows the
//! same pipeline:
//!
//! 1. Canonicalize the document ([`CanonicalBytes::from_payload`]) and take
//!    its SHA-256 as `data_hash`.
//! 2. Assemble the type-specific [`SealPayload`].
//! 3. Sign, stamp, or hash the canonical payload.
//! 4. Wrap proof and payload in a [`SealEnvelope`] and encode it.
//!
//! ## Failure reporting
//!
//! `generate_seal` returns `Err` only for a seal type / algorithm
//! combination that cannot work. Missing key material and internal errors
//! are reported through [`SealGenerationResult::error_message`].

use std::sync::Arc;
use std::time::Instant;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::Mutex;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use taxpoynt_core::{md5_hex, sha256_hex, CanonicalBytes, DocumentPayload, Timestamp};
use taxpoynt_crypto::KeyMaterial;

use crate::envelope::{composite_hash, SealEnvelope, SealPayload};
use crate::error::SealError;
use crate::seal::{
    AuthenticationSeal, GenerationMetrics, SealAlgorithm, SealConfiguration, SealGenerationResult,
    SealMetadata, SealStatus, SealType, VerificationData,
};

/// Nonce length in bytes for `cryptographic_stamp` seals.
const NONCE_LEN: usize = 16;

/// Generator-wide settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Issuer name embedded in every payload and seal metadata.
    pub issuer: Option<String>,
    /// Used when a call passes no [`SealConfiguration`].
    pub defaults: SealConfiguration,
}

/// Produces seals from documents.
pub struct SealGenerator {
    config: GeneratorConfig,
    keys: Arc<KeyMaterial>,
    metrics: Mutex<GenerationMetrics>,
}

/// Values shared by every builder during one generation.
struct BuildContext<'a> {
    document_id: &'a str,
    canonical: &'a CanonicalBytes,
    data_hash: &'a str,
    timestamp: Timestamp,
    expires_at: Option<Timestamp>,
    config: &'a SealConfiguration,
}

impl SealGenerator {
    pub fn new(config: GeneratorConfig, keys: Arc<KeyMaterial>) -> Self {
        tracing::info!(
            issuer = ?config.issuer,
            key_id = %keys.key_id,
            can_sign = keys.can_sign(),
            has_certificate = keys.certificate.is_some(),
            "seal generator initialized"
        );
        Self {
            config,
            keys,
            metrics: Mutex::new(GenerationMetrics::default()),
        }
    }

    pub fn keys(&self) -> &Arc<KeyMaterial> {
        &self.keys
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Whether signature seal types are available.
    pub fn can_sign(&self) -> bool {
        self.keys.can_sign()
    }

    /// Generate one seal.
    ///
    /// # Errors
    ///
    /// [`SealError::UnsupportedAlgorithm`] if the configured algorithm
    /// cannot produce `seal_type`. All other failures come back as
    /// `Ok(result)` with `success == false`.
    pub fn generate_seal(
        &self,
        document_id: &str,
        document: &DocumentPayload,
        seal_type: SealType,
        config: Option<&SealConfiguration>,
    ) -> Result<SealGenerationResult, SealError> {
        let config = config.unwrap_or(&self.config.defaults);
        let algorithm = config.algorithm_for(seal_type);
        if !seal_type.supports(algorithm) {
            self.record(seal_type, algorithm, None);
            return Err(SealError::UnsupportedAlgorithm { seal_type, algorithm });
        }

        let started = Instant::now();
        let outcome = self.build_seal(document_id, document, seal_type, algorithm, config);
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        Ok(match outcome {
            Ok(seal) => {
                tracing::debug!(
                    seal_id = %seal.seal_id,
                    document_id,
                    seal_type = %seal_type,
                    algorithm = %algorithm,
                    elapsed_ms,
                    "seal generated"
                );
                self.record(seal_type, algorithm, Some(elapsed_ms));
                SealGenerationResult::succeeded(seal, elapsed_ms)
            }
            Err(e) => {
                tracing::warn!(
                    document_id,
                    seal_type = %seal_type,
                    algorithm = %algorithm,
                    error = %e,
                    "seal generation failed"
                );
                self.record(seal_type, algorithm, None);
                SealGenerationResult::failed(e, elapsed_ms)
            }
        })
    }

    /// Generate one seal per document, sequentially. A failed document does
    /// not stop the batch.
    ///
    /// # Errors
    ///
    /// [`SealError::UnsupportedAlgorithm`] before any document is processed.
    pub fn generate_batch_seals(
        &self,
        documents: &[(String, DocumentPayload)],
        seal_type: SealType,
        config: Option<&SealConfiguration>,
    ) -> Result<Vec<SealGenerationResult>, SealError> {
        let effective = config.unwrap_or(&self.config.defaults);
        let algorithm = effective.algorithm_for(seal_type);
        if !seal_type.supports(algorithm) {
            return Err(SealError::UnsupportedAlgorithm { seal_type, algorithm });
        }
        documents
            .iter()
            .map(|(id, doc)| self.generate_seal(id, doc, seal_type, config))
            .collect()
    }

    /// Generate a composite seal with default settings: document hash and
    /// HMAC stamp, plus an RSA signature when a private key is loaded.
    pub fn generate_document_seal(
        &self,
        document_id: &str,
        document: &DocumentPayload,
    ) -> SealGenerationResult {
        let config = SealConfiguration {
            algorithm: None,
            ..self.config.defaults.clone()
        };
        match self.generate_seal(document_id, document, SealType::CompositeSeal, Some(&config)) {
            Ok(result) => result,
            Err(e) => SealGenerationResult::failed(e, 0.0),
        }
    }

    /// Snapshot of this instance's counters.
    pub fn get_generation_metrics(&self) -> GenerationMetrics {
        self.metrics.lock().clone()
    }

    fn record(&self, seal_type: SealType, algorithm: SealAlgorithm, success_ms: Option<f64>) {
        let mut m = self.metrics.lock();
        m.total_requests += 1;
        *m.by_seal_type.entry(seal_type.as_str().to_string()).or_default() += 1;
        *m.by_algorithm.entry(algorithm.as_str().to_string()).or_default() += 1;
        match success_ms {
            Some(ms) => {
                m.successful += 1;
                let n = m.successful as f64;
                m.average_generation_ms += (ms - m.average_generation_ms) / n;
            }
            None => m.failed += 1,
        }
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    fn build_seal(
        &self,
        document_id: &str,
        document: &DocumentPayload,
        seal_type: SealType,
        algorithm: SealAlgorithm,
        config: &SealConfiguration,
    ) -> Result<AuthenticationSeal, SealError> {
        let canonical = CanonicalBytes::from_payload(document)?;
        let data_hash = sha256_hex(&canonical);
        let timestamp = Timestamp::now();
        let expires_at = (config.validity_hours > 0).then(|| timestamp.plus_hours(config.validity_hours));

        let ctx = BuildContext {
            document_id,
            canonical: &canonical,
            data_hash: &data_hash,
            timestamp,
            expires_at,
            config,
        };
        let envelope = match seal_type {
            SealType::DigitalSignature | SealType::IntegritySeal => {
                self.signature_envelope(&ctx, seal_type, algorithm)?
            }
            SealType::CryptographicStamp => self.stamp_envelope(&ctx, algorithm)?,
            SealType::DocumentHash => self.hash_envelope(&ctx, algorithm)?,
            SealType::TimestampSeal => self.timestamp_envelope(&ctx, algorithm)?,
            SealType::CompositeSeal => self.composite_envelope(&ctx, algorithm)?,
        };
        let seal_value = envelope.encode(config.compression, config.encoding)?;

        let embeds_certificate = envelope.certificate_pem().is_some()
            || envelope
                .layers()?
                .iter()
                .any(|layer| layer.certificate_pem().is_some());
        let certificate_thumbprint = if embeds_certificate {
            self.keys.certificate.as_ref().map(|c| c.thumbprint.clone())
        } else {
            None
        };

        let seal_id = uuid::Uuid::new_v4().to_string();
        let created_at = *timestamp.as_datetime();
        let expires_at = expires_at.map(|t| *t.as_datetime());
        let key_id = Some(self.keys.key_id.clone());
        Ok(AuthenticationSeal {
            seal_id: seal_id.clone(),
            document_id: document_id.to_string(),
            seal_type,
            seal_value,
            algorithm,
            status: SealStatus::Generated,
            metadata: SealMetadata {
                seal_id,
                algorithm,
                created_at,
                expires_at,
                issuer: self.config.issuer.clone(),
                certificate_thumbprint,
                key_id: key_id.clone(),
            },
            verification_data: VerificationData {
                data_hash,
                document_size: canonical.len(),
                key_id,
            },
            created_at,
            updated_at: created_at,
            expires_at,
            version: AuthenticationSeal::CURRENT_VERSION,
        })
    }

    fn base_payload(&self, ctx: &BuildContext<'_>, seal_type: SealType, algorithm: SealAlgorithm) -> SealPayload {
        let mut payload = SealPayload::new(seal_type, ctx.document_id, ctx.data_hash, algorithm);
        if ctx.config.include_timestamp {
            payload.timestamp = Some(ctx.timestamp.to_iso8601());
        }
        payload.expires_at = ctx.expires_at.map(|t| t.to_iso8601());
        payload.issuer = self.config.issuer.clone();
        payload.key_id = Some(self.keys.key_id.clone());
        payload.additional_claims = ctx.config.additional_claims.clone();
        payload
    }

    fn signature_envelope(
        &self,
        ctx: &BuildContext<'_>,
        seal_type: SealType,
        algorithm: SealAlgorithm,
    ) -> Result<SealEnvelope, SealError> {
        let scheme = algorithm
            .rsa_scheme()
            .ok_or(SealError::UnsupportedAlgorithm { seal_type, algorithm })?;
        let key = self.keys.signing_key.as_ref().ok_or_else(|| {
            SealError::KeyUnavailable(format!("{seal_type} requires an RSA private key"))
        })?;

        let mut payload = self.base_payload(ctx, seal_type, algorithm);
        if seal_type == SealType::IntegritySeal {
            payload.document_size = Some(ctx.canonical.len());
            payload.checksum_md5 = Some(md5_hex(ctx.canonical));
        }
        let payload = serde_json::to_value(&payload)?;
        let signature = key.sign(scheme, &CanonicalBytes::new(&payload)?)?;

        let mut body = Map::new();
        body.insert("signature".into(), Value::String(STANDARD.encode(signature)));
        body.insert("payload".into(), payload);
        if ctx.config.include_certificate {
            if let Some(cert) = &self.keys.certificate {
                body.insert("certificate".into(), Value::String(cert.pem.clone()));
            }
        }
        SealEnvelope::from_body(seal_type, body)
    }

    fn stamp_envelope(&self, ctx: &BuildContext<'_>, algorithm: SealAlgorithm) -> Result<SealEnvelope, SealError> {
        let seal_type = SealType::CryptographicStamp;
        let hmac = algorithm
            .hmac()
            .ok_or(SealError::UnsupportedAlgorithm { seal_type, algorithm })?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        let mut payload = self.base_payload(ctx, seal_type, algorithm);
        payload.nonce = Some(hex::encode(nonce));
        let payload = serde_json::to_value(&payload)?;
        let stamp = self.keys.hmac_key.stamp(hmac, &CanonicalBytes::new(&payload)?)?;

        let mut body = Map::new();
        body.insert("stamp".into(), Value::String(stamp));
        body.insert("payload".into(), payload);
        SealEnvelope::from_body(seal_type, body)
    }

    fn hash_envelope(&self, ctx: &BuildContext<'_>, algorithm: SealAlgorithm) -> Result<SealEnvelope, SealError> {
        let seal_type = SealType::DocumentHash;
        let digest = algorithm
            .digest()
            .ok_or(SealError::UnsupportedAlgorithm { seal_type, algorithm })?;

        let payload = serde_json::to_value(self.base_payload(ctx, seal_type, algorithm))?;
        let mut body = Map::new();
        body.insert("hash".into(), Value::String(digest.digest(ctx.canonical).hex));
        body.insert("payload".into(), payload);
        SealEnvelope::from_body(seal_type, body)
    }

    fn timestamp_envelope(&self, ctx: &BuildContext<'_>, algorithm: SealAlgorithm) -> Result<SealEnvelope, SealError> {
        let seal_type = SealType::TimestampSeal;
        let hmac = algorithm
            .hmac()
            .ok_or(SealError::UnsupportedAlgorithm { seal_type, algorithm })?;

        // The timestamp is the point of this seal type, so it is always present.
        let mut payload = self.base_payload(ctx, seal_type, algorithm);
        payload.timestamp = Some(ctx.timestamp.to_iso8601());
        payload.unix_timestamp = Some(ctx.timestamp.epoch_secs());
        let payload = serde_json::to_value(&payload)?;
        let token = self.keys.hmac_key.stamp(hmac, &CanonicalBytes::new(&payload)?)?;

        let mut body = Map::new();
        body.insert("timestamp_token".into(), Value::String(token));
        body.insert("payload".into(), payload);
        SealEnvelope::from_body(seal_type, body)
    }

    fn composite_envelope(&self, ctx: &BuildContext<'_>, algorithm: SealAlgorithm) -> Result<SealEnvelope, SealError> {
        let hash_alg = if algorithm.digest().is_some() { algorithm } else { SealAlgorithm::Sha256 };
        let stamp_alg = if algorithm.hmac().is_some() { algorithm } else { SealAlgorithm::HmacSha256 };
        let wants_signature = algorithm.rsa_scheme().is_some();
        if wants_signature && !self.keys.can_sign() {
            return Err(SealError::KeyUnavailable(format!(
                "composite seal with {algorithm} requires an RSA private key"
            )));
        }

        let mut layers = vec![self.hash_envelope(ctx, hash_alg)?, self.stamp_envelope(ctx, stamp_alg)?];
        if self.keys.can_sign() {
            let sig_alg = if wants_signature { algorithm } else { SealAlgorithm::RsaSha256 };
            layers.push(self.signature_envelope(ctx, SealType::DigitalSignature, sig_alg)?);
        }

        let mut payload = self.base_payload(ctx, SealType::CompositeSeal, algorithm);
        payload.layer_types = Some(layers.iter().map(SealEnvelope::seal_type).collect());

        let mut layer_map = Map::new();
        for layer in &layers {
            layer_map.insert(layer.seal_type().as_str().to_string(), Value::Object(layer.body().clone()));
        }
        let mut body = Map::new();
        body.insert("composite_hash".into(), Value::String(composite_hash(&layers)?));
        body.insert("layers".into(), Value::Object(layer_map));
        body.insert("payload".into(), serde_json::to_value(&payload)?);
        SealEnvelope::from_body(SealType::CompositeSeal, body)
    }
}

impl std::fmt::Debug for SealGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealGenerator")
            .field("issuer", &self.config.issuer)
            .field("key_id", &self.keys.key_id)
            .field("can_sign", &self.keys.can_sign())
            .finish()
    }
}
