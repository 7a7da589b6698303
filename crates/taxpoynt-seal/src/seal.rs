//! # Seal Data Model
//!
//! [`AuthenticationSeal`] is the artifact the generator produces and every
//! other component consumes. Its `seal_value` is an opaque base64 string
//! whose decoded structure depends on the [`SealType`]; see
//! [`crate::envelope`] for the layouts.
//!
//! A seal is immutable after generation except for `status` and
//! `updated_at`, which only the repository changes.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taxpoynt_core::DigestAlgorithm;
use taxpoynt_crypto::{HmacAlgorithm, RsaScheme};

use crate::error::SealError;

// ---------------------------------------------------------------------------
// SealType
// ---------------------------------------------------------------------------

/// The six seal constructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SealType {
    /// RSA signature over the seal payload.
    DigitalSignature,
    /// HMAC over the seal payload, with a per-seal random nonce.
    CryptographicStamp,
    /// Plain digest of the canonical document. Needs no key.
    DocumentHash,
    /// HMAC tag over a payload carrying both ISO8601 and Unix timestamps.
    TimestampSeal,
    /// RSA signature over a payload that also carries size and MD5 checksum.
    IntegritySeal,
    /// Document hash + stamp (+ signature when a key is loaded) bound by a
    /// composite hash.
    CompositeSeal,
}

impl SealType {
    pub const ALL: [SealType; 6] = [
        Self::DigitalSignature,
        Self::CryptographicStamp,
        Self::DocumentHash,
        Self::TimestampSeal,
        Self::IntegritySeal,
        Self::CompositeSeal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DigitalSignature => "digital_signature",
            Self::CryptographicStamp => "cryptographic_stamp",
            Self::DocumentHash => "document_hash",
            Self::TimestampSeal => "timestamp_seal",
            Self::IntegritySeal => "integrity_seal",
            Self::CompositeSeal => "composite_seal",
        }
    }

    /// Algorithm used when the configuration does not name one.
    pub fn default_algorithm(&self) -> SealAlgorithm {
        match self {
            Self::DigitalSignature | Self::IntegritySeal => SealAlgorithm::RsaSha256,
            Self::CryptographicStamp | Self::TimestampSeal => SealAlgorithm::HmacSha256,
            Self::DocumentHash | Self::CompositeSeal => SealAlgorithm::Sha256,
        }
    }

    /// Whether `algorithm` can produce this seal type.
    ///
    /// A composite seal accepts any algorithm; it is routed to the layer of
    /// the matching family.
    pub fn supports(&self, algorithm: SealAlgorithm) -> bool {
        match self {
            Self::DigitalSignature | Self::IntegritySeal => algorithm.rsa_scheme().is_some(),
            Self::CryptographicStamp | Self::TimestampSeal => algorithm.hmac().is_some(),
            Self::DocumentHash => algorithm.digest().is_some(),
            Self::CompositeSeal => true,
        }
    }

    /// Whether this type needs an RSA private key.
    pub fn requires_signing_key(&self) -> bool {
        matches!(self, Self::DigitalSignature | Self::IntegritySeal)
    }
}

impl std::fmt::Display for SealType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SealType {
    type Err = SealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| SealError::malformed(format!("unknown seal type '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// SealAlgorithm
// ---------------------------------------------------------------------------

/// Cryptographic algorithm identifiers carried in seals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SealAlgorithm {
    RsaSha256,
    RsaPssSha256,
    HmacSha256,
    HmacSha512,
    Sha256,
    Sha512,
}

impl SealAlgorithm {
    pub const ALL: [SealAlgorithm; 6] = [
        Self::RsaSha256,
        Self::RsaPssSha256,
        Self::HmacSha256,
        Self::HmacSha512,
        Self::Sha256,
        Self::Sha512,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RsaSha256 => "rsa_sha256",
            Self::RsaPssSha256 => "rsa_pss_sha256",
            Self::HmacSha256 => "hmac_sha256",
            Self::HmacSha512 => "hmac_sha512",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    pub fn rsa_scheme(&self) -> Option<RsaScheme> {
        match self {
            Self::RsaSha256 => Some(RsaScheme::Pkcs1v15Sha256),
            Self::RsaPssSha256 => Some(RsaScheme::PssSha256),
            _ => None,
        }
    }

    pub fn hmac(&self) -> Option<HmacAlgorithm> {
        match self {
            Self::HmacSha256 => Some(HmacAlgorithm::Sha256),
            Self::HmacSha512 => Some(HmacAlgorithm::Sha512),
            _ => None,
        }
    }

    pub fn digest(&self) -> Option<DigestAlgorithm> {
        match self {
            Self::Sha256 => Some(DigestAlgorithm::Sha256),
            Self::Sha512 => Some(DigestAlgorithm::Sha512),
            _ => None,
        }
    }
}

impl std::fmt::Display for SealAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SealAlgorithm {
    type Err = SealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| SealError::malformed(format!("unknown seal algorithm '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// SealStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a persisted seal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SealStatus {
    Pending,
    Generated,
    Verified,
    Invalid,
    Expired,
    Revoked,
}

impl SealStatus {
    pub const ALL: [SealStatus; 6] = [
        Self::Pending,
        Self::Generated,
        Self::Verified,
        Self::Invalid,
        Self::Expired,
        Self::Revoked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Generated => "generated",
            Self::Verified => "verified",
            Self::Invalid => "invalid",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }
}

impl std::fmt::Display for SealStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SealStatus {
    type Err = SealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| SealError::malformed(format!("unknown seal status '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// AuthenticationSeal
// ---------------------------------------------------------------------------

/// Descriptive metadata recorded at generation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SealMetadata {
    pub seal_id: String,
    pub algorithm: SealAlgorithm,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub issuer: Option<String>,
    pub certificate_thumbprint: Option<String>,
    pub key_id: Option<String>,
}

/// Precomputed values allowing a quick check without decoding the seal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationData {
    /// SHA-256 of the canonical document.
    pub data_hash: String,
    /// Length of the canonical document in bytes.
    pub document_size: usize,
    pub key_id: Option<String>,
}

/// A cryptographic seal bound to one document's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationSeal {
    pub seal_id: String,
    pub document_id: String,
    pub seal_type: SealType,
    /// Base64 (standard or URL-safe) envelope, possibly zlib-compressed.
    pub seal_value: String,
    pub algorithm: SealAlgorithm,
    pub status: SealStatus,
    pub metadata: SealMetadata,
    pub verification_data: VerificationData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Schema version of the seal record.
    pub version: i32,
}

impl AuthenticationSeal {
    pub const CURRENT_VERSION: i32 = 1;

    pub fn issuer(&self) -> Option<&str> {
        self.metadata.issuer.as_deref()
    }

    pub fn certificate_thumbprint(&self) -> Option<&str> {
        self.metadata.certificate_thumbprint.as_deref()
    }

    pub fn key_id(&self) -> Option<&str> {
        self.metadata.key_id.as_deref()
    }

    /// Whether `expires_at` is set and lies before `now`.
    pub fn is_expired_at(&self, now: &DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp < *now)
    }
}

// ---------------------------------------------------------------------------
// SealConfiguration
// ---------------------------------------------------------------------------

/// Text encoding of the outer seal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SealEncoding {
    /// RFC 4648 standard alphabet with padding.
    #[default]
    Base64,
    /// RFC 4648 URL-safe alphabet, no padding.
    Base64Url,
}

/// Per-call generation options. Not persisted with the seal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SealConfiguration {
    /// `None` selects [`SealType::default_algorithm`].
    pub algorithm: Option<SealAlgorithm>,
    /// RSA modulus size for keys generated on demand.
    pub key_size: usize,
    /// Seal lifetime; `0` means the seal never expires.
    pub validity_hours: i64,
    /// Embed the generation timestamp in the payload.
    pub include_timestamp: bool,
    /// Embed the signer certificate in signature envelopes.
    pub include_certificate: bool,
    /// zlib-compress the envelope before encoding.
    pub compression: bool,
    pub encoding: SealEncoding,
    /// Extra claims copied verbatim into the signed payload.
    pub additional_claims: serde_json::Map<String, serde_json::Value>,
}

impl Default for SealConfiguration {
    fn default() -> Self {
        Self {
            algorithm: None,
            key_size: 2048,
            validity_hours: 8760,
            include_timestamp: true,
            include_certificate: true,
            compression: false,
            encoding: SealEncoding::Base64,
            additional_claims: serde_json::Map::new(),
        }
    }
}

impl SealConfiguration {
    /// Resolve the effective algorithm for `seal_type`.
    pub fn algorithm_for(&self, seal_type: SealType) -> SealAlgorithm {
        self.algorithm.unwrap_or_else(|| seal_type.default_algorithm())
    }
}

// ---------------------------------------------------------------------------
// SealGenerationResult
// ---------------------------------------------------------------------------

/// Outcome of one generation call. Failures are reported here, not raised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealGenerationResult {
    pub seal: Option<AuthenticationSeal>,
    pub success: bool,
    pub error_message: Option<String>,
    pub generation_time_ms: f64,
}

impl SealGenerationResult {
    pub(crate) fn succeeded(seal: AuthenticationSeal, generation_time_ms: f64) -> Self {
        Self {
            seal: Some(seal),
            success: true,
            error_message: None,
            generation_time_ms,
        }
    }

    pub(crate) fn failed(error: impl ToString, generation_time_ms: f64) -> Self {
        Self {
            seal: None,
            success: false,
            error_message: Some(error.to_string()),
            generation_time_ms,
        }
    }
}

/// Counters kept by one generator instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetrics {
    pub total_requests: u64,
    pub successful: u64,
    pub failed: u64,
    pub by_seal_type: BTreeMap<String, u64>,
    pub by_algorithm: BTreeMap<String, u64>,
    /// Rolling mean over successful generations.
    pub average_generation_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_type_string_roundtrip() {
        for t in SealType::ALL {
            assert_eq!(t.as_str().parse::<SealType>().unwrap(), t);
            assert_eq!(serde_json::to_value(t).unwrap(), serde_json::json!(t.as_str()));
        }
        assert!("wax_seal".parse::<SealType>().is_err());
    }

    #[test]
    fn algorithm_string_roundtrip() {
        for a in SealAlgorithm::ALL {
            assert_eq!(a.as_str().parse::<SealAlgorithm>().unwrap(), a);
        }
    }

    #[test]
    fn default_algorithms_are_supported() {
        for t in SealType::ALL {
            assert!(t.supports(t.default_algorithm()), "{t}");
        }
    }

    #[test]
    fn compatibility_matrix() {
        use SealAlgorithm::*;
        assert!(SealType::DigitalSignature.supports(RsaPssSha256));
        assert!(!SealType::DigitalSignature.supports(HmacSha256));
        assert!(SealType::TimestampSeal.supports(HmacSha512));
        assert!(!SealType::CryptographicStamp.supports(Sha256));
        assert!(SealType::DocumentHash.supports(Sha512));
        assert!(!SealType::DocumentHash.supports(RsaSha256));
        assert!(!SealType::IntegritySeal.supports(Sha512));
        for a in SealAlgorithm::ALL {
            assert!(SealType::CompositeSeal.supports(a));
        }
    }

    #[test]
    fn configuration_defaults() {
        let config = SealConfiguration::default();
        assert_eq!(config.validity_hours, 8760);
        assert!(config.include_timestamp);
        assert!(config.include_certificate);
        assert!(!config.compression);
        assert_eq!(config.algorithm_for(SealType::TimestampSeal), SealAlgorithm::HmacSha256);
    }

    #[test]
    fn configuration_deserializes_partially() {
        let config: SealConfiguration =
            serde_json::from_str(r#"{"algorithm":"rsa_pss_sha256","compression":true}"#).unwrap();
        assert_eq!(config.algorithm, Some(SealAlgorithm::RsaPssSha256));
        assert!(config.compression);
        assert_eq!(config.validity_hours, 8760);
    }
}
