//! # X.509 Certificate Inspection and Trust
//!
//! Seals of type `digital_signature` and `integrity_seal` may embed the
//! signer's certificate as PEM. [`CertificateInfo`] extracts the fields the
//! validator needs (validity window, issuer, serial, RSA public key) and
//! [`TrustStore`] decides whether the certificate may vouch for a signature.
//!
//! Chain building and OCSP/CRL retrieval are out of scope: revocation is a
//! locally maintained list of thumbprints and serial numbers.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use x509_cert::der::{DecodePem, Encode};
use x509_cert::Certificate;

use crate::error::CryptoError;

/// Fields extracted from a PEM X.509 certificate.
#[derive(Debug, Clone)]
pub struct CertificateInfo {
    /// The PEM text the certificate was parsed from.
    pub pem: String,
    /// Lowercase hex SHA-256 of the DER encoding.
    pub thumbprint: String,
    /// Lowercase hex serial number (big-endian, as encoded).
    pub serial_hex: String,
    /// Issuer distinguished name (RFC 4514 rendering).
    pub issuer: String,
    /// Subject distinguished name (RFC 4514 rendering).
    pub subject: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// RSA public key from the subject public key info.
    pub public_key: RsaPublicKey,
}

impl CertificateInfo {
    /// Parse a PEM certificate.
    ///
    /// # Errors
    ///
    /// `CryptoError::Certificate` if the PEM is malformed, the DER does not
    /// decode as X.509, or the key is not RSA.
    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        let cert = Certificate::from_pem(pem.trim().as_bytes())
            .map_err(|e| CryptoError::Certificate(format!("invalid PEM certificate: {e}")))?;
        let der = cert
            .to_der()
            .map_err(|e| CryptoError::Certificate(format!("DER re-encoding failed: {e}")))?;

        let tbs = &cert.tbs_certificate;
        let spki_der = tbs
            .subject_public_key_info
            .to_der()
            .map_err(|e| CryptoError::Certificate(format!("SPKI encoding failed: {e}")))?;
        let public_key = RsaPublicKey::from_public_key_der(&spki_der)
            .map_err(|e| CryptoError::Certificate(format!("certificate key is not RSA: {e}")))?;

        Ok(Self {
            pem: pem.trim().to_string(),
            thumbprint: taxpoynt_core::sha256_raw_hex(&der),
            serial_hex: hex::encode(tbs.serial_number.as_bytes()),
            issuer: tbs.issuer.to_string(),
            subject: tbs.subject.to_string(),
            not_before: to_utc(tbs.validity.not_before.to_unix_duration())?,
            not_after: to_utc(tbs.validity.not_after.to_unix_duration())?,
            public_key,
        })
    }

    /// Read and parse a PEM certificate file.
    pub fn from_pem_file(path: impl AsRef<std::path::Path>) -> Result<Self, CryptoError> {
        let pem = std::fs::read_to_string(path)?;
        Self::from_pem(&pem)
    }

    /// Whether `at` falls inside `[not_before, not_after]`.
    pub fn is_valid_at(&self, at: &DateTime<Utc>) -> bool {
        self.not_before <= *at && *at <= self.not_after
    }
}

fn to_utc(since_epoch: std::time::Duration) -> Result<DateTime<Utc>, CryptoError> {
    let secs = i64::try_from(since_epoch.as_secs())
        .map_err(|_| CryptoError::Certificate("validity date out of range".to_string()))?;
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| CryptoError::Certificate("validity date out of range".to_string()))
}

/// Why a certificate was not accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateRejection {
    /// Current time is past `not_after`.
    Expired { not_after: DateTime<Utc> },
    /// Current time is before `not_before`.
    NotYetValid { not_before: DateTime<Utc> },
    /// Thumbprint or serial is on the revocation list.
    Revoked { serial_hex: String },
    /// Issuer is not in the trusted set.
    UntrustedIssuer { issuer: String },
}

impl std::fmt::Display for CertificateRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Expired { not_after } => write!(f, "certificate expired at {not_after}"),
            Self::NotYetValid { not_before } => {
                write!(f, "certificate not valid before {not_before}")
            }
            Self::Revoked { serial_hex } => write!(f, "certificate {serial_hex} has been revoked"),
            Self::UntrustedIssuer { issuer } => write!(f, "issuer '{issuer}' is not trusted"),
        }
    }
}

/// Trusted issuers and locally revoked certificates.
///
/// An empty trusted-issuer set means issuer checking is not configured;
/// [`TrustStore::issuer_check_enabled`] lets callers surface that as a
/// warning.
#[derive(Debug, Clone, Default)]
pub struct TrustStore {
    trusted_issuers: HashSet<String>,
    revoked: HashSet<String>,
}

impl TrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store trusting the given issuer names.
    pub fn with_issuers<I, S>(issuers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            trusted_issuers: issuers.into_iter().map(Into::into).collect(),
            revoked: HashSet::new(),
        }
    }

    pub fn add_trusted_issuer(&mut self, issuer: impl Into<String>) {
        self.trusted_issuers.insert(issuer.into());
    }

    /// Revoke by thumbprint or serial number (lowercase hex).
    pub fn revoke(&mut self, thumbprint_or_serial: impl Into<String>) {
        self.revoked
            .insert(thumbprint_or_serial.into().to_ascii_lowercase());
    }

    pub fn issuer_check_enabled(&self) -> bool {
        !self.trusted_issuers.is_empty()
    }

    pub fn trusted_issuers(&self) -> impl Iterator<Item = &str> {
        self.trusted_issuers.iter().map(String::as_str)
    }

    pub fn is_revoked(&self, cert: &CertificateInfo) -> bool {
        self.revoked.contains(&cert.thumbprint) || self.revoked.contains(&cert.serial_hex)
    }

    /// Evaluate a certificate at `now`.
    ///
    /// Checks run in order: revocation, validity window, issuer. The first
    /// failure is returned. The issuer check is skipped when no trusted
    /// issuers are configured.
    pub fn evaluate(
        &self,
        cert: &CertificateInfo,
        now: &DateTime<Utc>,
    ) -> Result<(), CertificateRejection> {
        if self.is_revoked(cert) {
            return Err(CertificateRejection::Revoked {
                serial_hex: cert.serial_hex.clone(),
            });
        }
        if *now < cert.not_before {
            return Err(CertificateRejection::NotYetValid {
                not_before: cert.not_before,
            });
        }
        if *now > cert.not_after {
            return Err(CertificateRejection::Expired {
                not_after: cert.not_after,
            });
        }
        if self.issuer_check_enabled() && !self.trusted_issuers.contains(&cert.issuer) {
            return Err(CertificateRejection::UntrustedIssuer {
                issuer: cert.issuer.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::signing::RsaSigningKey;
    use chrono::TimeZone;

    fn mid_2026() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn parses_signing_certificate() {
        let cert = CertificateInfo::from_pem(fixtures::SIGNING_CERT_PEM).unwrap();
        assert!(cert.subject.contains("TaxPoynt Test Signing"));
        assert!(cert.issuer.contains("TaxPoynt"));
        assert_eq!(cert.thumbprint.len(), 64);
        assert_eq!(cert.serial_hex, "1001");
        assert!(cert.is_valid_at(&mid_2026()));
    }

    #[test]
    fn certificate_key_matches_private_key() {
        let cert = CertificateInfo::from_pem(fixtures::SIGNING_CERT_PEM).unwrap();
        let key = RsaSigningKey::from_pem(fixtures::SIGNING_KEY_PEM).unwrap();
        assert_eq!(cert.public_key, key.public_key());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(CertificateInfo::from_pem("not a certificate").is_err());
        assert!(CertificateInfo::from_pem(fixtures::SIGNING_KEY_PEM).is_err());
    }

    #[test]
    fn expired_certificate_rejected() {
        let cert = CertificateInfo::from_pem(fixtures::EXPIRED_CERT_PEM).unwrap();
        let store = TrustStore::new();
        assert!(matches!(
            store.evaluate(&cert, &mid_2026()),
            Err(CertificateRejection::Expired { .. })
        ));
    }

    #[test]
    fn not_yet_valid_rejected() {
        let cert = CertificateInfo::from_pem(fixtures::SIGNING_CERT_PEM).unwrap();
        let before = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            TrustStore::new().evaluate(&cert, &before),
            Err(CertificateRejection::NotYetValid { .. })
        ));
    }

    #[test]
    fn empty_store_skips_issuer_check() {
        let cert = CertificateInfo::from_pem(fixtures::ROGUE_CERT_PEM).unwrap();
        let store = TrustStore::new();
        assert!(!store.issuer_check_enabled());
        assert!(store.evaluate(&cert, &mid_2026()).is_ok());
    }

    #[test]
    fn untrusted_issuer_rejected() {
        let trusted = CertificateInfo::from_pem(fixtures::SIGNING_CERT_PEM).unwrap();
        let rogue = CertificateInfo::from_pem(fixtures::ROGUE_CERT_PEM).unwrap();
        let store = TrustStore::with_issuers([trusted.issuer.clone()]);
        assert!(store.evaluate(&trusted, &mid_2026()).is_ok());
        assert!(matches!(
            store.evaluate(&rogue, &mid_2026()),
            Err(CertificateRejection::UntrustedIssuer { .. })
        ));
    }

    #[test]
    fn revocation_by_serial_or_thumbprint() {
        let cert = CertificateInfo::from_pem(fixtures::SIGNING_CERT_PEM).unwrap();

        let mut by_serial = TrustStore::new();
        by_serial.revoke(cert.serial_hex.clone());
        assert!(matches!(
            by_serial.evaluate(&cert, &mid_2026()),
            Err(CertificateRejection::Revoked { .. })
        ));

        let mut by_thumbprint = TrustStore::new();
        by_thumbprint.revoke(cert.thumbprint.to_uppercase());
        assert!(by_thumbprint.is_revoked(&cert));
    }

    #[test]
    fn revocation_takes_priority_over_expiry() {
        let cert = CertificateInfo::from_pem(fixtures::EXPIRED_CERT_PEM).unwrap();
        let mut store = TrustStore::new();
        store.revoke(cert.serial_hex.clone());
        assert!(matches!(
            store.evaluate(&cert, &mid_2026()),
            Err(CertificateRejection::Revoked { .. })
        ));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cert.pem");
        std::fs::write(&path, fixtures::SIGNING_CERT_PEM).unwrap();
        let cert = CertificateInfo::from_pem_file(&path).unwrap();
        assert!(cert.subject.contains("TaxPoynt"));
    }
}
