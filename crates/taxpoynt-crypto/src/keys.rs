//! # Key Material Loading
//!
//! Loads the signing key, certificate, and HMAC secret a seal deployment
//! runs with. Loading never fails: each missing or unreadable piece is
//! logged and the corresponding capability is switched off.
//!
//! | Missing | Effect |
//! |---|---|
//! | private key | signature seal types unavailable |
//! | certificate | signature seals carry no certificate |
//! | HMAC secret | an ephemeral HMAC key is generated |
//!
//! An ephemeral HMAC key makes stamps unverifiable after restart, so it is
//! logged at `warn`.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::certificate::CertificateInfo;
use crate::mac::HmacKey;
use crate::signing::RsaSigningKey;

/// Where key material comes from. Deserializable so it can sit inside
/// a YAML configuration file.
///
/// `Debug` redacts the HMAC secret.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeySource {
    /// PEM private key (PKCS#8 or PKCS#1).
    pub private_key_path: Option<PathBuf>,
    /// PEM X.509 certificate for the private key.
    pub certificate_path: Option<PathBuf>,
    /// HMAC secret (hex, or raw UTF-8 if not valid hex).
    #[serde(skip_serializing)]
    pub hmac_secret: Option<String>,
    /// Identifier stamped into seal metadata. Defaults to the HMAC key
    /// fingerprint.
    pub key_id: Option<String>,
}

impl std::fmt::Debug for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySource")
            .field("private_key_path", &self.private_key_path)
            .field("certificate_path", &self.certificate_path)
            .field("hmac_secret", &self.hmac_secret.as_ref().map(|_| "[REDACTED]"))
            .field("key_id", &self.key_id)
            .finish()
    }
}

/// Loaded key material shared by the generator and the validator.
#[derive(Debug, Clone)]
pub struct KeyMaterial {
    pub signing_key: Option<Arc<RsaSigningKey>>,
    pub certificate: Option<CertificateInfo>,
    pub hmac_key: HmacKey,
    pub key_id: String,
    /// `true` when the HMAC key was generated at load time.
    pub hmac_ephemeral: bool,
}

impl KeyMaterial {
    /// Load from `source`, degrading on every failure.
    pub fn load(source: &KeySource) -> Self {
        let signing_key = source.private_key_path.as_ref().and_then(|path| {
            match RsaSigningKey::from_pem_file(path) {
                Ok(key) => {
                    tracing::info!(path = %path.display(), bits = key.key_size(), "loaded RSA signing key");
                    Some(Arc::new(key))
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "could not load private key; signature seal types disabled"
                    );
                    None
                }
            }
        });
        if source.private_key_path.is_none() {
            tracing::warn!("no private key configured; signature seal types disabled");
        }

        let certificate = source.certificate_path.as_ref().and_then(|path| {
            match CertificateInfo::from_pem_file(path) {
                Ok(cert) => {
                    tracing::info!(
                        path = %path.display(),
                        subject = %cert.subject,
                        not_after = %cert.not_after,
                        "loaded signing certificate"
                    );
                    Some(cert)
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "could not load certificate");
                    None
                }
            }
        });

        let (hmac_key, hmac_ephemeral) = match source.hmac_secret.as_deref().map(HmacKey::from_secret) {
            Some(Ok(key)) => (key, false),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "invalid HMAC secret; generating ephemeral key");
                (HmacKey::generate(), true)
            }
            None => {
                tracing::warn!(
                    "no HMAC secret configured; generating ephemeral key. \
                     Stamps will not verify after restart."
                );
                (HmacKey::generate(), true)
            }
        };

        Self::assemble(signing_key, certificate, hmac_key, source.key_id.clone(), hmac_ephemeral)
    }

    /// Key material with only an HMAC key (no signature seal types).
    pub fn hmac_only(hmac_key: HmacKey) -> Self {
        Self::assemble(None, None, hmac_key, None, false)
    }

    /// Key material from already-parsed parts.
    pub fn from_parts(
        signing_key: Option<RsaSigningKey>,
        certificate: Option<CertificateInfo>,
        hmac_key: HmacKey,
        key_id: Option<String>,
    ) -> Self {
        Self::assemble(signing_key.map(Arc::new), certificate, hmac_key, key_id, false)
    }

    fn assemble(
        signing_key: Option<Arc<RsaSigningKey>>,
        certificate: Option<CertificateInfo>,
        hmac_key: HmacKey,
        key_id: Option<String>,
        hmac_ephemeral: bool,
    ) -> Self {
        if let (Some(key), Some(cert)) = (&signing_key, &certificate) {
            if key.public_key() != cert.public_key {
                tracing::warn!(
                    subject = %cert.subject,
                    "certificate public key does not match the private key; \
                     signatures will fail certificate verification"
                );
            }
        }
        let key_id = key_id.unwrap_or_else(|| hmac_key.fingerprint());
        Self {
            signing_key,
            certificate,
            hmac_key,
            key_id,
            hmac_ephemeral,
        }
    }

    pub fn can_sign(&self) -> bool {
        self.signing_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("key.pem");
        let cert_path = dir.path().join("cert.pem");
        std::fs::write(&key_path, fixtures::SIGNING_KEY_PEM).unwrap();
        std::fs::write(&cert_path, fixtures::SIGNING_CERT_PEM).unwrap();

        let material = KeyMaterial::load(&KeySource {
            private_key_path: Some(key_path),
            certificate_path: Some(cert_path),
            hmac_secret: Some(fixtures::HMAC_SECRET.to_string()),
            key_id: Some("firs-key-1".to_string()),
        });

        assert!(material.can_sign());
        assert!(material.certificate.is_some());
        assert!(!material.hmac_ephemeral);
        assert_eq!(material.key_id, "firs-key-1");
    }

    #[test]
    fn missing_files_degrade() {
        let dir = tempfile::tempdir().unwrap();
        let material = KeyMaterial::load(&KeySource {
            private_key_path: Some(dir.path().join("absent.pem")),
            certificate_path: Some(dir.path().join("absent-cert.pem")),
            hmac_secret: None,
            key_id: None,
        });
        assert!(!material.can_sign());
        assert!(material.certificate.is_none());
        assert!(material.hmac_ephemeral);
        assert_eq!(material.key_id, material.hmac_key.fingerprint());
    }

    #[test]
    fn unparseable_key_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("key.pem");
        std::fs::write(&key_path, "garbage").unwrap();
        let material = KeyMaterial::load(&KeySource {
            private_key_path: Some(key_path),
            hmac_secret: Some("abc-secret".to_string()),
            ..KeySource::default()
        });
        assert!(!material.can_sign());
        assert!(!material.hmac_ephemeral);
    }

    #[test]
    fn key_id_defaults_to_fingerprint() {
        let key = HmacKey::from_secret(fixtures::HMAC_SECRET).unwrap();
        let fingerprint = key.fingerprint();
        let material = KeyMaterial::hmac_only(key);
        assert_eq!(material.key_id, fingerprint);
        assert_eq!(material.key_id.len(), 16);
    }

    #[test]
    fn key_source_never_serializes_secret() {
        let source = KeySource {
            hmac_secret: Some("top-secret".to_string()),
            ..KeySource::default()
        };
        let json = serde_json::to_string(&source).unwrap();
        assert!(!json.contains("top-secret"));
    }
}
