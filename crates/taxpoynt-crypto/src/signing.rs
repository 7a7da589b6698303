//! # RSA Signing and Verification
//!
//! RSA signatures for `digital_signature`, `integrity_seal`, and the
//! signature layer of `composite_seal`. Two padding schemes are supported,
//! both over SHA-256:
//!
//! - PKCS#1 v1.5 (`rsa_sha256`) — deterministic.
//! - PSS (`rsa_pss_sha256`) — randomized salt, blinded signing.
//!
//! ## Security Invariant
//!
//! - Signing input MUST be `&CanonicalBytes`.
//! - Private keys are never serialized or logged. `RsaSigningKey` does not
//!   implement `Serialize` and its `Debug` impl redacts the key.

use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{RandomizedSigner, SignatureEncoding, Signer, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use taxpoynt_core::CanonicalBytes;

use crate::error::CryptoError;

/// RSA padding scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsaScheme {
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    Pkcs1v15Sha256,
    /// RSASSA-PSS with SHA-256.
    PssSha256,
}

/// An RSA private key for seal signing.
pub struct RsaSigningKey {
    private_key: RsaPrivateKey,
}

impl RsaSigningKey {
    /// Generate a new random key of `bits` size.
    pub fn generate(bits: usize) -> Result<Self, CryptoError> {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| CryptoError::KeyError(format!("RSA key generation failed: {e}")))?;
        Ok(Self { private_key })
    }

    /// Parse a PEM private key, accepting PKCS#8 (`BEGIN PRIVATE KEY`) and
    /// PKCS#1 (`BEGIN RSA PRIVATE KEY`).
    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|pkcs8_err| {
                RsaPrivateKey::from_pkcs1_pem(pem).map_err(|pkcs1_err| {
                    CryptoError::KeyError(format!(
                        "not a PKCS#8 ({pkcs8_err}) or PKCS#1 ({pkcs1_err}) RSA private key"
                    ))
                })
            })?;
        Ok(Self { private_key })
    }

    /// Read and parse a PEM private key file.
    pub fn from_pem_file(path: impl AsRef<std::path::Path>) -> Result<Self, CryptoError> {
        let pem = std::fs::read_to_string(path)?;
        Self::from_pem(&pem)
    }

    /// The matching public key.
    pub fn public_key(&self) -> RsaPublicKey {
        self.private_key.to_public_key()
    }

    /// Modulus size in bits.
    pub fn key_size(&self) -> usize {
        self.private_key.size() * 8
    }

    /// Sign canonical bytes, returning the raw signature bytes.
    pub fn sign(&self, scheme: RsaScheme, data: &CanonicalBytes) -> Result<Vec<u8>, CryptoError> {
        match scheme {
            RsaScheme::Pkcs1v15Sha256 => {
                let key = rsa::pkcs1v15::SigningKey::<Sha256>::new(self.private_key.clone());
                let signature = key
                    .try_sign(data.as_bytes())
                    .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
                Ok(signature.to_vec())
            }
            RsaScheme::PssSha256 => {
                let key = rsa::pss::BlindedSigningKey::<Sha256>::new(self.private_key.clone());
                let mut rng = rand::thread_rng();
                let signature = key
                    .try_sign_with_rng(&mut rng, data.as_bytes())
                    .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
                Ok(signature.to_vec())
            }
        }
    }
}

impl std::fmt::Debug for RsaSigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RsaSigningKey(<private>)")
    }
}

/// Verify an RSA signature over canonical bytes.
///
/// Returns `Ok(())` if valid, `Err(CryptoError::VerificationFailed)`
/// otherwise (including signatures of the wrong length).
pub fn verify_rsa(
    public_key: &RsaPublicKey,
    scheme: RsaScheme,
    data: &CanonicalBytes,
    signature: &[u8],
) -> Result<(), CryptoError> {
    match scheme {
        RsaScheme::Pkcs1v15Sha256 => {
            let key = rsa::pkcs1v15::VerifyingKey::<Sha256>::new(public_key.clone());
            let sig = rsa::pkcs1v15::Signature::try_from(signature)
                .map_err(|e| CryptoError::VerificationFailed(e.to_string()))?;
            key.verify(data.as_bytes(), &sig)
                .map_err(|e| CryptoError::VerificationFailed(format!("PKCS#1 v1.5: {e}")))
        }
        RsaScheme::PssSha256 => {
            let key = rsa::pss::VerifyingKey::<Sha256>::new(public_key.clone());
            let sig = rsa::pss::Signature::try_from(signature)
                .map_err(|e| CryptoError::VerificationFailed(e.to_string()))?;
            key.verify(data.as_bytes(), &sig)
                .map_err(|e| CryptoError::VerificationFailed(format!("PSS: {e}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use serde_json::json;

    fn canonical(v: serde_json::Value) -> CanonicalBytes {
        CanonicalBytes::new(&v).unwrap()
    }

    #[test]
    fn loads_pkcs8_and_pkcs1_pem() {
        let a = RsaSigningKey::from_pem(fixtures::SIGNING_KEY_PEM).unwrap();
        let b = RsaSigningKey::from_pem(fixtures::SIGNING_KEY_PKCS1_PEM).unwrap();
        assert_eq!(a.public_key(), b.public_key());
        assert_eq!(a.key_size(), 2048);
    }

    #[test]
    fn rejects_garbage_pem() {
        assert!(RsaSigningKey::from_pem("-----BEGIN NOTHING-----").is_err());
    }

    #[test]
    fn pkcs1v15_sign_and_verify() {
        let key = RsaSigningKey::from_pem(fixtures::SIGNING_KEY_PEM).unwrap();
        let data = canonical(json!({"invoice_number": "INV-001"}));
        let sig = key.sign(RsaScheme::Pkcs1v15Sha256, &data).unwrap();
        assert_eq!(sig.len(), 256);
        verify_rsa(&key.public_key(), RsaScheme::Pkcs1v15Sha256, &data, &sig).unwrap();
    }

    #[test]
    fn pkcs1v15_is_deterministic() {
        let key = RsaSigningKey::from_pem(fixtures::SIGNING_KEY_PEM).unwrap();
        let data = canonical(json!({"a": 1}));
        assert_eq!(
            key.sign(RsaScheme::Pkcs1v15Sha256, &data).unwrap(),
            key.sign(RsaScheme::Pkcs1v15Sha256, &data).unwrap()
        );
    }

    #[test]
    fn pss_sign_and_verify() {
        let key = RsaSigningKey::from_pem(fixtures::SIGNING_KEY_PEM).unwrap();
        let data = canonical(json!({"total_amount": 1000}));
        let sig = key.sign(RsaScheme::PssSha256, &data).unwrap();
        verify_rsa(&key.public_key(), RsaScheme::PssSha256, &data, &sig).unwrap();
    }

    #[test]
    fn scheme_mismatch_fails() {
        let key = RsaSigningKey::from_pem(fixtures::SIGNING_KEY_PEM).unwrap();
        let data = canonical(json!({"a": 1}));
        let sig = key.sign(RsaScheme::Pkcs1v15Sha256, &data).unwrap();
        assert!(verify_rsa(&key.public_key(), RsaScheme::PssSha256, &data, &sig).is_err());
    }

    #[test]
    fn wrong_key_fails() {
        let key = RsaSigningKey::from_pem(fixtures::SIGNING_KEY_PEM).unwrap();
        let rogue = RsaSigningKey::from_pem(fixtures::ROGUE_KEY_PEM).unwrap();
        let data = canonical(json!({"a": 1}));
        let sig = key.sign(RsaScheme::Pkcs1v15Sha256, &data).unwrap();
        assert!(verify_rsa(&rogue.public_key(), RsaScheme::Pkcs1v15Sha256, &data, &sig).is_err());
    }

    #[test]
    fn tampered_data_fails() {
        let key = RsaSigningKey::from_pem(fixtures::SIGNING_KEY_PEM).unwrap();
        let sig = key
            .sign(RsaScheme::PssSha256, &canonical(json!({"total_amount": 1000})))
            .unwrap();
        let tampered = canonical(json!({"total_amount": 1500}));
        assert!(verify_rsa(&key.public_key(), RsaScheme::PssSha256, &tampered, &sig).is_err());
    }

    #[test]
    fn truncated_signature_fails() {
        let key = RsaSigningKey::from_pem(fixtures::SIGNING_KEY_PEM).unwrap();
        let data = canonical(json!({"a": 1}));
        let sig = key.sign(RsaScheme::Pkcs1v15Sha256, &data).unwrap();
        assert!(verify_rsa(&key.public_key(), RsaScheme::Pkcs1v15Sha256, &data, &sig[..10]).is_err());
    }

    #[test]
    fn debug_redacts_private_key() {
        let key = RsaSigningKey::from_pem(fixtures::SIGNING_KEY_PEM).unwrap();
        assert_eq!(format!("{key:?}"), "RsaSigningKey(<private>)");
    }
}
