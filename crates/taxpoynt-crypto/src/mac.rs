//! # HMAC Stamps
//!
//! Keyed message authentication for `cryptographic_stamp` and
//! `timestamp_seal` seals. The key is a server-held secret shared between the
//! generator and validator of one deployment.
//!
//! ## Security Invariant
//!
//! - Stamps are always compared with [`constant_time_eq`], never `==`.
//! - `HmacKey` zeroizes on drop and its `Debug` impl does not print the key.

use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha512};
use subtle::ConstantTimeEq;
use taxpoynt_core::CanonicalBytes;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Hash function underlying an HMAC stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HmacAlgorithm {
    /// HMAC-SHA256.
    Sha256,
    /// HMAC-SHA512.
    Sha512,
}

/// A server-held HMAC secret.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct HmacKey(Vec<u8>);

impl HmacKey {
    /// Number of random bytes in a generated key.
    pub const GENERATED_LEN: usize = 32;

    /// Generate a fresh random key from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; Self::GENERATED_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Wrap raw key bytes.
    ///
    /// # Errors
    ///
    /// Rejects empty keys.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self, CryptoError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(CryptoError::KeyError("HMAC key must not be empty".to_string()));
        }
        Ok(Self(bytes))
    }

    /// Parse a hex-encoded key.
    pub fn from_hex(hex_key: &str) -> Result<Self, CryptoError> {
        Self::from_bytes(hex::decode(hex_key.trim())?)
    }

    /// Interpret a configuration secret: hex if it decodes as hex, otherwise
    /// the UTF-8 bytes of the string.
    pub fn from_secret(secret: &str) -> Result<Self, CryptoError> {
        let trimmed = secret.trim();
        match hex::decode(trimmed) {
            Ok(bytes) if !bytes.is_empty() => Ok(Self(bytes)),
            _ => Self::from_bytes(trimmed.as_bytes().to_vec()),
        }
    }

    /// Short non-secret identifier for this key (first 16 hex chars of its
    /// SHA-256), suitable for `key_id` fields.
    pub fn fingerprint(&self) -> String {
        let digest = taxpoynt_core::sha256_raw_hex(&self.0);
        digest[..16].to_string()
    }

    /// Compute the hex-encoded stamp of canonical bytes.
    pub fn stamp(&self, algorithm: HmacAlgorithm, data: &CanonicalBytes) -> Result<String, CryptoError> {
        let tag = match algorithm {
            HmacAlgorithm::Sha256 => {
                let mut mac = HmacSha256::new_from_slice(&self.0)
                    .map_err(|e| CryptoError::KeyError(format!("invalid HMAC key: {e}")))?;
                mac.update(data.as_bytes());
                mac.finalize().into_bytes().to_vec()
            }
            HmacAlgorithm::Sha512 => {
                let mut mac = HmacSha512::new_from_slice(&self.0)
                    .map_err(|e| CryptoError::KeyError(format!("invalid HMAC key: {e}")))?;
                mac.update(data.as_bytes());
                mac.finalize().into_bytes().to_vec()
            }
        };
        Ok(hex::encode(tag))
    }

    /// Recompute the stamp and compare it with `stamp_hex` in constant time.
    ///
    /// Malformed hex in `stamp_hex` yields `Ok(false)` rather than an error:
    /// a garbled stamp is simply not a valid stamp.
    pub fn verify(
        &self,
        algorithm: HmacAlgorithm,
        data: &CanonicalBytes,
        stamp_hex: &str,
    ) -> Result<bool, CryptoError> {
        let expected = match hex::decode(stamp_hex.trim()) {
            Ok(bytes) => bytes,
            Err(_) => return Ok(false),
        };
        let computed = hex::decode(self.stamp(algorithm, data)?)?;
        Ok(constant_time_eq(&expected, &computed))
    }
}

impl std::fmt::Debug for HmacKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HmacKey(<{} bytes>)", self.0.len())
    }
}

/// Constant-time byte comparison.
///
/// Length mismatch returns `false` immediately; lengths of MAC tags are not
/// secret.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canonical(v: serde_json::Value) -> CanonicalBytes {
        CanonicalBytes::new(&v).unwrap()
    }

    #[test]
    fn stamp_lengths_match_algorithm() {
        let key = HmacKey::generate();
        let data = canonical(json!({"invoice_number": "INV-001"}));
        assert_eq!(key.stamp(HmacAlgorithm::Sha256, &data).unwrap().len(), 64);
        assert_eq!(key.stamp(HmacAlgorithm::Sha512, &data).unwrap().len(), 128);
    }

    #[test]
    fn verify_accepts_own_stamp() {
        let key = HmacKey::from_secret("firs-shared-secret").unwrap();
        let data = canonical(json!({"total_amount": 1000}));
        let stamp = key.stamp(HmacAlgorithm::Sha256, &data).unwrap();
        assert!(key.verify(HmacAlgorithm::Sha256, &data, &stamp).unwrap());
    }

    #[test]
    fn verify_rejects_other_key() {
        let key = HmacKey::generate();
        let other = HmacKey::generate();
        let data = canonical(json!({"total_amount": 1000}));
        let stamp = key.stamp(HmacAlgorithm::Sha512, &data).unwrap();
        assert!(!other.verify(HmacAlgorithm::Sha512, &data, &stamp).unwrap());
    }

    #[test]
    fn verify_rejects_tampered_data() {
        let key = HmacKey::generate();
        let stamp = key
            .stamp(HmacAlgorithm::Sha256, &canonical(json!({"total_amount": 1000})))
            .unwrap();
        let tampered = canonical(json!({"total_amount": 1500}));
        assert!(!key.verify(HmacAlgorithm::Sha256, &tampered, &stamp).unwrap());
    }

    #[test]
    fn verify_treats_garbage_as_invalid() {
        let key = HmacKey::generate();
        let data = canonical(json!({}));
        assert!(!key.verify(HmacAlgorithm::Sha256, &data, "zz-not-hex").unwrap());
    }

    #[test]
    fn from_secret_prefers_hex() {
        let a = HmacKey::from_secret("00ff").unwrap();
        let b = HmacKey::from_bytes(vec![0x00, 0xff]).unwrap();
        let data = canonical(json!({"a": 1}));
        assert_eq!(
            a.stamp(HmacAlgorithm::Sha256, &data).unwrap(),
            b.stamp(HmacAlgorithm::Sha256, &data).unwrap()
        );
    }

    #[test]
    fn empty_key_rejected() {
        assert!(HmacKey::from_bytes(Vec::new()).is_err());
        assert!(HmacKey::from_secret("   ").is_err());
    }

    #[test]
    fn debug_does_not_leak_key() {
        let key = HmacKey::from_secret("super-secret").unwrap();
        let debug = format!("{key:?}");
        assert!(!debug.contains("super"));
        assert_eq!(debug, "HmacKey(<12 bytes>)");
    }

    #[test]
    fn constant_time_eq_behaviour() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
