//! # Content Digests
//!
//! Digest helpers over [`CanonicalBytes`]. The seal subsystem needs three
//! hash functions:
//!
//! - **SHA-256** — the `data_hash` embedded in every seal, checkpoint hashes,
//!   composite-layer hashes.
//! - **SHA-512** — the optional strong variant for `document_hash` seals.
//! - **MD5** — the legacy checksum carried in `integrity_seal` payloads. It is
//!   defense-in-depth only and never the primary integrity guarantee.
//!
//! ## Security Invariant
//!
//! Document digests accept only `&CanonicalBytes`. The one raw-bytes entry
//! point, [`sha256_raw_hex`], exists for hashing values that are themselves
//! already-encoded seal material (layer values, certificate DER).

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

use crate::canonical::CanonicalBytes;

/// Hash function used to produce a [`ContentDigest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestAlgorithm {
    /// SHA-256.
    Sha256,
    /// SHA-512.
    Sha512,
    /// MD5 (legacy checksum only).
    Md5,
}

impl DigestAlgorithm {
    /// Returns the algorithm identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
            Self::Md5 => "md5",
        }
    }

    /// Compute the digest of canonical bytes with this algorithm.
    pub fn digest(&self, data: &CanonicalBytes) -> ContentDigest {
        let hex = match self {
            Self::Sha256 => sha256_hex(data),
            Self::Sha512 => sha512_hex(data),
            Self::Md5 => md5_hex(data),
        };
        ContentDigest {
            algorithm: *self,
            hex,
        }
    }
}

impl std::fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A digest with its algorithm tag, rendered as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest {
    /// The hash algorithm that produced this digest.
    pub algorithm: DigestAlgorithm,
    /// Lowercase hex digest.
    pub hex: String,
}

impl ContentDigest {
    /// Borrow the hex digest.
    pub fn to_hex(&self) -> &str {
        &self.hex
    }

    /// First `n` hex characters, used for cache keys and short identifiers.
    pub fn prefix(&self, n: usize) -> &str {
        &self.hex[..n.min(self.hex.len())]
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

/// SHA-256 of canonical bytes as lowercase hex.
pub fn sha256_hex(data: &CanonicalBytes) -> String {
    hex::encode(Sha256::digest(data.as_bytes()))
}

/// SHA-512 of canonical bytes as lowercase hex.
pub fn sha512_hex(data: &CanonicalBytes) -> String {
    hex::encode(Sha512::digest(data.as_bytes()))
}

/// MD5 of canonical bytes as lowercase hex.
pub fn md5_hex(data: &CanonicalBytes) -> String {
    hex::encode(Md5::digest(data.as_bytes()))
}

/// SHA-256 of already-encoded material as lowercase hex.
pub fn sha256_raw_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sha256_known_vector() {
        // SHA-256 of the two bytes "{}".
        let cb = CanonicalBytes::new(&json!({})).unwrap();
        assert_eq!(cb.as_bytes(), b"{}");
        assert_eq!(
            sha256_hex(&cb),
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }

    #[test]
    fn md5_known_vector() {
        let cb = CanonicalBytes::new(&json!({})).unwrap();
        assert_eq!(md5_hex(&cb), "99914b932bd37a50b983c5e7c90ae93b");
    }

    #[test]
    fn digest_lengths() {
        let cb = CanonicalBytes::new(&json!({"invoice_number": "INV-001"})).unwrap();
        assert_eq!(DigestAlgorithm::Sha256.digest(&cb).hex.len(), 64);
        assert_eq!(DigestAlgorithm::Sha512.digest(&cb).hex.len(), 128);
        assert_eq!(DigestAlgorithm::Md5.digest(&cb).hex.len(), 32);
    }

    #[test]
    fn different_inputs_different_digests() {
        let a = CanonicalBytes::new(&json!({"total_amount": 1000})).unwrap();
        let b = CanonicalBytes::new(&json!({"total_amount": 1500})).unwrap();
        assert_ne!(sha256_hex(&a), sha256_hex(&b));
    }

    #[test]
    fn display_and_prefix() {
        let cb = CanonicalBytes::new(&json!({"a": 1})).unwrap();
        let digest = DigestAlgorithm::Sha256.digest(&cb);
        assert!(format!("{digest}").starts_with("sha256:"));
        assert_eq!(digest.prefix(16).len(), 16);
        assert_eq!(digest.prefix(500).len(), 64);
    }

    #[test]
    fn raw_and_canonical_agree_on_same_bytes() {
        let cb = CanonicalBytes::new(&json!({"a": 1})).unwrap();
        assert_eq!(sha256_raw_hex(cb.as_bytes()), sha256_hex(&cb));
    }
}
