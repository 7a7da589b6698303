//! # taxpoynt-crypto — Cryptographic Primitives for Seals
//!
//! This crate provides the cryptographic building blocks the seal generator
//! and stamp validator are assembled from:
//!
//! - **RSA signatures** ([`RsaSigningKey`], [`verify_rsa`]) in PKCS#1 v1.5
//!   and PSS form, both over SHA-256.
//! - **HMAC stamps** ([`HmacKey`]) over SHA-256 or SHA-512, verified in
//!   constant time.
//! - **X.509 inspection** ([`CertificateInfo`]) and trust evaluation
//!   ([`TrustStore`]): validity window, revocation, trusted issuers.
//! - **Key material loading** ([`KeyMaterial`]) that degrades instead of
//!   failing when the private key or certificate is unavailable.
//!
//! ## Security Invariant
//!
//! Every signing and stamping input is `&CanonicalBytes`. You cannot sign a
//! payload that did not go through the canonicalization pipeline.

pub mod certificate;
pub mod error;
pub mod keys;
pub mod mac;
pub mod signing;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

// Re-export primary types.
pub use certificate::{CertificateInfo, CertificateRejection, TrustStore};
pub use error::CryptoError;
pub use keys::{KeyMaterial, KeySource};
pub use mac::{constant_time_eq, HmacAlgorithm, HmacKey};
pub use signing::{verify_rsa, RsaScheme, RsaSigningKey};
