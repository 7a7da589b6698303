//! Deterministic key material for tests.
//!
//! RSA-2048 keys and self-signed certificates generated once and checked in.
//! Never use these outside tests.

/// PKCS#8 PEM private key matching [`SIGNING_CERT_PEM`].
pub const SIGNING_KEY_PEM: &str = include_str!("testdata/signing_key.pem");

/// The same key as [`SIGNING_KEY_PEM`], PKCS#1 encoded.
pub const SIGNING_KEY_PKCS1_PEM: &str = include_str!("testdata/signing_key_pkcs1.pem");

/// Self-signed `CN=TaxPoynt Test Signing`, valid 2024-01-01 to 2099-12-31.
pub const SIGNING_CERT_PEM: &str = include_str!("testdata/signing_cert.pem");

/// Same subject and key as [`SIGNING_CERT_PEM`], valid only during 2020.
pub const EXPIRED_CERT_PEM: &str = include_str!("testdata/expired_cert.pem");

/// An unrelated key pair with issuer `CN=Rogue Signer`.
pub const ROGUE_KEY_PEM: &str = include_str!("testdata/rogue_key.pem");

/// Self-signed certificate for [`ROGUE_KEY_PEM`].
pub const ROGUE_CERT_PEM: &str = include_str!("testdata/rogue_cert.pem");

/// A fixed HMAC secret shared by test generators and validators.
pub const HMAC_SECRET: &str = "taxpoynt-test-hmac-secret";
