//! # Cryptographic Error Types
//!
//! Structured errors for all cryptographic operations in `taxpoynt-crypto`.

use thiserror::Error;

/// Errors from cryptographic operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Signature verification failed.
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),

    /// Key parsing or construction failed.
    #[error("key error: {0}")]
    KeyError(String),

    /// Signing operation failed.
    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// Certificate could not be parsed or encoded.
    #[error("certificate error: {0}")]
    Certificate(String),

    /// Hex decoding error.
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    /// Canonicalization of the signing input failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] taxpoynt_core::CanonicalizationError),

    /// I/O error while reading key or certificate files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
