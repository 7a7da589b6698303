//! # Seal Error Types

use thiserror::Error;

use crate::seal::{SealAlgorithm, SealType};

/// Errors from seal generation and envelope decoding.
///
/// Only [`SealError::UnsupportedAlgorithm`] escapes
/// [`SealGenerator::generate_seal`](crate::SealGenerator::generate_seal);
/// everything else is folded into the returned result.
#[derive(Error, Debug)]
pub enum SealError {
    /// The requested algorithm cannot produce the requested seal type.
    #[error("algorithm {algorithm} is not supported for seal type {seal_type}")]
    UnsupportedAlgorithm {
        seal_type: SealType,
        algorithm: SealAlgorithm,
    },

    /// Key material required by the seal type is not loaded.
    #[error("key not available: {0}")]
    KeyUnavailable(String),

    /// The seal value does not decode to the structure its type requires.
    #[error("malformed seal: {0}")]
    Malformed(String),

    /// Underlying cryptographic failure.
    #[error(transparent)]
    Crypto(#[from] taxpoynt_crypto::CryptoError),

    /// Canonicalization of a document or payload failed.
    #[error(transparent)]
    Canonicalization(#[from] taxpoynt_core::CanonicalizationError),

    /// JSON (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Compression or decompression failed.
    #[error("compression error: {0}")]
    Compression(#[from] std::io::Error),
}

impl SealError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}
