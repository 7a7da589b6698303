//! # Error Types — Structured Error Hierarchy
//!
//! Defines the foundational error types shared by the seal subsystem. All
//! errors use `thiserror` for derive-based `Display` and `Error`
//! implementations.
//!
//! ## Design
//!
//! - Canonicalization errors carry the serializer's diagnostic.
//! - Integrity errors include the expected vs actual values.
//! - Component crates wrap these in their own error enums; none of them is
//!   ever surfaced past a public seal/validation/verification operation.

use thiserror::Error;

/// Top-level error type for the foundational layer.
#[derive(Error, Debug)]
pub enum TaxpoyntError {
    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// Content integrity violation.
    #[error("integrity error: expected {expected}, got {actual}")]
    Integrity {
        /// The value that was expected.
        expected: String,
        /// The value that was observed.
        actual: String,
    },

    /// A timestamp string could not be parsed or was not UTC.
    #[error("invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp {
        /// The rejected input.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_display_carries_both_sides() {
        let err = TaxpoyntError::Integrity {
            expected: "abc".to_string(),
            actual: "def".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("abc"));
        assert!(msg.contains("def"));
    }

    #[test]
    fn invalid_timestamp_display() {
        let err = TaxpoyntError::InvalidTimestamp {
            value: "yesterday".to_string(),
            reason: "not RFC 3339".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("yesterday"));
        assert!(msg.contains("not RFC 3339"));
    }

    #[test]
    fn canonicalization_wraps_serde_error() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = TaxpoyntError::from(CanonicalizationError::from(serde_err));
        assert!(format!("{err}").starts_with("canonicalization error"));
    }
}
