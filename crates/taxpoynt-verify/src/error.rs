//! # Verification Error Types

use thiserror::Error;

/// Errors inside one verification run. [`VerificationService::verify_document`]
/// records these in `result.errors` and never returns them.
///
/// [`VerificationService::verify_document`]: crate::VerificationService::verify_document
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error(transparent)]
    Canonicalization(#[from] taxpoynt_core::CanonicalizationError),

    #[error(transparent)]
    Seal(#[from] taxpoynt_seal::SealError),

    #[error("seal lookup failed: {0}")]
    Repository(#[from] taxpoynt_repository::RepositoryError),

    #[error("seal generation failed: {0}")]
    Generation(String),

    #[error("failed to persist seal {0}")]
    Persistence(String),

    #[error("ledger error: {0}")]
    Ledger(String),
}

/// Errors building an [`AuthenticationSealSuite`](crate::AuthenticationSealSuite).
#[derive(Error, Debug)]
pub enum SuiteError {
    #[error("failed to read configuration {path}: {source}")]
    ConfigRead {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("invalid value for {var}: {value}")]
    InvalidEnv { var: String, value: String },

    #[error(transparent)]
    Repository(#[from] taxpoynt_repository::RepositoryError),
}
