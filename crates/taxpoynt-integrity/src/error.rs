//! # Integrity Error Types

use thiserror::Error;

/// Errors from checkpoint creation and fingerprinting.
///
/// [`IntegrityChecker::verify_document_integrity`](crate::IntegrityChecker::verify_document_integrity)
/// does not return these; it folds them into an `UNKNOWN` report.
#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error(transparent)]
    Canonicalization(#[from] taxpoynt_core::CanonicalizationError),

    #[error("document id must not be empty")]
    EmptyDocumentId,
}
