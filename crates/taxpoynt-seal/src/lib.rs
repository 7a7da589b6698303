//! # taxpoynt-seal — Authentication Seals
//!
//! Creation and validation of the cryptographic seals attached to TaxPoynt
//! e-invoices.
//!
//! - [`SealGenerator`] turns a [`DocumentPayload`](taxpoynt_core::DocumentPayload)
//!   into an [`AuthenticationSeal`] of one of six [`SealType`]s.
//! - [`StampValidator`] re-derives a seal from the original document and
//!   reports a [`ValidationResult`].
//! - [`envelope`] defines the encoded structure inside `seal_value`.
//!
//! ## Crate Policy
//!
//! Validation never raises. Generation raises only for a seal type /
//! algorithm combination that cannot exist; every other failure is a
//! reported result.

pub mod envelope;
pub mod error;
pub mod generator;
pub mod seal;
pub mod validator;

pub use envelope::{SealEnvelope, SealPayload};
pub use error::SealError;
pub use generator::{GeneratorConfig, SealGenerator};
pub use seal::{
    AuthenticationSeal, GenerationMetrics, SealAlgorithm, SealConfiguration, SealEncoding,
    SealGenerationResult, SealMetadata, SealStatus, SealType, VerificationData,
};
pub use validator::{
    status_for, StampValidator, ValidationError, ValidationMetrics, ValidationResult,
    ValidationStatus, ValidatorConfig,
};
