//! # taxpoynt-verify — Document Authenticity Verification
//!
//! The top of the seal stack. [`VerificationService`] turns seals,
//! integrity reports and ledger records into weighted evidence and one
//! [`AuthenticityStatus`] verdict. [`create_authentication_seal_suite`]
//! builds every component from a single [`SuiteConfig`].
//!
//! ## Crate Map
//!
//! ```text
//! taxpoynt-core ─┬─ taxpoynt-crypto ── taxpoynt-seal ─┬─ taxpoynt-integrity ─┐
//!                │                                    └─ taxpoynt-repository ┴─ taxpoynt-verify
//! ```

pub mod error;
pub mod ledger;
pub mod model;
pub mod service;
pub mod suite;

pub use error::{SuiteError, VerificationError};
pub use ledger::{BlockchainLedger, InMemoryLedger, LedgerRecord};
pub use model::{
    weighted_confidence, AuthenticityStatus, ServiceStats, VerificationAudit, VerificationContext,
    VerificationEvidence, VerificationLevel, VerificationMethod, VerificationPolicy, VerificationResult,
    VerificationSummary,
};
pub use service::{VerificationConfig, VerificationService};
pub use suite::{create_authentication_seal_suite, AuthenticationSealSuite, SuiteConfig};
