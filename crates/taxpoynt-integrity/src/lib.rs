//! # taxpoynt-integrity — Document Integrity
//!
//! Detects whether a document changed since it was sealed or checkpointed,
//! and how.
//!
//! - [`IntegrityChecker`] runs tiered checks ([`CheckLevel`]) and produces
//!   an [`IntegrityReport`] with violations and a confidence score.
//! - [`fields`] flattens JSON documents into dot-notation leaf paths and
//!   computes [`DocumentFingerprint`]s.
//! - [`forensic`] holds the line diff and the tampering-pattern detectors.
//!
//! ## Security Invariant
//!
//! Every hash is taken over [`CanonicalBytes`](taxpoynt_core::CanonicalBytes),
//! so key order and whitespace never register as tampering.

pub mod checker;
pub mod error;
pub mod fields;
pub mod forensic;
pub mod report;

pub use checker::{IntegrityChecker, IntegrityConfig};
pub use error::IntegrityError;
pub use fields::DocumentFingerprint;
pub use forensic::{ForensicAnalysis, LineDiff, PatternKind, TamperingPattern};
pub use report::{
    CheckLevel, IntegrityAnalysis, IntegrityCheckpoint, IntegrityMetrics, IntegrityReport,
    IntegrityStatus, IntegrityViolationDetail, Severity, ViolationType,
};
