//! # taxpoynt-core — Foundational Types for the Seal Subsystem
//!
//! Every other crate in the workspace depends on `taxpoynt-core`; it depends
//! on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **One document representation.** Invoices arrive as JSON objects, raw
//!    text, or opaque bytes. [`DocumentPayload`] is the single sum type for
//!    all three, so no component has to guess what it was handed.
//!
//! 2. **`CanonicalBytes` is the only hashing input.** Seal generation, stamp
//!    validation, and integrity checking all hash the bytes produced by
//!    [`CanonicalBytes::from_payload`]. If two call sites canonicalized
//!    differently every round trip would break, so there is exactly one path.
//!
//! 3. **UTC-only timestamps.** [`Timestamp`] carries UTC with seconds
//!    precision, matching what gets embedded in seal payloads.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `taxpoynt-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use canonical::{CanonicalBytes, DocumentPayload};
pub use digest::{md5_hex, sha256_hex, sha256_raw_hex, sha512_hex, ContentDigest, DigestAlgorithm};
pub use error::{CanonicalizationError, TaxpoyntError};
pub use temporal::Timestamp;
