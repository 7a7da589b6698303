//! # taxpoynt-cli — Seal Command-Line Interface
//!
//! ## Subcommands
//!
//! - `generate` / `validate`: produce a seal for a document, or check a
//!   stored seal against one
//! - `integrity`: compare a current document with its reference at a check level
//! - `verify`: tiered authenticity verification
//!
//! Handlers print JSON to stdout and return the process exit code: 0 on
//! success, 2 when the document failed the check, 1 on errors.
//!
//! ## Keys
//!
//! Key material comes from the `--config` YAML and the `TAXPOYNT_*`
//! environment variables (see [`taxpoynt_verify::SuiteConfig`]). Without an
//! HMAC secret an ephemeral key is generated, so stamps made in one
//! invocation will not validate in the next.

pub mod document;
pub mod integrity;
pub mod seal;
pub mod verify;

/// Exit code for a document that failed its check.
pub const EXIT_REJECTED: u8 = 2;
