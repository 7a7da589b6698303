//! # Integrity Subcommand
//!
//! Compares a document against a reference copy and prints the
//! [`IntegrityReport`](taxpoynt_integrity::IntegrityReport).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use taxpoynt_crypto::KeyMaterial;
use taxpoynt_integrity::{CheckLevel, IntegrityChecker};
use taxpoynt_seal::StampValidator;

use crate::document::{load_config, load_document, load_seal, print_json};
use crate::EXIT_REJECTED;

#[derive(Args, Debug)]
pub struct IntegrityArgs {
    /// Document to check.
    #[arg(long)]
    pub current: PathBuf,

    #[arg(long, default_value = "document")]
    pub document_id: String,

    /// Trusted copy to compare against.
    #[arg(long)]
    pub reference: Option<PathBuf>,

    /// basic, standard, comprehensive or forensic.
    #[arg(long, default_value = "standard")]
    pub level: CheckLevel,

    /// Seal files to validate alongside the content checks.
    #[arg(long = "seal")]
    pub seals: Vec<PathBuf>,
}

pub fn run_integrity(args: &IntegrityArgs, config_path: Option<&Path>) -> Result<u8> {
    let config = load_config(config_path)?;
    let keys = Arc::new(KeyMaterial::load(&config.keys));
    let validator = Arc::new(StampValidator::new(config.validator, keys));
    let checker = IntegrityChecker::new(config.integrity, Some(validator));

    let current = load_document(&args.current)?;
    let reference = args.reference.as_deref().map(load_document).transpose()?;
    let seals = args.seals.iter().map(|p| load_seal(p)).collect::<Result<Vec<_>>>()?;

    let report = checker.verify_document_integrity(&args.document_id, &current, reference.as_ref(), &seals, args.level);
    print_json(&report)?;
    Ok(if report.is_intact { 0 } else { EXIT_REJECTED })
}
