//! # Generate and Validate Subcommands
//!
//! ```bash
//! taxpoynt generate --document invoice.json --document-id INV-001 \
//!     --seal-type cryptographic_stamp --out inv-001.seal.json
//! taxpoynt validate --document invoice.json --seal inv-001.seal.json
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Args;
use taxpoynt_crypto::KeyMaterial;
use taxpoynt_seal::{SealAlgorithm, SealGenerator, SealType, StampValidator};

use crate::document::{load_config, load_document, load_seal, print_json};
use crate::EXIT_REJECTED;

/// Arguments for `generate`.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Document file (JSON, text, or binary).
    #[arg(long)]
    pub document: PathBuf,

    #[arg(long)]
    pub document_id: String,

    /// Seal type, e.g. cryptographic_stamp or digital_signature.
    #[arg(long, default_value = "composite_seal")]
    pub seal_type: SealType,

    /// Override the seal type's default algorithm.
    #[arg(long)]
    pub algorithm: Option<SealAlgorithm>,

    /// Seal lifetime in hours; 0 never expires.
    #[arg(long)]
    pub validity_hours: Option<i64>,

    /// Write the seal here instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[arg(long)]
    pub document: PathBuf,

    /// Seal file written by `generate`.
    #[arg(long)]
    pub seal: PathBuf,
}

pub fn run_generate(args: &GenerateArgs, config_path: Option<&Path>) -> Result<u8> {
    let config = load_config(config_path)?;
    let keys = Arc::new(KeyMaterial::load(&config.keys));
    let mut options = config.generator.defaults.clone();
    if args.algorithm.is_some() {
        options.algorithm = args.algorithm;
    }
    if let Some(hours) = args.validity_hours {
        options.validity_hours = hours;
    }
    let generator = SealGenerator::new(config.generator, keys);
    let payload = load_document(&args.document)?;

    let result = generator.generate_seal(&args.document_id, &payload, args.seal_type, Some(&options))?;
    let Some(seal) = result.seal else {
        bail!(
            "seal generation failed: {}",
            result.error_message.unwrap_or_else(|| "unknown error".to_string())
        );
    };
    match &args.out {
        Some(path) => {
            std::fs::write(path, serde_json::to_string_pretty(&seal)?)?;
            tracing::info!(seal_id = %seal.seal_id, path = %path.display(), "seal written");
        }
        None => print_json(&seal)?,
    }
    Ok(0)
}

pub fn run_validate(args: &ValidateArgs, config_path: Option<&Path>) -> Result<u8> {
    let config = load_config(config_path)?;
    let keys = Arc::new(KeyMaterial::load(&config.keys));
    let validator = StampValidator::new(config.validator, keys);
    let seal = load_seal(&args.seal)?;
    let payload = load_document(&args.document)?;

    let result = validator.validate_stamp(&seal, &payload);
    print_json(&result)?;
    Ok(if result.is_valid { 0 } else { EXIT_REJECTED })
}
