//! # Verify Subcommand
//!
//! Runs the verification service over a document. Seals come from
//! `--seal` files, or from the repository when `DATABASE_URL` points at a
//! seal database.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use taxpoynt_verify::{create_authentication_seal_suite, VerificationContext, VerificationLevel};

use crate::document::{load_config, load_document, load_seal, print_json};
use crate::EXIT_REJECTED;

#[derive(Args, Debug)]
pub struct VerifyArgs {
    #[arg(long)]
    pub document: PathBuf,

    #[arg(long)]
    pub document_id: String,

    /// basic, standard, comprehensive, forensic or blockchain.
    #[arg(long, default_value = "standard")]
    pub level: VerificationLevel,

    #[arg(long)]
    pub reference: Option<PathBuf>,

    #[arg(long = "seal")]
    pub seals: Vec<PathBuf>,

    /// Ledger lookup bound in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Print the full result instead of the summary.
    #[arg(long)]
    pub full: bool,
}

pub async fn run_verify(args: &VerifyArgs, config_path: Option<&Path>) -> Result<u8> {
    let mut config = load_config(config_path)?;
    // One-shot runs gain nothing from periodic cleanup or backup.
    config.repository.enable_background_tasks = false;
    let suite = create_authentication_seal_suite(config, None).await?;

    let mut context = VerificationContext::new(&args.document_id, load_document(&args.document)?, args.level);
    if let Some(reference) = &args.reference {
        context = context.with_reference(load_document(reference)?);
    }
    if !args.seals.is_empty() {
        context = context.with_seals(args.seals.iter().map(|p| load_seal(p)).collect::<Result<Vec<_>>>()?);
    }
    if let Some(secs) = args.timeout_secs {
        context = context.with_timeout(Duration::from_secs(secs));
    }

    let service = &suite.verification_service;
    let result = service.verify_document(&context).await;
    if args.full {
        print_json(&result)?;
    } else {
        print_json(&service.get_verification_summary(&result))?;
    }
    suite.shutdown().await;
    Ok(if result.is_authentic() { 0 } else { EXIT_REJECTED })
}
