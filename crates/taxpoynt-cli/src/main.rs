//! # taxpoynt CLI entry point
//!
//! Parses arguments, sets up tracing and dispatches to the subcommand
//! handlers in `taxpoynt_cli`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use taxpoynt_cli::integrity::{run_integrity, IntegrityArgs};
use taxpoynt_cli::seal::{run_generate, run_validate, GenerateArgs, ValidateArgs};
use taxpoynt_cli::verify::{run_verify, VerifyArgs};

/// TaxPoynt authentication seals.
///
/// Generates and validates document seals, checks document integrity and
/// runs tiered authenticity verification.
#[derive(Parser, Debug)]
#[command(name = "taxpoynt", version, about, long_about = None)]
struct Cli {
    /// Verbose logging. Repeat for more (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json: bool,

    /// YAML suite configuration.
    #[arg(long, global = true, env = "TAXPOYNT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a seal for a document.
    Generate(GenerateArgs),

    /// Validate a seal against a document.
    Validate(ValidateArgs),

    /// Compare a document with a reference copy.
    Integrity(IntegrityArgs),

    /// Verify document authenticity.
    Verify(VerifyArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        })
    });
    // Logs go to stderr so stdout stays parseable JSON.
    if cli.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let config = cli.config.as_deref();
    let result = match &cli.command {
        Commands::Generate(args) => run_generate(args, config),
        Commands::Validate(args) => run_validate(args, config),
        Commands::Integrity(args) => run_integrity(args, config),
        Commands::Verify(args) => run_verify(args, config).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxpoynt_integrity::CheckLevel;
    use taxpoynt_seal::SealType;
    use taxpoynt_verify::VerificationLevel;

    #[test]
    fn parse_seal_generate() {
        let cli = Cli::try_parse_from([
            "taxpoynt",
            "generate",
            "--document",
            "inv.json",
            "--document-id",
            "INV-001",
            "--seal-type",
            "cryptographic_stamp",
        ])
        .unwrap();
        let Commands::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.seal_type, SealType::CryptographicStamp);
        assert!(args.algorithm.is_none());
        assert!(args.out.is_none());
    }

    #[test]
    fn parse_rejects_unknown_seal_type() {
        assert!(Cli::try_parse_from([
            "taxpoynt",
            "generate",
            "--document",
            "inv.json",
            "--document-id",
            "INV-001",
            "--seal-type",
            "wax",
        ])
        .is_err());
    }

    #[test]
    fn parse_integrity_defaults() {
        let cli = Cli::try_parse_from(["taxpoynt", "integrity", "--current", "a.json"]).unwrap();
        let Commands::Integrity(args) = cli.command else {
            panic!("expected integrity");
        };
        assert_eq!(args.level, CheckLevel::Standard);
        assert!(args.reference.is_none());
        assert!(args.seals.is_empty());
    }

    #[test]
    fn parse_verify_with_global_flags() {
        let cli = Cli::try_parse_from([
            "taxpoynt",
            "verify",
            "--document",
            "a.json",
            "--document-id",
            "A",
            "--level",
            "forensic",
            "--seal",
            "s1.json",
            "--seal",
            "s2.json",
            "-vv",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.json);
        let Commands::Verify(args) = cli.command else {
            panic!("expected verify");
        };
        assert_eq!(args.level, VerificationLevel::Forensic);
        assert_eq!(args.seals.len(), 2);
    }
}
