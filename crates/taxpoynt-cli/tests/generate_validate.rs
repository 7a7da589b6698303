//! Generate a seal to disk, then validate it, through the CLI handlers.

use std::path::{Path, PathBuf};

use taxpoynt_cli::integrity::{run_integrity, IntegrityArgs};
use taxpoynt_cli::seal::{run_generate, run_validate, GenerateArgs, ValidateArgs};
use taxpoynt_cli::EXIT_REJECTED;
use taxpoynt_crypto::fixtures;
use taxpoynt_integrity::CheckLevel;
use taxpoynt_seal::SealType;

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn config(dir: &Path) -> PathBuf {
    write(
        dir,
        "suite.yaml",
        &format!("keys:\n  hmac_secret: {}\n", fixtures::HMAC_SECRET),
    )
}

#[test]
fn generated_seal_validates_until_the_document_changes() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let original = write(dir.path(), "inv.json", r#"{"invoice_number": "INV-001", "total_amount": 1000}"#);
    let altered = write(dir.path(), "inv2.json", r#"{"invoice_number": "INV-001", "total_amount": 1500}"#);
    let seal = dir.path().join("inv.seal.json");

    let code = run_generate(
        &GenerateArgs {
            document: original.clone(),
            document_id: "INV-001".into(),
            seal_type: SealType::CryptographicStamp,
            algorithm: None,
            validity_hours: None,
            out: Some(seal.clone()),
        },
        Some(&config),
    )
    .unwrap();
    assert_eq!(code, 0);
    assert!(seal.exists());

    let ok = run_validate(&ValidateArgs { document: original, seal: seal.clone() }, Some(&config)).unwrap();
    assert_eq!(ok, 0);

    let rejected = run_validate(&ValidateArgs { document: altered, seal }, Some(&config)).unwrap();
    assert_eq!(rejected, EXIT_REJECTED);
}

#[test]
fn signature_seal_without_private_key_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let doc = write(dir.path(), "inv.json", r#"{"invoice_number": "INV-001"}"#);

    let result = run_generate(
        &GenerateArgs {
            document: doc,
            document_id: "INV-001".into(),
            seal_type: SealType::DigitalSignature,
            algorithm: None,
            validity_hours: None,
            out: Some(dir.path().join("never.json")),
        },
        Some(&config),
    );
    assert!(result.is_err());
    assert!(!dir.path().join("never.json").exists());
}

#[test]
fn integrity_exit_code_reflects_changes() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let a = write(dir.path(), "a.json", r#"{"invoice_number": "A", "total_amount": 100}"#);
    let b = write(dir.path(), "b.json", r#"{"invoice_number": "A", "total_amount": 200}"#);

    let args = |current: &PathBuf| IntegrityArgs {
        current: current.clone(),
        document_id: "A".into(),
        reference: Some(a.clone()),
        level: CheckLevel::Standard,
        seals: Vec::new(),
    };
    assert_eq!(run_integrity(&args(&a), Some(&config)).unwrap(), 0);
    assert_eq!(run_integrity(&args(&b), Some(&config)).unwrap(), EXIT_REJECTED);
}
