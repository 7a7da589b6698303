//! Input loading shared by every subcommand.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use taxpoynt_core::DocumentPayload;
use taxpoynt_seal::AuthenticationSeal;
use taxpoynt_verify::SuiteConfig;

/// Read a document file. JSON files become structured payloads, other
/// UTF-8 files text, anything else binary.
pub fn load_document(path: &Path) -> Result<DocumentPayload> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read document {}", path.display()))?;
    Ok(payload_from_bytes(bytes))
}

pub fn payload_from_bytes(bytes: Vec<u8>) -> DocumentPayload {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&bytes) {
        return DocumentPayload::structured(value);
    }
    match String::from_utf8(bytes) {
        Ok(text) => DocumentPayload::text(text),
        Err(e) => DocumentPayload::binary(e.into_bytes()),
    }
}

/// Read a seal previously written by `generate`.
pub fn load_seal(path: &Path) -> Result<AuthenticationSeal> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read seal {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not a seal record", path.display()))
}

/// YAML config (when given) with environment overrides applied.
pub fn load_config(path: Option<&Path>) -> Result<SuiteConfig> {
    let config = match path {
        Some(path) => SuiteConfig::from_yaml_file(path)?,
        None => SuiteConfig::default(),
    };
    Ok(config.from_env()?)
}

/// Pretty JSON to stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_kind_follows_content() {
        assert!(matches!(payload_from_bytes(br#"{"a":1}"#.to_vec()), DocumentPayload::Structured(_)));
        assert!(matches!(payload_from_bytes(b"plain invoice".to_vec()), DocumentPayload::Text(_)));
        assert!(matches!(payload_from_bytes(vec![0xff, 0x00, 0xfe]), DocumentPayload::Binary(_)));
    }

    #[test]
    fn missing_document_names_the_path() {
        let err = load_document(Path::new("/nonexistent/invoice.json")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/invoice.json"));
    }
}
