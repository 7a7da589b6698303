//! # Seal Envelope Codec
//!
//! The `seal_value` of an [`AuthenticationSeal`](crate::AuthenticationSeal)
//! is the base64 encoding of a canonical JSON object, the *envelope*. Each
//! seal type has a fixed set of envelope keys:
//!
//! | Seal type | Required keys | Optional |
//! |---|---|---|
//! | `digital_signature` | `signature`, `payload` | `certificate` |
//! | `cryptographic_stamp` | `stamp`, `payload` | |
//! | `document_hash` | `hash`, `payload` | |
//! | `timestamp_seal` | `timestamp_token`, `payload` | |
//! | `integrity_seal` | `signature`, `payload` | `certificate` |
//! | `composite_seal` | `layers`, `composite_hash`, `payload` | |
//!
//! `payload` always carries `seal_type`, `document_id`, `data_hash`, and
//! `algorithm` ([`SealPayload`]). The signature, stamp, or hash covers the
//! canonical bytes of `payload` exactly as they appear in the envelope.
//!
//! ## Security Invariant
//!
//! An envelope whose keys do not match its declared type, or whose
//! `payload.seal_type` differs from the declared type, is rejected as
//! malformed. Decoding never repairs a structure.
//!
//! ## Wire form
//!
//! Canonical JSON, optionally zlib-compressed, then base64 (standard with
//! padding, or URL-safe without). Decoding accepts either alphabet and
//! detects compression by the first byte: plain JSON always starts with `{`.

use std::io::{Read, Write};

use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use taxpoynt_core::CanonicalBytes;

use crate::error::SealError;
use crate::seal::{SealAlgorithm, SealEncoding, SealType};

/// Upper bound on a decompressed envelope.
const MAX_DECODED_LEN: u64 = 16 * 1024 * 1024;

/// Layer order inside a composite seal. The composite hash concatenates
/// layers in this order.
pub const COMPOSITE_LAYER_ORDER: [SealType; 3] = [
    SealType::DocumentHash,
    SealType::CryptographicStamp,
    SealType::DigitalSignature,
];

// ---------------------------------------------------------------------------
// SealPayload
// ---------------------------------------------------------------------------

/// The signed/stamped/hashed part of an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SealPayload {
    pub seal_type: SealType,
    pub document_id: String,
    /// SHA-256 of the canonical document.
    pub data_hash: String,
    pub algorithm: SealAlgorithm,
    /// ISO8601 UTC generation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    /// Random hex nonce (`cryptographic_stamp`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Unix seconds matching `timestamp` (`timestamp_seal`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unix_timestamp: Option<i64>,
    /// Canonical document length (`integrity_seal`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_size: Option<usize>,
    /// MD5 of the canonical document (`integrity_seal`). Legacy checksum,
    /// not an integrity guarantee.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum_md5: Option<String>,
    /// Layers present in a `composite_seal`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_types: Option<Vec<SealType>>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub additional_claims: Map<String, Value>,
}

impl SealPayload {
    pub fn new(
        seal_type: SealType,
        document_id: impl Into<String>,
        data_hash: impl Into<String>,
        algorithm: SealAlgorithm,
    ) -> Self {
        Self {
            seal_type,
            document_id: document_id.into(),
            data_hash: data_hash.into(),
            algorithm,
            timestamp: None,
            expires_at: None,
            issuer: None,
            key_id: None,
            nonce: None,
            unix_timestamp: None,
            document_size: None,
            checksum_md5: None,
            layer_types: None,
            additional_claims: Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// SealEnvelope
// ---------------------------------------------------------------------------

/// A decoded envelope whose shape has been checked against its seal type.
#[derive(Debug, Clone, PartialEq)]
pub struct SealEnvelope {
    seal_type: SealType,
    body: Map<String, Value>,
}

impl SealEnvelope {
    /// Wrap an envelope body, checking its shape.
    pub fn from_body(seal_type: SealType, body: Map<String, Value>) -> Result<Self, SealError> {
        check_shape(seal_type, &body)?;
        Ok(Self { seal_type, body })
    }

    /// Decode a `seal_value` declared to be of `declared` type.
    pub fn decode(seal_value: &str, declared: SealType) -> Result<Self, SealError> {
        let raw = decode_text(seal_value.trim())?;
        let json = if raw.first() == Some(&b'{') {
            raw
        } else {
            let mut out = Vec::new();
            ZlibDecoder::new(raw.as_slice())
                .take(MAX_DECODED_LEN)
                .read_to_end(&mut out)
                .map_err(|e| SealError::malformed(format!("seal value is neither JSON nor zlib: {e}")))?;
            out
        };
        match serde_json::from_slice::<Value>(&json) {
            Ok(Value::Object(body)) => Self::from_body(declared, body),
            Ok(_) => Err(SealError::malformed("seal envelope is not a JSON object")),
            Err(e) => Err(SealError::malformed(format!("seal envelope is not valid JSON: {e}"))),
        }
    }

    /// Encode to the `seal_value` text form.
    pub fn encode(&self, compression: bool, encoding: SealEncoding) -> Result<String, SealError> {
        let canonical = CanonicalBytes::new(&self.body)?;
        let bytes = if compression {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(canonical.as_bytes())?;
            encoder.finish()?
        } else {
            canonical.into_bytes()
        };
        Ok(match encoding {
            SealEncoding::Base64 => STANDARD.encode(bytes),
            SealEncoding::Base64Url => URL_SAFE_NO_PAD.encode(bytes),
        })
    }

    pub fn seal_type(&self) -> SealType {
        self.seal_type
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    /// The raw payload object, exactly as signed.
    pub fn payload_value(&self) -> &Value {
        // Presence is guaranteed by `check_shape`.
        self.body.get("payload").unwrap_or(&Value::Null)
    }

    /// Canonical bytes of the payload: the signing/stamping input.
    pub fn payload_bytes(&self) -> Result<CanonicalBytes, SealError> {
        Ok(CanonicalBytes::new(self.payload_value())?)
    }

    /// Typed view of the payload.
    pub fn payload(&self) -> Result<SealPayload, SealError> {
        serde_json::from_value(self.payload_value().clone())
            .map_err(|e| SealError::malformed(format!("seal payload fields invalid: {e}")))
    }

    /// A required string field of the envelope (`signature`, `stamp`, ...).
    pub fn string_field(&self, key: &str) -> Result<&str, SealError> {
        self.body
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| SealError::malformed(format!("envelope field '{key}' missing or not a string")))
    }

    /// Embedded PEM certificate, if any.
    pub fn certificate_pem(&self) -> Option<&str> {
        self.body.get("certificate").and_then(Value::as_str)
    }

    /// The layers of a composite envelope, in [`COMPOSITE_LAYER_ORDER`].
    /// Empty for any other type.
    pub fn layers(&self) -> Result<Vec<SealEnvelope>, SealError> {
        let Some(layers) = self.body.get("layers").and_then(Value::as_object) else {
            return Ok(Vec::new());
        };
        COMPOSITE_LAYER_ORDER
            .iter()
            .filter_map(|t| layers.get(t.as_str()).map(|v| (*t, v)))
            .map(|(t, v)| match v {
                Value::Object(body) => Self::from_body(t, body.clone()),
                _ => Err(SealError::malformed(format!("layer '{t}' is not an object"))),
            })
            .collect()
    }
}

/// SHA-256 over the concatenated canonical bytes of each layer, in the
/// order given.
pub fn composite_hash(layers: &[SealEnvelope]) -> Result<String, SealError> {
    let mut concatenated = Vec::new();
    for layer in layers {
        concatenated.extend_from_slice(CanonicalBytes::new(layer.body())?.as_bytes());
    }
    Ok(taxpoynt_core::sha256_raw_hex(&concatenated))
}

fn decode_text(text: &str) -> Result<Vec<u8>, SealError> {
    if text.is_empty() {
        return Err(SealError::malformed("seal value is empty"));
    }
    STANDARD
        .decode(text)
        .or_else(|_| URL_SAFE_NO_PAD.decode(text))
        .or_else(|_| URL_SAFE.decode(text))
        .map_err(|e| SealError::malformed(format!("seal value is not base64: {e}")))
}

fn envelope_keys(seal_type: SealType) -> (&'static [&'static str], &'static [&'static str]) {
    match seal_type {
        SealType::DigitalSignature | SealType::IntegritySeal => {
            (&["signature", "payload"], &["certificate"])
        }
        SealType::CryptographicStamp => (&["stamp", "payload"], &[]),
        SealType::DocumentHash => (&["hash", "payload"], &[]),
        SealType::TimestampSeal => (&["timestamp_token", "payload"], &[]),
        SealType::CompositeSeal => (&["layers", "composite_hash", "payload"], &[]),
    }
}

fn check_shape(seal_type: SealType, body: &Map<String, Value>) -> Result<(), SealError> {
    let (required, optional) = envelope_keys(seal_type);
    for key in required {
        if !body.contains_key(*key) {
            return Err(SealError::malformed(format!(
                "{seal_type} envelope is missing '{key}'"
            )));
        }
    }
    if let Some(extra) = body
        .keys()
        .find(|k| !required.contains(&k.as_str()) && !optional.contains(&k.as_str()))
    {
        return Err(SealError::malformed(format!(
            "{seal_type} envelope has unexpected key '{extra}'"
        )));
    }

    for (key, value) in body {
        let ok = match key.as_str() {
            "payload" | "layers" => value.is_object(),
            _ => value.is_string(),
        };
        if !ok {
            return Err(SealError::malformed(format!(
                "{seal_type} envelope field '{key}' has the wrong JSON type"
            )));
        }
    }

    let declared = body
        .get("payload")
        .and_then(|p| p.get("seal_type"))
        .and_then(Value::as_str);
    if declared != Some(seal_type.as_str()) {
        return Err(SealError::malformed(format!(
            "payload seal_type {declared:?} does not match declared type {seal_type}"
        )));
    }

    if seal_type == SealType::CompositeSeal {
        if let Some(layers) = body.get("layers").and_then(Value::as_object) {
            if let Some(unknown) = layers
                .keys()
                .find(|k| !COMPOSITE_LAYER_ORDER.iter().any(|t| t.as_str() == k.as_str()))
            {
                return Err(SealError::malformed(format!("unknown composite layer '{unknown}'")));
            }
            for required_layer in [SealType::DocumentHash, SealType::CryptographicStamp] {
                if !layers.contains_key(required_layer.as_str()) {
                    return Err(SealError::malformed(format!(
                        "composite seal is missing the {required_layer} layer"
                    )));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    fn hash_envelope() -> SealEnvelope {
        SealEnvelope::from_body(
            SealType::DocumentHash,
            body(json!({
                "hash": "abc",
                "payload": {"seal_type": "document_hash", "document_id": "INV-1",
                            "data_hash": "abc", "algorithm": "sha256"}
            })),
        )
        .unwrap()
    }

    #[test]
    fn encode_decode_plain_and_compressed() {
        let env = hash_envelope();
        for compression in [false, true] {
            for encoding in [SealEncoding::Base64, SealEncoding::Base64Url] {
                let text = env.encode(compression, encoding).unwrap();
                let decoded = SealEnvelope::decode(&text, SealType::DocumentHash).unwrap();
                assert_eq!(decoded, env);
            }
        }
    }

    #[test]
    fn encoding_is_canonical() {
        let text = hash_envelope().encode(false, SealEncoding::Base64).unwrap();
        let raw = STANDARD.decode(text).unwrap();
        let s = String::from_utf8(raw).unwrap();
        assert!(s.starts_with(r#"{"hash":"abc","payload":{"algorithm":"sha256""#));
    }

    #[test]
    fn declared_type_mismatch_is_malformed() {
        let text = hash_envelope().encode(false, SealEncoding::Base64).unwrap();
        let err = SealEnvelope::decode(&text, SealType::CryptographicStamp).unwrap_err();
        assert!(matches!(err, SealError::Malformed(_)));
    }

    #[test]
    fn payload_type_mismatch_is_malformed() {
        let err = SealEnvelope::from_body(
            SealType::CryptographicStamp,
            body(json!({"stamp": "00", "payload": {"seal_type": "document_hash"}})),
        )
        .unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn unexpected_key_is_malformed() {
        let err = SealEnvelope::from_body(
            SealType::DocumentHash,
            body(json!({"hash": "a", "extra": "b", "payload": {"seal_type": "document_hash"}})),
        )
        .unwrap_err();
        assert!(err.to_string().contains("unexpected key 'extra'"));
    }

    #[test]
    fn wrong_field_type_is_malformed() {
        assert!(SealEnvelope::from_body(
            SealType::DocumentHash,
            body(json!({"hash": 7, "payload": {"seal_type": "document_hash"}})),
        )
        .is_err());
    }

    #[test]
    fn garbage_values_are_malformed() {
        for text in ["", "!!!not base64!!!", "aGVsbG8=" /* "hello" */, "WzEsMl0=" /* [1,2] */] {
            assert!(
                matches!(SealEnvelope::decode(text, SealType::DocumentHash), Err(SealError::Malformed(_))),
                "{text}"
            );
        }
    }

    #[test]
    fn composite_requires_hash_and_stamp_layers() {
        let err = SealEnvelope::from_body(
            SealType::CompositeSeal,
            body(json!({
                "layers": {"document_hash": {"hash": "a", "payload": {"seal_type": "document_hash"}}},
                "composite_hash": "x",
                "payload": {"seal_type": "composite_seal"}
            })),
        )
        .unwrap_err();
        assert!(err.to_string().contains("cryptographic_stamp"));
    }

    #[test]
    fn composite_hash_depends_on_every_layer() {
        let a = hash_envelope();
        let mut altered_body = a.body().clone();
        altered_body.insert("hash".into(), json!("abd"));
        let b = SealEnvelope::from_body(SealType::DocumentHash, altered_body).unwrap();
        assert_ne!(
            composite_hash(&[a.clone()]).unwrap(),
            composite_hash(&[b]).unwrap()
        );
        assert_eq!(composite_hash(&[a.clone()]).unwrap(), composite_hash(&[a]).unwrap());
    }

    #[test]
    fn payload_parses_typed_view() {
        let payload = hash_envelope().payload().unwrap();
        assert_eq!(payload.seal_type, SealType::DocumentHash);
        assert_eq!(payload.algorithm, SealAlgorithm::Sha256);
        assert!(payload.timestamp.is_none());
    }
}
