//! # Seal Lifecycle
//!
//! Generation and validation across the core, crypto and seal crates with
//! the checked-in RSA fixtures.

use std::sync::Arc;

use chrono::{Duration, Utc};
use proptest::prelude::*;
use serde_json::json;
use taxpoynt_core::DocumentPayload;
use taxpoynt_crypto::{fixtures, CertificateInfo, HmacKey, KeyMaterial, RsaSigningKey};
use taxpoynt_seal::{
    AuthenticationSeal, GeneratorConfig, SealEncoding, SealEnvelope, SealGenerator, SealType, StampValidator,
    ValidationError, ValidationStatus, ValidatorConfig,
};

fn keys() -> Arc<KeyMaterial> {
    Arc::new(KeyMaterial::from_parts(
        Some(RsaSigningKey::from_pem(fixtures::SIGNING_KEY_PEM).unwrap()),
        Some(CertificateInfo::from_pem(fixtures::SIGNING_CERT_PEM).unwrap()),
        HmacKey::from_secret(fixtures::HMAC_SECRET).unwrap(),
        Some("test-key".to_string()),
    ))
}

fn generator() -> SealGenerator {
    SealGenerator::new(GeneratorConfig::default(), keys())
}

fn validator() -> StampValidator {
    let issuer = CertificateInfo::from_pem(fixtures::SIGNING_CERT_PEM).unwrap().issuer;
    StampValidator::new(
        ValidatorConfig {
            trusted_issuers: vec![issuer],
            ..ValidatorConfig::default()
        },
        keys(),
    )
}

fn seal(gen: &SealGenerator, doc: &DocumentPayload, seal_type: SealType) -> AuthenticationSeal {
    let result = gen.generate_seal("INV-001", doc, seal_type, None).unwrap();
    assert!(result.success, "{seal_type}: {:?}", result.error_message);
    result.seal.unwrap()
}

// ---------------------------------------------------------------------------
// Invoice scenario
// ---------------------------------------------------------------------------

#[test]
fn document_hash_seal_detects_amount_change() {
    let gen = generator();
    let validator = validator();
    let original = DocumentPayload::structured(json!({"invoice_number": "INV-001", "total_amount": 1000}));
    let altered = DocumentPayload::structured(json!({"invoice_number": "INV-001", "total_amount": 1500}));

    let seal = seal(&gen, &original, SealType::DocumentHash);

    let ok = validator.validate_stamp(&seal, &original);
    assert!(ok.is_valid);
    assert_eq!(ok.status, ValidationStatus::Valid);

    let bad = validator.validate_stamp(&seal, &altered);
    assert!(!bad.is_valid);
    assert_eq!(bad.errors, vec![ValidationError::HashMismatch]);
}

// ---------------------------------------------------------------------------
// Round trip over every type and payload kind
// ---------------------------------------------------------------------------

#[test]
fn every_type_round_trips_for_every_payload_kind() {
    let gen = generator();
    let validator = validator();
    let payloads = [
        DocumentPayload::structured(json!({"invoice_number": "INV-001", "lines": [{"sku": "A", "qty": 2}]})),
        DocumentPayload::text("INVOICE INV-001 TOTAL 1000.00 NGN"),
        DocumentPayload::binary(vec![0x25, 0x50, 0x44, 0x46, 0x00, 0xff]),
    ];
    for doc in &payloads {
        for seal_type in SealType::ALL {
            let seal = seal(&gen, doc, seal_type);
            let result = validator.validate_stamp(&seal, doc);
            assert!(result.is_valid, "{seal_type} over {:?}: {:?}", doc.kind(), result.errors);
        }
    }
}

#[test]
fn seal_bound_to_other_key_is_rejected() {
    let seal = seal(&generator(), &DocumentPayload::text("x"), SealType::CryptographicStamp);
    let stranger = StampValidator::new(
        ValidatorConfig::default(),
        Arc::new(KeyMaterial::hmac_only(HmacKey::generate())),
    );
    let result = stranger.validate_stamp(&seal, &DocumentPayload::text("x"));
    assert!(!result.is_valid);
    assert_eq!(result.status, ValidationStatus::Invalid);
}

// ---------------------------------------------------------------------------
// Composite layering
// ---------------------------------------------------------------------------

#[test]
fn forged_composite_layer_fails_on_composite_hash() {
    let doc = DocumentPayload::structured(json!({"invoice_number": "INV-001"}));
    let seal = seal(&generator(), &doc, SealType::CompositeSeal);

    let envelope = SealEnvelope::decode(&seal.seal_value, SealType::CompositeSeal).unwrap();
    let mut body = envelope.body().clone();
    body["layers"]["document_hash"]["hash"] = json!("ab".repeat(32));
    let forged = SealEnvelope::from_body(SealType::CompositeSeal, body).unwrap();
    let mut forged_seal = seal.clone();
    forged_seal.seal_value = forged.encode(false, SealEncoding::Base64).unwrap();

    let result = validator().validate_stamp(&forged_seal, &doc);
    assert!(!result.is_valid);
    assert_eq!(result.errors, vec![ValidationError::HashMismatch]);
    assert_eq!(result.metadata.get("failed_check"), Some(&json!("composite_hash")));
}

// ---------------------------------------------------------------------------
// Expiry
// ---------------------------------------------------------------------------

#[test]
fn signature_outside_tolerance_is_expired_not_valid() {
    let doc = DocumentPayload::text("INV-001");
    let seal = seal(&generator(), &doc, SealType::DigitalSignature);
    let later = Utc::now() + Duration::hours(1);

    let result = validator().validate_stamp_at(&seal, &doc, later);
    assert!(!result.is_valid);
    assert_eq!(result.status, ValidationStatus::Expired);
    assert_eq!(result.errors, vec![ValidationError::ExpiredTimestamp]);
}

// ---------------------------------------------------------------------------
// Tamper detection
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn any_amount_change_breaks_the_seal(a in 0i64..1_000_000, delta in 1i64..1_000) {
        let keys = Arc::new(KeyMaterial::hmac_only(HmacKey::from_secret(fixtures::HMAC_SECRET).unwrap()));
        let gen = SealGenerator::new(GeneratorConfig::default(), keys.clone());
        let validator = StampValidator::new(ValidatorConfig::default(), keys);
        let original = DocumentPayload::structured(json!({"invoice_number": "INV-P", "total_amount": a}));
        let altered = DocumentPayload::structured(json!({"invoice_number": "INV-P", "total_amount": a + delta}));

        for seal_type in [SealType::DocumentHash, SealType::CryptographicStamp, SealType::TimestampSeal] {
            let seal = gen.generate_seal("INV-P", &original, seal_type, None).unwrap().seal.unwrap();
            prop_assert!(validator.validate_stamp(&seal, &original).is_valid);
            prop_assert!(!validator.validate_stamp(&seal, &altered).is_valid);
        }
    }

    #[test]
    fn text_mutation_breaks_the_seal(text in "[a-zA-Z0-9 ]{1,64}", extra in "[a-z]") {
        let keys = Arc::new(KeyMaterial::hmac_only(HmacKey::from_secret(fixtures::HMAC_SECRET).unwrap()));
        let gen = SealGenerator::new(GeneratorConfig::default(), keys.clone());
        let validator = StampValidator::new(ValidatorConfig::default(), keys);
        let seal = gen
            .generate_seal("T", &DocumentPayload::text(text.clone()), SealType::DocumentHash, None)
            .unwrap()
            .seal
            .unwrap();
        let mutated = DocumentPayload::text(format!("{text}{extra}"));
        prop_assert!(!validator.validate_stamp(&seal, &mutated).is_valid);
    }
}
