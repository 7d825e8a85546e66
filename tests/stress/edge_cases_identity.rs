//! Edge case tests: malformed records, lenient loading, requirement
//! configuration, duplicate keys, legacy fields and revocation misuse.

use serde_json::{json, Value};

use sovereign_identity::identity::Website;
use sovereign_identity::{
    CurveName, Identity, IdentityConfig, IdentityError, Key, KeyQuery, KeySpec, Network, Purpose,
    RevocationReason,
};

fn minimal() -> Identity {
    let mut identity = Identity::with_config(
        IdentityConfig::permissive().with_required_keys(vec![KeyQuery::new().with("purpose", "sign")]),
    );
    identity
        .add_key(Key::generate(KeySpec::Ec(CurveName::Secp256k1), Purpose::Sign).unwrap())
        .unwrap();
    identity
}

fn sign_only() -> IdentityConfig {
    minimal().config().clone()
}

// === Loading ===

#[test]
fn edge_non_object_records_rejected() {
    for record in [json!(null), json!([]), json!("identity"), json!(42)] {
        assert!(Identity::from_json(&record).is_err(), "{record}");
    }
}

#[test]
fn edge_pubkeys_must_be_array() {
    let mut json = minimal().to_json(false).unwrap();
    json["pubkeys"] = json!({"type": "ec"});
    assert!(matches!(
        Identity::from_json_with(&json, sign_only()),
        Err(IdentityError::InvalidProperty { .. })
    ));
}

#[test]
fn edge_missing_required_key_on_load() {
    let json = minimal().to_json(false).unwrap();
    // Default requirements include bitcoin keys this identity lacks.
    assert!(matches!(
        Identity::from_json(&json),
        Err(IdentityError::MissingRequiredKey(_))
    ));
    Identity::from_json_with(&json, sign_only()).unwrap();
}

#[test]
fn edge_duplicate_keys_in_record_rejected() {
    let mut json = minimal().to_json(false).unwrap();
    let first = json["pubkeys"][0].clone();
    json["pubkeys"].as_array_mut().unwrap().push(first);
    assert!(matches!(
        Identity::from_json_with(&json, sign_only()),
        Err(IdentityError::DuplicateKey(_))
    ));
}

#[test]
fn edge_lenient_loading_only_skips_unknown_types() {
    let mut json = minimal().to_json(false).unwrap();
    json["pubkeys"]
        .as_array_mut()
        .unwrap()
        .push(json!({"type": "ed25519", "value": "abcd"}));
    let lenient = sign_only().lenient(true);
    let loaded = Identity::from_json_with(&json, lenient.clone()).unwrap();
    assert_eq!(loaded.all_keys().len(), 1);

    // Malformed material of a known type still fails.
    json["pubkeys"]
        .as_array_mut()
        .unwrap()
        .push(json!({"type": "ec", "value": "zz"}));
    assert!(matches!(
        Identity::from_json_with(&json, lenient),
        Err(IdentityError::InvalidKeyMaterial(_))
    ));
}

#[test]
fn edge_signed_unknown_type_fails_even_when_lenient() {
    let mut json = minimal().export_signed().unwrap();
    json["pubkeys"]
        .as_array_mut()
        .unwrap()
        .push(json!({"type": "ed25519", "value": "abcd", "_sig": "00"}));
    assert!(matches!(
        Identity::from_json_with(&json, sign_only().lenient(true)),
        Err(IdentityError::InvalidSignature { .. })
    ));
}

#[test]
fn edge_key_appended_to_signed_export_fails() {
    let identity = minimal();
    let mut json = identity.export_signed().unwrap();
    let extra = Key::generate(KeySpec::Bitcoin(Network::Bitcoin), Purpose::Payment).unwrap();
    json["pubkeys"]
        .as_array_mut()
        .unwrap()
        .push(extra.to_record(false));
    // Existing signatures cover the whole document, new key included.
    assert!(Identity::from_json_with(&json, sign_only()).is_err());
}

#[test]
fn edge_legacy_pub_field_accepted() {
    let key = Key::generate(KeySpec::Ec(CurveName::Secp256k1), Purpose::Sign).unwrap();
    let json = json!({
        "_t": "identity",
        "v": "0.2",
        "pubkeys": [{"type": "ec", "purpose": "sign", "pub": key.value()}],
    });
    let loaded = Identity::from_json_with(&json, sign_only()).unwrap();
    let out = loaded.to_json(false).unwrap();
    assert_eq!(out["v"], "0.3");
    assert_eq!(out["pubkeys"][0]["value"], Value::from(key.value()));
    assert!(out["pubkeys"][0].get("pub").is_none());
}

#[test]
fn edge_mismatched_private_and_public_rejected() {
    let a = Key::generate(KeySpec::Bitcoin(Network::Bitcoin), Purpose::Payment).unwrap();
    let b = Key::generate(KeySpec::Bitcoin(Network::Bitcoin), Purpose::Payment).unwrap();
    let mut record = a.to_record(true);
    record["value"] = Value::from(b.value());
    assert!(matches!(
        Key::from_record(&record),
        Err(IdentityError::InvalidKeyMaterial(_))
    ));
}

#[test]
fn edge_sections_accept_single_record() {
    let mut json = minimal().to_json(false).unwrap();
    json["websites"] = json!({"url": "https://example.com"});
    let loaded = Identity::from_json_with(&json, sign_only()).unwrap();
    assert_eq!(loaded.websites(), &[Website::new("https://example.com")]);
    assert!(loaded.to_json(false).unwrap()["websites"].is_array());
}

// === Requirements ===

#[test]
fn edge_empty_requirements_allow_keyless_identity() {
    let identity = Identity::with_config(IdentityConfig::permissive());
    assert!(identity.validate().valid);
    let json = identity.to_json(false).unwrap();
    assert_eq!(json["pubkeys"], json!([]));
    // Nothing to sign with, nothing to fail on.
    let signed = identity.export_signed().unwrap();
    Identity::from_json_with(&signed, IdentityConfig::permissive()).unwrap();
}

#[test]
fn edge_first_unmet_requirement_reported() {
    let config = IdentityConfig::permissive().with_required_keys(vec![
        KeyQuery::new().with("purpose", "sign"),
        KeyQuery::new().with("type", "dsa"),
        KeyQuery::new().with("purpose", "encrypt"),
    ]);
    let mut identity = Identity::with_config(config);
    identity
        .add_key(Key::generate(KeySpec::Ec(CurveName::P256), Purpose::Sign).unwrap())
        .unwrap();
    let validation = identity.validate();
    assert!(!validation.valid);
    let reason = validation.reason.unwrap();
    assert!(reason.contains("dsa"), "{reason}");
    assert!(!reason.contains("encrypt"), "{reason}");
}

// === Keys and revocation ===

#[test]
fn edge_remove_unknown_key_is_none() {
    let mut identity = minimal();
    assert!(identity.remove_key("nope").is_none());
    assert_eq!(identity.all_keys().len(), 1);
}

#[test]
fn edge_revoked_keys_survive_every_export() {
    let mut identity = Identity::with_config(sign_only());
    identity
        .add_key(
            Key::generate(KeySpec::Dsa, Purpose::Sign)
                .unwrap()
                .with_revocation(RevocationReason::Superseded)
                .unwrap()
                .with_revocation(RevocationReason::KeyCompromise)
                .unwrap(),
        )
        .unwrap();

    let exports = [
        identity.to_json(false).unwrap(),
        identity.to_json(true).unwrap(),
        identity.export_signed().unwrap(),
    ];
    for json in &exports {
        let loaded = Identity::from_json_with(json, sign_only()).unwrap();
        assert_eq!(loaded, identity);
        assert_eq!(loaded.all_keys()[0].revocations().len(), 2);
    }
}

#[test]
fn edge_revocation_from_public_key_fails() {
    let identity = minimal();
    let loaded = Identity::from_json_with(&identity.to_json(false).unwrap(), sign_only()).unwrap();
    assert!(matches!(
        loaded.all_keys()[0].generate_revocation(RevocationReason::Superseded),
        Err(IdentityError::MissingPrivateKey(_))
    ));
}

#[test]
fn edge_verify_never_panics_on_garbage() {
    let keys = [
        Key::generate(KeySpec::Ec(CurveName::Secp256k1), Purpose::Sign).unwrap(),
        Key::generate(KeySpec::Ec(CurveName::P256), Purpose::Sign).unwrap(),
        Key::generate(KeySpec::Bitcoin(Network::Testnet), Purpose::Sign).unwrap(),
        Key::generate(KeySpec::Dsa, Purpose::Sign).unwrap(),
    ];
    let long = "ff".repeat(80);
    let garbage = ["", "00", "zz", "30", "3006020100020100", long.as_str()];
    for key in &keys {
        for sig in garbage {
            assert!(!key.verify(b"message", sig));
        }
    }
}
