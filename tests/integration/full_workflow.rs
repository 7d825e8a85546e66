//! Integration test: full end-to-end workflow.
//!
//! Tests the complete lifecycle:
//! 1. Generate identities with the default key set
//! 2. Fill in profile sections
//! 3. Export publicly with proofs of key possession
//! 4. Load the signed exports, verifying every signature
//! 5. Index the loaded identities in an address book
//! 6. Look them up by public key, fingerprint and custom attributes
//! 7. Revoke a key and validate the certificate

use std::ptr;

use sovereign_identity::identity::{Contact, Name, Profile, Website};
use sovereign_identity::keys::Network;
use sovereign_identity::{
    AddressBook, Identity, IdentityError, IndexSpec, Key, KeyFilter, KeyQuery, KeySpec, KeyType,
    Purpose, RevocationReason,
};

fn person(name: &str) -> Identity {
    let mut identity = Identity::generate(Network::Testnet).expect("default key set");
    identity.set_name(Name::formatted(name));
    identity.set_summary(format!("{name} is most excellent"));
    identity.add_website(Website::new("https://wyldstallyns.com"));
    identity.add_contact(Contact::new("email", &format!("{}@wyldstallyns.com", name.to_lowercase())));
    identity.add_profile(Profile::new(
        "github",
        &name.to_lowercase(),
        "https://gist.github.com/proof",
    ));
    identity
}

#[test]
fn full_workflow_generate_export_index() {
    // ── Step 1-2: Generate identities ───────────────────────────────────
    let mut ted = person("Ted");
    let bill = person("Bill");
    ted.add_key(
        Key::generate(KeySpec::Dsa, Purpose::Encrypt)
            .unwrap()
            .with_attribute("label", "most triumphant key")
            .unwrap(),
    )
    .unwrap();
    assert!(ted.validate().valid);
    assert_eq!(ted.all_keys().len(), 5);

    // ── Step 3: Signed export ────────────────────────────────────────────
    let ted_signed = ted.export_signed().expect("ted holds every secret");
    let bill_signed = bill.export_signed().expect("bill holds every secret");
    for record in ted_signed["pubkeys"].as_array().unwrap() {
        assert!(record.get("_sig").is_some(), "every key record is signed");
        assert!(record.get("priv").is_none(), "no secrets in a public export");
    }

    // ── Step 4: Load with verification ──────────────────────────────────
    let ted_loaded = Identity::from_json(&ted_signed).expect("valid signed export");
    let bill_loaded = Identity::from_json(&bill_signed).expect("valid signed export");
    assert_eq!(ted_loaded, ted);
    assert_eq!(ted_loaded.hash().unwrap(), ted.hash().unwrap());
    assert_ne!(ted_loaded, bill_loaded);

    // ── Step 5: Index ────────────────────────────────────────────────────
    let mut book = AddressBook::new();
    assert!(book.add(&ted_loaded, false).unwrap());
    assert!(book.add(&bill_loaded, false).unwrap());
    assert_eq!(book.size(), 9, "size counts keys in the pub index");

    // ── Step 6: Lookups ──────────────────────────────────────────────────
    for key in ted_loaded.all_keys() {
        let entry = book.by_pub(key.value()).expect("indexed by pub");
        assert!(ptr::eq(entry.identity, &ted_loaded));
        let entry = book.by_fingerprint(key.fingerprint()).expect("indexed by fingerprint");
        assert!(ptr::eq(entry.identity, &ted_loaded));
    }

    book.add_index(IndexSpec::unique("label")).unwrap();
    book.add_index(IndexSpec::non_unique("networkName")).unwrap();
    let label = book
        .lookup("label", "most triumphant key")
        .unwrap()
        .expect("label backfilled");
    assert!(ptr::eq(label.identity, &ted_loaded));
    assert_eq!(label.key.key_type(), KeyType::Dsa);
    assert_eq!(book.lookup_all("networkName", "testnet").unwrap().len(), 4);

    // A second copy of ted is a different owner of the same keys.
    let ted_copy = Identity::from_json(&ted_signed).unwrap();
    assert!(matches!(
        book.add(&ted_copy, false),
        Err(IdentityError::DuplicateIndexValue { .. })
    ));
    assert_eq!(book.size(), 9);

    assert!(book.remove(&ted_loaded));
    assert_eq!(book.size(), 4);
    assert!(book.lookup("label", "most triumphant key").unwrap().is_none());

    // ── Step 7: Revocation ───────────────────────────────────────────────
    let query = KeyQuery::new().with("purpose", "sign");
    let signer = ted.keys(KeyFilter::Query(&query))[0];
    let cert = signer
        .generate_revocation(RevocationReason::KeyCompromise)
        .unwrap();
    let public_signer = ted_loaded.keys(KeyFilter::Query(&query))[0];
    public_signer
        .validate_revocation(&cert)
        .expect("public half validates the certificate");
}

#[test]
fn full_workflow_private_backup_roundtrip() {
    let ted = person("Ted");
    let backup = ted.to_json(true).unwrap();
    let text = serde_json::to_string(&backup).unwrap();

    let restored = Identity::from_json_str(&text).unwrap();
    assert!(restored.all_keys().iter().all(Key::has_private));
    assert_eq!(restored.to_json(true).unwrap(), backup);

    // The restored identity can produce a signed export that loads.
    let signed = restored.export_signed().unwrap();
    Identity::from_json(&signed).unwrap();
}

#[test]
fn full_workflow_signing_with_identity_keys() {
    let ted = person("Ted");
    let payment = ted
        .keys(KeyFilter::Type(KeyType::Bitcoin))
        .into_iter()
        .find(|k| k.purpose() == &Purpose::Payment)
        .unwrap();
    assert!(payment.value().len() == 66);
    assert!(payment.fingerprint().starts_with('m') || payment.fingerprint().starts_with('n'));

    let sig = ted.sign(b"pay bill 5 bucks", payment.value()).unwrap();
    let public = Identity::from_json(&ted.export_signed().unwrap()).unwrap();
    let public_payment = public
        .all_keys()
        .iter()
        .find(|k| k.value() == payment.value())
        .unwrap();
    assert!(Identity::verify(b"pay bill 5 bucks", public_payment, &sig));
    assert!(matches!(
        public.sign(b"pay bill 5 bucks", payment.value()),
        Err(IdentityError::KeyNotFound(_))
    ));
}
