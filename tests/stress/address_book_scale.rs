//! Stress test: address books with hundreds of identities and thousands
//! of index entries, including failed adds and late index registration.

use std::collections::HashSet;
use std::ptr;

use sovereign_identity::{
    AddressBook, CurveName, Identity, IdentityConfig, IdentityError, IndexSpec, Key, KeySpec,
    Network, Purpose,
};

fn labelled_identity(i: usize, keys: usize) -> Identity {
    let mut identity = Identity::with_config(IdentityConfig::permissive());
    for k in 0..keys {
        let spec = if k % 2 == 0 {
            KeySpec::Ec(CurveName::Secp256k1)
        } else {
            KeySpec::Bitcoin(Network::Testnet)
        };
        let key = Key::generate(spec, Purpose::Sign)
            .unwrap()
            .with_attribute("label", format!("identity-{i}-key-{k}"))
            .unwrap()
            .with_attribute("team", format!("team-{}", i % 10))
            .unwrap();
        identity.add_key(key).unwrap();
    }
    identity
}

#[test]
fn stress_200_identities_indexed() {
    let identities: Vec<Identity> = (0..200).map(|i| labelled_identity(i, 4)).collect();

    let mut book = AddressBook::new();
    book.add_index(IndexSpec::unique("label")).unwrap();
    for identity in &identities {
        assert!(book.add(identity, false).unwrap());
    }
    assert_eq!(book.size(), 800);

    let mut fingerprints = HashSet::new();
    for (i, identity) in identities.iter().enumerate() {
        for (k, key) in identity.all_keys().iter().enumerate() {
            assert!(fingerprints.insert(key.fingerprint().to_string()));
            let entry = book
                .lookup("label", &format!("identity-{i}-key-{k}"))
                .unwrap()
                .unwrap();
            assert!(ptr::eq(entry.identity, identity));
            assert!(ptr::eq(entry.key, key));
        }
    }
}

#[test]
fn stress_late_non_unique_index_groups_entries() {
    let identities: Vec<Identity> = (0..100).map(|i| labelled_identity(i, 2)).collect();
    let mut book = AddressBook::new();
    for identity in &identities {
        book.add(identity, false).unwrap();
    }

    book.add_index(IndexSpec::non_unique("team")).unwrap();
    for t in 0..10 {
        let entries = book.lookup_all("team", &format!("team-{t}")).unwrap();
        assert_eq!(entries.len(), 20, "10 identities x 2 keys per team");
    }
    assert!(matches!(
        book.add_index(IndexSpec::unique("team")),
        Err(IdentityError::InvalidIndex(_))
    ));
}

#[test]
fn stress_rejected_adds_leave_no_trace() {
    let identities: Vec<Identity> = (0..50).map(|i| labelled_identity(i, 3)).collect();
    let mut book = AddressBook::new();
    for identity in &identities {
        book.add(identity, false).unwrap();
    }
    let size = book.size();

    // Copies collide on every key; none of their entries may appear.
    let copies: Vec<Identity> = identities
        .iter()
        .map(|identity| {
            Identity::from_json_with(
                &identity.to_json(false).unwrap(),
                IdentityConfig::permissive(),
            )
            .unwrap()
        })
        .collect();
    for copy in &copies {
        assert!(book.add(copy, false).is_err());
        assert_eq!(book.size(), size);
    }
    for (original, copy) in identities.iter().zip(&copies) {
        for key in copy.all_keys() {
            let entry = book.by_pub(key.value()).unwrap();
            assert!(ptr::eq(entry.identity, original));
        }
    }
}

#[test]
fn stress_add_remove_cycles() {
    let identities: Vec<Identity> = (0..100).map(|i| labelled_identity(i, 2)).collect();
    let mut book = AddressBook::new();
    for round in 0..5 {
        for identity in &identities {
            assert!(book.add(identity, false).unwrap(), "round {round}");
        }
        assert_eq!(book.size(), 200);
        for identity in identities.iter().step_by(2) {
            assert!(book.remove(identity));
        }
        assert_eq!(book.size(), 100);
        for identity in identities.iter().skip(1).step_by(2) {
            assert!(book.remove(identity));
        }
        assert_eq!(book.size(), 0);
    }
}
