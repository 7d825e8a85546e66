//! SovereignIdentity: self-sovereign identities built from key bundles.
//!
//! An [`Identity`] holds keys of several algorithms (generic elliptic
//! curve, Bitcoin, DSA), each tagged with a purpose, plus profile
//! sections. Identities export to JSON, optionally with a signature from
//! every key proving possession of its secret, and load back with every
//! embedded signature verified. An [`AddressBook`] indexes identities by
//! key attributes with per-index uniqueness.

pub mod addressbook;
pub mod canonical;
pub mod config;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod keys;
pub mod sigtree;


// Re-export primary types
pub use addressbook::{AddressBook, Entry, IndexSpec};
pub use config::IdentityConfig;
pub use error::{IdentityError, Result};
pub use identity::{Identity, KeyFilter, KeyQuery, Validation};
pub use keys::{
    CurveName, Key, KeyAlgorithm, KeyMaterial, KeySpec, KeyType, Network, Purpose,
    RevocationCertificate, RevocationReason,
};
pub use sigtree::{Segment, SignatureTree};
