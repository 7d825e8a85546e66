//! Keys: the polymorphic key abstraction and its variants.
//!
//! Every key variant implements [`KeyAlgorithm`]. [`Key`] wraps a variant
//! together with its purpose, canonical public string, fingerprint and any
//! extra record attributes, and is the type identities and address books
//! work with. Keys are immutable once constructed.

pub mod bitcoin;
pub mod curve;
pub mod dsa;
pub mod ec;
pub mod revocation;

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};
use zeroize::Zeroizing;

use crate::config::{DEFAULT_CURVE, SIG_FIELD};
use crate::crypto::hash;
use crate::error::{IdentityError, Result};

pub use self::bitcoin::{BitcoinKey, Network};
pub use self::curve::CurveName;
pub use self::dsa::DsaKey;
pub use self::ec::EcKey;
pub use self::revocation::{RevocationCertificate, RevocationReason};

// ── Record fields ────────────────────────────────────────────────────────────

/// Variant discriminator.
pub const TYPE_FIELD: &str = "type";
/// Key purpose.
pub const PURPOSE_FIELD: &str = "purpose";
/// Canonical public material.
pub const VALUE_FIELD: &str = "value";
/// Legacy alias for `value`, accepted on input only.
pub const PUB_FIELD: &str = "pub";
/// Private material, present only in private exports.
pub const PRIV_FIELD: &str = "priv";
/// Fingerprint of the public material.
pub const FINGERPRINT_FIELD: &str = "fingerprint";
/// EC curve name.
pub const CURVE_FIELD: &str = "curve";
/// Bitcoin network name.
pub const NETWORK_FIELD: &str = "networkName";
/// Bitcoin P2PKH address.
pub const ADDRESS_FIELD: &str = "address";

const CORE_FIELDS: &[&str] = &[
    TYPE_FIELD,
    PURPOSE_FIELD,
    VALUE_FIELD,
    PUB_FIELD,
    PRIV_FIELD,
    FINGERPRINT_FIELD,
    SIG_FIELD,
];

// ── Types ────────────────────────────────────────────────────────────────────

/// The closed set of key variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Ec,
    Bitcoin,
    Dsa,
}

impl KeyType {
    /// Return the discriminator used in key records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ec => "ec",
            Self::Bitcoin => "bitcoin",
            Self::Dsa => "dsa",
        }
    }
}

impl FromStr for KeyType {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ec" => Ok(Self::Ec),
            "bitcoin" => Ok(Self::Bitcoin),
            "dsa" => Ok(Self::Dsa),
            other => Err(IdentityError::UnrecognizedKeyType(other.to_string())),
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a key is meant to be used for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Purpose {
    Sign,
    Update,
    Encrypt,
    Payment,
    Messaging,
    /// Generic purpose used when a record names none.
    Identity,
    Custom(String),
}

impl Purpose {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Sign => "sign",
            Self::Update => "update",
            Self::Encrypt => "encrypt",
            Self::Payment => "payment",
            Self::Messaging => "messaging",
            Self::Identity => "identity",
            Self::Custom(s) => s,
        }
    }
}

impl From<&str> for Purpose {
    fn from(s: &str) -> Self {
        match s {
            "sign" => Self::Sign,
            "update" => Self::Update,
            "encrypt" => Self::Encrypt,
            "payment" => Self::Payment,
            "messaging" => Self::Messaging,
            "identity" => Self::Identity,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for generating a fresh key of a given variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySpec {
    Ec(CurveName),
    Bitcoin(Network),
    Dsa,
}

impl KeySpec {
    pub fn key_type(&self) -> KeyType {
        match self {
            Self::Ec(_) => KeyType::Ec,
            Self::Bitcoin(_) => KeyType::Bitcoin,
            Self::Dsa => KeyType::Dsa,
        }
    }
}

// ── Contract ─────────────────────────────────────────────────────────────────

/// Operations every key variant provides.
pub trait KeyAlgorithm {
    /// Variant discriminator.
    fn key_type(&self) -> KeyType;

    /// Raw public material, used for hashing.
    fn public_bytes(&self) -> Vec<u8>;

    /// Canonical string form of the public material.
    fn public_string(&self) -> String;

    /// String form of the private material, if held.
    fn private_string(&self) -> Option<Zeroizing<String>>;

    /// Fingerprint derived from the public material.
    fn fingerprint(&self) -> String;

    /// Sign `message`. Fails with `MissingPrivateKey` without a secret.
    fn sign(&self, message: &[u8]) -> Result<String>;

    /// Verify `signature` over `message`. Malformed input yields `false`.
    fn verify(&self, message: &[u8], signature: &str) -> bool;

    /// Variant-specific record fields.
    fn extra_fields(&self) -> Vec<(&'static str, String)>;
}

/// Key material of one of the supported variants.
#[derive(Clone)]
pub enum KeyMaterial {
    Ec(EcKey),
    Bitcoin(BitcoinKey),
    Dsa(DsaKey),
}

impl KeyMaterial {
    /// Generate fresh material.
    pub fn generate(spec: KeySpec) -> Result<Self> {
        Ok(match spec {
            KeySpec::Ec(curve) => Self::Ec(EcKey::generate(curve)),
            KeySpec::Bitcoin(network) => Self::Bitcoin(BitcoinKey::generate(network)),
            KeySpec::Dsa => Self::Dsa(DsaKey::generate()?),
        })
    }

    /// Parse material from a key record, dispatching on its type.
    fn from_record(key_type: KeyType, record: &Map<String, Value>) -> Result<Self> {
        let public = str_field(record, VALUE_FIELD).or_else(|| str_field(record, PUB_FIELD));
        let private = str_field(record, PRIV_FIELD);
        Ok(match key_type {
            KeyType::Ec => {
                let curve: CurveName = str_field(record, CURVE_FIELD)
                    .unwrap_or(DEFAULT_CURVE)
                    .parse()?;
                Self::Ec(EcKey::from_parts(curve, public, private)?)
            }
            KeyType::Bitcoin => {
                let network: Network = str_field(record, NETWORK_FIELD)
                    .unwrap_or(Network::Bitcoin.as_str())
                    .parse()?;
                let address = str_field(record, ADDRESS_FIELD);
                Self::Bitcoin(BitcoinKey::from_parts(network, public, private, address)?)
            }
            KeyType::Dsa => Self::Dsa(DsaKey::from_parts(public, private)?),
        })
    }

    fn algorithm(&self) -> &dyn KeyAlgorithm {
        match self {
            Self::Ec(k) => k,
            Self::Bitcoin(k) => k,
            Self::Dsa(k) => k,
        }
    }
}

fn str_field<'r>(record: &'r Map<String, Value>, field: &str) -> Option<&'r str> {
    record.get(field).and_then(Value::as_str)
}

// ── Key ──────────────────────────────────────────────────────────────────────

/// A key pair (or public key) with its purpose and record attributes.
///
/// Two keys are equal iff their canonical public strings are equal;
/// type and purpose do not take part.
#[derive(Clone)]
pub struct Key {
    purpose: Purpose,
    material: KeyMaterial,
    value: String,
    fingerprint: String,
    attributes: Map<String, Value>,
}

impl Key {
    /// Generate a fresh key pair.
    pub fn generate(spec: KeySpec, purpose: Purpose) -> Result<Self> {
        Ok(Self::from_material(KeyMaterial::generate(spec)?, purpose))
    }

    /// Wrap existing material, deriving value and fingerprint.
    pub fn from_material(material: KeyMaterial, purpose: Purpose) -> Self {
        let algorithm = material.algorithm();
        let value = algorithm.public_string();
        let fingerprint = algorithm.fingerprint();
        Self {
            purpose,
            material,
            value,
            fingerprint,
            attributes: Map::new(),
        }
    }

    /// Parse a key record.
    ///
    /// A supplied `fingerprint` is kept verbatim. Fields the variant does
    /// not consume are kept as extra attributes.
    pub fn from_record(record: &Value) -> Result<Self> {
        let record = record.as_object().ok_or_else(|| {
            IdentityError::InvalidKeyMaterial("key record must be an object".into())
        })?;
        let key_type: KeyType = match record.get(TYPE_FIELD) {
            Some(Value::String(t)) => t.parse()?,
            Some(other) => return Err(IdentityError::UnrecognizedKeyType(other.to_string())),
            None => return Err(IdentityError::UnrecognizedKeyType("<missing>".into())),
        };
        let purpose = str_field(record, PURPOSE_FIELD)
            .map(Purpose::from)
            .unwrap_or(Purpose::Identity);

        let material = KeyMaterial::from_record(key_type, record)?;
        let mut key = Self::from_material(material, purpose);
        if let Some(fingerprint) = str_field(record, FINGERPRINT_FIELD) {
            key.fingerprint = fingerprint.to_string();
        }

        let variant_fields: Vec<&str> = key
            .algorithm()
            .extra_fields()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        key.attributes = record
            .iter()
            .filter(|(k, _)| !CORE_FIELDS.contains(&k.as_str()) && !variant_fields.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(key)
    }

    /// Attach an extra record attribute, such as a `label`.
    pub fn with_attribute(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
        let reserved = CORE_FIELDS.contains(&name)
            || self.algorithm().extra_fields().iter().any(|(f, _)| *f == name);
        if reserved {
            return Err(IdentityError::InvalidProperty {
                field: name.to_string(),
                reason: "reserved key field".into(),
            });
        }
        self.attributes.insert(name.to_string(), value.into());
        Ok(self)
    }

    /// Serialize to a key record.
    pub fn to_record(&self, include_private: bool) -> Value {
        let mut record = self.attributes.clone();
        record.insert(TYPE_FIELD.into(), self.key_type().as_str().into());
        record.insert(PURPOSE_FIELD.into(), self.purpose.as_str().into());
        record.insert(VALUE_FIELD.into(), self.value.clone().into());
        record.insert(FINGERPRINT_FIELD.into(), self.fingerprint.clone().into());
        for (name, value) in self.algorithm().extra_fields() {
            record.insert(name.into(), value.into());
        }
        if include_private {
            if let Some(private) = self.algorithm().private_string() {
                record.insert(PRIV_FIELD.into(), private.as_str().into());
            }
        }
        Value::Object(record)
    }

    /// Look up a record attribute by name.
    ///
    /// Covers the core fields (`pub` aliases `value`), the variant fields
    /// and any extra attribute. Private material is never exposed here.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            TYPE_FIELD => Some(self.key_type().as_str().into()),
            PURPOSE_FIELD => Some(self.purpose.as_str().into()),
            VALUE_FIELD | PUB_FIELD => Some(self.value.clone().into()),
            FINGERPRINT_FIELD => Some(self.fingerprint.clone().into()),
            PRIV_FIELD | SIG_FIELD => None,
            _ => self
                .algorithm()
                .extra_fields()
                .into_iter()
                .find(|(field, _)| *field == name)
                .map(|(_, value)| Value::String(value))
                .or_else(|| self.attributes.get(name).cloned()),
        }
    }

    pub fn sign(&self, message: &[u8]) -> Result<String> {
        self.algorithm().sign(message)
    }

    pub fn verify(&self, message: &[u8], signature: &str) -> bool {
        self.algorithm().verify(message, signature)
    }

    /// Hex SHA-256 of the public material.
    pub fn hash(&self) -> String {
        hash::sha256_hex(&self.algorithm().public_bytes())
    }

    pub fn key_type(&self) -> KeyType {
        self.algorithm().key_type()
    }

    pub fn purpose(&self) -> &Purpose {
        &self.purpose
    }

    /// Canonical public string.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn material(&self) -> &KeyMaterial {
        &self.material
    }

    /// Extra attributes beyond the core and variant fields.
    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Whether the secret half is held.
    pub fn has_private(&self) -> bool {
        self.algorithm().private_string().is_some()
    }

    /// String form of the private material, if held.
    pub fn private_string(&self) -> Option<Zeroizing<String>> {
        self.algorithm().private_string()
    }

    /// The same key without its secret.
    pub fn public_only(&self) -> Result<Self> {
        let mut record = self.to_record(false);
        if let Value::Object(map) = &mut record {
            map.remove(PRIV_FIELD);
        }
        Self::from_record(&record)
    }

    fn algorithm(&self) -> &dyn KeyAlgorithm {
        self.material.algorithm()
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Key {}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("type", &self.key_type())
            .field("purpose", &self.purpose)
            .field("value", &self.value)
            .field("fingerprint", &self.fingerprint)
            .field("has_private", &self.has_private())
            .finish()
    }
}
