//! Identity: an ordered bundle of keys plus profile sections.
//!
//! An identity owns its keys exclusively and rejects duplicates by public
//! value. It may only be serialized once every required key query is
//! satisfied. Signed exports attach to each key record a signature, made
//! by that key, over the canonical unsigned export; loading verifies every
//! such signature before anything else.

pub mod requirements;
pub mod sections;

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

pub use requirements::{default_key_set, default_required_keys, KeyQuery};
pub use sections::{
    Connection, Contact, Location, Name, Payment, Photo, Profile, Statement, Website,
};

use crate::canonical;
use crate::config::{
    IdentityConfig, IDENTITY_TYPE, IDENTITY_VERSION, PUBKEYS_FIELD, SIG_FIELD, TYPE_FIELD,
    VERSION_FIELD,
};
use crate::error::{IdentityError, Result};
use crate::keys::{Key, KeyType, Network};
use crate::sigtree;

const NAME_FIELD: &str = "name";
const LOCATION_FIELD: &str = "location";
const SUMMARY_FIELD: &str = "summary";
const PHOTOS_FIELD: &str = "photos";
const WEBSITES_FIELD: &str = "websites";
const CONTACT_FIELD: &str = "contact";
const PAYMENTS_FIELD: &str = "payments";
const PROFILES_FIELD: &str = "profiles";
const STATEMENTS_FIELD: &str = "statements";
const CONNECTIONS_FIELD: &str = "connections";

/// Which keys [`Identity::keys`] returns.
#[derive(Debug, Clone, Copy)]
pub enum KeyFilter<'q> {
    All,
    Type(KeyType),
    Query(&'q KeyQuery),
}

/// Outcome of [`Identity::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    /// The first unmet requirement, when invalid.
    pub reason: Option<String>,
}

impl Validation {
    fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    fn failed(reason: String) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
        }
    }
}

/// A self-sovereign identity.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    keys: Vec<Key>,
    name: Option<Name>,
    location: Option<Location>,
    summary: Option<String>,
    photos: Vec<Photo>,
    websites: Vec<Website>,
    contact: Vec<Contact>,
    payments: Vec<Payment>,
    profiles: Vec<Profile>,
    statements: Vec<Statement>,
    connections: Vec<Connection>,
    /// Unrecognized top-level properties, kept verbatim.
    extras: Map<String, Value>,
    config: IdentityConfig,
}

impl Identity {
    /// An empty identity using the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty identity using `config`.
    pub fn with_config(config: IdentityConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// An identity holding a freshly generated default key set.
    pub fn generate(network: Network) -> Result<Self> {
        let mut identity = Self::new();
        for key in default_key_set(network)? {
            identity.add_key(key)?;
        }
        Ok(identity)
    }

    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    // ── Keys ─────────────────────────────────────────────────────────────────

    /// Append a key. Fails with `DuplicateKey` if an equal key is held.
    pub fn add_key(&mut self, key: Key) -> Result<()> {
        if self.keys.contains(&key) {
            return Err(IdentityError::DuplicateKey(key.value().to_string()));
        }
        self.keys.push(key);
        Ok(())
    }

    /// Remove and return the key with public value `value`.
    pub fn remove_key(&mut self, value: &str) -> Option<Key> {
        let position = self.keys.iter().position(|k| k.value() == value)?;
        Some(self.keys.remove(position))
    }

    /// Keys matching `filter`, in insertion order.
    pub fn keys(&self, filter: KeyFilter<'_>) -> Vec<&Key> {
        self.keys
            .iter()
            .filter(|key| match filter {
                KeyFilter::All => true,
                KeyFilter::Type(key_type) => key.key_type() == key_type,
                KeyFilter::Query(query) => query.matches(key),
            })
            .collect()
    }

    /// Every held key, in insertion order.
    pub fn all_keys(&self) -> &[Key] {
        &self.keys
    }

    /// The held key with public value `value`, if its secret is held too.
    pub fn private_key(&self, value: &str) -> Option<&Key> {
        self.keys
            .iter()
            .find(|k| k.value() == value && k.has_private())
    }

    // ── Validation ───────────────────────────────────────────────────────────

    /// Check every required key query against the held keys.
    pub fn validate(&self) -> Validation {
        for query in &self.config.required_keys {
            if !self.keys.iter().any(|key| query.matches(key)) {
                return Validation::failed(format!("missing required key {query}"));
            }
        }
        Validation::ok()
    }

    fn ensure_valid(&self) -> Result<()> {
        match self.validate() {
            Validation { valid: true, .. } => Ok(()),
            Validation { reason, .. } => Err(IdentityError::MissingRequiredKey(
                reason.unwrap_or_default(),
            )),
        }
    }

    // ── Export ───────────────────────────────────────────────────────────────

    /// Serialize to an identity record. Fails if required keys are missing.
    pub fn to_json(&self, include_private: bool) -> Result<Value> {
        self.ensure_valid()?;
        self.build_record(include_private)
    }

    fn build_record(&self, include_private: bool) -> Result<Value> {
        let mut record = self.extras.clone();

        if let Some(name) = &self.name {
            record.insert(NAME_FIELD.into(), to_value(name)?);
        }
        if let Some(location) = &self.location {
            record.insert(LOCATION_FIELD.into(), to_value(location)?);
        }
        if let Some(summary) = &self.summary {
            record.insert(SUMMARY_FIELD.into(), summary.clone().into());
        }
        insert_list(&mut record, PHOTOS_FIELD, &self.photos)?;
        insert_list(&mut record, WEBSITES_FIELD, &self.websites)?;
        insert_list(&mut record, CONTACT_FIELD, &self.contact)?;
        insert_list(&mut record, PAYMENTS_FIELD, &self.payments)?;
        insert_list(&mut record, PROFILES_FIELD, &self.profiles)?;
        insert_list(&mut record, STATEMENTS_FIELD, &self.statements)?;
        insert_list(&mut record, CONNECTIONS_FIELD, &self.connections)?;

        let pubkeys = self
            .keys
            .iter()
            .map(|key| key.to_record(include_private))
            .collect();
        record.insert(PUBKEYS_FIELD.into(), Value::Array(pubkeys));
        record.insert(VERSION_FIELD.into(), IDENTITY_VERSION.into());
        record.insert(TYPE_FIELD.into(), IDENTITY_TYPE.into());
        Ok(Value::Object(record))
    }

    /// Sign the canonical form of `document` with every held key.
    ///
    /// Returns each key's public record with the signature under `_sig`.
    /// Fails with `MissingPrivateKey` before signing anything if any key
    /// lacks its secret.
    pub fn sign_with_all(&self, document: &Value) -> Result<Vec<Value>> {
        if let Some(key) = self.keys.iter().find(|k| !k.has_private()) {
            return Err(IdentityError::MissingPrivateKey(key.value().to_string()));
        }
        let message = canonical::to_canonical_string(document);
        self.keys
            .iter()
            .map(|key| {
                let mut record = key.to_record(false);
                if let Value::Object(map) = &mut record {
                    map.insert(SIG_FIELD.into(), key.sign(message.as_bytes())?.into());
                }
                Ok(record)
            })
            .collect()
    }

    /// Public export with a possession proof on every key record.
    pub fn export_signed(&self) -> Result<Value> {
        let mut record = self.to_json(false)?;
        let signed = self.sign_with_all(&record)?;
        if let Value::Object(map) = &mut record {
            map.insert(PUBKEYS_FIELD.into(), Value::Array(signed));
        }
        Ok(record)
    }

    // ── Import ───────────────────────────────────────────────────────────────

    /// Load an identity record with the default configuration.
    pub fn from_json(record: &Value) -> Result<Self> {
        Self::from_json_with(record, IdentityConfig::default())
    }

    /// Parse identity JSON text with the default configuration.
    pub fn from_json_str(s: &str) -> Result<Self> {
        Self::from_json(&serde_json::from_str(s)?)
    }

    /// Load an identity record.
    ///
    /// Embedded signatures are verified first; any failure aborts the
    /// load. The loaded identity must then satisfy `config`'s required
    /// keys.
    pub fn from_json_with(record: &Value, config: IdentityConfig) -> Result<Self> {
        let map = record.as_object().ok_or_else(|| IdentityError::InvalidProperty {
            field: "identity".into(),
            reason: "expected an object".into(),
        })?;
        match map.get(TYPE_FIELD) {
            None => {}
            Some(Value::String(t)) if t == IDENTITY_TYPE => {}
            Some(other) => {
                return Err(IdentityError::InvalidProperty {
                    field: TYPE_FIELD.into(),
                    reason: format!("expected \"{IDENTITY_TYPE}\", found {other}"),
                })
            }
        }
        if let Some(version) = map.get(VERSION_FIELD) {
            if version.as_str() != Some(IDENTITY_VERSION) {
                log::debug!("loading identity record with version {version}");
            }
        }

        let (unsigned, signatures) = sigtree::split(record);
        if !signatures.is_empty() {
            sigtree::verify_tree(&unsigned, &signatures)?;
            log::debug!("verified {} embedded signatures", signatures.count());
        }

        let mut identity = Self::with_config(config);
        let Value::Object(unsigned) = unsigned else {
            return Err(IdentityError::InvalidProperty {
                field: "identity".into(),
                reason: "expected an object".into(),
            });
        };
        for (name, value) in unsigned {
            match name.as_str() {
                PUBKEYS_FIELD => identity.load_keys(&value)?,
                VERSION_FIELD | TYPE_FIELD => {}
                _ => identity.set_property(&name, value)?,
            }
        }

        identity.ensure_valid()?;
        Ok(identity)
    }

    fn load_keys(&mut self, pubkeys: &Value) -> Result<()> {
        let records = match pubkeys {
            Value::Array(records) => records,
            Value::Null => return Ok(()),
            _ => {
                return Err(IdentityError::InvalidProperty {
                    field: PUBKEYS_FIELD.into(),
                    reason: "expected an array of key records".into(),
                })
            }
        };
        for record in records {
            match Key::from_record(record) {
                Ok(key) => self.add_key(key)?,
                Err(IdentityError::UnrecognizedKeyType(t)) if self.config.lenient_key_types => {
                    log::warn!("skipping key with unrecognized type {t}");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    // ── Properties ───────────────────────────────────────────────────────────

    /// Set a top-level property by name.
    ///
    /// Known section names are parsed into their typed records and replace
    /// the current value; any other name is stored verbatim. The names
    /// `pubkeys`, `v` and `_t` are managed by the identity itself.
    pub fn set_property(&mut self, name: &str, value: Value) -> Result<()> {
        match name {
            PUBKEYS_FIELD | VERSION_FIELD | TYPE_FIELD | SIG_FIELD => {
                return Err(IdentityError::InvalidProperty {
                    field: name.to_string(),
                    reason: "reserved property".into(),
                })
            }
            NAME_FIELD => self.name = optional(name, &value)?,
            LOCATION_FIELD => self.location = optional(name, &value)?,
            SUMMARY_FIELD => self.summary = optional(name, &value)?,
            PHOTOS_FIELD => self.photos = sections::parse_list(name, &value)?,
            WEBSITES_FIELD => self.websites = sections::parse_list(name, &value)?,
            CONTACT_FIELD => self.contact = sections::parse_list(name, &value)?,
            PAYMENTS_FIELD => self.payments = sections::parse_list(name, &value)?,
            PROFILES_FIELD => self.profiles = sections::parse_list(name, &value)?,
            STATEMENTS_FIELD => self.statements = sections::parse_list(name, &value)?,
            CONNECTIONS_FIELD => self.connections = sections::parse_list(name, &value)?,
            _ => {
                self.extras.insert(name.to_string(), value);
            }
        }
        Ok(())
    }

    /// An unrecognized top-level property.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.extras.get(name)
    }

    pub fn set_name(&mut self, name: Name) {
        self.name = Some(name);
    }

    pub fn set_location(&mut self, location: Location) {
        self.location = Some(location);
    }

    pub fn set_summary(&mut self, summary: impl Into<String>) {
        self.summary = Some(summary.into());
    }

    pub fn add_photo(&mut self, photo: Photo) {
        self.photos.push(photo);
    }

    pub fn add_website(&mut self, website: Website) {
        self.websites.push(website);
    }

    pub fn add_contact(&mut self, contact: Contact) {
        self.contact.push(contact);
    }

    pub fn add_payment(&mut self, payment: Payment) {
        self.payments.push(payment);
    }

    pub fn add_profile(&mut self, profile: Profile) {
        self.profiles.push(profile);
    }

    pub fn add_statement(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    pub fn add_connection(&mut self, connection: Connection) {
        self.connections.push(connection);
    }

    pub fn name(&self) -> Option<&Name> {
        self.name.as_ref()
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn photos(&self) -> &[Photo] {
        &self.photos
    }

    pub fn websites(&self) -> &[Website] {
        &self.websites
    }

    pub fn contact(&self) -> &[Contact] {
        &self.contact
    }

    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    // ── Signing ──────────────────────────────────────────────────────────────

    /// Sign `data` with the held key whose public value is `value`.
    pub fn sign(&self, data: &[u8], value: &str) -> Result<String> {
        self.private_key(value)
            .ok_or_else(|| IdentityError::KeyNotFound(value.to_string()))?
            .sign(data)
    }

    /// Verify `signature` over `data` with `key`.
    pub fn verify(data: &[u8], key: &Key, signature: &str) -> bool {
        key.verify(data, signature)
    }

    // ── Content identity ─────────────────────────────────────────────────────

    /// Canonical public serialization, regardless of validity.
    pub fn canonical_string(&self) -> Result<String> {
        Ok(canonical::to_canonical_string(&self.build_record(false)?))
    }

    /// Hex SHA-256 of the canonical public serialization.
    pub fn hash(&self) -> Result<String> {
        Ok(canonical::canonical_hash(&self.build_record(false)?))
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        match (self.canonical_string(), other.canonical_string()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .name
            .as_ref()
            .and_then(|n| n.formatted.as_deref())
            .unwrap_or("<unnamed>");
        write!(f, "{name} ({} keys)", self.keys.len())
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

fn insert_list<T: Serialize>(record: &mut Map<String, Value>, field: &str, items: &[T]) -> Result<()> {
    if !items.is_empty() {
        record.insert(field.into(), to_value(&items)?);
    }
    Ok(())
}

fn optional<T: serde::de::DeserializeOwned>(field: &str, value: &Value) -> Result<Option<T>> {
    match value {
        Value::Null => Ok(None),
        _ => sections::parse(field, value).map(Some),
    }
}
