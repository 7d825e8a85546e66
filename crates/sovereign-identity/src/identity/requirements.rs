//! Key queries and the default required key set.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::DEFAULT_CURVE;
use crate::error::{IdentityError, Result};
use crate::keys::{
    CurveName, Key, KeySpec, KeyType, Network, Purpose, CURVE_FIELD, NETWORK_FIELD,
    PURPOSE_FIELD, TYPE_FIELD,
};

/// A set of attribute constraints over a key, e.g. `{"purpose": "sign"}`.
///
/// A key matches when every named attribute is present on it with an equal
/// value. The empty query matches every key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyQuery(BTreeMap<String, Value>);

impl KeyQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constraint.
    pub fn with(mut self, attribute: &str, value: impl Into<Value>) -> Self {
        self.0.insert(attribute.to_string(), value.into());
        self
    }

    /// String value of a constraint, if it has one.
    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.0.get(attribute).and_then(Value::as_str)
    }

    /// Whether `key` satisfies every constraint.
    pub fn matches(&self, key: &Key) -> bool {
        self.0
            .iter()
            .all(|(attribute, expected)| key.attribute(attribute).as_ref() == Some(expected))
    }

    /// Generation parameters for a fresh key satisfying this query.
    ///
    /// `network` applies to Bitcoin keys when the query names none.
    pub fn key_spec(&self, network: Network) -> Result<KeySpec> {
        let key_type: KeyType = self
            .get(TYPE_FIELD)
            .ok_or_else(|| IdentityError::UnrecognizedKeyType("<missing>".into()))?
            .parse()?;
        Ok(match key_type {
            KeyType::Ec => KeySpec::Ec(self.get(CURVE_FIELD).unwrap_or(DEFAULT_CURVE).parse()?),
            KeyType::Bitcoin => KeySpec::Bitcoin(match self.get(NETWORK_FIELD) {
                Some(name) => name.parse()?,
                None => network,
            }),
            KeyType::Dsa => KeySpec::Dsa,
        })
    }

    /// Generate a fresh key satisfying this query.
    pub fn generate(&self, network: Network) -> Result<Key> {
        let spec = self.key_spec(network)?;
        let purpose = self
            .get(PURPOSE_FIELD)
            .map(Purpose::from)
            .unwrap_or(Purpose::Identity);
        let mut key = Key::generate(spec, purpose)?;
        // Any further constraints become attributes so the key still matches.
        for (attribute, value) in &self.0 {
            if key.attribute(attribute).as_ref() != Some(value) {
                key = key.with_attribute(attribute, value.clone())?;
            }
        }
        Ok(key)
    }
}

impl fmt::Display for KeyQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => format!("{k}={s}"),
                other => format!("{k}={other}"),
            })
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// Keys every identity must hold unless configured otherwise: Bitcoin
/// keys for payment and messaging, secp256k1 keys for signing and updates.
pub fn default_required_keys() -> Vec<KeyQuery> {
    vec![
        KeyQuery::new()
            .with(TYPE_FIELD, KeyType::Bitcoin.as_str())
            .with(PURPOSE_FIELD, "payment"),
        KeyQuery::new()
            .with(TYPE_FIELD, KeyType::Bitcoin.as_str())
            .with(PURPOSE_FIELD, "messaging"),
        KeyQuery::new()
            .with(TYPE_FIELD, KeyType::Ec.as_str())
            .with(CURVE_FIELD, CurveName::Secp256k1.as_str())
            .with(PURPOSE_FIELD, "sign"),
        KeyQuery::new()
            .with(TYPE_FIELD, KeyType::Ec.as_str())
            .with(CURVE_FIELD, CurveName::Secp256k1.as_str())
            .with(PURPOSE_FIELD, "update"),
    ]
}

/// One freshly generated key per default requirement. Bitcoin keys are
/// generated on `network`.
pub fn default_key_set(network: Network) -> Result<Vec<Key>> {
    default_required_keys()
        .iter()
        .map(|query| query.generate(network))
        .collect()
}
