//! Typed profile sections of an identity.
//!
//! Each section names the fields it requires; anything else in the
//! record is kept in `extra` and written back unchanged.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{IdentityError, Result};

/// A person's or organization's name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Name {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Name {
    pub fn formatted(name: &str) -> Self {
        Self {
            formatted: Some(name.to_string()),
            ..Self::default()
        }
    }
}

/// Where the identity is located.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Website {
    pub url: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A contact channel, e.g. `{"type": "email", "identifier": "ted@x.io"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(rename = "type")]
    pub kind: String,
    pub identifier: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A payment destination, e.g. a Bitcoin address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    #[serde(rename = "type")]
    pub kind: String,
    pub identifier: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An account on another service, with a link proving ownership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(rename = "type")]
    pub kind: String,
    pub username: String,
    pub proof_url: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A signed public statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub message: String,
    pub signature: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    #[serde(rename = "type")]
    pub kind: String,
    pub username: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

macro_rules! simple_constructor {
    ($ty:ident { $($field:ident),+ }) => {
        impl $ty {
            pub fn new($($field: &str),+) -> Self {
                Self {
                    $($field: $field.to_string(),)+
                    extra: Map::new(),
                }
            }
        }
    };
}

simple_constructor!(Photo { kind, url });
simple_constructor!(Website { url });
simple_constructor!(Contact { kind, identifier });
simple_constructor!(Payment { kind, identifier });
simple_constructor!(Profile { kind, username, proof_url });
simple_constructor!(Statement { message, signature });
simple_constructor!(Connection { kind, username });

/// Parse one section record, reporting failures against `field`.
pub(crate) fn parse<T: DeserializeOwned>(field: &str, value: &Value) -> Result<T> {
    T::deserialize(value).map_err(|e| IdentityError::InvalidProperty {
        field: field.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a list-valued section. A lone record is accepted as a list of one.
pub(crate) fn parse_list<T: DeserializeOwned>(field: &str, value: &Value) -> Result<Vec<T>> {
    match value {
        Value::Array(items) => items.iter().map(|item| parse(field, item)).collect(),
        Value::Object(_) => Ok(vec![parse(field, value)?]),
        Value::Null => Ok(Vec::new()),
        _ => Err(IdentityError::InvalidProperty {
            field: field.to_string(),
            reason: "expected a list of records".into(),
        }),
    }
}
