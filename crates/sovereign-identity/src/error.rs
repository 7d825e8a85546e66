//! Error types for sovereign identities.
//!
//! All errors are strongly typed and propagated without panicking.
//! Private key material is never included in error messages.

/// Identity error types covering keys, identities, and the address book.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("Unrecognized key type: {0}")]
    UnrecognizedKeyType(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Missing private key for {0}")]
    MissingPrivateKey(String),

    #[error("Missing required key: {0}")]
    MissingRequiredKey(String),

    #[error("Invalid signature at {path}")]
    InvalidSignature { path: String },

    #[error("An identity with {index} \"{value}\" is already in the address book")]
    DuplicateIndexValue { index: String, value: String },

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Invalid property {field}: {reason}")]
    InvalidProperty { field: String, reason: String },

    #[error("Invalid revocation: {0}")]
    InvalidRevocation(String),

    #[error("Invalid index: {0}")]
    InvalidIndex(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for IdentityError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, IdentityError>;
