//! Wire constants and identity configuration.
//!
//! The constants here define the JSON shape of exported identities.
//! Changing any of them breaks every signature ever produced over an
//! export, so they are effectively frozen.

use serde::{Deserialize, Serialize};

use crate::error::{IdentityError, Result};
use crate::identity::KeyQuery;

// ---------------------------------------------------------------------------
// Identity record
// ---------------------------------------------------------------------------

/// Version tag written into every identity record under `v`.
pub const IDENTITY_VERSION: &str = "0.3";

/// Field holding the version tag.
pub const VERSION_FIELD: &str = "v";

/// Field holding the type discriminator.
pub const TYPE_FIELD: &str = "_t";

/// Type discriminator value for identity records.
pub const IDENTITY_TYPE: &str = "identity";

/// Field holding the array of key records.
pub const PUBKEYS_FIELD: &str = "pubkeys";

/// Field carrying an embedded signature on a signed record.
pub const SIG_FIELD: &str = "_sig";

// ---------------------------------------------------------------------------
// Key parameters
// ---------------------------------------------------------------------------

/// Curve used when an EC key record or query names none.
pub const DEFAULT_CURVE: &str = "secp256k1";

/// Byte length of the random nonce in a revocation certificate.
pub const REVOCATION_NONCE_LEN: usize = 16;

/// Number of SHA-256 bytes kept in a DSA fingerprint.
pub const DSA_FINGERPRINT_LEN: usize = 20;

// ---------------------------------------------------------------------------
// Runtime configuration
// ---------------------------------------------------------------------------

/// Tunables for building and loading identities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IdentityConfig {
    /// Every query must be matched by at least one held key before an
    /// identity may be serialized or loaded.
    pub required_keys: Vec<KeyQuery>,
    /// Skip key records with an unrecognized `type` instead of failing
    /// the whole load.
    pub lenient_key_types: bool,
}

impl IdentityConfig {
    /// Parse a configuration document. Missing fields take their defaults.
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| IdentityError::InvalidProperty {
            field: "config".into(),
            reason: e.to_string(),
        })
    }

    /// A configuration that requires no keys at all.
    pub fn permissive() -> Self {
        Self {
            required_keys: Vec::new(),
            lenient_key_types: false,
        }
    }

    /// Replace the required key set.
    pub fn with_required_keys(mut self, required_keys: Vec<KeyQuery>) -> Self {
        self.required_keys = required_keys;
        self
    }

    /// Toggle lenient loading of unrecognized key types.
    pub fn lenient(mut self, lenient: bool) -> Self {
        self.lenient_key_types = lenient;
        self
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            required_keys: crate::identity::requirements::default_required_keys(),
            lenient_key_types: false,
        }
    }
}
