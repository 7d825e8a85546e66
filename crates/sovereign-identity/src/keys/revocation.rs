//! Key revocation certificates.
//!
//! A certificate names the revoked public key, a reason code from the
//! X.509 CRL reason set, and a random nonce, and is signed by the key it
//! revokes. The signature covers the canonical certificate without `sig`.
//!
//! Certificates sit inside key records, so their signature field is `sig`
//! rather than `_sig`: every `_sig` in an identity document belongs to the
//! signature tree.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Key;
use crate::canonical;
use crate::config::REVOCATION_NONCE_LEN;
use crate::crypto::random;
use crate::error::{IdentityError, Result};

/// Attribute under which attached certificates are kept on a key.
pub const REVOCATIONS_FIELD: &str = "revocations";

/// CRL reason codes. Code 7 is unassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RevocationReason {
    Unspecified,
    KeyCompromise,
    CaCompromise,
    AffiliationChanged,
    Superseded,
    CessationOfOperation,
    CertificateHold,
    RemoveFromCrl,
    PrivilegeWithdrawn,
    AaCompromise,
}

impl RevocationReason {
    /// Numeric code as written into certificates.
    pub fn code(&self) -> u8 {
        match self {
            Self::Unspecified => 0,
            Self::KeyCompromise => 1,
            Self::CaCompromise => 2,
            Self::AffiliationChanged => 3,
            Self::Superseded => 4,
            Self::CessationOfOperation => 5,
            Self::CertificateHold => 6,
            Self::RemoveFromCrl => 8,
            Self::PrivilegeWithdrawn => 9,
            Self::AaCompromise => 10,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        Some(match code {
            0 => Self::Unspecified,
            1 => Self::KeyCompromise,
            2 => Self::CaCompromise,
            3 => Self::AffiliationChanged,
            4 => Self::Superseded,
            5 => Self::CessationOfOperation,
            6 => Self::CertificateHold,
            8 => Self::RemoveFromCrl,
            9 => Self::PrivilegeWithdrawn,
            10 => Self::AaCompromise,
            _ => return None,
        })
    }
}

/// A signed statement that a key is revoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationCertificate {
    /// CRL reason code. Kept raw so unknown codes survive parsing and are
    /// rejected by validation instead.
    pub reason: u64,
    /// Public value of the revoked key.
    pub value: String,
    /// Random hex nonce.
    pub nonce: String,
    /// Signature by the revoked key.
    pub sig: String,
}

#[derive(Serialize)]
struct UnsignedCertificate<'a> {
    reason: u64,
    value: &'a str,
    nonce: &'a str,
}

impl RevocationCertificate {
    fn signed_content(&self) -> Result<String> {
        canonical::canonicalize(&UnsignedCertificate {
            reason: self.reason,
            value: &self.value,
            nonce: &self.nonce,
        })
    }

    /// Parse a certificate from its JSON record.
    pub fn from_value(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| IdentityError::InvalidRevocation(e.to_string()))
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

impl Key {
    /// Produce a certificate revoking this key. Requires the secret.
    pub fn generate_revocation(&self, reason: RevocationReason) -> Result<RevocationCertificate> {
        let mut cert = RevocationCertificate {
            reason: u64::from(reason.code()),
            value: self.value().to_string(),
            nonce: random::random_hex_nonce::<REVOCATION_NONCE_LEN>(),
            sig: String::new(),
        };
        cert.sig = self.sign(cert.signed_content()?.as_bytes())?;
        Ok(cert)
    }

    /// Check that `cert` revokes this key and carries a known reason.
    pub fn validate_revocation(&self, cert: &RevocationCertificate) -> Result<()> {
        let content = cert.signed_content()?;
        if cert.value != self.value() || !self.verify(content.as_bytes(), &cert.sig) {
            return Err(IdentityError::InvalidSignature {
                path: REVOCATIONS_FIELD.into(),
            });
        }
        if RevocationReason::from_code(cert.reason).is_none() {
            return Err(IdentityError::InvalidRevocation(format!(
                "unknown reason code {}",
                cert.reason
            )));
        }
        Ok(())
    }

    /// Return a copy of this key with a new certificate appended to its
    /// `revocations` attribute.
    pub fn with_revocation(mut self, reason: RevocationReason) -> Result<Self> {
        let cert = self.generate_revocation(reason)?.to_value()?;
        match self.attributes.get_mut(REVOCATIONS_FIELD) {
            Some(Value::Array(list)) => list.push(cert),
            _ => {
                self.attributes
                    .insert(REVOCATIONS_FIELD.into(), Value::Array(vec![cert]));
            }
        }
        Ok(self)
    }

    /// Certificates attached to this key that validate against it.
    pub fn revocations(&self) -> Vec<RevocationCertificate> {
        let Some(Value::Array(list)) = self.attributes.get(REVOCATIONS_FIELD) else {
            return Vec::new();
        };
        list.iter()
            .filter_map(|v| RevocationCertificate::from_value(v).ok())
            .filter(|cert| self.validate_revocation(cert).is_ok())
            .collect()
    }
}
