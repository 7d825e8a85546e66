//! Classic DSA keys.
//!
//! Domain parameters (p, q, g) are expensive to generate, so one set is
//! generated on first use and shared by every key generated afterwards
//! in the process. Parsed keys carry their own parameters.
//!
//! Key material is DER (SPKI for public, PKCS#8 for private) in base64.
//! Signatures are the fixed-width concatenation `r || s`, each padded to
//! the byte width of `q`, in hex.

use base64::Engine;
use dsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use dsa::signature::{DigestSigner, DigestVerifier};
use dsa::{BigUint, Components, KeySize, Signature, SigningKey, VerifyingKey};
use parking_lot::{const_mutex, Mutex};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::{KeyAlgorithm, KeyType};
use crate::config::DSA_FINGERPRINT_LEN;
use crate::crypto::hash;
use crate::error::{IdentityError, Result};

static DOMAIN: Mutex<Option<Components>> = const_mutex(None);

const B64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// Domain parameters shared by generated keys, built on first use.
fn shared_components() -> Components {
    let mut domain = DOMAIN.lock();
    domain
        .get_or_insert_with(|| {
            log::debug!("generating DSA domain parameters");
            #[allow(deprecated)]
            let size = KeySize::DSA_1024_160;
            Components::generate(&mut rand::thread_rng(), size)
        })
        .clone()
}

/// A DSA key, with or without its secret.
#[derive(Clone)]
pub struct DsaKey {
    public: VerifyingKey,
    /// SPKI DER of `public`, encoded once at construction.
    spki: Vec<u8>,
    secret: Option<SigningKey>,
}

impl DsaKey {
    /// Generate a fresh key pair over the shared domain parameters.
    pub fn generate() -> Result<Self> {
        let secret = SigningKey::generate(&mut rand::thread_rng(), shared_components());
        Self::from_signing_key(secret)
    }

    fn from_signing_key(secret: SigningKey) -> Result<Self> {
        let public = secret.verifying_key().clone();
        Ok(Self {
            spki: spki_der(&public)?,
            public,
            secret: Some(secret),
        })
    }

    fn from_verifying_key(public: VerifyingKey) -> Result<Self> {
        Ok(Self {
            spki: spki_der(&public)?,
            public,
            secret: None,
        })
    }

    /// Build a key from record material.
    pub fn from_parts(public: Option<&str>, private: Option<&str>) -> Result<Self> {
        let key = match (private, public) {
            (Some(private), _) => {
                let der = Zeroizing::new(B64.decode(private).map_err(|_| {
                    IdentityError::InvalidKeyMaterial("invalid DSA private key encoding".into())
                })?);
                let secret = SigningKey::from_pkcs8_der(&der).map_err(|_| {
                    IdentityError::InvalidKeyMaterial("invalid DSA private key".into())
                })?;
                Self::from_signing_key(secret)?
            }
            (None, Some(public)) => Self::from_verifying_key(parse_public(public)?)?,
            (None, None) => {
                return Err(IdentityError::InvalidKeyMaterial(
                    "pub or priv is required".into(),
                ))
            }
        };

        if let (Some(_), Some(public)) = (private, public) {
            if spki_der(&parse_public(public)?)? != key.spki {
                return Err(IdentityError::InvalidKeyMaterial(
                    "public key does not match private key".into(),
                ));
            }
        }

        Ok(key)
    }

    /// Byte width of each signature half.
    fn scalar_width(&self) -> usize {
        (self.public.components().q().bits() + 7) / 8
    }
}

fn spki_der(public: &VerifyingKey) -> Result<Vec<u8>> {
    public
        .to_public_key_der()
        .map(|doc| doc.as_bytes().to_vec())
        .map_err(|e| IdentityError::InvalidKeyMaterial(format!("cannot encode DSA public key: {e}")))
}

fn parse_public(public: &str) -> Result<VerifyingKey> {
    let der = B64
        .decode(public)
        .map_err(|e| IdentityError::InvalidKeyMaterial(format!("invalid DSA public key encoding: {e}")))?;
    VerifyingKey::from_public_key_der(&der)
        .map_err(|e| IdentityError::InvalidKeyMaterial(format!("invalid DSA public key: {e}")))
}

fn left_pad(bytes: Vec<u8>, width: usize) -> Vec<u8> {
    let mut out = vec![0u8; width.saturating_sub(bytes.len())];
    out.extend(bytes);
    out
}

impl KeyAlgorithm for DsaKey {
    fn key_type(&self) -> KeyType {
        KeyType::Dsa
    }

    fn public_bytes(&self) -> Vec<u8> {
        self.spki.clone()
    }

    fn public_string(&self) -> String {
        B64.encode(&self.spki)
    }

    fn private_string(&self) -> Option<Zeroizing<String>> {
        let secret = self.secret.as_ref()?;
        let der = secret.to_pkcs8_der().ok()?;
        Some(Zeroizing::new(B64.encode(der.as_bytes())))
    }

    fn fingerprint(&self) -> String {
        hex::encode(&hash::sha256(&self.spki)[..DSA_FINGERPRINT_LEN])
    }

    fn sign(&self, message: &[u8]) -> Result<String> {
        let secret = self
            .secret
            .as_ref()
            .ok_or_else(|| IdentityError::MissingPrivateKey(self.fingerprint()))?;
        let signature: Signature = secret
            .try_sign_digest(Sha256::new_with_prefix(message))
            .map_err(|e| IdentityError::InvalidKeyMaterial(format!("DSA signing failed: {e}")))?;
        let width = self.scalar_width();
        let mut out = left_pad(signature.r().to_bytes_be(), width);
        out.extend(left_pad(signature.s().to_bytes_be(), width));
        Ok(hex::encode(out))
    }

    fn verify(&self, message: &[u8], signature: &str) -> bool {
        let width = self.scalar_width();
        let Ok(bytes) = hex::decode(signature) else {
            return false;
        };
        if bytes.len() != width * 2 {
            return false;
        }
        let (r, s) = bytes.split_at(width);
        let Ok(signature) =
            Signature::from_components(BigUint::from_bytes_be(r), BigUint::from_bytes_be(s))
        else {
            return false;
        };
        self.public
            .verify_digest(Sha256::new_with_prefix(message), &signature)
            .is_ok()
    }

    fn extra_fields(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}
