//! Generic elliptic curve keys (ECDSA).
//!
//! Public material is the compressed SEC1 point in hex, private material
//! the 32-byte scalar in hex. Messages are hashed with SHA-256 and the
//! digest is signed; signatures are DER encoded hex.

use std::sync::Arc;

use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use zeroize::Zeroizing;

use super::curve::{self, CurveContext, CurveName};
use super::{KeyAlgorithm, KeyType};
use crate::crypto::{hash, random};
use crate::error::{IdentityError, Result};

/// An ECDSA key on a named curve, with or without its secret.
#[derive(Clone)]
pub struct EcKey {
    context: Arc<CurveContext>,
    inner: EcInner,
}

#[derive(Clone)]
enum EcInner {
    Secp256k1 {
        public: secp256k1::PublicKey,
        secret: Option<secp256k1::SecretKey>,
    },
    P256 {
        public: p256::ecdsa::VerifyingKey,
        secret: Option<p256::ecdsa::SigningKey>,
    },
}

impl EcKey {
    /// Generate a fresh key pair on `curve`.
    pub fn generate(curve: CurveName) -> Self {
        let context = curve::curve(curve);
        let inner = match &*context {
            CurveContext::Secp256k1(secp) => {
                let secret = loop {
                    let bytes = Zeroizing::new(random::random_bytes::<32>());
                    // Out-of-range scalars are astronomically rare; draw again.
                    if let Ok(sk) = secp256k1::SecretKey::from_slice(&bytes[..]) {
                        break sk;
                    }
                };
                EcInner::Secp256k1 {
                    public: secp256k1::PublicKey::from_secret_key(secp, &secret),
                    secret: Some(secret),
                }
            }
            CurveContext::P256 => {
                let secret = loop {
                    let bytes = Zeroizing::new(random::random_bytes::<32>());
                    if let Ok(sk) = p256::ecdsa::SigningKey::from_slice(&bytes[..]) {
                        break sk;
                    }
                };
                EcInner::P256 {
                    public: secret.verifying_key().to_owned(),
                    secret: Some(secret),
                }
            }
        };
        Self { context, inner }
    }

    /// Build a key from record material.
    ///
    /// At least one of `public` and `private` is required. When both are
    /// given, the public point derived from `private` must match `public`.
    pub fn from_parts(curve: CurveName, public: Option<&str>, private: Option<&str>) -> Result<Self> {
        let context = curve::curve(curve);
        let key = match (private, public) {
            (Some(private), _) => Self::parse_private(context, private)?,
            (None, Some(public)) => Self::parse_public(context, public)?,
            (None, None) => {
                return Err(IdentityError::InvalidKeyMaterial(
                    "pub or priv is required".into(),
                ))
            }
        };

        if let (Some(_), Some(public)) = (private, public) {
            let claimed = Self::parse_public(key.context.clone(), public)?;
            if claimed.public_bytes() != key.public_bytes() {
                return Err(IdentityError::InvalidKeyMaterial(
                    "public key does not match private key".into(),
                ));
            }
        }

        Ok(key)
    }

    fn parse_public(context: Arc<CurveContext>, public: &str) -> Result<Self> {
        let bytes = hex::decode(public)
            .map_err(|e| IdentityError::InvalidKeyMaterial(format!("invalid public key hex: {e}")))?;
        let inner = match &*context {
            CurveContext::Secp256k1(_) => EcInner::Secp256k1 {
                public: secp256k1::PublicKey::from_slice(&bytes).map_err(|e| {
                    IdentityError::InvalidKeyMaterial(format!("invalid secp256k1 point: {e}"))
                })?,
                secret: None,
            },
            CurveContext::P256 => EcInner::P256 {
                public: p256::ecdsa::VerifyingKey::from_sec1_bytes(&bytes).map_err(|e| {
                    IdentityError::InvalidKeyMaterial(format!("invalid p256 point: {e}"))
                })?,
                secret: None,
            },
        };
        Ok(Self { context, inner })
    }

    fn parse_private(context: Arc<CurveContext>, private: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            hex::decode(private)
                .map_err(|_| IdentityError::InvalidKeyMaterial("invalid private key hex".into()))?,
        );
        let inner = match &*context {
            CurveContext::Secp256k1(secp) => {
                let secret = secp256k1::SecretKey::from_slice(&bytes).map_err(|_| {
                    IdentityError::InvalidKeyMaterial("invalid secp256k1 private key".into())
                })?;
                EcInner::Secp256k1 {
                    public: secp256k1::PublicKey::from_secret_key(secp, &secret),
                    secret: Some(secret),
                }
            }
            CurveContext::P256 => {
                let secret = p256::ecdsa::SigningKey::from_slice(&bytes).map_err(|_| {
                    IdentityError::InvalidKeyMaterial("invalid p256 private key".into())
                })?;
                EcInner::P256 {
                    public: secret.verifying_key().to_owned(),
                    secret: Some(secret),
                }
            }
        };
        Ok(Self { context, inner })
    }

    /// The curve this key lives on.
    pub fn curve(&self) -> CurveName {
        self.context.name()
    }

    /// Compressed SEC1 encoding of the public point.
    pub fn compressed_public(&self) -> Vec<u8> {
        match &self.inner {
            EcInner::Secp256k1 { public, .. } => public.serialize().to_vec(),
            EcInner::P256 { public, .. } => public.to_encoded_point(true).as_bytes().to_vec(),
        }
    }

    /// Raw secret scalar, if held.
    pub(crate) fn secret_bytes(&self) -> Option<Zeroizing<Vec<u8>>> {
        match &self.inner {
            EcInner::Secp256k1 { secret, .. } => secret
                .as_ref()
                .map(|sk| Zeroizing::new(sk.secret_bytes().to_vec())),
            EcInner::P256 { secret, .. } => secret
                .as_ref()
                .map(|sk| Zeroizing::new(sk.to_bytes().to_vec())),
        }
    }

    /// Sign a 32-byte digest, returning the DER signature bytes.
    pub(crate) fn sign_prehash(&self, digest: &[u8; 32]) -> Result<Vec<u8>> {
        let missing = || IdentityError::MissingPrivateKey(self.public_string());
        match (&*self.context, &self.inner) {
            (CurveContext::Secp256k1(secp), EcInner::Secp256k1 { secret, .. }) => {
                let secret = secret.as_ref().ok_or_else(missing)?;
                let message = secp256k1::Message::from_digest(*digest);
                Ok(secp.sign_ecdsa(&message, secret).serialize_der().to_vec())
            }
            (CurveContext::P256, EcInner::P256 { secret, .. }) => {
                let secret = secret.as_ref().ok_or_else(missing)?;
                let signature: p256::ecdsa::Signature = secret
                    .sign_prehash(digest)
                    .map_err(|e| IdentityError::InvalidKeyMaterial(format!("p256 signing failed: {e}")))?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            _ => Err(IdentityError::InvalidKeyMaterial(
                "curve context does not match key material".into(),
            )),
        }
    }

    /// Verify a DER signature over a 32-byte digest.
    pub(crate) fn verify_prehash(&self, digest: &[u8; 32], der: &[u8]) -> bool {
        match (&*self.context, &self.inner) {
            (CurveContext::Secp256k1(secp), EcInner::Secp256k1 { public, .. }) => {
                let Ok(mut signature) = secp256k1::ecdsa::Signature::from_der(der) else {
                    return false;
                };
                signature.normalize_s();
                let message = secp256k1::Message::from_digest(*digest);
                secp.verify_ecdsa(&message, &signature, public).is_ok()
            }
            (CurveContext::P256, EcInner::P256 { public, .. }) => {
                let Ok(signature) = p256::ecdsa::Signature::from_der(der) else {
                    return false;
                };
                public.verify_prehash(digest, &signature).is_ok()
            }
            _ => false,
        }
    }
}

impl KeyAlgorithm for EcKey {
    fn key_type(&self) -> KeyType {
        KeyType::Ec
    }

    fn public_bytes(&self) -> Vec<u8> {
        self.compressed_public()
    }

    fn public_string(&self) -> String {
        hex::encode(self.compressed_public())
    }

    fn private_string(&self) -> Option<Zeroizing<String>> {
        self.secret_bytes()
            .map(|bytes| Zeroizing::new(hex::encode(&bytes[..])))
    }

    fn fingerprint(&self) -> String {
        hash::sha256_hex(&self.compressed_public())
    }

    fn sign(&self, message: &[u8]) -> Result<String> {
        self.sign_prehash(&hash::sha256(message)).map(hex::encode)
    }

    fn verify(&self, message: &[u8], signature: &str) -> bool {
        match hex::decode(signature) {
            Ok(der) => self.verify_prehash(&hash::sha256(message), &der),
            Err(_) => false,
        }
    }

    fn extra_fields(&self) -> Vec<(&'static str, String)> {
        vec![(super::CURVE_FIELD, self.curve().as_str().to_string())]
    }
}

impl Drop for EcKey {
    fn drop(&mut self) {
        if let EcInner::Secp256k1 {
            secret: Some(secret),
            ..
        } = &mut self.inner
        {
            secret.non_secure_erase();
        }
    }
}
