//! Bitcoin keys: secp256k1 ECDSA bound to a network.
//!
//! The fingerprint of a Bitcoin key is its pay-to-pubkey-hash address.
//! Private material travels as compressed WIF. Messages are hashed with
//! double SHA-256 before signing.

use std::fmt;
use std::str::FromStr;

use zeroize::Zeroizing;

use super::curve::CurveName;
use super::ec::EcKey;
use super::{KeyAlgorithm, KeyType, ADDRESS_FIELD, NETWORK_FIELD};
use crate::crypto::hash;
use crate::error::{IdentityError, Result};

/// Compressed-key marker appended to a WIF payload.
const WIF_COMPRESSED: u8 = 0x01;

/// Bitcoin network a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Bitcoin,
    Testnet,
}

impl Network {
    /// Return the name used in key records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bitcoin => "bitcoin",
            Self::Testnet => "testnet",
        }
    }

    /// P2PKH address version byte.
    pub fn pubkey_hash_version(&self) -> u8 {
        match self {
            Self::Bitcoin => 0x00,
            Self::Testnet => 0x6f,
        }
    }

    /// WIF private key version byte.
    pub fn wif_version(&self) -> u8 {
        match self {
            Self::Bitcoin => 0x80,
            Self::Testnet => 0xef,
        }
    }
}

impl FromStr for Network {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bitcoin" => Ok(Self::Bitcoin),
            "testnet" => Ok(Self::Testnet),
            other => Err(IdentityError::InvalidKeyMaterial(format!(
                "unsupported network: {other}"
            ))),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A secp256k1 key with a Bitcoin network and address.
#[derive(Clone)]
pub struct BitcoinKey {
    ec: EcKey,
    network: Network,
    address: String,
}

impl BitcoinKey {
    /// Generate a fresh key for `network`.
    pub fn generate(network: Network) -> Self {
        Self::from_ec(EcKey::generate(CurveName::Secp256k1), network, None)
    }

    /// Build a key from record material.
    ///
    /// `private` is WIF; `public` is the compressed point in hex. A supplied
    /// `address` is kept verbatim rather than re-derived.
    pub fn from_parts(
        network: Network,
        public: Option<&str>,
        private: Option<&str>,
        address: Option<&str>,
    ) -> Result<Self> {
        let private_hex = private
            .map(|wif| decode_wif(wif, network))
            .transpose()?;
        let ec = EcKey::from_parts(
            CurveName::Secp256k1,
            public,
            private_hex.as_ref().map(|s| s.as_str()),
        )?;
        Ok(Self::from_ec(ec, network, address.map(str::to_owned)))
    }

    fn from_ec(ec: EcKey, network: Network, address: Option<String>) -> Self {
        let address = address.unwrap_or_else(|| p2pkh_address(&ec.compressed_public(), network));
        Self {
            ec,
            network,
            address,
        }
    }

    /// The network this key belongs to.
    pub fn network(&self) -> Network {
        self.network
    }

    /// The P2PKH address.
    pub fn address(&self) -> &str {
        &self.address
    }
}

/// Base58Check P2PKH address for a compressed public key.
pub fn p2pkh_address(compressed_public: &[u8], network: Network) -> String {
    bs58::encode(hash::hash160(compressed_public))
        .with_check_version(network.pubkey_hash_version())
        .into_string()
}

fn encode_wif(secret: &[u8], network: Network) -> Zeroizing<String> {
    let mut payload = Zeroizing::new(Vec::with_capacity(secret.len() + 1));
    payload.extend_from_slice(secret);
    payload.push(WIF_COMPRESSED);
    Zeroizing::new(
        bs58::encode(&payload[..])
            .with_check_version(network.wif_version())
            .into_string(),
    )
}

/// Decode a WIF string to the hex secret scalar.
fn decode_wif(wif: &str, network: Network) -> Result<Zeroizing<String>> {
    let decoded = Zeroizing::new(
        bs58::decode(wif)
            .with_check(None)
            .into_vec()
            .map_err(|_| IdentityError::InvalidKeyMaterial("invalid WIF private key".into()))?,
    );
    let (version, body) = decoded
        .split_first()
        .ok_or_else(|| IdentityError::InvalidKeyMaterial("empty WIF private key".into()))?;
    if *version != network.wif_version() {
        return Err(IdentityError::InvalidKeyMaterial(format!(
            "WIF private key is not for {network}"
        )));
    }
    let secret = match body {
        [secret @ .., WIF_COMPRESSED] if secret.len() == 32 => secret,
        secret if secret.len() == 32 => secret,
        _ => {
            return Err(IdentityError::InvalidKeyMaterial(
                "WIF private key has the wrong length".into(),
            ))
        }
    };
    Ok(Zeroizing::new(hex::encode(secret)))
}

impl KeyAlgorithm for BitcoinKey {
    fn key_type(&self) -> KeyType {
        KeyType::Bitcoin
    }

    fn public_bytes(&self) -> Vec<u8> {
        self.ec.compressed_public()
    }

    fn public_string(&self) -> String {
        self.ec.public_string()
    }

    fn private_string(&self) -> Option<Zeroizing<String>> {
        self.ec
            .secret_bytes()
            .map(|secret| encode_wif(&secret, self.network))
    }

    fn fingerprint(&self) -> String {
        self.address.clone()
    }

    fn sign(&self, message: &[u8]) -> Result<String> {
        self.ec
            .sign_prehash(&hash::sha256d(message))
            .map(hex::encode)
    }

    fn verify(&self, message: &[u8], signature: &str) -> bool {
        match hex::decode(signature) {
            Ok(der) => self.ec.verify_prehash(&hash::sha256d(message), &der),
            Err(_) => false,
        }
    }

    fn extra_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            (NETWORK_FIELD, self.network.as_str().to_string()),
            (ADDRESS_FIELD, self.address.clone()),
        ]
    }
}
