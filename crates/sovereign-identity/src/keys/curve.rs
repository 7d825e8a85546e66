//! Process-wide elliptic curve contexts.
//!
//! A curve context is built the first time a curve name is used and then
//! shared read-only by every key on that curve. Construction happens at
//! most once per name: the lookup and the insert run under one lock, so
//! racing first users of a curve all receive the same `Arc`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::{const_mutex, Mutex};
use secp256k1::{All, Secp256k1};

use crate::error::{IdentityError, Result};

static CURVES: Mutex<BTreeMap<CurveName, Arc<CurveContext>>> = const_mutex(BTreeMap::new());

/// Supported curve names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CurveName {
    Secp256k1,
    P256,
}

impl CurveName {
    /// Return the name used in key records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Secp256k1 => "secp256k1",
            Self::P256 => "p256",
        }
    }
}

impl FromStr for CurveName {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "secp256k1" => Ok(Self::Secp256k1),
            "p256" | "P-256" | "prime256v1" => Ok(Self::P256),
            other => Err(IdentityError::InvalidKeyMaterial(format!(
                "unsupported curve: {other}"
            ))),
        }
    }
}

impl fmt::Display for CurveName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared, immutable per-curve state.
pub enum CurveContext {
    /// libsecp256k1 signing and verification context.
    Secp256k1(Secp256k1<All>),
    /// The P-256 backend is stateless.
    P256,
}

impl CurveContext {
    fn build(name: CurveName) -> Self {
        match name {
            CurveName::Secp256k1 => Self::Secp256k1(Secp256k1::new()),
            CurveName::P256 => Self::P256,
        }
    }

    /// The curve this context belongs to.
    pub fn name(&self) -> CurveName {
        match self {
            Self::Secp256k1(_) => CurveName::Secp256k1,
            Self::P256 => CurveName::P256,
        }
    }
}

impl fmt::Debug for CurveContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CurveContext").field(&self.name()).finish()
    }
}

/// Return the shared context for `name`, building it on first use.
pub fn curve(name: CurveName) -> Arc<CurveContext> {
    let mut curves = CURVES.lock();
    curves
        .entry(name)
        .or_insert_with(|| {
            log::debug!("initializing curve context for {name}");
            Arc::new(CurveContext::build(name))
        })
        .clone()
}
