//! Hashing and randomness shared by every key variant.
//!
//! This module provides:
//! - SHA-256, double SHA-256 and HASH160 digests
//! - Cryptographically secure random bytes for key generation and nonces

pub mod hash;
pub mod random;
