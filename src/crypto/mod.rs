//! Cryptographic utilities for the miner
//!
//! This module provides:
//! - SHA-256 hashing
//! - ECDSA signature verification (secp256k1)
//! - Merkle root calculation

pub mod hash;
pub mod keys;
pub mod merkle;

pub use hash::{double_sha256, double_sha256_hex, hash_from_hex, sha256, Hash, ZERO_HASH};
pub use keys::{
    p2pkh_script_sig, parse_p2pkh_script_sig, KeyError, KeyPair, Secp256k1Verifier,
    SignatureVerifier, TrustingVerifier,
};
pub use merkle::calculate_merkle_root;
