//! Cryptographic hashing utilities for the miner
//!
//! Provides the SHA-256 based digests used for transaction ids, header
//! hashes and merkle tree nodes.

use sha2::{Digest, Sha256};

/// A 256-bit digest
pub type Hash = [u8; 32];

/// The all-zero digest
pub const ZERO_HASH: Hash = [0u8; 32];

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let mut hash = ZERO_HASH;
    hash.copy_from_slice(&hasher.finalize());
    hash
}

/// Computes double SHA-256 hash (SHA-256 of SHA-256)
/// Used for transaction ids, block hashes and merkle nodes
pub fn double_sha256(data: &[u8]) -> Hash {
    sha256(&sha256(data))
}

/// Computes double SHA-256 hash and returns it as a hex string
pub fn double_sha256_hex(data: &[u8]) -> String {
    hex::encode(double_sha256(data))
}

/// Parse a 64-character hex string into a digest
pub fn hash_from_hex(hex_str: &str) -> Option<Hash> {
    let bytes = hex::decode(hex_str).ok()?;
    bytes.try_into().ok()
}
