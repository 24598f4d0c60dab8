//! Merkle tree root calculation over transaction ids
//!
//! The pairing rule (duplicate the last id of an odd level) is part of the
//! header commitment and must match bit-for-bit.

use super::hash::{double_sha256, Hash, ZERO_HASH};

/// Hash two child nodes into their parent
fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut data = [0u8; 64];
    data[..32].copy_from_slice(left);
    data[32..].copy_from_slice(right);
    double_sha256(&data)
}

/// Calculate the merkle root from an ordered list of transaction ids
///
/// An empty list yields the all-zero root; a single id is its own root.
pub fn calculate_merkle_root(ids: &[Hash]) -> Hash {
    if ids.is_empty() {
        return ZERO_HASH;
    }

    let mut current_level: Vec<Hash> = ids.to_vec();

    while current_level.len() > 1 {
        current_level = current_level
            .chunks(2)
            .map(|chunk| match chunk {
                [left, right] => hash_pair(left, right),
                // Duplicate the last hash if odd number
                [last] => hash_pair(last, last),
                _ => unreachable!("chunks(2) yields one or two elements"),
            })
            .collect();
    }

    current_level[0]
}
