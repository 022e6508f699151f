//! Merkle root over transaction ids
//!
//! Bitcoin-style tree: sha256d of concatenated children, odd levels
//! duplicate their last node.

use super::{hash_pair, Hash};

/// Compute the merkle root of a list of transaction hashes
///
/// If the list is empty, returns zero hash.
/// A single leaf is its own root.
pub fn compute_merkle_root(hashes: &[Hash]) -> Hash {
    let mut current_level: Vec<Hash> = hashes.to_vec();

    while current_level.len() > 1 {
        let mut next_level = Vec::with_capacity((current_level.len() + 1) / 2);
        for pair in current_level.chunks(2) {
            let right = pair.get(1).unwrap_or(&pair[0]);
            next_level.push(hash_pair(&pair[0], right));
        }
        current_level = next_level;
    }

    current_level.first().copied().unwrap_or_else(Hash::zero)
}
