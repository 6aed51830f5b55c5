//! Bitcoin transaction merkle trees (Double-SHA256, duplicate-last padding).

use alloc::vec::Vec;

use bitcoin::hashes::{sha256d, Hash, HashEngine};

use crate::error::BridgeError;

/// `sha256d(left || right)`.
pub fn hash256_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut engine = sha256d::Hash::engine();
    engine.input(left);
    engine.input(right);
    sha256d::Hash::from_engine(engine).to_byte_array()
}

/// Folds `leaf` up a branch of concatenated 32-byte siblings.
///
/// At depth `d` the bit `d` of `index` decides the side: 1 puts the sibling on the
/// left. Fails if the branch is not a whole number of hashes or if `index` does not
/// fit in a tree of that depth.
pub fn compute_root(leaf: &[u8; 32], branch: &[u8], index: u64) -> Result<[u8; 32], BridgeError> {
    if branch.len() % 32 != 0 {
        return Err(BridgeError::InvalidMerkleProofLength(branch.len()));
    }
    let depth = branch.len() / 32;
    if depth < 64 && index >> depth != 0 {
        return Err(BridgeError::InvalidMerkleProof);
    }

    let mut current = *leaf;
    let mut idx = index;
    for chunk in branch.chunks_exact(32) {
        let mut sibling = [0u8; 32];
        sibling.copy_from_slice(chunk);
        current = if idx & 1 == 1 {
            hash256_pair(&sibling, &current)
        } else {
            hash256_pair(&current, &sibling)
        };
        idx >>= 1;
    }
    Ok(current)
}

/// True if `leaf` at `index` proves into `root` through `branch`.
///
/// A single-transaction block has an empty branch and `leaf == root`.
pub fn prove(leaf: &[u8; 32], root: &[u8; 32], branch: &[u8], index: u64) -> Result<bool, BridgeError> {
    Ok(&compute_root(leaf, branch, index)? == root)
}

/// Merkle root of `leaves` (internal byte order), or `None` for an empty list.
pub fn merkle_root(leaves: &[[u8; 32]]) -> Option<[u8; 32]> {
    build_proof(leaves, 0).map(|(root, _)| root)
}

/// Root and sibling branch proving `leaves[index]`.
pub fn build_proof(leaves: &[[u8; 32]], index: usize) -> Option<([u8; 32], Vec<u8>)> {
    if index >= leaves.len() {
        return None;
    }
    let mut level = leaves.to_vec();
    let mut idx = index;
    let mut branch = Vec::new();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            let last = level[level.len() - 1];
            level.push(last);
        }
        branch.extend_from_slice(&level[idx ^ 1]);
        level = level
            .chunks_exact(2)
            .map(|pair| hash256_pair(&pair[0], &pair[1]))
            .collect();
        idx >>= 1;
    }
    Some((level[0], branch))
}
