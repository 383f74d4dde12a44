//! Merkle tree construction and inclusion-proof verification.
//!
//! Spec scopes the actual tree implementation as an external
//! collaborator ("the core depends on the contract that `build(leaves)`
//! yields a root and `verify(...)` is decidable"), but a concrete,
//! SHA-256-based implementation is needed for both the transaction root
//! (§4.6 step 6) and the plot-inclusion proof (§4.3 step 5). This
//! generalizes the teacher's `Block::calculate_merkle_root` (pairwise
//! folding, duplicate-last-node padding for odd counts) into a full
//! build+verify pair; the teacher never needed inclusion proofs since it
//! only ever recomputed the whole root.

use crate::hashing::sha256_concat;
use crate::primitives::Hash32;

/// Build a Merkle root over `leaves`.
///
/// - Empty list -> the all-zero root (spec §4.6 step 6).
/// - Single leaf -> that leaf's hash is the root directly (tree of
///   height 0; see DESIGN.md's resolution of the single-leaf open
///   question).
/// - Odd node count at any level -> the last node is duplicated, the
///   same convention the teacher's block Merkle root uses.
pub fn build(leaves: &[Hash32]) -> Hash32 {
    if leaves.is_empty() {
        return Hash32::ZERO;
    }
    let mut level: Vec<Hash32> = leaves.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity((level.len() + 1) / 2);
        for pair in level.chunks(2) {
            let left = pair[0];
            let right = if pair.len() > 1 { pair[1] } else { pair[0] };
            next.push(sha256_concat(left.as_bytes(), right.as_bytes()));
        }
        level = next;
    }
    level[0]
}

/// Orientation of a sibling hash relative to the node being folded:
/// `true` means the sibling is on the left.
pub type Orientation = bool;

/// Verify that folding `leaf` with `path[i]` per `orientation[i]`
/// reconstructs `root`. `path` and `orientation` must be the same
/// length; a length mismatch is treated as an invalid proof rather than
/// a panic.
pub fn verify(leaf: Hash32, path: &[Hash32], orientation: &[Orientation], root: Hash32) -> bool {
    if path.len() != orientation.len() {
        return false;
    }
    let mut acc = leaf;
    for (sibling, sibling_is_left) in path.iter().zip(orientation.iter()) {
        acc = if *sibling_is_left {
            sha256_concat(sibling.as_bytes(), acc.as_bytes())
        } else {
            sha256_concat(acc.as_bytes(), sibling.as_bytes())
        };
    }
    acc == root
}

/// Fold `leaf` with `path` per `orientation` and return the resulting
/// root, or `None` if `path`/`orientation` lengths disagree. Used by
/// [`crate::proof`] where the reconstructed root itself (not just a
/// match/no-match verdict) is needed for the PlotRootMismatch check.
pub fn reconstruct_root(leaf: Hash32, path: &[Hash32], orientation: &[Orientation]) -> Option<Hash32> {
    if path.len() != orientation.len() {
        return None;
    }
    let mut acc = leaf;
    for (sibling, sibling_is_left) in path.iter().zip(orientation.iter()) {
        acc = if *sibling_is_left {
            sha256_concat(sibling.as_bytes(), acc.as_bytes())
        } else {
            sha256_concat(acc.as_bytes(), sibling.as_bytes())
        };
    }
    Some(acc)
}

/// Build a root and, for every leaf, the inclusion path/orientation that
/// `verify` accepts against that root. Used by tests and by anything
/// assembling a `BlockProof`-shaped structure from a known leaf set.
pub fn build_with_proofs(leaves: &[Hash32]) -> (Hash32, Vec<(Vec<Hash32>, Vec<Orientation>)>) {
    if leaves.is_empty() {
        return (Hash32::ZERO, Vec::new());
    }
    let n = leaves.len();
    let mut levels: Vec<Vec<Hash32>> = vec![leaves.to_vec()];
    while levels.last().unwrap().len() > 1 {
        let cur = levels.last().unwrap();
        let mut next = Vec::with_capacity((cur.len() + 1) / 2);
        for pair in cur.chunks(2) {
            let left = pair[0];
            let right = if pair.len() > 1 { pair[1] } else { pair[0] };
            next.push(sha256_concat(left.as_bytes(), right.as_bytes()));
        }
        levels.push(next);
    }
    let root = *levels.last().unwrap().first().unwrap();

    let mut proofs = Vec::with_capacity(n);
    for leaf_index in 0..n {
        let mut path = Vec::new();
        let mut orientation = Vec::new();
        let mut idx = leaf_index;
        for level in &levels[..levels.len() - 1] {
            let pair_start = idx - (idx % 2);
            let sibling_idx = if idx % 2 == 0 { idx + 1 } else { idx - 1 };
            let sibling = if sibling_idx < level.len() {
                level[sibling_idx]
            } else {
                level[pair_start]
            };
            path.push(sibling);
            orientation.push(idx % 2 == 1); // sibling is on the left iff we're the right node
            idx /= 2;
        }
        proofs.push((path, orientation));
    }
    (root, proofs)
}
