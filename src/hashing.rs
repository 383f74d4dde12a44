//! The hash function behind every digest in this crate.
//!
//! Spec pins the algorithm explicitly ("HashFunction.compute(bytes) ->
//! Hash32 (SHA-256 behavior)"), unlike the teacher's free choice of
//! BLAKE3. The domain-separated free-function style below mirrors the
//! teacher's `blake3_hash`/`blake3_hash_block`/`blake3_hash_tx` helpers
//! in `crypto.rs`.

use crate::primitives::Hash32;
use sha2::{Digest, Sha256};

/// Abstract hash function collaborator per spec §6. Kept as a trait so
/// callers that want to inject a mock in tests can do so, even though the
/// protocol always uses [`Sha256Hasher`] in practice.
pub trait HashFunction: Send + Sync {
    fn compute(&self, data: &[u8]) -> Hash32;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Hasher;

impl HashFunction for Sha256Hasher {
    fn compute(&self, data: &[u8]) -> Hash32 {
        sha256(data)
    }
}

/// Plain SHA-256 over `data`.
pub fn sha256(data: &[u8]) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Hash32(out)
}

/// SHA-256 over the concatenation of two byte slices, the shape used by
/// challenge derivation and Merkle folding.
pub fn sha256_concat(a: &[u8], b: &[u8]) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update(a);
    hasher.update(b);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Hash32(out)
}
