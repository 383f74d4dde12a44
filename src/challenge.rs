//! Deterministic challenge derivation (spec §4.1).
//!
//! Mirrors the teacher's domain-separated hashing helpers
//! (`blake3_hash_block`, `blake3_hash_tx` in `crypto.rs`) — a small
//! free function per derivation purpose — rehomed onto SHA-256 with the
//! exact preimages spec §4.1 specifies.

use crate::error::ArgumentError;
use crate::hashing::sha256;
use crate::primitives::{Epoch, Hash32};

/// `SHA256(parent_hash || epoch_le_u64)`. `epoch` must be non-negative;
/// its little-endian encoding on the wire is fixed regardless of host
/// endianness.
pub fn derive_challenge(parent_hash: Hash32, epoch: Epoch) -> Result<Hash32, ArgumentError> {
    if epoch < 0 {
        return Err(ArgumentError::InvalidArgument(format!("epoch must be non-negative, got {epoch}")));
    }
    let mut preimage = Vec::with_capacity(40);
    preimage.extend_from_slice(parent_hash.as_bytes());
    preimage.extend_from_slice(&(epoch as u64).to_le_bytes());
    Ok(sha256(&preimage))
}

/// `SHA256(utf8(network_id))`. `network_id` must be non-empty.
pub fn derive_genesis_challenge(network_id: &str) -> Result<Hash32, ArgumentError> {
    if network_id.is_empty() {
        return Err(ArgumentError::InvalidArgument("network_id must not be empty".into()));
    }
    Ok(sha256(network_id.as_bytes()))
}

pub fn verify_challenge(parent_hash: Hash32, epoch: Epoch, challenge: Hash32) -> Result<bool, ArgumentError> {
    Ok(derive_challenge(parent_hash, epoch)? == challenge)
}

pub fn verify_genesis_challenge(network_id: &str, challenge: Hash32) -> Result<bool, ArgumentError> {
    Ok(derive_genesis_challenge(network_id)? == challenge)
}
