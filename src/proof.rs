//! PoST proof types and the `ProofValidator` pipeline (spec §4.3, §6).
//!
//! Generalizes the teacher's `verify_pow` (Argon2-based work-proof
//! recompute-and-compare in `crypto.rs`) into the five-step
//! challenge/plot-commitment/score/target/Merkle-inclusion pipeline spec
//! §4.3 describes. `BlockProof` carries one field beyond the wire layout
//! §6 lists explicitly (`challenge`): the wire section only fixes
//! `BlockPlotMetadata` at 73 bytes and leaves `BlockProof` itself
//! variable-length (it already varies with `path_count`), so adding a
//! fixed 32-byte field does not violate any stated fixed-size invariant,
//! and it is what makes checks 1–2 in §4.3 ("proof.challenge ==
//! expected_challenge", "proof.merkle_root == expected_plot_root")
//! literal rather than tautological — see DESIGN.md's proof-validator
//! entry for the full reasoning.

use crate::error::ProofError;
use crate::hashing::sha256;
use crate::merkle::{self, Orientation};
use crate::primitives::{ByteReader, ByteWriter, Hash32};

/// Fixed 73-byte plot commitment record (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlotMetadata {
    pub leaf_count: i64,
    pub plot_id: Hash32,
    pub plot_header_hash: Hash32,
    pub version: u8,
}

impl PlotMetadata {
    pub const WIRE_LEN: usize = 73;

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(Self::WIRE_LEN);
        w.i64(self.leaf_count)
            .bytes(self.plot_id.as_bytes())
            .bytes(self.plot_header_hash.as_bytes())
            .u8(self.version);
        w.into_vec()
    }

    pub fn decode(r: &mut ByteReader) -> Result<Self, ProofError> {
        let leaf_count = r.i64().map_err(|_| ProofError::InvalidArgument("truncated plot metadata".into()))?;
        let plot_id = Hash32::from_bytes(r.bytes(32).map_err(|_| ProofError::InvalidArgument("truncated plot_id".into()))?)
            .map_err(|e| ProofError::InvalidArgument(e.to_string()))?;
        let plot_header_hash =
            Hash32::from_bytes(r.bytes(32).map_err(|_| ProofError::InvalidArgument("truncated plot_header_hash".into()))?)
                .map_err(|e| ProofError::InvalidArgument(e.to_string()))?;
        let version = r.u8().map_err(|_| ProofError::InvalidArgument("truncated version".into()))?;
        if leaf_count <= 0 {
            return Err(ProofError::InvalidArgument("leaf_count must be positive".into()));
        }
        Ok(Self { leaf_count, plot_id, plot_header_hash, version })
    }
}

/// A candidate PoST proof attached to a block header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockProof {
    pub challenge: Hash32,
    pub leaf_value: Hash32,
    pub leaf_index: i64,
    pub merkle_path: Vec<Hash32>,
    pub orientation_bits: Vec<Orientation>,
    pub plot_metadata: PlotMetadata,
}

impl BlockProof {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(
            32 + 32 + 8 + 4 + self.merkle_path.len() * 32 + 4 + self.orientation_bits.len() + PlotMetadata::WIRE_LEN,
        );
        w.bytes(self.challenge.as_bytes());
        w.bytes(self.leaf_value.as_bytes());
        w.i64(self.leaf_index);
        w.i32(self.merkle_path.len() as i32);
        for h in &self.merkle_path {
            w.bytes(h.as_bytes());
        }
        w.i32(self.orientation_bits.len() as i32);
        for b in &self.orientation_bits {
            w.bool(*b);
        }
        w.bytes(&self.plot_metadata.encode());
        w.into_vec()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProofError> {
        let mut r = ByteReader::new(bytes);
        let bad = |msg: &str| ProofError::InvalidArgument(msg.to_string());
        let challenge = Hash32::from_bytes(r.bytes(32).map_err(|_| bad("truncated challenge"))?)
            .map_err(|e| ProofError::InvalidArgument(e.to_string()))?;
        let leaf_value = Hash32::from_bytes(r.bytes(32).map_err(|_| bad("truncated leaf_value"))?)
            .map_err(|e| ProofError::InvalidArgument(e.to_string()))?;
        let leaf_index = r.i64().map_err(|_| bad("truncated leaf_index"))?;
        let path_count = r.i32().map_err(|_| bad("truncated path_count"))?;
        if path_count < 0 {
            return Err(bad("negative path_count"));
        }
        let mut merkle_path = Vec::with_capacity(path_count as usize);
        for _ in 0..path_count {
            merkle_path.push(
                Hash32::from_bytes(r.bytes(32).map_err(|_| bad("truncated merkle_path entry"))?)
                    .map_err(|e| ProofError::InvalidArgument(e.to_string()))?,
            );
        }
        let bit_count = r.i32().map_err(|_| bad("truncated bit_count"))?;
        if bit_count != path_count {
            return Err(bad("bit_count must equal path_count"));
        }
        let mut orientation_bits = Vec::with_capacity(bit_count as usize);
        for _ in 0..bit_count {
            orientation_bits.push(r.bool().map_err(|_| bad("truncated orientation bit"))?);
        }
        let plot_metadata = PlotMetadata::decode(&mut r)?;
        if leaf_index < 0 {
            return Err(bad("leaf_index must be non-negative"));
        }
        Ok(Self { challenge, leaf_value, leaf_index, merkle_path, orientation_bits, plot_metadata })
    }
}

/// Stateless PoST proof validator (spec §4.3).
#[derive(Debug, Default, Clone, Copy)]
pub struct ProofValidator;

impl ProofValidator {
    /// Runs the five-step check in order, returning the first failure.
    /// On success, returns the recomputed score (`SHA256(challenge ||
    /// leaf_value)`), which callers compare against whatever they track
    /// as the canonical proof score.
    pub fn verify(
        &self,
        proof: &BlockProof,
        expected_challenge: Hash32,
        expected_plot_root: Hash32,
        difficulty_target: Option<&[u8; 32]>,
        tree_height: Option<usize>,
    ) -> Result<Hash32, ProofError> {
        if proof.challenge != expected_challenge {
            return Err(ProofError::ChallengeMismatch);
        }
        if let Some(h) = tree_height {
            if proof.merkle_path.len() != h {
                return Err(ProofError::InvalidMerklePath);
            }
        }
        let reconstructed = merkle::reconstruct_root(proof.leaf_value, &proof.merkle_path, &proof.orientation_bits)
            .ok_or(ProofError::InvalidMerklePath)?;
        if reconstructed != expected_plot_root {
            return Err(ProofError::PlotRootMismatch);
        }

        let mut preimage = Vec::with_capacity(64);
        preimage.extend_from_slice(proof.challenge.as_bytes());
        preimage.extend_from_slice(proof.leaf_value.as_bytes());
        let score = sha256(&preimage);

        if let Some(target) = difficulty_target {
            if !crate::difficulty::is_below(score.as_bytes(), target) {
                return Err(ProofError::ScoreAboveTarget);
            }
        }

        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_proof(challenge: Hash32) -> (BlockProof, Hash32) {
        let leaves: Vec<Hash32> = (0u8..4).map(|n| sha256(&[n])).collect();
        let (root, proofs) = merkle::build_with_proofs(&leaves);
        let (path, orientation) = proofs[0].clone();
        let proof = BlockProof {
            challenge,
            leaf_value: leaves[0],
            leaf_index: 0,
            merkle_path: path,
            orientation_bits: orientation,
            plot_metadata: PlotMetadata {
                leaf_count: 4,
                plot_id: Hash32([9u8; 32]),
                plot_header_hash: Hash32([8u8; 32]),
                version: 1,
            },
        };
        (proof, root)
    }

    #[test]
    fn accepts_well_formed_proof_without_target() {
        let challenge = Hash32([1u8; 32]);
        let (proof, root) = sample_proof(challenge);
        let validator = ProofValidator;
        assert!(validator.verify(&proof, challenge, root, None, None).is_ok());
    }

    #[test]
    fn rejects_challenge_mismatch() {
        let challenge = Hash32([1u8; 32]);
        let (proof, root) = sample_proof(challenge);
        let validator = ProofValidator;
        let err = validator.verify(&proof, Hash32([2u8; 32]), root, None, None).unwrap_err();
        assert!(matches!(err, ProofError::ChallengeMismatch));
    }

    #[test]
    fn rejects_plot_root_mismatch() {
        let challenge = Hash32([1u8; 32]);
        let (proof, _root) = sample_proof(challenge);
        let validator = ProofValidator;
        let err = validator.verify(&proof, challenge, Hash32([3u8; 32]), None, None).unwrap_err();
        assert!(matches!(err, ProofError::PlotRootMismatch));
    }

    #[test]
    fn rejects_score_above_target() {
        let challenge = Hash32([1u8; 32]);
        let (proof, root) = sample_proof(challenge);
        let validator = ProofValidator;
        let impossible_target = [0u8; 32]; // nothing is below an all-zero target
        let err = validator.verify(&proof, challenge, root, Some(&impossible_target), None).unwrap_err();
        assert!(matches!(err, ProofError::ScoreAboveTarget));
    }

    #[test]
    fn accepts_score_below_generous_target() {
        let challenge = Hash32([1u8; 32]);
        let (proof, root) = sample_proof(challenge);
        let validator = ProofValidator;
        let generous_target = [0xFFu8; 32];
        assert!(validator.verify(&proof, challenge, root, Some(&generous_target), None).is_ok());
    }

    #[test]
    fn rejects_wrong_tree_height() {
        let challenge = Hash32([1u8; 32]);
        let (proof, root) = sample_proof(challenge);
        let validator = ProofValidator;
        let err = validator.verify(&proof, challenge, root, None, Some(proof.merkle_path.len() + 1)).unwrap_err();
        assert!(matches!(err, ProofError::InvalidMerklePath));
    }

    #[test]
    fn plot_metadata_round_trips_through_wire_encoding() {
        let meta = PlotMetadata {
            leaf_count: 16,
            plot_id: Hash32([4u8; 32]),
            plot_header_hash: Hash32([5u8; 32]),
            version: 2,
        };
        let bytes = meta.encode();
        assert_eq!(bytes.len(), PlotMetadata::WIRE_LEN);
        let mut r = ByteReader::new(&bytes);
        let decoded = PlotMetadata::decode(&mut r).unwrap();
        assert_eq!(meta, decoded);
    }

    #[test]
    fn block_proof_round_trips_through_wire_encoding() {
        let (proof, _root) = sample_proof(Hash32([6u8; 32]));
        let bytes = proof.encode();
        let decoded = BlockProof::decode(&bytes).unwrap();
        assert_eq!(proof, decoded);
    }
}
