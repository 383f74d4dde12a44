//! Block header/body types and their exact-size wire codec (spec §3, §6).
//!
//! Generalizes the teacher's `BlockHeader`/`Block` (`calculate_hash`
//! over a signature-excluded view, `sign`/`verify_signature` methods)
//! onto spec's fixed 290-byte header and PoST-shaped body (transactions
//! plus a single `BlockProof`, in place of the teacher's
//! nonce-plus-PoW-hash fields).

use crate::error::ConsensusError;
use crate::hashing::sha256;
use crate::primitives::{ByteReader, ByteWriter, Difficulty, Epoch, Hash32, Height, PublicKey, Signature};
use crate::proof::BlockProof;
use crate::signing::{BlockSigner, SignatureVerifier};
use crate::transaction::Transaction;

pub const HEADER_WIRE_LEN: usize = 290;
const HEADER_UNSIGNED_LEN: usize = HEADER_WIRE_LEN - Signature::LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: u8,
    pub parent_hash: Hash32,
    pub height: Height,
    pub timestamp_unix_secs: i64,
    pub difficulty: Difficulty,
    pub epoch: Epoch,
    pub challenge: Hash32,
    pub plot_root: Hash32,
    pub proof_score: Hash32,
    pub tx_root: Hash32,
    pub miner_id: PublicKey,
    pub signature: Signature,
}

impl BlockHeader {
    /// `SHA256(serialize(header_without_signature))`.
    pub fn hash(&self) -> Hash32 {
        sha256(&self.encode_unsigned())
    }

    pub fn sign(&mut self, signer: &dyn BlockSigner) {
        let hash = self.hash();
        self.signature = signer.sign(hash.as_bytes());
    }

    pub fn verify_signature(&self, verifier: &dyn SignatureVerifier) -> bool {
        verifier.verify(self.hash().as_bytes(), &self.signature, &self.miner_id)
    }

    fn encode_unsigned(&self) -> [u8; HEADER_UNSIGNED_LEN] {
        let mut w = ByteWriter::with_capacity(HEADER_UNSIGNED_LEN);
        w.u8(self.version)
            .bytes(self.parent_hash.as_bytes())
            .i64(self.height)
            .i64(self.timestamp_unix_secs)
            .i64(self.difficulty)
            .i64(self.epoch)
            .bytes(self.challenge.as_bytes())
            .bytes(self.plot_root.as_bytes())
            .bytes(self.proof_score.as_bytes())
            .bytes(self.tx_root.as_bytes())
            .bytes(self.miner_id.as_bytes());
        let v = w.into_vec();
        let mut out = [0u8; HEADER_UNSIGNED_LEN];
        out.copy_from_slice(&v);
        out
    }

    pub fn encode(&self) -> [u8; HEADER_WIRE_LEN] {
        let mut out = [0u8; HEADER_WIRE_LEN];
        out[..HEADER_UNSIGNED_LEN].copy_from_slice(&self.encode_unsigned());
        out[HEADER_UNSIGNED_LEN..].copy_from_slice(self.signature.as_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ConsensusError> {
        if bytes.len() != HEADER_WIRE_LEN {
            return Err(ConsensusError::Io(format!(
                "expected {HEADER_WIRE_LEN} bytes for a block header, got {}",
                bytes.len()
            )));
        }
        let mut r = ByteReader::new(bytes);
        let version = r.u8()?;
        let parent_hash = Hash32::from_bytes(r.bytes(32)?).map_err(ConsensusError::from)?;
        let height = r.i64()?;
        let timestamp_unix_secs = r.i64()?;
        let difficulty = r.i64()?;
        let epoch = r.i64()?;
        let challenge = Hash32::from_bytes(r.bytes(32)?).map_err(ConsensusError::from)?;
        let plot_root = Hash32::from_bytes(r.bytes(32)?).map_err(ConsensusError::from)?;
        let proof_score = Hash32::from_bytes(r.bytes(32)?).map_err(ConsensusError::from)?;
        let tx_root = Hash32::from_bytes(r.bytes(32)?).map_err(ConsensusError::from)?;
        let miner_id = PublicKey::from_bytes(r.bytes(33)?).map_err(ConsensusError::from)?;
        let signature = Signature::from_bytes(r.bytes(64)?).map_err(ConsensusError::from)?;
        Ok(Self {
            version,
            parent_hash,
            height,
            timestamp_unix_secs,
            difficulty,
            epoch,
            challenge,
            plot_root,
            proof_score,
            tx_root,
            miner_id,
            signature,
        })
    }
}

#[derive(Debug, Clone)]
pub struct BlockBody {
    pub transactions: Vec<Transaction>,
    pub proof: BlockProof,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub header: BlockHeader,
    pub body: BlockBody,
}

impl Block {
    pub fn hash(&self) -> Hash32 {
        self.header.hash()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(HEADER_WIRE_LEN + 1024);
        w.bytes(&self.header.encode());
        w.i32(self.body.transactions.len() as i32);
        for tx in &self.body.transactions {
            let bytes = tx.encode();
            w.i32(bytes.len() as i32);
            w.bytes(&bytes);
        }
        w.bytes(&self.body.proof.encode());
        w.into_vec()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ConsensusError> {
        if bytes.len() < HEADER_WIRE_LEN {
            return Err(ConsensusError::Io("block too short for a header".into()));
        }
        let header = BlockHeader::decode(&bytes[..HEADER_WIRE_LEN])?;
        let mut r = ByteReader::new(&bytes[HEADER_WIRE_LEN..]);
        let tx_count = r.i32()?;
        if tx_count < 0 {
            return Err(ConsensusError::Io("negative transaction count".into()));
        }
        let mut transactions = Vec::with_capacity(tx_count as usize);
        for _ in 0..tx_count {
            let len = r.i32()?;
            if len < 0 {
                return Err(ConsensusError::Io("negative transaction length".into()));
            }
            let bytes = r.bytes(len as usize)?;
            transactions.push(Transaction::decode(bytes).map_err(|e| ConsensusError::Io(e.to_string()))?);
        }
        let proof = BlockProof::decode(r.bytes(r.remaining())?).map_err(ConsensusError::from)?;
        Ok(Self { header, body: BlockBody { transactions, proof } })
    }
}
