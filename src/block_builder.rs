//! Assembles and self-validates new blocks (spec §4.9).
//!
//! Generalizes the teacher's genesis/mining-reward assembly code in
//! `blockchain.rs` (build a header, attach the reward transaction, sign,
//! hash) from "always genesis" to "any height, given the caller-supplied
//! consensus fields (parent hash, difficulty, epoch, challenge, plot
//! root, proof)".

use crate::block::{Block, BlockBody, BlockHeader};
use crate::block_validator::{BlockValidator, ExpectedChainState};
use crate::cancellation::CancellationToken;
use crate::config::TransactionValidationConfig;
use crate::error::BuildError;
use crate::mempool::Mempool;
use crate::merkle;
use crate::primitives::{Difficulty, Epoch, Hash32, Height};
use crate::proof::BlockProof;
use crate::signing::{BlockSigner, SignatureVerifier};

pub struct ConsensusFields {
    pub parent_hash: Hash32,
    pub height: Height,
    pub difficulty: Difficulty,
    pub epoch: Epoch,
    pub challenge: Hash32,
    pub plot_root: Hash32,
    pub proof_score: Hash32,
    pub is_genesis: bool,
}

pub struct BlockBuilder<'a> {
    mempool: &'a Mempool,
    config: &'a TransactionValidationConfig,
    verifier: &'a dyn SignatureVerifier,
    max_transactions: usize,
}

impl<'a> BlockBuilder<'a> {
    pub fn new(mempool: &'a Mempool, config: &'a TransactionValidationConfig, verifier: &'a dyn SignatureVerifier, max_transactions: usize) -> Self {
        Self { mempool, config, verifier, max_transactions }
    }

    /// Draws the highest-priority transactions from the mempool, signs a
    /// header with `signer`, attaches `proof`, and self-validates the
    /// result via [`BlockValidator`] before returning it.
    pub fn build(
        &self,
        fields: ConsensusFields,
        proof: BlockProof,
        signer: &dyn BlockSigner,
        timestamp_unix_secs: i64,
        cancel: &CancellationToken,
    ) -> Result<Block, BuildError> {
        if cancel.is_cancelled() {
            return Err(BuildError::Cancelled);
        }
        let transactions = self.mempool.drain(self.max_transactions);
        let tx_hashes: Vec<Hash32> = transactions.iter().map(|tx| tx.hash()).collect();
        let tx_root = merkle::build(&tx_hashes);

        let mut header = BlockHeader {
            version: self.config.supported_version,
            parent_hash: fields.parent_hash,
            height: fields.height,
            timestamp_unix_secs,
            difficulty: fields.difficulty,
            epoch: fields.epoch,
            challenge: fields.challenge,
            plot_root: fields.plot_root,
            proof_score: fields.proof_score,
            tx_root,
            miner_id: signer.public_key(),
            signature: crate::primitives::Signature::empty(),
        };
        header.sign(signer);

        let block = Block { header, body: BlockBody { transactions, proof } };

        let expected = ExpectedChainState {
            parent_hash: fields.parent_hash,
            height: fields.height,
            difficulty: fields.difficulty,
            epoch: fields.epoch,
            challenge: fields.challenge,
            plot_root: fields.plot_root,
            is_genesis: fields.is_genesis,
        };
        let validator = BlockValidator::new(self.config, self.verifier);
        validator.validate(&block, &expected, timestamp_unix_secs, cancel).map_err(BuildError::BuildFailed)?;

        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MempoolConfig;
    use crate::proof::PlotMetadata;
    use crate::signing::{Secp256k1Keypair, Secp256k1Verifier};

    fn tx_config() -> TransactionValidationConfig {
        TransactionValidationConfig {
            min_fee: 1,
            max_fee: 1000,
            max_transactions_per_block: 10,
            check_duplicate_transactions: false,
            max_transaction_size: 4096,
            supported_version: 1,
        }
    }

    fn empty_proof(challenge: Hash32) -> BlockProof {
        BlockProof {
            challenge,
            leaf_value: Hash32::ZERO,
            leaf_index: 0,
            merkle_path: Vec::new(),
            orientation_bits: Vec::new(),
            plot_metadata: PlotMetadata { leaf_count: 1, plot_id: Hash32::ZERO, plot_header_hash: Hash32::ZERO, version: 1 },
        }
    }

    #[test]
    fn builds_and_self_validates_genesis_block() {
        let mempool = Mempool::new(MempoolConfig { max_transactions: 10, max_transactions_per_block: 10, min_fee: 1 });
        let cfg = tx_config();
        let verifier = Secp256k1Verifier;
        let miner = Secp256k1Keypair::generate();
        let builder = BlockBuilder::new(&mempool, &cfg, &verifier, 10);

        let challenge = Hash32([4u8; 32]);
        let fields = ConsensusFields {
            parent_hash: Hash32::ZERO,
            height: 0,
            difficulty: 1,
            epoch: 0,
            challenge,
            plot_root: Hash32::ZERO,
            proof_score: crate::hashing::sha256(&[challenge.as_bytes().as_slice(), Hash32::ZERO.as_bytes().as_slice()].concat()),
            is_genesis: true,
        };
        let block = builder.build(fields, empty_proof(challenge), &miner, 1_700_000_000, &CancellationToken::never()).unwrap();
        assert_eq!(block.header.height, 0);
        assert!(!block.header.signature.is_empty());
    }

    #[test]
    fn includes_drained_mempool_transactions_in_tx_root() {
        let mempool = Mempool::new(MempoolConfig { max_transactions: 10, max_transactions_per_block: 10, min_fee: 1 });
        let cfg = tx_config();
        let verifier = Secp256k1Verifier;
        let miner = Secp256k1Keypair::generate();
        let sender = Secp256k1Keypair::generate();
        let recipient = Secp256k1Keypair::generate().public_key();
        let mut tx = crate::transaction::Transaction::new_unsigned(1, sender.public_key(), recipient, 10, 0, 2);
        tx.sign(&sender);
        mempool.admit(tx.clone()).unwrap();

        let builder = BlockBuilder::new(&mempool, &cfg, &verifier, 10);
        let challenge = Hash32([4u8; 32]);
        let fields = ConsensusFields {
            parent_hash: Hash32::ZERO,
            height: 0,
            difficulty: 1,
            epoch: 0,
            challenge,
            plot_root: Hash32::ZERO,
            proof_score: crate::hashing::sha256(&[challenge.as_bytes().as_slice(), Hash32::ZERO.as_bytes().as_slice()].concat()),
            is_genesis: true,
        };
        let block = builder.build(fields, empty_proof(challenge), &miner, 1_700_000_000, &CancellationToken::never()).unwrap();
        assert_eq!(block.body.transactions.len(), 1);
        assert_eq!(block.header.tx_root, merkle::build(&[tx.hash()]));
    }
}
