//! Seven-step ordered block validation pipeline (spec §4.6).
//!
//! Generalizes the teacher's `Block::validate` (signature, parent hash,
//! height, Merkle root, timestamp window, per-tx signature, run in a
//! fixed order) onto spec's exact step sequence, adding the
//! chain-relative difficulty/epoch/challenge checks the teacher's
//! single-process chain never needed and routing the proof check
//! through [`crate::proof::ProofValidator`] in place of the teacher's
//! inline Argon2 recompute.

use crate::block::Block;
use crate::cancellation::CancellationToken;
use crate::config::TransactionValidationConfig;
use crate::difficulty;
use crate::error::BlockValidationError;
use crate::merkle;
use crate::primitives::{Difficulty, Epoch, Hash32, Height};
use crate::proof::ProofValidator;
use crate::signing::SignatureVerifier;
use crate::transaction::TransactionValidator;

/// The chain-relative facts a candidate block's header must match,
/// supplied by the caller (the chain tip plus whatever the difficulty/
/// epoch engines currently expect) — `BlockValidator` itself carries no
/// state.
#[derive(Debug, Clone, Copy)]
pub struct ExpectedChainState {
    pub parent_hash: Hash32,
    pub height: Height,
    pub difficulty: Difficulty,
    pub epoch: Epoch,
    pub challenge: Hash32,
    pub plot_root: Hash32,
    pub is_genesis: bool,
}

pub struct BlockValidator<'a> {
    config: &'a TransactionValidationConfig,
    verifier: &'a dyn SignatureVerifier,
    supported_version: u8,
    max_timestamp_skew_s: i64,
}

impl<'a> BlockValidator<'a> {
    pub fn new(config: &'a TransactionValidationConfig, verifier: &'a dyn SignatureVerifier) -> Self {
        Self { config, verifier, supported_version: config.supported_version, max_timestamp_skew_s: 120 }
    }

    /// Runs all seven steps in order, returning the first failure.
    /// Checked for cancellation between each step (spec §5).
    pub fn validate(
        &self,
        block: &Block,
        expected: &ExpectedChainState,
        now: i64,
        cancel: &CancellationToken,
    ) -> Result<(), BlockValidationError> {
        let check = || if cancel.is_cancelled() { Err(BlockValidationError::Cancelled) } else { Ok(()) };
        self.check_header_structure(block)?;
        check()?;
        self.check_timestamp(block, now)?;
        check()?;
        self.check_header_signature(block)?;
        check()?;
        self.check_against_chain_state(block, expected)?;
        check()?;
        self.check_transactions(block, cancel)?;
        check()?;
        self.check_tx_root(block)?;
        check()?;
        self.check_proof(block, expected)?;
        Ok(())
    }

    fn check_header_structure(&self, block: &Block) -> Result<(), BlockValidationError> {
        let header = &block.header;
        if header.version != self.supported_version {
            return Err(BlockValidationError::UnsupportedVersion);
        }
        if header.height < 0 {
            return Err(BlockValidationError::InvalidHeight);
        }
        if header.signature.is_empty() {
            return Err(BlockValidationError::HeaderNotSigned);
        }
        if header.difficulty <= 0 {
            return Err(BlockValidationError::InvalidDifficulty);
        }
        Ok(())
    }

    fn check_timestamp(&self, block: &Block, now: i64) -> Result<(), BlockValidationError> {
        let ts = block.header.timestamp_unix_secs;
        if ts < 0 || ts > now + self.max_timestamp_skew_s {
            return Err(BlockValidationError::InvalidTimestamp);
        }
        Ok(())
    }

    fn check_header_signature(&self, block: &Block) -> Result<(), BlockValidationError> {
        if !block.header.verify_signature(self.verifier) {
            return Err(BlockValidationError::InvalidHeaderSignature);
        }
        Ok(())
    }

    fn check_against_chain_state(&self, block: &Block, expected: &ExpectedChainState) -> Result<(), BlockValidationError> {
        let header = &block.header;
        if !expected.is_genesis && header.parent_hash != expected.parent_hash {
            return Err(BlockValidationError::InvalidParentHash);
        }
        if header.height != expected.height {
            return Err(BlockValidationError::InvalidHeight);
        }
        if header.difficulty != expected.difficulty {
            return Err(BlockValidationError::InvalidDifficulty);
        }
        if header.epoch != expected.epoch {
            return Err(BlockValidationError::InvalidEpoch);
        }
        if header.challenge != expected.challenge {
            return Err(BlockValidationError::InvalidChallenge);
        }
        Ok(())
    }

    fn check_transactions(&self, block: &Block, cancel: &CancellationToken) -> Result<(), BlockValidationError> {
        let validator = TransactionValidator::new(self.config, self.verifier);
        for tx in &block.body.transactions {
            if cancel.is_cancelled() {
                return Err(BlockValidationError::Cancelled);
            }
            validator.validate_stateless(tx, cancel)?;
            if !tx.verify_signature(self.verifier) {
                return Err(BlockValidationError::InvalidTransactionSignature);
            }
        }
        Ok(())
    }

    fn check_tx_root(&self, block: &Block) -> Result<(), BlockValidationError> {
        let leaves: Vec<Hash32> = block.body.transactions.iter().map(|tx| tx.hash()).collect();
        let computed = merkle::build(&leaves);
        if computed != block.header.tx_root {
            return Err(BlockValidationError::InvalidTransactionRoot);
        }
        Ok(())
    }

    fn check_proof(&self, block: &Block, expected: &ExpectedChainState) -> Result<(), BlockValidationError> {
        let target = difficulty::difficulty_to_target(block.header.difficulty)
            .map_err(|e| BlockValidationError::Other(e.to_string()))?;
        let validator = ProofValidator;
        let score = validator.verify(
            &block.body.proof,
            block.header.challenge,
            expected.plot_root,
            Some(&target),
            None,
        )?;
        if score != block.header.proof_score {
            return Err(BlockValidationError::InvalidProof(crate::error::ProofError::ScoreMismatch));
        }
        Ok(())
    }
}
