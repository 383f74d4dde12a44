//! Chain reorganization (spec §4.8).
//!
//! The teacher has no reorg logic at all — `NumiBlockchain::add_block`
//! only ever appends to a single chain. This is written fresh in the
//! teacher's idiom (typed errors via `thiserror`, `log::` tracing at
//! each stage, an explicit `tokio::sync::broadcast` fan-out for the
//! resulting event matching the teacher's `tokio`-first concurrency
//! style everywhere else) directly from spec §4.8's fork-point/
//! cumulative-difficulty/snapshot-revert-apply algorithm, reusing
//! `StateManager`'s snapshot primitives from `state.rs`.

use crate::block::Block;
use crate::cancellation::CancellationToken;
use crate::config::TransactionValidationConfig;
use crate::error::ReorgError;
use crate::events::{ChainReorgEvent, EventBus};
use crate::mempool::Mempool;
use crate::primitives::{Hash32, Height};
use crate::signing::SignatureVerifier;
use crate::state::StateManager;
use crate::storage::{ChainStorage, WriteBatch};
use crate::transaction::TransactionValidator;

pub struct ChainReorganizer<'a> {
    storage: &'a dyn ChainStorage,
    state: &'a StateManager<'a>,
    mempool: &'a Mempool,
    config: &'a TransactionValidationConfig,
    verifier: &'a dyn SignatureVerifier,
    events: &'a EventBus,
    max_reorg_depth: i64,
}

impl<'a> ChainReorganizer<'a> {
    pub fn new(
        storage: &'a dyn ChainStorage,
        state: &'a StateManager<'a>,
        mempool: &'a Mempool,
        config: &'a TransactionValidationConfig,
        verifier: &'a dyn SignatureVerifier,
        events: &'a EventBus,
        max_reorg_depth: i64,
    ) -> Self {
        Self { storage, state, mempool, config, verifier, events, max_reorg_depth }
    }

    fn err(e: impl ToString) -> ReorgError {
        ReorgError::State(e.to_string())
    }

    fn cumulative_difficulty(&self, hash: Hash32) -> Result<i64, ReorgError> {
        if hash == Hash32::ZERO {
            return Ok(0);
        }
        if let Some(cached) = self.storage.get_cumulative_difficulty(hash).map_err(Self::err)? {
            return Ok(cached);
        }
        let block = self.storage.get_block_by_hash(hash).map_err(Self::err)?.ok_or(ReorgError::ForkNotFound)?;
        let parent_cum = self.cumulative_difficulty(block.header.parent_hash)?;
        Ok(parent_cum + block.header.difficulty)
    }

    /// Returns the height of the most recent local ancestor shared with
    /// `alt_blocks`, or `ForkNotFound` if none of the local chain's
    /// ancestry matches the alternative chain's base.
    fn find_fork_point(&self, alt_blocks: &[Block], local_tip_hash: Hash32) -> Result<Height, ReorgError> {
        let fork_hash = alt_blocks.first().map(|b| b.header.parent_hash).unwrap_or(Hash32::ZERO);
        if fork_hash == Hash32::ZERO {
            return Ok(0);
        }
        let mut cursor = local_tip_hash;
        loop {
            if cursor == fork_hash {
                let block = self.storage.get_block_by_hash(cursor).map_err(Self::err)?.ok_or(ReorgError::ForkNotFound)?;
                return Ok(block.header.height);
            }
            match self.storage.get_block_by_hash(cursor).map_err(Self::err)? {
                Some(block) if block.header.height > 0 => cursor = block.header.parent_hash,
                _ => return Err(ReorgError::ForkNotFound),
            }
        }
    }

    /// Attempts to switch the canonical chain to `alternative_chain_blocks`
    /// (oldest-to-newest, culminating in `alternative_tip_block`). Returns
    /// `Ok(true)` if the switch happened, `Ok(false)` if the alternative's
    /// cumulative difficulty does not exceed the current tip's.
    pub fn try_reorganize(
        &self,
        alternative_tip_block: &Block,
        alternative_chain_blocks: &[Block],
        now: i64,
        cancel: &CancellationToken,
    ) -> Result<bool, ReorgError> {
        if cancel.is_cancelled() {
            return Err(ReorgError::Cancelled);
        }
        let current_tip_hash = self.storage.get_best_block_hash().map_err(Self::err)?.unwrap_or(Hash32::ZERO);
        let current_height = self.storage.get_chain_height().map_err(Self::err)?;
        let current_cum = self.cumulative_difficulty(current_tip_hash)?;

        let fork_height = self.find_fork_point(alternative_chain_blocks, current_tip_hash)?;
        let fork_hash = alternative_chain_blocks.first().map(|b| b.header.parent_hash).unwrap_or(Hash32::ZERO);
        let fork_cum = self.cumulative_difficulty(fork_hash)?;
        let alt_cum = alternative_chain_blocks.iter().fold(fork_cum, |acc, b| acc + b.header.difficulty);

        if alt_cum <= current_cum {
            log::debug!("reorg: alternative cumulative difficulty {alt_cum} does not exceed current {current_cum}");
            return Ok(false);
        }

        let depth = current_height - fork_height;
        if depth > self.max_reorg_depth {
            return Err(ReorgError::ReorgTooDeep { depth: depth as u64, max: self.max_reorg_depth as u64 });
        }

        if cancel.is_cancelled() {
            return Err(ReorgError::Cancelled);
        }

        let snapshot = self.state.snapshot();
        match self.perform_switch(current_tip_hash, fork_height, alternative_tip_block, alternative_chain_blocks, now, cancel) {
            Ok(event) => {
                self.state.release(snapshot);
                self.events.emit_reorg(event);
                Ok(true)
            }
            Err(e) => {
                if let Err(revert_err) = self.state.revert(snapshot) {
                    log::error!("reorg: failed to revert snapshot after failed switch: {revert_err}");
                }
                self.state.release(snapshot);
                Err(e)
            }
        }
    }

    fn perform_switch(
        &self,
        current_tip_hash: Hash32,
        fork_height: Height,
        alternative_tip_block: &Block,
        alternative_chain_blocks: &[Block],
        now: i64,
        cancel: &CancellationToken,
    ) -> Result<ChainReorgEvent, ReorgError> {
        let current_height = self.storage.get_chain_height().map_err(Self::err)?;

        let mut reverted_txs = Vec::new();
        let mut cursor = current_tip_hash;
        let mut batch = WriteBatch::new();
        let mut reverted_count = 0usize;
        while cursor != Hash32::ZERO {
            if cancel.is_cancelled() {
                return Err(ReorgError::Cancelled);
            }
            let block = self.storage.get_block_by_hash(cursor).map_err(Self::err)?.ok_or(ReorgError::ForkNotFound)?;
            if block.header.height <= fork_height {
                break;
            }
            self.state.revert_block(&block, cancel).map_err(Self::err)?;
            reverted_txs.extend(block.body.transactions.iter().cloned());
            batch.mark_orphaned(cursor);
            reverted_count += 1;
            cursor = block.header.parent_hash;
        }

        let mut parent_cum = self.cumulative_difficulty(alternative_chain_blocks.first().map(|b| b.header.parent_hash).unwrap_or(Hash32::ZERO))?;
        for block in alternative_chain_blocks {
            if cancel.is_cancelled() {
                return Err(ReorgError::Cancelled);
            }
            self.state.apply_block(block, cancel).map_err(Self::err)?;
            parent_cum += block.header.difficulty;
            batch.put_block(block.clone());
            batch.set_cumulative_difficulty(block.hash(), parent_cum);
        }

        let new_tip_hash = alternative_tip_block.hash();
        let new_tip_height = alternative_tip_block.header.height;
        batch.set_best_block_hash(new_tip_hash);
        batch.set_chain_height(new_tip_height);
        self.storage.commit(batch).map_err(Self::err)?;

        self.mempool.clear();
        let validator = TransactionValidator::new(self.config, self.verifier);
        for tx in &reverted_txs {
            let balance = self.state.get_balance(&tx.sender);
            let nonce = self.state.get_nonce(&tx.sender);
            if validator.validate_standalone(tx, balance, nonce, false, cancel).is_ok() {
                let _ = self.mempool.admit(tx.clone());
            }
        }

        Ok(ChainReorgEvent {
            fork_height,
            old_tip_hash: current_tip_hash,
            old_tip_height: current_height,
            new_tip_hash,
            new_tip_height,
            reverted_count,
            applied_count: alternative_chain_blocks.len(),
            timestamp: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::Signature;
    use crate::proof::{BlockProof, PlotMetadata};
    use crate::signing::{Secp256k1Keypair, Secp256k1Verifier};
    use crate::storage::{MemChainStorage, MetadataStorage};

    fn config() -> TransactionValidationConfig {
        TransactionValidationConfig {
            min_fee: 1,
            max_fee: 1000,
            max_transactions_per_block: 10,
            check_duplicate_transactions: false,
            max_transaction_size: 4096,
            supported_version: 1,
        }
    }

    fn empty_proof() -> BlockProof {
        BlockProof {
            challenge: Hash32::ZERO,
            leaf_value: Hash32::ZERO,
            leaf_index: 0,
            merkle_path: Vec::new(),
            orientation_bits: Vec::new(),
            plot_metadata: PlotMetadata { leaf_count: 1, plot_id: Hash32::ZERO, plot_header_hash: Hash32::ZERO, version: 1 },
        }
    }

    fn block(parent: Hash32, height: i64, difficulty: i64, miner: &Secp256k1Keypair) -> Block {
        let mut header = crate::block::BlockHeader {
            version: 1,
            parent_hash: parent,
            height,
            timestamp_unix_secs: 1_700_000_000 + height,
            difficulty,
            epoch: 0,
            challenge: Hash32::ZERO,
            plot_root: Hash32::ZERO,
            proof_score: Hash32::ZERO,
            tx_root: Hash32::ZERO,
            miner_id: miner.public_key(),
            signature: Signature::empty(),
        };
        header.sign(miner);
        Block { header, body: crate::block::BlockBody { transactions: Vec::new(), proof: empty_proof() } }
    }

    fn seed_chain(storage: &MemChainStorage, miner: &Secp256k1Keypair, heights: &[i64]) -> Vec<Block> {
        let mut parent = Hash32::ZERO;
        let mut blocks = Vec::new();
        let mut cum = 0i64;
        for &h in heights {
            let b = block(parent, h, 100, miner);
            parent = b.hash();
            cum += 100;
            let mut batch = WriteBatch::new();
            batch.put_block(b.clone());
            batch.set_best_block_hash(b.hash());
            batch.set_chain_height(h);
            batch.set_cumulative_difficulty(b.hash(), cum);
            storage.commit(batch).unwrap();
            blocks.push(b);
        }
        blocks
    }

    #[test]
    fn higher_difficulty_alternative_triggers_reorg() {
        let storage = MemChainStorage::new();
        let miner = Secp256k1Keypair::generate();
        let cfg = config();
        let verifier = Secp256k1Verifier;
        let state = StateManager::new(&cfg, &verifier, &storage);
        let mempool = Mempool::new(crate::config::MempoolConfig { max_transactions: 100, max_transactions_per_block: 10, min_fee: 1 });
        let events = EventBus::new();

        let local = seed_chain(&storage, &miner, &[1, 2, 3]);
        let fork_parent = local[0].hash();
        let alt_miner = Secp256k1Keypair::generate();
        let alt2 = block(fork_parent, 2, 500, &alt_miner);
        let alt3 = block(alt2.hash(), 3, 500, &alt_miner);
        let alt_blocks = vec![alt2, alt3.clone()];

        let reorg = ChainReorganizer::new(&storage, &state, &mempool, &cfg, &verifier, &events, 10);
        let switched = reorg.try_reorganize(&alt3, &alt_blocks, 1_700_001_000, &CancellationToken::never()).unwrap();
        assert!(switched);
        assert_eq!(storage.get_best_block_hash().unwrap(), Some(alt3.hash()));
        assert_eq!(storage.get_chain_height().unwrap(), 3);
    }

    #[test]
    fn lower_difficulty_alternative_is_rejected() {
        let storage = MemChainStorage::new();
        let miner = Secp256k1Keypair::generate();
        let cfg = config();
        let verifier = Secp256k1Verifier;
        let state = StateManager::new(&cfg, &verifier, &storage);
        let mempool = Mempool::new(crate::config::MempoolConfig { max_transactions: 100, max_transactions_per_block: 10, min_fee: 1 });
        let events = EventBus::new();

        let local = seed_chain(&storage, &miner, &[1, 2, 3]);
        let fork_parent = local[0].hash();
        let alt_miner = Secp256k1Keypair::generate();
        let alt2 = block(fork_parent, 2, 10, &alt_miner);
        let alt3 = block(alt2.hash(), 3, 10, &alt_miner);
        let alt_blocks = vec![alt2, alt3.clone()];

        let reorg = ChainReorganizer::new(&storage, &state, &mempool, &cfg, &verifier, &events, 10);
        let switched = reorg.try_reorganize(&alt3, &alt_blocks, 1_700_001_000, &CancellationToken::never()).unwrap();
        assert!(!switched);
        assert_eq!(storage.get_best_block_hash().unwrap(), Some(local.last().unwrap().hash()));
    }

    #[test]
    fn reorg_deeper_than_configured_max_is_rejected() {
        let storage = MemChainStorage::new();
        let miner = Secp256k1Keypair::generate();
        let cfg = config();
        let verifier = Secp256k1Verifier;
        let state = StateManager::new(&cfg, &verifier, &storage);
        let mempool = Mempool::new(crate::config::MempoolConfig { max_transactions: 100, max_transactions_per_block: 10, min_fee: 1 });
        let events = EventBus::new();

        let local = seed_chain(&storage, &miner, &[1, 2, 3]);
        let fork_parent = local[0].hash();
        let alt_miner = Secp256k1Keypair::generate();
        let alt2 = block(fork_parent, 2, 500, &alt_miner);
        let alt3 = block(alt2.hash(), 3, 500, &alt_miner);
        let alt_blocks = vec![alt2, alt3.clone()];

        let reorg = ChainReorganizer::new(&storage, &state, &mempool, &cfg, &verifier, &events, 1);
        let err = reorg.try_reorganize(&alt3, &alt_blocks, 1_700_001_000, &CancellationToken::never()).unwrap_err();
        assert!(matches!(err, ReorgError::ReorgTooDeep { .. }));
        assert_eq!(storage.get_best_block_hash().unwrap(), Some(local.last().unwrap().hash()));
    }
}
