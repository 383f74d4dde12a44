//! World-state transitions and the state-root commitment (spec §4.7).
//!
//! Generalizes the teacher's `NumiBlockchain::apply_block` (per-tx
//! debit/credit over a `DashMap`, self-transfer special case) and its
//! `calculate_state_root` (pairwise BLAKE3 fold over account entries)
//! into an atomic, snapshot/revert-capable transition function with a
//! deterministic root: the teacher's root folds `DashMap` iteration
//! order directly, which is not stable across runs, so leaves here are
//! sorted by address first.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::account::{AccountState, WorldState};
use crate::block::Block;
use crate::cancellation::CancellationToken;
use crate::config::TransactionValidationConfig;
use crate::error::StateError;
use crate::hashing::sha256;
use crate::merkle;
use crate::primitives::{ByteWriter, Hash32, PublicKey};
use crate::signing::SignatureVerifier;
use crate::storage::{ChainStorage, WriteBatch};
use crate::sync_lock::RwLock;
use crate::transaction::{BlockValidationContext, TransactionValidator};

pub type SnapshotId = u64;

/// Owns the account ledger and exposes the single atomic entry point
/// (`apply_block`) everything else in the consensus core funnels
/// through.
pub struct StateManager<'a> {
    world: WorldState,
    snapshots: RwLock<HashMap<SnapshotId, HashMap<PublicKey, AccountState>>>,
    next_snapshot_id: AtomicU64,
    apply_lock: RwLock<()>,
    config: &'a TransactionValidationConfig,
    verifier: &'a dyn SignatureVerifier,
    storage: &'a dyn ChainStorage,
}

impl<'a> StateManager<'a> {
    pub fn new(config: &'a TransactionValidationConfig, verifier: &'a dyn SignatureVerifier, storage: &'a dyn ChainStorage) -> Self {
        Self {
            world: WorldState::new(),
            snapshots: RwLock::new(HashMap::new()),
            next_snapshot_id: AtomicU64::new(1),
            apply_lock: RwLock::new(()),
            config,
            verifier,
            storage,
        }
    }

    /// Delegates to the backing store's own integrity check (spec's
    /// `StateManager` contract names this directly rather than routing
    /// callers through `storage()`).
    pub fn check_consistency(&self) -> Result<(), StateError> {
        self.storage.check_integrity()
    }

    pub fn get_balance(&self, address: &PublicKey) -> i64 {
        self.world.balance(address)
    }

    pub fn get_nonce(&self, address: &PublicKey) -> i64 {
        self.world.nonce(address)
    }

    /// Direct ledger access for genesis premine and test seeding — never
    /// called from the block-application path, which only ever moves
    /// balance that already exists via `apply_block`.
    pub fn world(&self) -> &WorldState {
        &self.world
    }

    /// Pure predicate: validates every transaction in `block` against
    /// tentative in-block state, never mutating `self`.
    pub fn validate_block_state(&self, block: &Block, cancel: &CancellationToken) -> bool {
        let validator = TransactionValidator::new(self.config, self.verifier);
        let mut ctx = BlockValidationContext::new();
        for tx in &block.body.transactions {
            let world = &self.world;
            let outcome = validator.validate_in_block(
                tx,
                &mut ctx,
                || {
                    let state = world.get(&tx.sender);
                    (state.balance, state.nonce)
                },
                cancel,
            );
            if outcome.is_err() {
                return false;
            }
        }
        true
    }

    /// Snapshots the accounts touched by `block` so a failed persistence
    /// commit can be rolled back without a full-ledger snapshot.
    fn touched_accounts(&self, block: &Block) -> HashMap<PublicKey, AccountState> {
        let mut touched = HashMap::new();
        for tx in &block.body.transactions {
            touched.entry(tx.sender).or_insert_with(|| self.world.get(&tx.sender));
            touched.entry(tx.recipient).or_insert_with(|| self.world.get(&tx.recipient));
        }
        touched.entry(block.header.miner_id).or_insert_with(|| self.world.get(&block.header.miner_id));
        touched
    }

    /// Writes the current state of every account touched by `block` to
    /// the backing store in a single batch.
    fn persist_touched(&self, block: &Block) -> Result<(), StateError> {
        let mut batch = WriteBatch::new();
        for addr in self.touched_accounts(block).keys() {
            batch.put_account(*addr, self.world.get(addr));
        }
        self.storage.commit(batch)
    }

    /// Applies `block`'s transactions and the miner's fee reward
    /// atomically, returning the post-transition state root. Fails
    /// without mutating state if `validate_block_state` rejects the
    /// block, and rolls the in-memory mutation back if the storage
    /// commit that follows is rejected (spec §4.7 steps 2 and 5).
    pub fn apply_block(&self, block: &Block, cancel: &CancellationToken) -> Result<Hash32, StateError> {
        let _guard = self.apply_lock.write();
        if cancel.is_cancelled() {
            return Err(StateError::Cancelled);
        }
        if !self.validate_block_state(block, cancel) {
            return Err(StateError::StateTransitionFailed("block failed in-block transaction validation".into()));
        }
        if cancel.is_cancelled() {
            return Err(StateError::Cancelled);
        }
        let before = self.touched_accounts(block);
        let mut total_fees: i64 = 0;
        for tx in &block.body.transactions {
            self.world.debit_and_advance_nonce(tx.sender, tx.amount + tx.fee);
            self.world.credit(tx.recipient, tx.amount);
            total_fees += tx.fee;
        }
        if total_fees > 0 {
            self.world.credit(block.header.miner_id, total_fees);
        }
        if let Err(e) = self.persist_touched(block) {
            for (addr, state) in before {
                self.world.set(addr, state);
            }
            return Err(e);
        }
        Ok(self.state_root())
    }

    /// Reverses `block`'s effects against committed state — used by the
    /// reorganizer when walking back local blocks. Assumes `block` was
    /// previously applied via `apply_block`. Persists the reverted
    /// account states, rolling back the in-memory mutation if the
    /// storage commit fails.
    pub fn revert_block(&self, block: &Block, cancel: &CancellationToken) -> Result<(), StateError> {
        let _guard = self.apply_lock.write();
        if cancel.is_cancelled() {
            return Err(StateError::Cancelled);
        }
        let before = self.touched_accounts(block);
        let mut total_fees: i64 = 0;
        for tx in &block.body.transactions {
            self.world.credit(tx.sender, tx.amount + tx.fee);
            let mut entry = self.world.get(&tx.sender);
            entry.nonce -= 1;
            self.world.set(tx.sender, entry);
            let mut recipient = self.world.get(&tx.recipient);
            recipient.balance -= tx.amount;
            self.world.set(tx.recipient, recipient);
            total_fees += tx.fee;
        }
        if total_fees > 0 {
            let mut miner = self.world.get(&block.header.miner_id);
            miner.balance -= total_fees;
            self.world.set(block.header.miner_id, miner);
        }
        if let Err(e) = self.persist_touched(block) {
            for (addr, state) in before {
                self.world.set(addr, state);
            }
            return Err(e);
        }
        Ok(())
    }

    /// A sparse Merkle-style commitment: `SHA256(addr || balance_le ||
    /// nonce_le)` leaves, sorted by address, folded with [`merkle::build`].
    pub fn state_root(&self) -> Hash32 {
        let mut entries: Vec<(PublicKey, AccountState)> = self.world.iter().collect();
        entries.sort_by_key(|(addr, _)| *addr);
        let leaves: Vec<Hash32> = entries
            .iter()
            .map(|(addr, state)| {
                let mut w = ByteWriter::with_capacity(33 + 16);
                w.bytes(addr.as_bytes()).i64(state.balance).i64(state.nonce);
                sha256(&w.into_vec())
            })
            .collect();
        merkle::build(&leaves)
    }

    /// Captures the full account ledger and returns a handle to restore
    /// it later via `revert`.
    pub fn snapshot(&self) -> SnapshotId {
        let id = self.next_snapshot_id.fetch_add(1, Ordering::SeqCst);
        let copy: HashMap<PublicKey, AccountState> = self.world.iter().collect();
        self.snapshots.write().insert(id, copy);
        id
    }

    /// Restores the ledger to the state captured by `snapshot`.
    /// Reverting an unknown id is a fatal [`StateError::InvalidSnapshot`].
    pub fn revert(&self, id: SnapshotId) -> Result<(), StateError> {
        let captured = self.snapshots.read().get(&id).cloned().ok_or(StateError::InvalidSnapshot)?;
        let current: Vec<PublicKey> = self.world.iter().map(|(addr, _)| addr).collect();
        for addr in current {
            if !captured.contains_key(&addr) {
                self.world.set(addr, AccountState::default());
            }
        }
        for (addr, state) in captured {
            self.world.set(addr, state);
        }
        Ok(())
    }

    /// Idempotent: releasing an already-released or unknown id is a no-op.
    pub fn release(&self, id: SnapshotId) {
        self.snapshots.write().remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::Signature;
    use crate::proof::{BlockProof, PlotMetadata};
    use crate::signing::{Secp256k1Keypair, Secp256k1Verifier};
    use crate::storage::{AccountStorage, MemChainStorage};
    use crate::transaction::Transaction;

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

    fn block_with_txs(miner: PublicKey, txs: Vec<Transaction>) -> Block {
        Block {
            header: crate::block::BlockHeader {
                version: 1,
                parent_hash: Hash32::ZERO,
                height: 1,
                timestamp_unix_secs: 0,
                difficulty: 1,
                epoch: 0,
                challenge: Hash32::ZERO,
                plot_root: Hash32::ZERO,
                proof_score: Hash32::ZERO,
                tx_root: Hash32::ZERO,
                miner_id: miner,
                signature: Signature::empty(),
            },
            body: crate::block::BlockBody {
                transactions: txs,
                proof: BlockProof {
                    challenge: Hash32::ZERO,
                    leaf_value: Hash32::ZERO,
                    leaf_index: 0,
                    merkle_path: Vec::new(),
                    orientation_bits: Vec::new(),
                    plot_metadata: PlotMetadata { leaf_count: 1, plot_id: Hash32::ZERO, plot_header_hash: Hash32::ZERO, version: 1 },
                },
            },
        }
    }

    #[test]
    fn apply_block_debits_sender_and_credits_recipient_and_miner() {
        let cfg = config();
        let verifier = Secp256k1Verifier;
        let storage = MemChainStorage::new();
        let state = StateManager::new(&cfg, &verifier, &storage);
        let sender = Secp256k1Keypair::generate();
        let recipient = Secp256k1Keypair::generate().public_key();
        let miner = Secp256k1Keypair::generate().public_key();
        state.world.credit(sender.public_key(), 1000);

        let mut tx = Transaction::new_unsigned(1, sender.public_key(), recipient, 100, 0, 5);
        tx.sign(&sender);
        let block = block_with_txs(miner, vec![tx]);

        state.apply_block(&block, &CancellationToken::never()).unwrap();
        assert_eq!(state.get_balance(&sender.public_key()), 895);
        assert_eq!(state.get_balance(&recipient), 100);
        assert_eq!(state.get_balance(&miner), 5);
        assert_eq!(state.get_nonce(&sender.public_key()), 1);

        let persisted = storage.get_account(&sender.public_key()).unwrap().unwrap();
        assert_eq!(persisted.balance, 895);
        assert_eq!(persisted.nonce, 1);
        assert_eq!(storage.get_account(&miner).unwrap().unwrap().balance, 5);
    }

    #[test]
    fn double_spend_in_block_rejects_whole_block_and_leaves_state_untouched() {
        let cfg = config();
        let verifier = Secp256k1Verifier;
        let storage = MemChainStorage::new();
        let state = StateManager::new(&cfg, &verifier, &storage);
        let sender = Secp256k1Keypair::generate();
        let recipient = Secp256k1Keypair::generate().public_key();
        let miner = Secp256k1Keypair::generate().public_key();
        state.world.credit(sender.public_key(), 100);

        let mut tx1 = Transaction::new_unsigned(1, sender.public_key(), recipient, 60, 0, 1);
        tx1.sign(&sender);
        let mut tx2 = Transaction::new_unsigned(1, sender.public_key(), recipient, 60, 1, 1);
        tx2.sign(&sender);
        let block = block_with_txs(miner, vec![tx1, tx2]);

        assert!(state.apply_block(&block, &CancellationToken::never()).is_err());
        assert_eq!(state.get_balance(&sender.public_key()), 100);
        assert_eq!(state.get_nonce(&sender.public_key()), 0);
    }

    #[test]
    fn snapshot_and_revert_restores_prior_balances() {
        let cfg = config();
        let verifier = Secp256k1Verifier;
        let storage = MemChainStorage::new();
        let state = StateManager::new(&cfg, &verifier, &storage);
        let addr = Secp256k1Keypair::generate().public_key();
        state.world.credit(addr, 50);
        let id = state.snapshot();
        state.world.credit(addr, 1000);
        assert_eq!(state.get_balance(&addr), 1050);
        state.revert(id).unwrap();
        assert_eq!(state.get_balance(&addr), 50);
    }

    #[test]
    fn revert_unknown_snapshot_is_fatal() {
        let cfg = config();
        let verifier = Secp256k1Verifier;
        let storage = MemChainStorage::new();
        let state = StateManager::new(&cfg, &verifier, &storage);
        assert!(matches!(state.revert(999), Err(StateError::InvalidSnapshot)));
    }

    #[test]
    fn release_is_idempotent() {
        let cfg = config();
        let verifier = Secp256k1Verifier;
        let storage = MemChainStorage::new();
        let state = StateManager::new(&cfg, &verifier, &storage);
        let id = state.snapshot();
        state.release(id);
        state.release(id);
    }

    #[test]
    fn empty_state_root_is_zero() {
        let cfg = config();
        let verifier = Secp256k1Verifier;
        let storage = MemChainStorage::new();
        let state = StateManager::new(&cfg, &verifier, &storage);
        assert_eq!(state.state_root(), Hash32::ZERO);
    }

    #[test]
    fn state_root_changes_after_apply() {
        let cfg = config();
        let verifier = Secp256k1Verifier;
        let storage = MemChainStorage::new();
        let state = StateManager::new(&cfg, &verifier, &storage);
        let before = state.state_root();
        state.world.credit(Secp256k1Keypair::generate().public_key(), 10);
        assert_ne!(state.state_root(), before);
    }
}
