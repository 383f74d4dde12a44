//! Fee-priority transaction mempool (spec §4.4).
//!
//! Generalizes the teacher's `mempool.rs` (`PriorityKey`-ordered
//! `BTreeMap` index over a `DashMap` transaction table) onto spec's
//! plain `(-fee, hash)` ordering, dropping the teacher's age-decay
//! weighting (`LWAPQ`) and per-account rate limiting — spec's pool has
//! neither.

use std::collections::{BTreeMap, HashMap};

use crate::config::MempoolConfig;
use crate::error::MempoolError;
use crate::primitives::Hash32;
use crate::sync_lock::RwLock;
use crate::transaction::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct PriorityKey {
    neg_fee: i64,
    hash_bytes: [u8; 32],
}

impl PriorityKey {
    fn for_tx(tx: &Transaction, hash: Hash32) -> Self {
        Self { neg_fee: -tx.fee, hash_bytes: hash.0 }
    }
}

#[derive(Default)]
struct MempoolInner {
    by_priority: BTreeMap<PriorityKey, Hash32>,
    by_hash: HashMap<Hash32, Transaction>,
}

pub struct Mempool {
    config: MempoolConfig,
    inner: RwLock<MempoolInner>,
}

impl Mempool {
    pub fn new(config: MempoolConfig) -> Self {
        Self { config, inner: RwLock::new(MempoolInner::default()) }
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, hash: Hash32) -> bool {
        self.inner.read().by_hash.contains_key(&hash)
    }

    /// Admits `tx`, evicting the lowest-fee entry if the pool is full
    /// and `tx`'s fee exceeds it (spec §4.4 admission rule).
    pub fn admit(&self, tx: Transaction) -> Result<Hash32, MempoolError> {
        if tx.fee < self.config.min_fee {
            return Err(MempoolError::FeeTooLow { minimum: self.config.min_fee, got: tx.fee });
        }
        let hash = tx.hash();
        let mut inner = self.inner.write();
        if inner.by_hash.contains_key(&hash) {
            return Err(MempoolError::DuplicateTransaction);
        }
        if inner.by_hash.len() >= self.config.max_transactions {
            let lowest = *inner
                .by_priority
                .keys()
                .next_back()
                .expect("by_priority and by_hash are always the same length");
            if tx.fee > -lowest.neg_fee {
                inner.by_priority.remove(&lowest);
                inner.by_hash.remove(&Hash32(lowest.hash_bytes));
            } else {
                return Err(MempoolError::PoolFull);
            }
        }
        inner.by_priority.insert(PriorityKey::for_tx(&tx, hash), hash);
        inner.by_hash.insert(hash, tx);
        Ok(hash)
    }

    /// Returns up to `min(max_count, max_transactions_per_block, len)`
    /// transactions in priority order, without removing them.
    pub fn drain(&self, max_count: usize) -> Vec<Transaction> {
        let inner = self.inner.read();
        let limit = max_count.min(self.config.max_transactions_per_block);
        inner
            .by_priority
            .values()
            .take(limit)
            .map(|hash| inner.by_hash.get(hash).cloned().expect("index and table stay in sync"))
            .collect()
    }

    /// Explicit removal after a block including these hashes commits.
    pub fn remove(&self, hashes: &[Hash32]) {
        let mut inner = self.inner.write();
        for hash in hashes {
            if let Some(tx) = inner.by_hash.remove(hash) {
                inner.by_priority.remove(&PriorityKey::for_tx(&tx, *hash));
            }
        }
    }

    /// Drops every pending transaction (reorg reset, spec §4.8).
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.by_priority.clear();
        inner.by_hash.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::Secp256k1Keypair;

    fn config(max_transactions: usize, max_per_block: usize, min_fee: i64) -> MempoolConfig {
        MempoolConfig { max_transactions, max_transactions_per_block: max_per_block, min_fee }
    }

    fn tx(sender: &Secp256k1Keypair, fee: i64, nonce: i64) -> Transaction {
        let recipient = Secp256k1Keypair::generate().public_key();
        let mut tx = crate::transaction::Transaction::new_unsigned(1, sender.public_key(), recipient, 10, nonce, fee);
        tx.sign(sender);
        tx
    }

    #[test]
    fn rejects_fee_below_minimum() {
        let pool = Mempool::new(config(10, 10, 5));
        let sender = Secp256k1Keypair::generate();
        assert!(matches!(pool.admit(tx(&sender, 1, 0)), Err(MempoolError::FeeTooLow { .. })));
    }

    #[test]
    fn rejects_duplicate_by_hash() {
        let pool = Mempool::new(config(10, 10, 1));
        let sender = Secp256k1Keypair::generate();
        let t = tx(&sender, 5, 0);
        pool.admit(t.clone()).unwrap();
        assert!(matches!(pool.admit(t), Err(MempoolError::DuplicateTransaction)));
    }

    #[test]
    fn drain_returns_in_fee_priority_order() {
        let pool = Mempool::new(config(10, 10, 1));
        let sender = Secp256k1Keypair::generate();
        pool.admit(tx(&sender, 3, 0)).unwrap();
        pool.admit(tx(&sender, 9, 1)).unwrap();
        pool.admit(tx(&sender, 5, 2)).unwrap();
        let drained = pool.drain(10);
        let fees: Vec<i64> = drained.iter().map(|t| t.fee).collect();
        assert_eq!(fees, vec![9, 5, 3]);
    }

    #[test]
    fn drain_is_capped_by_max_transactions_per_block() {
        let pool = Mempool::new(config(10, 2, 1));
        let sender = Secp256k1Keypair::generate();
        for n in 0..5 {
            pool.admit(tx(&sender, n + 1, n)).unwrap();
        }
        assert_eq!(pool.drain(10).len(), 2);
    }

    #[test]
    fn full_pool_evicts_lowest_fee_when_incoming_fee_is_higher() {
        let pool = Mempool::new(config(2, 10, 1));
        let sender = Secp256k1Keypair::generate();
        pool.admit(tx(&sender, 2, 0)).unwrap();
        pool.admit(tx(&sender, 3, 1)).unwrap();
        pool.admit(tx(&sender, 10, 2)).unwrap();
        assert_eq!(pool.len(), 2);
        let fees: Vec<i64> = pool.drain(10).iter().map(|t| t.fee).collect();
        assert_eq!(fees, vec![10, 3]);
    }

    #[test]
    fn full_pool_rejects_when_incoming_fee_is_not_higher() {
        let pool = Mempool::new(config(1, 10, 1));
        let sender = Secp256k1Keypair::generate();
        pool.admit(tx(&sender, 5, 0)).unwrap();
        assert!(matches!(pool.admit(tx(&sender, 5, 1)), Err(MempoolError::PoolFull)));
    }

    #[test]
    fn remove_drops_named_hashes_only() {
        let pool = Mempool::new(config(10, 10, 1));
        let sender = Secp256k1Keypair::generate();
        let t1 = tx(&sender, 2, 0);
        let t2 = tx(&sender, 3, 1);
        let h1 = pool.admit(t1).unwrap();
        pool.admit(t2).unwrap();
        pool.remove(&[h1]);
        assert_eq!(pool.len(), 1);
        assert!(!pool.contains(h1));
    }

    #[test]
    fn clear_empties_the_pool() {
        let pool = Mempool::new(config(10, 10, 1));
        let sender = Secp256k1Keypair::generate();
        pool.admit(tx(&sender, 2, 0)).unwrap();
        pool.clear();
        assert!(pool.is_empty());
    }
}
