//! Persistent storage abstraction (spec §4.7, §9 ambient persistence).
//!
//! Generalizes the teacher's `BlockchainStorage` (one `sled::Tree` per
//! concern, bincode-free hand-rolled key encoding, a `flush`/
//! `compact`/`get_database_size` maintenance surface) into the
//! `ChainStorage` trait spec's `StateManager`/`ChainReorganizer` depend
//! on, with a `SledChainStorage` default and a `MemChainStorage` for
//! tests — the teacher never needed a second backend since it only ever
//! ran against sled directly.

use std::collections::HashMap;
use std::path::Path;

use crate::account::AccountState;
use crate::block::Block;
use crate::error::StateError;
use crate::primitives::{ByteReader, ByteWriter, Hash32, PublicKey};
use crate::sync_lock::RwLock;

const ACCOUNT_WIRE_LEN: usize = 16;

fn encode_account(state: &AccountState) -> [u8; ACCOUNT_WIRE_LEN] {
    let mut w = ByteWriter::with_capacity(ACCOUNT_WIRE_LEN);
    w.i64(state.balance).i64(state.nonce);
    let v = w.into_vec();
    let mut out = [0u8; ACCOUNT_WIRE_LEN];
    out.copy_from_slice(&v);
    out
}

fn decode_account(bytes: &[u8]) -> Result<AccountState, StateError> {
    let mut r = ByteReader::new(bytes);
    let balance = r.i64().map_err(|e| StateError::Storage(e.to_string()))?;
    let nonce = r.i64().map_err(|e| StateError::Storage(e.to_string()))?;
    Ok(AccountState { balance, nonce })
}

/// One atomic unit of work: every `put` either all lands or none does.
#[derive(Default)]
pub struct WriteBatch {
    accounts: Vec<(PublicKey, AccountState)>,
    blocks: Vec<Block>,
    best_block_hash: Option<Hash32>,
    chain_height: Option<i64>,
    cumulative_difficulty: Option<(Hash32, i64)>,
    orphaned: Vec<Hash32>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_account(&mut self, address: PublicKey, state: AccountState) -> &mut Self {
        self.accounts.push((address, state));
        self
    }

    pub fn put_block(&mut self, block: Block) -> &mut Self {
        self.blocks.push(block);
        self
    }

    pub fn set_best_block_hash(&mut self, hash: Hash32) -> &mut Self {
        self.best_block_hash = Some(hash);
        self
    }

    pub fn set_chain_height(&mut self, height: i64) -> &mut Self {
        self.chain_height = Some(height);
        self
    }

    pub fn set_cumulative_difficulty(&mut self, hash: Hash32, difficulty: i64) -> &mut Self {
        self.cumulative_difficulty = Some((hash, difficulty));
        self
    }

    pub fn mark_orphaned(&mut self, hash: Hash32) -> &mut Self {
        self.orphaned.push(hash);
        self
    }
}

/// The account-ledger read surface (spec §6).
pub trait AccountStorage: Send + Sync {
    fn get_account(&self, address: &PublicKey) -> Result<Option<AccountState>, StateError>;
}

/// The block-archive read surface (spec §6).
pub trait BlockStorage: Send + Sync {
    fn get_block_by_hash(&self, hash: Hash32) -> Result<Option<Block>, StateError>;
    fn get_header_by_hash(&self, hash: Hash32) -> Result<Option<Block>, StateError> {
        self.get_block_by_hash(hash)
    }
}

/// The chain-tip/difficulty bookkeeping surface (spec §6).
pub trait MetadataStorage: Send + Sync {
    fn get_best_block_hash(&self) -> Result<Option<Hash32>, StateError>;
    fn get_chain_height(&self) -> Result<i64, StateError>;
    fn get_cumulative_difficulty(&self, hash: Hash32) -> Result<Option<i64>, StateError>;
}

/// The full storage collaborator spec's `StateManager`/`ChainReorganizer`
/// depend on: the three read surfaces above plus atomic commit and
/// integrity checking.
pub trait ChainStorage: AccountStorage + BlockStorage + MetadataStorage {
    fn commit(&self, batch: WriteBatch) -> Result<(), StateError>;
    fn check_integrity(&self) -> Result<(), StateError>;
}

/// In-memory backend, used by tests and the state-transition machinery
/// that doesn't need durability.
#[derive(Default)]
pub struct MemChainStorage {
    inner: RwLock<MemInner>,
}

#[derive(Default)]
struct MemInner {
    accounts: HashMap<PublicKey, AccountState>,
    blocks: HashMap<Hash32, Block>,
    best_block_hash: Option<Hash32>,
    chain_height: i64,
    cumulative_difficulty: HashMap<Hash32, i64>,
    orphaned: std::collections::HashSet<Hash32>,
}

impl MemChainStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_orphaned(&self, hash: Hash32) -> bool {
        self.inner.read().orphaned.contains(&hash)
    }
}

impl AccountStorage for MemChainStorage {
    fn get_account(&self, address: &PublicKey) -> Result<Option<AccountState>, StateError> {
        Ok(self.inner.read().accounts.get(address).copied())
    }
}

impl BlockStorage for MemChainStorage {
    fn get_block_by_hash(&self, hash: Hash32) -> Result<Option<Block>, StateError> {
        Ok(self.inner.read().blocks.get(&hash).cloned())
    }
}

impl MetadataStorage for MemChainStorage {
    fn get_best_block_hash(&self) -> Result<Option<Hash32>, StateError> {
        Ok(self.inner.read().best_block_hash)
    }

    fn get_chain_height(&self) -> Result<i64, StateError> {
        Ok(self.inner.read().chain_height)
    }

    fn get_cumulative_difficulty(&self, hash: Hash32) -> Result<Option<i64>, StateError> {
        Ok(self.inner.read().cumulative_difficulty.get(&hash).copied())
    }
}

impl ChainStorage for MemChainStorage {
    fn commit(&self, batch: WriteBatch) -> Result<(), StateError> {
        let mut inner = self.inner.write();
        for (addr, state) in batch.accounts {
            inner.accounts.insert(addr, state);
        }
        for block in batch.blocks {
            inner.blocks.insert(block.hash(), block);
        }
        if let Some(hash) = batch.best_block_hash {
            inner.best_block_hash = Some(hash);
        }
        if let Some(height) = batch.chain_height {
            inner.chain_height = height;
        }
        if let Some((hash, diff)) = batch.cumulative_difficulty {
            inner.cumulative_difficulty.insert(hash, diff);
        }
        for hash in batch.orphaned {
            inner.orphaned.insert(hash);
        }
        Ok(())
    }

    fn check_integrity(&self) -> Result<(), StateError> {
        Ok(())
    }
}

/// sled-backed durable storage.
pub struct SledChainStorage {
    db: sled::Db,
    accounts: sled::Tree,
    blocks: sled::Tree,
    metadata: sled::Tree,
    difficulty: sled::Tree,
}

const KEY_BEST_BLOCK_HASH: &[u8] = b"best_block_hash";
const KEY_CHAIN_HEIGHT: &[u8] = b"chain_height";

impl SledChainStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StateError> {
        let db = sled::open(path).map_err(|e| StateError::Storage(e.to_string()))?;
        let accounts = db.open_tree("accounts").map_err(|e| StateError::Storage(e.to_string()))?;
        let blocks = db.open_tree("blocks").map_err(|e| StateError::Storage(e.to_string()))?;
        let metadata = db.open_tree("metadata").map_err(|e| StateError::Storage(e.to_string()))?;
        let difficulty = db.open_tree("cumulative_difficulty").map_err(|e| StateError::Storage(e.to_string()))?;
        Ok(Self { db, accounts, blocks, metadata, difficulty })
    }

    pub fn flush(&self) -> Result<(), StateError> {
        self.db.flush().map_err(|e| StateError::Storage(e.to_string()))?;
        Ok(())
    }
}

impl AccountStorage for SledChainStorage {
    fn get_account(&self, address: &PublicKey) -> Result<Option<AccountState>, StateError> {
        match self.accounts.get(address.as_bytes()).map_err(|e| StateError::Storage(e.to_string()))? {
            Some(bytes) => Ok(Some(decode_account(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl BlockStorage for SledChainStorage {
    fn get_block_by_hash(&self, hash: Hash32) -> Result<Option<Block>, StateError> {
        match self.blocks.get(hash.as_bytes()).map_err(|e| StateError::Storage(e.to_string()))? {
            Some(bytes) => Ok(Some(Block::decode(&bytes).map_err(|e| StateError::Storage(e.to_string()))?)),
            None => Ok(None),
        }
    }
}

impl MetadataStorage for SledChainStorage {
    fn get_best_block_hash(&self) -> Result<Option<Hash32>, StateError> {
        match self.metadata.get(KEY_BEST_BLOCK_HASH).map_err(|e| StateError::Storage(e.to_string()))? {
            Some(bytes) => Hash32::from_bytes(&bytes).map(Some).map_err(|e| StateError::Storage(e.to_string())),
            None => Ok(None),
        }
    }

    fn get_chain_height(&self) -> Result<i64, StateError> {
        match self.metadata.get(KEY_CHAIN_HEIGHT).map_err(|e| StateError::Storage(e.to_string()))? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.as_ref().try_into().map_err(|_| StateError::Storage("corrupt chain_height".into()))?;
                Ok(i64::from_le_bytes(arr))
            }
            None => Ok(0),
        }
    }

    fn get_cumulative_difficulty(&self, hash: Hash32) -> Result<Option<i64>, StateError> {
        match self.difficulty.get(hash.as_bytes()).map_err(|e| StateError::Storage(e.to_string()))? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.as_ref().try_into().map_err(|_| StateError::Storage("corrupt difficulty".into()))?;
                Ok(Some(i64::from_le_bytes(arr)))
            }
            None => Ok(None),
        }
    }
}

impl ChainStorage for SledChainStorage {
    fn commit(&self, batch: WriteBatch) -> Result<(), StateError> {
        // accounts and blocks live in separate trees; sled has no cross-tree
        // atomic batch, so each tree's batch commits independently and
        // metadata (the pointer to "current" state) is written last.
        let mut account_batch = sled::Batch::default();
        for (addr, state) in &batch.accounts {
            account_batch.insert(addr.as_bytes().as_slice(), &encode_account(state)[..]);
        }
        self.accounts.apply_batch(account_batch).map_err(|e| StateError::Storage(e.to_string()))?;

        let mut block_batch = sled::Batch::default();
        for block in &batch.blocks {
            block_batch.insert(block.hash().as_bytes().as_slice(), block.encode());
        }
        self.blocks.apply_batch(block_batch).map_err(|e| StateError::Storage(e.to_string()))?;

        if let Some((hash, diff)) = batch.cumulative_difficulty {
            self.difficulty
                .insert(hash.as_bytes().as_slice(), &diff.to_le_bytes()[..])
                .map_err(|e| StateError::Storage(e.to_string()))?;
        }

        let mut metadata_batch = sled::Batch::default();
        if let Some(hash) = batch.best_block_hash {
            metadata_batch.insert(KEY_BEST_BLOCK_HASH, hash.as_bytes().as_slice());
        }
        if let Some(height) = batch.chain_height {
            metadata_batch.insert(KEY_CHAIN_HEIGHT, &height.to_le_bytes()[..]);
        }
        self.metadata.apply_batch(metadata_batch).map_err(|e| StateError::Storage(e.to_string()))?;

        Ok(())
    }

    fn check_integrity(&self) -> Result<(), StateError> {
        for entry in self.accounts.iter() {
            let (_, value) = entry.map_err(|e| StateError::Storage(e.to_string()))?;
            decode_account(&value)?;
        }
        for entry in self.blocks.iter() {
            let (_, value) = entry.map_err(|e| StateError::Storage(e.to_string()))?;
            Block::decode(&value).map_err(|e| StateError::Storage(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::Secp256k1Keypair;

    #[test]
    fn mem_storage_round_trips_accounts() {
        let storage = MemChainStorage::new();
        let addr = Secp256k1Keypair::generate().public_key();
        let mut batch = WriteBatch::new();
        batch.put_account(addr, AccountState { balance: 100, nonce: 3 });
        storage.commit(batch).unwrap();
        assert_eq!(storage.get_account(&addr).unwrap(), Some(AccountState { balance: 100, nonce: 3 }));
    }

    #[test]
    fn sled_storage_round_trips_accounts() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SledChainStorage::open(dir.path()).unwrap();
        let addr = Secp256k1Keypair::generate().public_key();
        let mut batch = WriteBatch::new();
        batch.put_account(addr, AccountState { balance: 50, nonce: 1 });
        batch.set_chain_height(1);
        storage.commit(batch).unwrap();
        assert_eq!(storage.get_account(&addr).unwrap(), Some(AccountState { balance: 50, nonce: 1 }));
        assert_eq!(storage.get_chain_height().unwrap(), 1);
        assert!(storage.check_integrity().is_ok());
    }

    #[test]
    fn missing_account_reads_as_none() {
        let storage = MemChainStorage::new();
        let addr = Secp256k1Keypair::generate().public_key();
        assert_eq!(storage.get_account(&addr).unwrap(), None);
    }
}
