//! Transaction type and `TransactionValidator` (spec §3, §4.5, §6).
//!
//! Generalizes the teacher's `Transaction` (`new`/`sign`/`verify_signature`/
//! `hash` plus a `validate_structure` gate before expensive checks) onto
//! the flat transfer-only record spec's data model fixes, dropping the
//! teacher's `TransactionType::{Transfer,MiningReward}` enum (mining
//! rewards here are paid out by `StateManager.apply_block`, not carried
//! as transactions) and its fee-by-size formula (spec says `min_fee ≤
//! fee ≤ max_fee`, a flat config bound, not size-derived).

use std::collections::HashMap;

use crate::cancellation::CancellationToken;
use crate::error::TransactionValidationError as TxError;
use crate::config::TransactionValidationConfig;
use crate::hashing::sha256;
use crate::primitives::{Amount, ByteReader, ByteWriter, Hash32, Nonce, PublicKey, Signature};
use crate::signing::{BlockSigner, SignatureVerifier};

pub const WIRE_LEN: usize = 155;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction {
    pub version: u8,
    pub sender: PublicKey,
    pub recipient: PublicKey,
    pub amount: Amount,
    pub nonce: Nonce,
    pub fee: Amount,
    pub signature: Signature,
}

impl Transaction {
    pub fn new_unsigned(version: u8, sender: PublicKey, recipient: PublicKey, amount: Amount, nonce: Nonce, fee: Amount) -> Self {
        Self { version, sender, recipient, amount, nonce, fee, signature: Signature::empty() }
    }

    /// `SHA256(serialize(tx_without_signature))`.
    pub fn hash(&self) -> Hash32 {
        sha256(&self.encode_unsigned())
    }

    pub fn sign(&mut self, signer: &dyn BlockSigner) {
        let hash = self.hash();
        self.signature = signer.sign(hash.as_bytes());
    }

    pub fn verify_signature(&self, verifier: &dyn SignatureVerifier) -> bool {
        verifier.verify(self.hash().as_bytes(), &self.signature, &self.sender)
    }

    fn encode_unsigned(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(WIRE_LEN - Signature::LEN);
        w.u8(self.version)
            .bytes(self.sender.as_bytes())
            .bytes(self.recipient.as_bytes())
            .i64(self.amount)
            .i64(self.nonce)
            .i64(self.fee);
        w.into_vec()
    }

    pub fn encode(&self) -> [u8; WIRE_LEN] {
        let mut w = ByteWriter::with_capacity(WIRE_LEN);
        w.u8(self.version)
            .bytes(self.sender.as_bytes())
            .bytes(self.recipient.as_bytes())
            .i64(self.amount)
            .i64(self.nonce)
            .i64(self.fee)
            .bytes(self.signature.as_bytes());
        let v = w.into_vec();
        let mut out = [0u8; WIRE_LEN];
        out.copy_from_slice(&v);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TxError> {
        if bytes.len() != WIRE_LEN {
            return Err(TxError::BasicValidationFailed(format!(
                "expected {WIRE_LEN} bytes for a transaction, got {}",
                bytes.len()
            )));
        }
        let mut r = ByteReader::new(bytes);
        let bad = |e: std::fmt::Arguments| TxError::BasicValidationFailed(e.to_string());
        let version = r.u8().map_err(|_| bad(format_args!("truncated version")))?;
        let sender = PublicKey::from_bytes(r.bytes(33).map_err(|_| bad(format_args!("truncated sender")))?)
            .map_err(|e| TxError::BasicValidationFailed(e.to_string()))?;
        let recipient = PublicKey::from_bytes(r.bytes(33).map_err(|_| bad(format_args!("truncated recipient")))?)
            .map_err(|e| TxError::BasicValidationFailed(e.to_string()))?;
        let amount = r.i64().map_err(|_| bad(format_args!("truncated amount")))?;
        let nonce = r.i64().map_err(|_| bad(format_args!("truncated nonce")))?;
        let fee = r.i64().map_err(|_| bad(format_args!("truncated fee")))?;
        let signature = Signature::from_bytes(r.bytes(64).map_err(|_| bad(format_args!("truncated signature")))?)
            .map_err(|e| TxError::BasicValidationFailed(e.to_string()))?;
        Ok(Self { version, sender, recipient, amount, nonce, fee, signature })
    }

    fn basic_rules(&self) -> Result<(), TxError> {
        if self.signature.is_empty() {
            return Err(TxError::BasicValidationFailed("transaction is not signed".into()));
        }
        if self.amount <= 0 {
            return Err(TxError::BasicValidationFailed("amount must be positive".into()));
        }
        if self.fee < 0 {
            return Err(TxError::BasicValidationFailed("fee cannot be negative".into()));
        }
        if self.nonce < 0 {
            return Err(TxError::BasicValidationFailed("nonce cannot be negative".into()));
        }
        if self.sender == self.recipient {
            return Err(TxError::SelfTransfer);
        }
        Ok(())
    }
}

/// Per-sender tentative `(balance, nonce)` overrides accumulated while
/// validating a sequence of transactions destined for the same block
/// (spec §4.5: in-block validation threading).
#[derive(Debug, Default)]
pub struct BlockValidationContext {
    overrides: HashMap<PublicKey, (Amount, Nonce)>,
}

impl BlockValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_insert(&mut self, addr: PublicKey, base: (Amount, Nonce)) -> (Amount, Nonce) {
        *self.overrides.entry(addr).or_insert(base)
    }
}

pub struct TransactionValidator<'a> {
    config: &'a TransactionValidationConfig,
    verifier: &'a dyn SignatureVerifier,
}

impl<'a> TransactionValidator<'a> {
    pub fn new(config: &'a TransactionValidationConfig, verifier: &'a dyn SignatureVerifier) -> Self {
        Self { config, verifier }
    }

    /// The rules shared by both standalone and in-block validation,
    /// excluding anything that depends on account state: structural
    /// well-formedness, fee bounds, size, and signature. Used directly
    /// by [`crate::block_validator::BlockValidator`] step 5, which only
    /// needs the stateless half.
    pub fn validate_stateless(&self, tx: &Transaction, cancel: &CancellationToken) -> Result<(), TxError> {
        if cancel.is_cancelled() {
            return Err(TxError::Cancelled);
        }
        self.check_shared_rules(tx)
    }

    fn check_shared_rules(&self, tx: &Transaction) -> Result<(), TxError> {
        tx.basic_rules()?;
        if tx.version != self.config.supported_version {
            return Err(TxError::UnsupportedVersion(tx.version));
        }
        if tx.fee < self.config.min_fee {
            return Err(TxError::FeeTooLow { minimum: self.config.min_fee, got: tx.fee });
        }
        if tx.fee > self.config.max_fee {
            return Err(TxError::FeeTooHigh { maximum: self.config.max_fee, got: tx.fee });
        }
        let size = tx.encode().len();
        if size > self.config.max_transaction_size {
            return Err(TxError::TransactionTooLarge { size, maximum: self.config.max_transaction_size });
        }
        if !tx.verify_signature(self.verifier) {
            return Err(TxError::InvalidSignature);
        }
        Ok(())
    }

    /// Standalone validation (spec §4.5 steps 1–7), against the
    /// account's currently-committed `(balance, nonce)`.
    pub fn validate_standalone(
        &self,
        tx: &Transaction,
        account_balance: Amount,
        account_nonce: Nonce,
        is_duplicate: bool,
        cancel: &CancellationToken,
    ) -> Result<(), TxError> {
        if cancel.is_cancelled() {
            return Err(TxError::Cancelled);
        }
        self.check_shared_rules(tx)?;
        if self.config.check_duplicate_transactions && is_duplicate {
            return Err(TxError::DuplicateTransaction);
        }
        if tx.nonce != account_nonce {
            return Err(TxError::InvalidNonce { expected: account_nonce, got: tx.nonce });
        }
        let required = tx.amount + tx.fee;
        if account_balance < required {
            return Err(TxError::InsufficientBalance { required, available: account_balance });
        }
        Ok(())
    }

    /// In-block validation: threads `ctx` so a sequence of transactions
    /// from the same sender validates coherently against tentative state
    /// rather than the last-committed account snapshot.
    pub fn validate_in_block(
        &self,
        tx: &Transaction,
        ctx: &mut BlockValidationContext,
        base_account: impl FnOnce() -> (Amount, Nonce),
        cancel: &CancellationToken,
    ) -> Result<(), TxError> {
        if cancel.is_cancelled() {
            return Err(TxError::Cancelled);
        }
        self.check_shared_rules(tx)?;
        let (balance, nonce) = ctx.get_or_insert(tx.sender, base_account());
        if tx.nonce != nonce {
            return Err(TxError::InvalidNonce { expected: nonce, got: tx.nonce });
        }
        let required = tx.amount + tx.fee;
        if balance < required {
            return Err(TxError::InsufficientBalance { required, available: balance });
        }
        ctx.overrides.insert(tx.sender, (balance - required, nonce + 1));
        ctx.overrides.entry(tx.recipient).and_modify(|(bal, _)| *bal += tx.amount);
        Ok(())
    }

    /// Validates a batch against `ctx`, short-circuiting on the first
    /// failure: remaining entries are reported as
    /// `Other("stopped due to earlier failure")`. A batch exceeding
    /// `max_transactions_per_block` is rejected wholesale.
    pub fn validate_batch(
        &self,
        txs: &[Transaction],
        ctx: &mut BlockValidationContext,
        mut base_account: impl FnMut(&PublicKey) -> (Amount, Nonce),
        cancel: &CancellationToken,
    ) -> Vec<Result<(), TxError>> {
        if txs.len() > self.config.max_transactions_per_block {
            return vec![Err(TxError::Other("transaction batch exceeds max_transactions_per_block".into())); txs.len()];
        }
        let mut results = Vec::with_capacity(txs.len());
        let mut failed = false;
        for tx in txs {
            if cancel.is_cancelled() {
                results.push(Err(TxError::Cancelled));
                failed = true;
                continue;
            }
            if failed {
                results.push(Err(TxError::Other("stopped due to earlier failure".into())));
                continue;
            }
            let sender = tx.sender;
            let outcome = self.validate_in_block(tx, ctx, || base_account(&sender), cancel);
            if outcome.is_err() {
                failed = true;
            }
            results.push(outcome);
        }
        results
    }
}
