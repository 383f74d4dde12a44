//! Typed error taxonomy for the consensus core.
//!
//! Each component gets its own enum so callers can match on a narrow,
//! meaningful set of variants; [`ConsensusError`] is the aggregate used
//! at API boundaries that can fail for more than one reason.

use thiserror::Error;

/// Programmer/boundary errors: bad sizes, bad arguments, nothing the
/// protocol itself disagrees with.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Errors from [`crate::proof::ProofValidator`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProofError {
    #[error("proof challenge does not match expected challenge")]
    ChallengeMismatch,
    #[error("proof merkle root does not match expected plot root")]
    PlotRootMismatch,
    #[error("recomputed score does not match proof score")]
    ScoreMismatch,
    #[error("proof score is not below the difficulty target")]
    ScoreAboveTarget,
    #[error("merkle inclusion path does not reconstruct the plot root")]
    InvalidMerklePath,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Errors from [`crate::transaction::TransactionValidator`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransactionValidationError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: i64, available: i64 },
    #[error("invalid nonce: expected {expected}, got {got}")]
    InvalidNonce { expected: i64, got: i64 },
    #[error("fee too low: minimum {minimum}, got {got}")]
    FeeTooLow { minimum: i64, got: i64 },
    #[error("fee too high: maximum {maximum}, got {got}")]
    FeeTooHigh { maximum: i64, got: i64 },
    #[error("transaction too large: {size} bytes, maximum {maximum}")]
    TransactionTooLarge { size: usize, maximum: usize },
    #[error("duplicate transaction")]
    DuplicateTransaction,
    #[error("basic validation failed: {0}")]
    BasicValidationFailed(String),
    #[error("unsupported transaction version {0}")]
    UnsupportedVersion(u8),
    #[error("sender and recipient must differ")]
    SelfTransfer,
    #[error("cancelled")]
    Cancelled,
    #[error("{0}")]
    Other(String),
}

/// Errors from [`crate::block_validator::BlockValidator`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BlockValidationError {
    #[error("unsupported block version")]
    UnsupportedVersion,
    #[error("invalid height")]
    InvalidHeight,
    #[error("header is not signed")]
    HeaderNotSigned,
    #[error("invalid difficulty")]
    InvalidDifficulty,
    #[error("invalid timestamp")]
    InvalidTimestamp,
    #[error("invalid header signature")]
    InvalidHeaderSignature,
    #[error("invalid parent hash")]
    InvalidParentHash,
    #[error("invalid epoch")]
    InvalidEpoch,
    #[error("invalid challenge")]
    InvalidChallenge,
    #[error("invalid transaction: {0}")]
    InvalidTransaction(TransactionValidationError),
    #[error("invalid transaction signature")]
    InvalidTransactionSignature,
    #[error("invalid transaction merkle root")]
    InvalidTransactionRoot,
    #[error("invalid proof: {0}")]
    InvalidProof(ProofError),
    #[error("proof score too high")]
    ProofScoreTooHigh,
    #[error("cancelled")]
    Cancelled,
    #[error("{0}")]
    Other(String),
}

impl From<TransactionValidationError> for BlockValidationError {
    fn from(e: TransactionValidationError) -> Self {
        BlockValidationError::InvalidTransaction(e)
    }
}

impl From<ProofError> for BlockValidationError {
    fn from(e: ProofError) -> Self {
        match e {
            ProofError::ScoreAboveTarget => BlockValidationError::ProofScoreTooHigh,
            other => BlockValidationError::InvalidProof(other),
        }
    }
}

/// Errors from [`crate::state::StateManager`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("state transition failed: {0}")]
    StateTransitionFailed(String),
    #[error("invalid snapshot handle")]
    InvalidSnapshot,
    #[error("storage error: {0}")]
    Storage(String),
    #[error("cancelled")]
    Cancelled,
}

/// Errors from [`crate::mempool::Mempool`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MempoolError {
    #[error("fee too low: minimum {minimum}, got {got}")]
    FeeTooLow { minimum: i64, got: i64 },
    #[error("mempool full and fee does not exceed lowest fee in pool")]
    PoolFull,
    #[error("duplicate transaction")]
    DuplicateTransaction,
}

/// Errors from [`crate::reorg::ChainReorganizer`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReorgError {
    #[error("reorg depth {depth} exceeds configured maximum {max}")]
    ReorgTooDeep { depth: u64, max: u64 },
    #[error("fork point not reconcilable with local chain")]
    ForkNotFound,
    #[error("state error during reorg: {0}")]
    State(String),
    #[error("storage error during reorg: {0}")]
    Storage(String),
    #[error("cancelled")]
    Cancelled,
}

/// Errors from [`crate::block_builder::BlockBuilder`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("block failed self-validation: {0}")]
    BuildFailed(BlockValidationError),
    #[error("cancelled")]
    Cancelled,
}

/// Aggregate error used at API boundaries that can surface more than one
/// component's error kind. Mirrors the teacher's single `BlockchainError`
/// enum while keeping the finer-grained typed errors available beneath.
#[derive(Debug, Clone, Error)]
pub enum ConsensusError {
    #[error(transparent)]
    Argument(#[from] ArgumentError),
    #[error(transparent)]
    Proof(#[from] ProofError),
    #[error(transparent)]
    Transaction(#[from] TransactionValidationError),
    #[error(transparent)]
    Block(#[from] BlockValidationError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Mempool(#[from] MempoolError),
    #[error(transparent)]
    Reorg(#[from] ReorgError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ConsensusError {
    fn from(e: std::io::Error) -> Self {
        ConsensusError::Io(e.to_string())
    }
}

impl From<sled::Error> for ConsensusError {
    fn from(e: sled::Error) -> Self {
        ConsensusError::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConsensusError>;
