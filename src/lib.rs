pub mod account;
pub mod block;
pub mod block_builder;
pub mod block_validator;
pub mod cancellation;
pub mod challenge;
pub mod config;
pub mod difficulty;
pub mod epoch;
pub mod error;
pub mod events;
pub mod hashing;
pub mod mempool;
pub mod merkle;
pub mod primitives;
pub mod proof;
pub mod reorg;
pub mod signing;
pub mod state;
pub mod storage;
pub mod sync_lock;
pub mod transaction;

pub use account::{AccountState, WorldState};
pub use block::{Block, BlockBody, BlockHeader};
pub use block_builder::{BlockBuilder, ConsensusFields};
pub use block_validator::{BlockValidator, ExpectedChainState};
pub use cancellation::CancellationToken;
pub use config::{Config, DifficultyAdjustmentConfig};
pub use epoch::EpochManager;
pub use error::ConsensusError;
pub use events::{ChainReorgEvent, ChallengeAvailable, ChallengeProvider, EventBus};
pub use mempool::Mempool;
pub use primitives::{Amount, Difficulty, Epoch as EpochNumber, Hash32, Height, Nonce, PublicKey, Signature};
pub use proof::{BlockProof, PlotMetadata, ProofValidator};
pub use reorg::ChainReorganizer;
pub use signing::{BlockSigner, Secp256k1Keypair, Secp256k1Verifier, SignatureVerifier};
pub use state::StateManager;
pub use storage::{ChainStorage, MemChainStorage, SledChainStorage, WriteBatch};
pub use sync_lock::RwLock;
pub use transaction::{BlockValidationContext, Transaction, TransactionValidator};

pub type Result<T> = std::result::Result<T, ConsensusError>;
