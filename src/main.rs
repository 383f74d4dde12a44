use std::path::PathBuf;

use clap::{Parser, Subcommand};

use spacetime_consensus::{
    Block, BlockBuilder, BlockValidator, CancellationToken, Config, ConsensusFields,
    ConsensusError, EventBus, ExpectedChainState, Mempool, Secp256k1Keypair, Secp256k1Verifier,
    SledChainStorage, StateManager, Transaction, TransactionValidator, WriteBatch,
};
use spacetime_consensus::challenge;
use spacetime_consensus::storage::{AccountStorage, BlockStorage, ChainStorage, MetadataStorage};
use spacetime_consensus::primitives::{Hash32, PublicKey};
use spacetime_consensus::proof::{BlockProof, PlotMetadata};

#[derive(Parser)]
#[command(name = "spacetime-node")]
#[command(about = "Proof-of-space-time consensus core - node utility")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    #[arg(long, default_value = "development")]
    profile: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new chain: create storage, generate a node key, commit the genesis block.
    Init,

    /// Print chain height, tip hash, and cumulative difficulty.
    Status,

    /// Validate a block read from a file against the current chain tip.
    ValidateBlock {
        #[arg(long)]
        block_file: PathBuf,
    },

    /// Build, sign, and validate a transfer transaction; prints its hash and wire encoding.
    SubmitTx {
        #[arg(long)]
        key_file: PathBuf,

        #[arg(long)]
        to: String,

        #[arg(long)]
        amount: i64,

        #[arg(long)]
        fee: i64,
    },
}

fn load_config(profile: &str, data_dir: &PathBuf) -> Config {
    let mut config = match profile {
        "production" => Config::production(),
        "testnet" => Config::testnet(),
        _ => Config::development(),
    };
    config.storage.data_directory = data_dir.clone();
    config
}

fn open_storage(data_dir: &PathBuf) -> Result<SledChainStorage, ConsensusError> {
    SledChainStorage::open(data_dir).map_err(ConsensusError::from)
}

fn node_key_path(data_dir: &PathBuf) -> PathBuf {
    data_dir.join("node_key.json")
}

fn main() -> Result<(), ConsensusError> {
    env_logger::init();
    let cli = Cli::parse();
    let config = load_config(&cli.profile, &cli.data_dir);
    config.validate().map_err(ConsensusError::Storage)?;

    match cli.command {
        Commands::Init => init_chain(&cli.data_dir, &config),
        Commands::Status => show_status(&cli.data_dir, &config),
        Commands::ValidateBlock { block_file } => validate_block(&cli.data_dir, &config, &block_file),
        Commands::SubmitTx { key_file, to, amount, fee } => submit_tx(&cli.data_dir, &config, &key_file, &to, amount, fee),
    }
}

fn init_chain(data_dir: &PathBuf, config: &Config) -> Result<(), ConsensusError> {
    std::fs::create_dir_all(data_dir)?;
    let storage = open_storage(data_dir)?;

    if storage.get_best_block_hash().map_err(|e| ConsensusError::Storage(e.to_string()))?.is_some() {
        println!("chain already initialized at {:?}", data_dir);
        return Ok(());
    }

    let signer = Secp256k1Keypair::load_or_generate(node_key_path(data_dir))
        .map_err(|e| ConsensusError::Storage(e.to_string()))?;
    let verifier = Secp256k1Verifier;
    let mempool = Mempool::new(config.mempool.clone());
    let events = EventBus::new();
    let _ = &events;

    let genesis_challenge = challenge::derive_genesis_challenge(&config.network_id.network_id).map_err(ConsensusError::from)?;
    let plot_root = Hash32::ZERO;
    let proof_score = spacetime_consensus::hashing::sha256(
        &[genesis_challenge.as_bytes().as_slice(), plot_root.as_bytes().as_slice()].concat(),
    );
    let proof = BlockProof {
        challenge: genesis_challenge,
        leaf_value: Hash32::ZERO,
        leaf_index: 0,
        merkle_path: Vec::new(),
        orientation_bits: Vec::new(),
        plot_metadata: PlotMetadata { leaf_count: 1, plot_id: Hash32::ZERO, plot_header_hash: Hash32::ZERO, version: 1 },
    };

    // The bootstrap proof above has no backing plot, so its score is a
    // fixed SHA-256 value rather than something found by a plotting
    // search. A difficulty above 1 would make check_proof's target
    // comparison fail almost certainly, so genesis always bootstraps at
    // the minimum difficulty; real retargeting takes over from there.
    let genesis_difficulty = 1;

    let fields = ConsensusFields {
        parent_hash: Hash32::ZERO,
        height: 0,
        difficulty: genesis_difficulty,
        epoch: 0,
        challenge: genesis_challenge,
        plot_root,
        proof_score,
        is_genesis: true,
    };

    let builder = BlockBuilder::new(&mempool, &config.transaction_validation, &verifier, config.mempool.max_transactions_per_block);
    let genesis = builder
        .build(fields, proof, &signer, config.network_id.genesis_timestamp, &CancellationToken::never())
        .map_err(ConsensusError::from)?;
    let genesis_hash = genesis.hash();

    let mut batch = WriteBatch::new();
    batch
        .put_block(genesis)
        .set_best_block_hash(genesis_hash)
        .set_chain_height(0)
        .set_cumulative_difficulty(genesis_hash, genesis_difficulty);
    storage.commit(batch).map_err(|e| ConsensusError::Storage(e.to_string()))?;

    println!("chain initialized at {:?}", data_dir);
    println!("network: {}", config.network_id.network_id);
    println!("genesis hash: {}", genesis_hash);
    println!("node public key: {}", signer.public_key().to_hex());
    println!("node address: {}", signer.public_key().display_address());
    Ok(())
}

fn show_status(data_dir: &PathBuf, config: &Config) -> Result<(), ConsensusError> {
    let storage = open_storage(data_dir)?;
    let height = storage.get_chain_height().map_err(|e| ConsensusError::Storage(e.to_string()))?;
    let tip = storage.get_best_block_hash().map_err(|e| ConsensusError::Storage(e.to_string()))?;

    println!("chain height: {}", height);
    match tip {
        Some(hash) => {
            println!("tip hash: {}", hash);
            let cumulative = storage
                .get_cumulative_difficulty(hash)
                .map_err(|e| ConsensusError::Storage(e.to_string()))?;
            println!("cumulative difficulty: {}", cumulative.unwrap_or(0));
            if let Some(block) = storage.get_block_by_hash(hash).map_err(|e| ConsensusError::Storage(e.to_string()))? {
                println!("tip transactions: {}", block.body.transactions.len());
                println!("tip epoch: {}", block.header.epoch);
            }
        }
        None => println!("tip hash: none (uninitialized)"),
    }
    let verifier = Secp256k1Verifier;
    let state = StateManager::new(&config.transaction_validation, &verifier, &storage);
    state.check_consistency().map_err(|e| ConsensusError::Storage(e.to_string()))?;
    println!("integrity check passed");
    Ok(())
}

fn validate_block(data_dir: &PathBuf, config: &Config, block_file: &PathBuf) -> Result<(), ConsensusError> {
    let storage = open_storage(data_dir)?;
    let bytes = std::fs::read(block_file)?;
    let block = Block::decode(&bytes).map_err(ConsensusError::from)?;

    let tip_hash = storage
        .get_best_block_hash()
        .map_err(|e| ConsensusError::Storage(e.to_string()))?
        .unwrap_or(Hash32::ZERO);
    let tip = if tip_hash.is_zero() {
        None
    } else {
        storage.get_block_by_hash(tip_hash).map_err(|e| ConsensusError::Storage(e.to_string()))?
    };

    let expected = match &tip {
        Some(tip_block) => ExpectedChainState {
            parent_hash: tip_hash,
            height: tip_block.header.height + 1,
            difficulty: block.header.difficulty,
            epoch: block.header.epoch,
            challenge: block.header.challenge,
            plot_root: block.header.plot_root,
            is_genesis: false,
        },
        None => ExpectedChainState {
            parent_hash: Hash32::ZERO,
            height: 0,
            difficulty: block.header.difficulty,
            epoch: block.header.epoch,
            challenge: block.header.challenge,
            plot_root: block.header.plot_root,
            is_genesis: true,
        },
    };

    let verifier = Secp256k1Verifier;
    let validator = BlockValidator::new(&config.transaction_validation, &verifier);
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_secs() as i64;

    match validator.validate(&block, &expected, now, &CancellationToken::never()) {
        Ok(()) => {
            println!("block {} is valid", block.hash());
            Ok(())
        }
        Err(e) => {
            println!("block {} is invalid: {}", block.hash(), e);
            Err(ConsensusError::from(e))
        }
    }
}

fn submit_tx(data_dir: &PathBuf, config: &Config, key_file: &PathBuf, to: &str, amount: i64, fee: i64) -> Result<(), ConsensusError> {
    let storage = open_storage(data_dir)?;
    let sender = Secp256k1Keypair::load_or_generate(key_file).map_err(|e| ConsensusError::Storage(e.to_string()))?;
    let recipient_bytes = hex::decode(to).map_err(|e| ConsensusError::Storage(format!("invalid recipient hex: {e}")))?;
    let recipient = PublicKey::from_bytes(&recipient_bytes).map_err(ConsensusError::from)?;

    let sender_pubkey = sender.public_key();
    let account = storage
        .get_account(&sender_pubkey)
        .map_err(|e| ConsensusError::Storage(e.to_string()))?
        .unwrap_or_default();

    let mut tx = Transaction::new_unsigned(
        config.transaction_validation.supported_version,
        sender_pubkey,
        recipient,
        amount,
        account.nonce,
        fee,
    );
    tx.sign(&sender);

    let verifier = Secp256k1Verifier;
    let tx_validator = TransactionValidator::new(&config.transaction_validation, &verifier);
    tx_validator
        .validate_standalone(&tx, account.balance, account.nonce, false, &CancellationToken::never())
        .map_err(ConsensusError::from)?;

    println!("transaction hash: {}", tx.hash());
    println!("from: {} ({})", sender_pubkey.to_hex(), sender_pubkey.display_address());
    println!("to: {} ({})", recipient.to_hex(), recipient.display_address());
    println!("amount: {}", amount);
    println!("fee: {}", fee);
    println!("nonce: {}", tx.nonce);
    println!("wire: {}", hex::encode(tx.encode()));
    Ok(())
}
