//! Node configuration: one struct per consensus component plus the
//! storage/network-id ambient settings, each with `Default` plus
//! `production()`/`development()`/`testnet()` presets and an
//! `apply_env_overrides` pass, mirroring the teacher's
//! `Config`/`NetworkConfig`/`MiningConfig`/... layout in shape (one
//! struct per subsystem, `NUMI_*`-style env vars, TOML load/save,
//! per-struct `validate()`) with the mining/RPC/P2P-specific structs
//! replaced by the consensus-specific ones spec's config section names.

use std::path::PathBuf;
use serde::{Deserialize, Serialize};

/// Top-level node configuration bundling every component config.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub network_id: NetworkIdConfig,
    pub mempool: MempoolConfig,
    pub transaction_validation: TransactionValidationConfig,
    pub difficulty_adjustment: DifficultyAdjustmentConfig,
    pub epoch: EpochConfig,
    pub reorg: ReorgConfig,
    pub storage: StorageConfig,
}

impl Config {
    pub fn production() -> Self {
        Self {
            network_id: NetworkIdConfig::production(),
            mempool: MempoolConfig::production(),
            transaction_validation: TransactionValidationConfig::production(),
            difficulty_adjustment: DifficultyAdjustmentConfig::production(),
            epoch: EpochConfig::production(),
            reorg: ReorgConfig::production(),
            storage: StorageConfig::production(),
        }
    }

    pub fn development() -> Self {
        Self {
            network_id: NetworkIdConfig::development(),
            mempool: MempoolConfig::development(),
            transaction_validation: TransactionValidationConfig::development(),
            difficulty_adjustment: DifficultyAdjustmentConfig::development(),
            epoch: EpochConfig::development(),
            reorg: ReorgConfig::development(),
            storage: StorageConfig::development(),
        }
    }

    pub fn testnet() -> Self {
        Self {
            network_id: NetworkIdConfig::testnet(),
            mempool: MempoolConfig::testnet(),
            transaction_validation: TransactionValidationConfig::testnet(),
            difficulty_adjustment: DifficultyAdjustmentConfig::testnet(),
            epoch: EpochConfig::testnet(),
            reorg: ReorgConfig::testnet(),
            storage: StorageConfig::testnet(),
        }
    }

    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let config_str = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&config_str)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("SPACETIME_NETWORK_ID") {
            self.network_id.network_id = id;
        }
        if let Ok(dir) = std::env::var("SPACETIME_DATA_DIR") {
            self.storage.data_directory = PathBuf::from(dir);
        }
        if let Ok(fee) = std::env::var("SPACETIME_MIN_FEE") {
            if let Ok(v) = fee.parse::<i64>() {
                self.transaction_validation.min_fee = v;
                self.mempool.min_fee = v;
            }
        }
        if let Ok(depth) = std::env::var("SPACETIME_MAX_REORG_DEPTH") {
            if let Ok(v) = depth.parse::<i64>() {
                self.reorg.max_reorg_depth = v;
            }
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.network_id.validate()?;
        self.mempool.validate()?;
        self.transaction_validation.validate()?;
        self.difficulty_adjustment.validate()?;
        self.epoch.validate()?;
        self.reorg.validate()?;
        self.storage.validate()?;
        Ok(())
    }
}

/// Network identity and genesis parameters (spec §4.1, §8 scenario 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkIdConfig {
    pub network_id: String,
    pub genesis_timestamp: i64,
    pub initial_difficulty: i64,
}

impl Default for NetworkIdConfig {
    fn default() -> Self {
        Self {
            network_id: "spacetime-devnet-v1".to_string(),
            genesis_timestamp: 0,
            initial_difficulty: 1000,
        }
    }
}

impl NetworkIdConfig {
    pub fn production() -> Self {
        Self {
            network_id: "spacetime-mainnet-v1".to_string(),
            genesis_timestamp: 1_700_000_000,
            initial_difficulty: 1_000_000,
        }
    }
    pub fn development() -> Self {
        Self {
            network_id: "spacetime-devnet-v1".to_string(),
            genesis_timestamp: 0,
            initial_difficulty: 100,
        }
    }
    pub fn testnet() -> Self {
        Self {
            network_id: "spacetime-testnet-v1".to_string(),
            genesis_timestamp: 1_700_000_000,
            initial_difficulty: 10_000,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.network_id.is_empty() {
            return Err("network_id must not be empty".to_string());
        }
        if self.initial_difficulty <= 0 {
            return Err("initial_difficulty must be positive".to_string());
        }
        Ok(())
    }
}

/// Mempool admission policy (spec §4.4, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MempoolConfig {
    pub max_transactions: usize,
    pub max_transactions_per_block: usize,
    pub min_fee: i64,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            max_transactions: 10_000,
            max_transactions_per_block: 2_000,
            min_fee: 1,
        }
    }
}

impl MempoolConfig {
    pub fn production() -> Self {
        Self { max_transactions: 50_000, max_transactions_per_block: 5_000, min_fee: 10 }
    }
    pub fn development() -> Self {
        Self { max_transactions: 1_000, max_transactions_per_block: 200, min_fee: 0 }
    }
    pub fn testnet() -> Self {
        Self { max_transactions: 5_000, max_transactions_per_block: 1_000, min_fee: 1 }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_transactions == 0 {
            return Err("mempool max_transactions must be greater than 0".to_string());
        }
        if self.max_transactions_per_block == 0 {
            return Err("mempool max_transactions_per_block must be greater than 0".to_string());
        }
        if self.min_fee < 0 {
            return Err("mempool min_fee cannot be negative".to_string());
        }
        Ok(())
    }
}

/// Per-transaction validation bounds (spec §4.5, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionValidationConfig {
    pub min_fee: i64,
    pub max_fee: i64,
    pub max_transactions_per_block: usize,
    pub check_duplicate_transactions: bool,
    pub max_transaction_size: usize,
    pub supported_version: u8,
}

impl Default for TransactionValidationConfig {
    fn default() -> Self {
        Self {
            min_fee: 1,
            max_fee: 1_000_000_000,
            max_transactions_per_block: 2_000,
            check_duplicate_transactions: true,
            max_transaction_size: 4096,
            supported_version: 1,
        }
    }
}

impl TransactionValidationConfig {
    pub fn production() -> Self {
        Self { min_fee: 10, ..Default::default() }
    }
    pub fn development() -> Self {
        Self { min_fee: 0, check_duplicate_transactions: false, ..Default::default() }
    }
    pub fn testnet() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.min_fee < 0 {
            return Err("min_fee cannot be negative".to_string());
        }
        if self.max_fee < self.min_fee {
            return Err("max_fee must be >= min_fee".to_string());
        }
        if self.max_transaction_size == 0 {
            return Err("max_transaction_size must be greater than 0".to_string());
        }
        if self.max_transactions_per_block == 0 {
            return Err("max_transactions_per_block must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Difficulty retarget parameters (spec §4.2).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DifficultyAdjustmentConfig {
    pub target_block_time_s: i64,
    pub adjustment_interval_blocks: i64,
    pub dampening_factor: i64,
    pub min_difficulty: i64,
    pub max_difficulty: i64,
}

impl Default for DifficultyAdjustmentConfig {
    fn default() -> Self {
        Self {
            target_block_time_s: 10,
            adjustment_interval_blocks: 100,
            dampening_factor: 4,
            min_difficulty: 1,
            max_difficulty: i64::MAX,
        }
    }
}

impl DifficultyAdjustmentConfig {
    pub fn production() -> Self {
        Self::default()
    }
    pub fn development() -> Self {
        Self { target_block_time_s: 5, adjustment_interval_blocks: 10, ..Default::default() }
    }
    pub fn testnet() -> Self {
        Self { target_block_time_s: 10, adjustment_interval_blocks: 50, ..Default::default() }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.target_block_time_s <= 0 {
            return Err("target_block_time_s must be positive".to_string());
        }
        if self.adjustment_interval_blocks <= 0 {
            return Err("adjustment_interval_blocks must be positive".to_string());
        }
        if self.dampening_factor <= 0 {
            return Err("dampening_factor must be positive".to_string());
        }
        if self.min_difficulty <= 0 || self.max_difficulty < self.min_difficulty {
            return Err("difficulty bounds invalid".to_string());
        }
        Ok(())
    }
}

/// Epoch/challenge rotation cadence (spec §4.1/§6: `epoch_duration_s ∈
/// [1, 3600]`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EpochConfig {
    pub epoch_duration_s: i64,
}

impl Default for EpochConfig {
    fn default() -> Self {
        Self { epoch_duration_s: 120 }
    }
}

impl EpochConfig {
    pub fn production() -> Self {
        Self::default()
    }
    pub fn development() -> Self {
        Self { epoch_duration_s: 10 }
    }
    pub fn testnet() -> Self {
        Self { epoch_duration_s: 30 }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(1..=3600).contains(&self.epoch_duration_s) {
            return Err("epoch_duration_s must be in [1, 3600]".to_string());
        }
        Ok(())
    }
}

/// Chain reorganization bounds (spec §4.8).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReorgConfig {
    pub max_reorg_depth: i64,
}

impl Default for ReorgConfig {
    fn default() -> Self {
        Self { max_reorg_depth: 100 }
    }
}

impl ReorgConfig {
    pub fn production() -> Self {
        Self::default()
    }
    pub fn development() -> Self {
        Self { max_reorg_depth: 20 }
    }
    pub fn testnet() -> Self {
        Self { max_reorg_depth: 50 }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_reorg_depth <= 0 {
            return Err("max_reorg_depth must be positive".to_string());
        }
        Ok(())
    }
}

/// On-disk storage location and sled cache sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub cache_size_mb: u64,
    pub checkpoint_interval: i64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_directory: PathBuf::from("./data"),
            cache_size_mb: 512,
            checkpoint_interval: 1000,
        }
    }
}

impl StorageConfig {
    pub fn production() -> Self {
        Self {
            data_directory: PathBuf::from("/var/lib/spacetime"),
            cache_size_mb: 2048,
            checkpoint_interval: 1000,
        }
    }
    pub fn development() -> Self {
        Self {
            data_directory: PathBuf::from("./dev-data"),
            cache_size_mb: 128,
            checkpoint_interval: 50,
        }
    }
    pub fn testnet() -> Self {
        Self {
            data_directory: PathBuf::from("./testnet-data"),
            cache_size_mb: 256,
            checkpoint_interval: 100,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.cache_size_mb == 0 {
            return Err("cache_size_mb must be greater than 0".to_string());
        }
        if self.checkpoint_interval <= 0 {
            return Err("checkpoint_interval must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_validates() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn production_config_validates() {
        assert!(Config::production().validate().is_ok());
    }

    #[test]
    fn development_config_validates() {
        assert!(Config::development().validate().is_ok());
    }

    #[test]
    fn testnet_config_validates() {
        assert!(Config::testnet().validate().is_ok());
    }

    #[test]
    fn invalid_difficulty_bounds_rejected() {
        let mut config = Config::default();
        config.difficulty_adjustment.min_difficulty = 100;
        config.difficulty_adjustment.max_difficulty = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = Config::development();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.network_id.network_id, deserialized.network_id.network_id);
        assert_eq!(config.mempool.max_transactions, deserialized.mempool.max_transactions);
    }

    #[test]
    fn config_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = Config::development();
        config.save_to_file(&path).unwrap();
        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(config.storage.cache_size_mb, loaded.storage.cache_size_mb);
    }

    #[test]
    fn env_override_applies_min_fee() {
        std::env::set_var("SPACETIME_MIN_FEE", "42");
        let mut config = Config::default();
        config.apply_env_overrides();
        std::env::remove_var("SPACETIME_MIN_FEE");
        assert_eq!(config.transaction_validation.min_fee, 42);
        assert_eq!(config.mempool.min_fee, 42);
    }
}
