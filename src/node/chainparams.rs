//! Network profiles: main, test and regtest
//!
//! Each profile owns its era list, genesis block and the node-facing
//! constants (magic bytes, port, seeds, address prefixes, checkpoints).
//! Profiles are built once and read-only afterwards; the one exception is
//! the regtest deployment override, applied to an owned profile before it
//! is shared.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use log::info;
use serde::Serialize;
use thiserror::Error;

use super::genesis::{build_genesis, GenesisError, GenesisInfo, GenesisParams};
use crate::consensus::{
    Block, ChainView, CompactTarget, ConsensusEras, Deployment, DeploymentPos, DifficultyError,
    EraError, Height, RetargetStrategy, RuleSet, U256, get_next_work_required,
};
use crate::constants::COIN;
use crate::crypto::Hash;

/// Message start shared by every network: "TRMP"
pub const MESSAGE_START: [u8; 4] = [0x54, 0x52, 0x4D, 0x50];

/// AuxPoW chain ID, carried in the top 16 version bits
pub const AUXPOW_CHAIN_ID: i32 = 0x00A8;

/// Merkle root of the shared genesis coinbase
pub const GENESIS_MERKLE_ROOT: &str =
    "a2435644e54e63726c142a69c36e031bbb45ddc569447d568e1af7373443bb05";

pub const MAIN_GENESIS_HASH: &str =
    "e81c430d51410470bcefcd8ecd4661bde27fb2ef14df54d48fb6c2cdaa0c1fde";
pub const TESTNET_GENESIS_HASH: &str =
    "9f57e1ca1fac63513eb17a6d758294c17c9c2c16169a99dc3dfcc62c552474f6";
pub const REGTEST_GENESIS_HASH: &str =
    "0adc5031c521d2163977f517a611a6292cb87d74fbd544f8fe2684a6bb1c2d28";

/// Network profile errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProfileError {
    #[error("unknown network '{0}' (expected main, test or regtest)")]
    UnknownNetwork(String),
    #[error("network {selected} already selected, cannot switch to {requested}")]
    AlreadySelected { selected: Network, requested: Network },
    #[error("deployment parameters can only be overridden on regtest, not {0}")]
    DeploymentOverrideNotAllowed(Network),
    #[error("invalid hash constant: {0}")]
    InvalidConstant(#[from] hex::FromHexError),
    #[error(transparent)]
    Era(#[from] EraError),
    #[error(transparent)]
    Genesis(#[from] GenesisError),
}

/// Network identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Main,
    #[serde(rename = "test")]
    Testnet,
    Regtest,
}

impl Network {
    pub const ALL: [Network; 3] = [Network::Main, Network::Testnet, Network::Regtest];

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Main => "main",
            Network::Testnet => "test",
            Network::Regtest => "regtest",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" => Ok(Network::Main),
            "test" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            other => Err(ProfileError::UnknownNetwork(other.to_string())),
        }
    }
}

/// Base58 version prefix kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Base58Type {
    PubkeyAddress,
    ScriptAddress,
    SecretKey,
    ExtPublicKey,
    ExtSecretKey,
}

impl Base58Type {
    fn index(self) -> usize {
        match self {
            Base58Type::PubkeyAddress => 0,
            Base58Type::ScriptAddress => 1,
            Base58Type::SecretKey => 2,
            Base58Type::ExtPublicKey => 3,
            Base58Type::ExtSecretKey => 4,
        }
    }
}

/// DNS seed entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DnsSeed {
    pub name: &'static str,
    pub host: &'static str,
}

/// Transaction-count estimate used for sync progress
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ChainTxData {
    pub time: i64,
    pub tx_count: u64,
    pub tx_rate: f64,
}

/// Everything one network needs: consensus eras plus node-facing constants
#[derive(Debug, Clone)]
pub struct NetworkProfile {
    network: Network,
    eras: ConsensusEras,
    genesis: Block,
    message_start: [u8; 4],
    default_port: u16,
    prune_after_height: u64,
    dns_seeds: Vec<DnsSeed>,
    base58_prefixes: [Vec<u8>; 5],
    checkpoints: BTreeMap<Height, Hash>,
    chain_tx_data: ChainTxData,
    mining_requires_peers: bool,
    default_consistency_checks: bool,
    require_standard: bool,
    mine_blocks_on_demand: bool,
}

impl NetworkProfile {
    pub fn for_network(network: Network) -> Result<Self, ProfileError> {
        match network {
            Network::Main => Self::main(),
            Network::Testnet => Self::testnet(),
            Network::Regtest => Self::regtest(),
        }
    }

    pub fn main() -> Result<Self, ProfileError> {
        let genesis_hash = Hash::from_hex(MAIN_GENESIS_HASH)?;

        let base = RuleSet {
            height_effective: 0,
            subsidy_halving_interval: 150_000,
            majority_enforce_block_upgrade: 1500,
            majority_reject_block_outdated: 1900,
            majority_window: 2000,
            bip34_height: 1000,
            bip34_hash: Hash::zero(),
            bip65_height: 1000,
            bip66_height: 1000,
            pow_limit: U256::MAX >> 20,
            pow_target_timespan: 60,
            pow_target_spacing: 60,
            coinbase_maturity: 100,
            rule_change_activation_threshold: 9576,
            miner_confirmation_window: 10080,
            deployments: [
                Deployment::new(28, 1199145601, 1230767999),
                Deployment::new(0, 1462060800, 1493596800),
                Deployment::new(1, 1479168000, 0),
            ],
            minimum_chain_work: U256::from(0x10001u64),
            default_assume_valid: genesis_hash,
            auxpow_chain_id: AUXPOW_CHAIN_ID,
            digishield_difficulty_calculation: true,
            pow_allow_min_difficulty_blocks: false,
            pow_allow_digishield_min_difficulty_blocks: false,
            pow_no_retargeting: false,
            strict_chain_id: true,
            allow_legacy_blocks: true,
            simplified_rewards: true,
            hash_genesis_block: Hash::zero(),
        };

        // Blocks 1000 - 59,999 are Digishield without AuxPoW
        let mut digishield = base.activate_at(1000);
        digishield.digishield_difficulty_calculation = true;
        digishield.pow_target_timespan = 60;
        digishield.coinbase_maturity = 240;

        // Blocks 60,000+ are AuxPoW
        let mut auxpow = digishield.activate_at(60_000);
        auxpow.allow_legacy_blocks = false;

        let eras = ConsensusEras::new(vec![base, digishield, auxpow])?;
        let genesis_params = GenesisParams {
            time: 1752628444,
            nonce: 516343,
            bits: CompactTarget(0x1e0ffff0),
            version: 1,
            reward: 50 * COIN,
        };

        Self::assemble(
            Network::Main,
            eras,
            &genesis_params,
            &genesis_hash,
            NodeConstants {
                default_port: 33884,
                prune_after_height: 200_000,
                dns_seeds: vec![DnsSeed {
                    name: "trumpow.meme",
                    host: "dnsseed.trumpow.meme",
                }],
                base58_prefixes: [
                    vec![65],
                    vec![28],
                    vec![151],
                    vec![0x02, 0xfa, 0xda, 0xfe],
                    vec![0x02, 0xfa, 0xc4, 0x95],
                ],
                chain_tx_data: ChainTxData::default(),
                mining_requires_peers: true,
                default_consistency_checks: false,
                require_standard: true,
                mine_blocks_on_demand: false,
            },
        )
    }

    pub fn testnet() -> Result<Self, ProfileError> {
        let genesis_hash = Hash::from_hex(TESTNET_GENESIS_HASH)?;

        let base = RuleSet {
            height_effective: 0,
            subsidy_halving_interval: 150_000,
            majority_enforce_block_upgrade: 501,
            majority_reject_block_outdated: 750,
            majority_window: 1000,
            bip34_height: 1000,
            bip34_hash: Hash::zero(),
            bip65_height: 1000,
            bip66_height: 1000,
            pow_limit: U256::MAX >> 20,
            pow_target_timespan: 60,
            pow_target_spacing: 60,
            coinbase_maturity: 30,
            rule_change_activation_threshold: 2880,
            miner_confirmation_window: 10080,
            deployments: [
                Deployment::new(28, 1199145601, 1230767999),
                Deployment::new(0, 1456790400, 1493596800),
                Deployment::new(1, 1462060800, 0),
            ],
            minimum_chain_work: U256::from(0x10001u64),
            default_assume_valid: genesis_hash,
            auxpow_chain_id: AUXPOW_CHAIN_ID,
            digishield_difficulty_calculation: true,
            pow_allow_min_difficulty_blocks: true,
            pow_allow_digishield_min_difficulty_blocks: false,
            pow_no_retargeting: false,
            strict_chain_id: false,
            allow_legacy_blocks: true,
            simplified_rewards: true,
            hash_genesis_block: Hash::zero(),
        };

        // Blocks 1000 - 1249 are Digishield without minimum difficulty
        let mut digishield = base.activate_at(1000);
        digishield.pow_target_timespan = 60;
        digishield.digishield_difficulty_calculation = true;
        digishield.pow_allow_min_difficulty_blocks = false;
        digishield.coinbase_maturity = 240;

        // Blocks 1250 - 59,999 allow minimum difficulty on every block
        let mut min_difficulty = digishield.activate_at(1250);
        min_difficulty.pow_allow_digishield_min_difficulty_blocks = true;
        min_difficulty.pow_allow_min_difficulty_blocks = true;

        let mut auxpow = min_difficulty.activate_at(60_000);
        auxpow.allow_legacy_blocks = false;

        let eras = ConsensusEras::new(vec![base, digishield, min_difficulty, auxpow])?;
        let genesis_params = GenesisParams {
            time: 1752628605,
            nonce: 1383086,
            bits: CompactTarget(0x1e0ffff0),
            version: 1,
            reward: 50 * COIN,
        };

        Self::assemble(
            Network::Testnet,
            eras,
            &genesis_params,
            &genesis_hash,
            NodeConstants {
                default_port: 44884,
                prune_after_height: 1000,
                dns_seeds: Vec::new(),
                base58_prefixes: [
                    vec![113],
                    vec![196],
                    vec![241],
                    vec![0x04, 0x35, 0x87, 0xcf],
                    vec![0x04, 0x35, 0x83, 0x94],
                ],
                chain_tx_data: ChainTxData::default(),
                mining_requires_peers: true,
                default_consistency_checks: false,
                require_standard: false,
                mine_blocks_on_demand: false,
            },
        )
    }

    pub fn regtest() -> Result<Self, ProfileError> {
        let genesis_hash = Hash::from_hex(REGTEST_GENESIS_HASH)?;
        let always = Deployment::new(0, 0, 999_999_999_999);

        let base = RuleSet {
            height_effective: 0,
            subsidy_halving_interval: 150,
            majority_enforce_block_upgrade: 750,
            majority_reject_block_outdated: 950,
            majority_window: 1000,
            // Far in the future so version 1 blocks are accepted
            bip34_height: 100_000_000,
            bip34_hash: Hash::zero(),
            bip65_height: 1351,
            bip66_height: 1251,
            pow_limit: U256::MAX >> 1,
            pow_target_timespan: 4 * 60 * 60,
            pow_target_spacing: 1,
            coinbase_maturity: 60,
            rule_change_activation_threshold: 540,
            miner_confirmation_window: 720,
            deployments: [
                Deployment { bit: 28, ..always },
                Deployment { bit: 0, ..always },
                Deployment { bit: 1, ..always },
            ],
            minimum_chain_work: U256::zero(),
            default_assume_valid: Hash::zero(),
            auxpow_chain_id: AUXPOW_CHAIN_ID,
            digishield_difficulty_calculation: false,
            pow_allow_min_difficulty_blocks: true,
            pow_allow_digishield_min_difficulty_blocks: false,
            pow_no_retargeting: true,
            strict_chain_id: true,
            allow_legacy_blocks: true,
            simplified_rewards: true,
            hash_genesis_block: Hash::zero(),
        };

        let mut digishield = base.activate_at(10);
        digishield.pow_target_timespan = 1;
        digishield.digishield_difficulty_calculation = true;

        let mut auxpow = digishield.activate_at(20);
        auxpow.allow_legacy_blocks = false;

        let eras = ConsensusEras::new(vec![base, digishield, auxpow])?;
        let genesis_params = GenesisParams {
            time: 1752629103,
            nonce: 3,
            bits: CompactTarget(0x207fffff),
            version: 1,
            reward: 50 * COIN,
        };

        Self::assemble(
            Network::Regtest,
            eras,
            &genesis_params,
            &genesis_hash,
            NodeConstants {
                default_port: 16329,
                prune_after_height: 1000,
                dns_seeds: Vec::new(),
                base58_prefixes: [
                    vec![111],
                    vec![196],
                    vec![239],
                    vec![0x04, 0x35, 0x87, 0xcf],
                    vec![0x04, 0x35, 0x83, 0x94],
                ],
                chain_tx_data: ChainTxData::default(),
                mining_requires_peers: false,
                default_consistency_checks: true,
                require_standard: false,
                mine_blocks_on_demand: true,
            },
        )
    }

    /// Build and verify the genesis block, link its hash into every era and
    /// seed the checkpoint map
    fn assemble(
        network: Network,
        mut eras: ConsensusEras,
        genesis_params: &GenesisParams,
        expected_hash: &Hash,
        node: NodeConstants,
    ) -> Result<Self, ProfileError> {
        let merkle_root = Hash::from_hex(GENESIS_MERKLE_ROOT)?;
        // Mainnet genesis is only ever asserted, never searched for
        let allow_mining = network != Network::Main;
        let genesis = build_genesis(genesis_params, allow_mining, expected_hash, &merkle_root)?;

        let genesis_hash = genesis.hash();
        eras.set_genesis_hash(genesis_hash);

        let mut checkpoints = BTreeMap::new();
        checkpoints.insert(0, genesis_hash);

        info!(
            "built {} profile: {} eras at heights {:?}, genesis {}",
            network,
            eras.len(),
            eras.activation_heights(),
            genesis_hash
        );

        Ok(Self {
            network,
            eras,
            genesis,
            message_start: MESSAGE_START,
            default_port: node.default_port,
            prune_after_height: node.prune_after_height,
            dns_seeds: node.dns_seeds,
            base58_prefixes: node.base58_prefixes,
            checkpoints,
            chain_tx_data: node.chain_tx_data,
            mining_requires_peers: node.mining_requires_peers,
            default_consistency_checks: node.default_consistency_checks,
            require_standard: node.require_standard,
            mine_blocks_on_demand: node.mine_blocks_on_demand,
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Rule set in force at `height`
    pub fn consensus(&self, height: Height) -> &RuleSet {
        self.eras.resolve(height)
    }

    pub fn eras(&self) -> &ConsensusEras {
        &self.eras
    }

    /// Compact bits required for the block after the tip of `chain`
    pub fn next_work_required<C>(
        &self,
        chain: &C,
        block_time: i64,
    ) -> Result<CompactTarget, DifficultyError>
    where
        C: ChainView + ?Sized,
    {
        get_next_work_required(chain, block_time, &self.eras)
    }

    pub fn genesis(&self) -> &Block {
        &self.genesis
    }

    pub fn genesis_info(&self) -> GenesisInfo {
        GenesisInfo::new(&self.genesis)
    }

    pub fn checkpoints(&self) -> &BTreeMap<Height, Hash> {
        &self.checkpoints
    }

    /// False only when a checkpoint exists at `height` and names another block
    pub fn check_checkpoint(&self, height: Height, hash: &Hash) -> bool {
        self.checkpoints
            .get(&height)
            .map_or(true, |expected| expected == hash)
    }

    /// Whether a chain with `work` clears the minimum-chain-work floor
    pub fn has_minimum_chain_work(&self, work: &U256) -> bool {
        *work >= self.eras.base().minimum_chain_work
    }

    pub fn minimum_chain_work(&self) -> &U256 {
        &self.eras.base().minimum_chain_work
    }

    pub fn default_assume_valid(&self) -> &Hash {
        &self.eras.base().default_assume_valid
    }

    pub fn base58_prefix(&self, kind: Base58Type) -> &[u8] {
        &self.base58_prefixes[kind.index()]
    }

    pub fn dns_seeds(&self) -> &[DnsSeed] {
        &self.dns_seeds
    }

    pub fn message_start(&self) -> &[u8; 4] {
        &self.message_start
    }

    pub fn default_port(&self) -> u16 {
        self.default_port
    }

    pub fn prune_after_height(&self) -> u64 {
        self.prune_after_height
    }

    pub fn chain_tx_data(&self) -> &ChainTxData {
        &self.chain_tx_data
    }

    pub fn mining_requires_peers(&self) -> bool {
        self.mining_requires_peers
    }

    pub fn default_consistency_checks(&self) -> bool {
        self.default_consistency_checks
    }

    pub fn require_standard(&self) -> bool {
        self.require_standard
    }

    pub fn mine_blocks_on_demand(&self) -> bool {
        self.mine_blocks_on_demand
    }

    /// Move a version-bits deployment window (regtest only, every era)
    pub fn update_deployment(
        &mut self,
        pos: DeploymentPos,
        start_time: i64,
        timeout: i64,
    ) -> Result<(), ProfileError> {
        if self.network != Network::Regtest {
            return Err(ProfileError::DeploymentOverrideNotAllowed(self.network));
        }
        self.eras.update_deployment(pos, start_time, timeout);
        Ok(())
    }

    /// Serializable view of the profile at `height`
    pub fn summary(&self, height: Height) -> ProfileSummary<'_> {
        let era = self.eras.era_at(height);
        ProfileSummary {
            network: self.network,
            height,
            strategy: era.strategy,
            rules: &era.rules,
            activation_heights: self.eras.activation_heights(),
            genesis: self.genesis_info(),
            message_start: hex::encode(self.message_start),
            default_port: self.default_port,
            prune_after_height: self.prune_after_height,
            dns_seeds: &self.dns_seeds,
            checkpoints: &self.checkpoints,
        }
    }
}

/// Node-facing constants passed to `assemble`
struct NodeConstants {
    default_port: u16,
    prune_after_height: u64,
    dns_seeds: Vec<DnsSeed>,
    base58_prefixes: [Vec<u8>; 5],
    chain_tx_data: ChainTxData,
    mining_requires_peers: bool,
    default_consistency_checks: bool,
    require_standard: bool,
    mine_blocks_on_demand: bool,
}

/// Profile view for display and JSON output
#[derive(Debug, Serialize)]
pub struct ProfileSummary<'a> {
    pub network: Network,
    pub height: Height,
    pub strategy: RetargetStrategy,
    pub rules: &'a RuleSet,
    pub activation_heights: Vec<Height>,
    pub genesis: GenesisInfo,
    pub message_start: String,
    pub default_port: u16,
    pub prune_after_height: u64,
    pub dns_seeds: &'a [DnsSeed],
    pub checkpoints: &'a BTreeMap<Height, Hash>,
}
