//! Consensus rule sets and their activation eras
//!
//! Each network is described by a short, hand-written list of rule sets,
//! one per hard-fork era, ordered by the height at which they take effect.
//! Resolution picks the era with the greatest activation height not above
//! the queried height, so every height maps to exactly one rule set.

use serde::Serialize;
use thiserror::Error;

use super::target::{serialize_u256_hex, CompactTarget, U256};
use crate::crypto::Hash;

/// Zero-based block height
pub type Height = u32;

/// Version-bits soft-fork deployments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DeploymentPos {
    TestDummy,
    /// BIP68, BIP112 and BIP113
    Csv,
    /// BIP141, BIP143 and BIP147
    Segwit,
}

impl DeploymentPos {
    pub const ALL: [DeploymentPos; 3] = [
        DeploymentPos::TestDummy,
        DeploymentPos::Csv,
        DeploymentPos::Segwit,
    ];

    fn index(self) -> usize {
        match self {
            DeploymentPos::TestDummy => 0,
            DeploymentPos::Csv => 1,
            DeploymentPos::Segwit => 2,
        }
    }
}

/// Version-bits deployment window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Deployment {
    /// Bit position in the block version
    pub bit: u8,
    /// Median time past at which signalling may start
    pub start_time: i64,
    /// Median time past after which the deployment fails; 0 disables it
    pub timeout: i64,
}

impl Deployment {
    pub const fn new(bit: u8, start_time: i64, timeout: i64) -> Self {
        Self {
            bit,
            start_time,
            timeout,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.timeout == 0
    }
}

/// How the next block's target is derived within an era
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RetargetStrategy {
    /// Every block inherits the previous block's bits
    NoRetargeting,
    /// Fixed-window retarget every `timespan / spacing` blocks
    Fixed,
    /// Dampened per-block retarget
    Digishield,
    /// Digishield, plus the PoW limit for blocks more than two spacings late
    PerBlockMinDifficulty,
}

impl RetargetStrategy {
    /// Pick the strategy implied by a rule set's difficulty flags.
    ///
    /// Under Digishield either min-difficulty flag enables the late-block
    /// limit.
    pub fn from_rules(rules: &RuleSet) -> Self {
        if rules.pow_no_retargeting {
            RetargetStrategy::NoRetargeting
        } else if rules.digishield_difficulty_calculation {
            if rules.pow_allow_min_difficulty_blocks
                || rules.pow_allow_digishield_min_difficulty_blocks
            {
                RetargetStrategy::PerBlockMinDifficulty
            } else {
                RetargetStrategy::Digishield
            }
        } else {
            RetargetStrategy::Fixed
        }
    }
}

/// Consensus constants for one era of one network
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleSet {
    /// First height at which these rules apply
    pub height_effective: Height,
    pub subsidy_halving_interval: u32,
    pub majority_enforce_block_upgrade: u32,
    pub majority_reject_block_outdated: u32,
    pub majority_window: u32,
    pub bip34_height: Height,
    pub bip34_hash: Hash,
    pub bip65_height: Height,
    pub bip66_height: Height,
    /// Easiest permitted target
    #[serde(serialize_with = "serialize_u256_hex")]
    pub pow_limit: U256,
    /// Seconds
    pub pow_target_timespan: i64,
    /// Seconds
    pub pow_target_spacing: i64,
    pub coinbase_maturity: u32,
    pub rule_change_activation_threshold: u32,
    pub miner_confirmation_window: u32,
    pub deployments: [Deployment; 3],
    #[serde(serialize_with = "serialize_u256_hex")]
    pub minimum_chain_work: U256,
    pub default_assume_valid: Hash,
    pub auxpow_chain_id: i32,
    pub digishield_difficulty_calculation: bool,
    pub pow_allow_min_difficulty_blocks: bool,
    pub pow_allow_digishield_min_difficulty_blocks: bool,
    pub pow_no_retargeting: bool,
    pub strict_chain_id: bool,
    pub allow_legacy_blocks: bool,
    pub simplified_rewards: bool,
    pub hash_genesis_block: Hash,
}

impl RuleSet {
    /// Blocks between fixed-window retargets
    pub fn difficulty_adjustment_interval(&self) -> i64 {
        self.pow_target_timespan / self.pow_target_spacing
    }

    pub fn deployment(&self, pos: DeploymentPos) -> &Deployment {
        &self.deployments[pos.index()]
    }

    pub fn deployment_mut(&mut self, pos: DeploymentPos) -> &mut Deployment {
        &mut self.deployments[pos.index()]
    }

    /// The PoW limit in header form
    pub fn pow_limit_compact(&self) -> CompactTarget {
        CompactTarget::from_target(&self.pow_limit)
    }

    pub fn bip34_active(&self, height: Height) -> bool {
        height >= self.bip34_height
    }

    pub fn bip65_active(&self, height: Height) -> bool {
        height >= self.bip65_height
    }

    pub fn bip66_active(&self, height: Height) -> bool {
        height >= self.bip66_height
    }

    /// Copy of these rules taking effect at `height_effective`, the starting
    /// point for describing the next era
    pub fn activate_at(&self, height_effective: Height) -> RuleSet {
        RuleSet {
            height_effective,
            ..self.clone()
        }
    }
}

/// Construction-time defects in an era list
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EraError {
    #[error("an era list needs at least one rule set")]
    Empty,
    #[error("the first era must take effect at height 0, not {0}")]
    FirstEraNotAtGenesis(Height),
    #[error("era activation heights must strictly increase ({previous} then {next})")]
    NonIncreasingHeights { previous: Height, next: Height },
    #[error("era at height {0} has a non-positive target timespan or spacing")]
    InvalidTiming(Height),
}

/// A rule set together with the retarget strategy chosen for it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Era {
    pub rules: RuleSet,
    pub strategy: RetargetStrategy,
}

/// Height-ordered rule sets of one network
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsensusEras {
    eras: Vec<Era>,
}

impl ConsensusEras {
    /// Validate the ordering and freeze each era's retarget strategy.
    ///
    /// The list must start at height 0 and strictly increase, which makes
    /// resolution total and unique.
    pub fn new(rule_sets: Vec<RuleSet>) -> Result<Self, EraError> {
        let first = rule_sets.first().ok_or(EraError::Empty)?;
        if first.height_effective != 0 {
            return Err(EraError::FirstEraNotAtGenesis(first.height_effective));
        }

        for pair in rule_sets.windows(2) {
            if pair[1].height_effective <= pair[0].height_effective {
                return Err(EraError::NonIncreasingHeights {
                    previous: pair[0].height_effective,
                    next: pair[1].height_effective,
                });
            }
        }

        if let Some(bad) = rule_sets
            .iter()
            .find(|r| r.pow_target_timespan <= 0 || r.pow_target_spacing <= 0)
        {
            return Err(EraError::InvalidTiming(bad.height_effective));
        }

        let eras = rule_sets
            .into_iter()
            .map(|rules| Era {
                strategy: RetargetStrategy::from_rules(&rules),
                rules,
            })
            .collect();

        Ok(Self { eras })
    }

    /// The era in force at `height`
    pub fn era_at(&self, height: Height) -> &Era {
        let idx = self
            .eras
            .partition_point(|era| era.rules.height_effective <= height);
        // idx >= 1: the first era starts at height 0
        &self.eras[idx.saturating_sub(1)]
    }

    /// The rule set in force at `height`
    pub fn resolve(&self, height: Height) -> &RuleSet {
        &self.era_at(height).rules
    }

    /// Rules of the first era
    pub fn base(&self) -> &RuleSet {
        &self.eras[0].rules
    }

    pub fn iter(&self) -> impl Iterator<Item = &Era> {
        self.eras.iter()
    }

    /// Number of eras, at least one
    pub fn len(&self) -> usize {
        self.eras.len()
    }

    /// Always false: `new` rejects an empty list
    pub fn is_empty(&self) -> bool {
        self.eras.is_empty()
    }

    /// Activation heights in order
    pub fn activation_heights(&self) -> Vec<Height> {
        self.eras.iter().map(|e| e.rules.height_effective).collect()
    }

    /// Record the genesis hash in every era
    pub(crate) fn set_genesis_hash(&mut self, hash: Hash) {
        for era in &mut self.eras {
            era.rules.hash_genesis_block = hash;
        }
    }

    /// Move a deployment window in every era
    pub(crate) fn update_deployment(&mut self, pos: DeploymentPos, start_time: i64, timeout: i64) {
        for era in &mut self.eras {
            let deployment = era.rules.deployment_mut(pos);
            deployment.start_time = start_time;
            deployment.timeout = timeout;
        }
    }
}
