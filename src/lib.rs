//! TRMP (TrumPOW) Consensus Core Library
//!
//! Per-height consensus rule resolution, difficulty retargeting and genesis
//! construction for the main, test and regtest networks.
//!
//! TRMP is the ticker used in addresses, logs and protocol identifiers.

pub mod consensus;
pub mod crypto;
pub mod node;
pub mod primitives;

pub use consensus::{
    BlockIndex, CompactTarget, ConsensusEras, Height, RetargetStrategy, RuleSet, U256,
};
pub use node::{select_network, selected_profile, Network, NetworkProfile, ProfileError};

/// Protocol constants - HARD-CODED, NEVER CONFIGURABLE
pub mod constants {
    /// Base units per coin (8 decimal places)
    pub const COIN: i64 = 100_000_000;

    /// One hundredth of a coin
    pub const CENT: i64 = 1_000_000;

    /// Upper bound on any single amount, used as a sanity check
    pub const MAX_MONEY: i64 = 10_000_000_000 * COIN;

    /// Currency ticker
    pub const CURRENCY_UNIT: &str = "TRMP";

    /// Whether `value` is a valid amount in base units
    pub fn money_range(value: i64) -> bool {
        (0..=MAX_MONEY).contains(&value)
    }

}
