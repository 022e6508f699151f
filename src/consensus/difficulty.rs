//! Difficulty adjustment algorithm
//!
//! The retargeter dispatches on the strategy frozen into the era that the
//! next block falls in. All arithmetic happens on the expanded 256-bit
//! target; compact bits are only decoded on entry and encoded on exit.

use log::{debug, warn};
use thiserror::Error;

use super::block::{BlockIndex, ChainView};
use super::params::{ConsensusEras, Height, RetargetStrategy, RuleSet};
use super::target::{CompactTarget, U256};

/// Retarget failures caused by an incomplete chain view
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DifficultyError {
    #[error("chain view does not reach back to height {0}")]
    MissingAncestor(Height),
}

/// Compact bits required for the block following the tip of `chain`.
///
/// `block_time` is the timestamp of the block being built; it only matters
/// for the min-difficulty rule. An empty chain yields the genesis era's
/// proof-of-work limit.
pub fn get_next_work_required<C>(
    chain: &C,
    block_time: i64,
    eras: &ConsensusEras,
) -> Result<CompactTarget, DifficultyError>
where
    C: ChainView + ?Sized,
{
    let last = match chain.tip() {
        Some(last) => last,
        None => return Ok(eras.base().pow_limit_compact()),
    };

    let height = last.height.saturating_add(1);
    let era = eras.era_at(height);
    let rules = &era.rules;

    let bits = match era.strategy {
        RetargetStrategy::NoRetargeting => last.bits,
        RetargetStrategy::Fixed => fixed_window_work_required(chain, last, block_time, rules)?,
        RetargetStrategy::Digishield => digishield_work_required(chain, last, rules)?,
        RetargetStrategy::PerBlockMinDifficulty => {
            if is_min_difficulty_due(last, block_time, rules) {
                warn!(
                    "block {} arrives {}s after its parent, allowing minimum difficulty",
                    height,
                    block_time - last.block_time()
                );
                rules.pow_limit_compact()
            } else {
                digishield_work_required(chain, last, rules)?
            }
        }
    };

    debug!(
        "next work required at height {} ({:?}): {} -> {}",
        height, era.strategy, last.bits, bits
    );
    Ok(bits)
}

/// A block more than two target spacings after its parent may use the limit
fn is_min_difficulty_due(last: &BlockIndex, block_time: i64, rules: &RuleSet) -> bool {
    block_time > last.block_time() + rules.pow_target_spacing * 2
}

fn ancestor<'a, C>(chain: &'a C, height: Height) -> Result<&'a BlockIndex, DifficultyError>
where
    C: ChainView + ?Sized,
{
    chain
        .at_height(height)
        .ok_or(DifficultyError::MissingAncestor(height))
}

/// Height of the first block of the window ending at `last`.
///
/// The first window after genesis is one block short, since genesis has no
/// parent to measure from.
fn window_start(last: &BlockIndex, interval: i64) -> Height {
    let interval = interval.max(1) as u64;
    let go_back = if u64::from(last.height) + 1 == interval {
        interval - 1
    } else {
        interval
    };
    u64::from(last.height).saturating_sub(go_back) as Height
}

fn fixed_window_work_required<C>(
    chain: &C,
    last: &BlockIndex,
    block_time: i64,
    rules: &RuleSet,
) -> Result<CompactTarget, DifficultyError>
where
    C: ChainView + ?Sized,
{
    let interval = rules.difficulty_adjustment_interval().max(1);
    let height = i64::from(last.height) + 1;

    if height % interval != 0 {
        if !rules.pow_allow_min_difficulty_blocks {
            return Ok(last.bits);
        }
        let limit = rules.pow_limit_compact();
        if is_min_difficulty_due(last, block_time, rules) {
            warn!(
                "block {} arrives {}s after its parent, allowing minimum difficulty",
                height,
                block_time - last.block_time()
            );
            return Ok(limit);
        }
        // Return the last non-special-min-difficulty-rules block
        let mut index = last;
        while index.height > 0
            && i64::from(index.height) % interval != 0
            && index.bits == limit
        {
            match chain.at_height(index.height - 1) {
                Some(prev) => index = prev,
                None => break,
            }
        }
        return Ok(index.bits);
    }

    let first = ancestor(chain, window_start(last, interval))?;
    Ok(calculate_next_work_required(last, first.block_time(), rules))
}

fn digishield_work_required<C>(
    chain: &C,
    last: &BlockIndex,
    rules: &RuleSet,
) -> Result<CompactTarget, DifficultyError>
where
    C: ChainView + ?Sized,
{
    let first = ancestor(chain, window_start(last, 1))?;
    Ok(calculate_digishield_work_required(last, first.block_time(), rules))
}

/// Legacy fixed-window retarget of `last.bits` over the window that started
/// at `first_block_time`
pub fn calculate_next_work_required(
    last: &BlockIndex,
    first_block_time: i64,
    rules: &RuleSet,
) -> CompactTarget {
    if rules.pow_no_retargeting {
        return last.bits;
    }
    let actual = last.block_time() - first_block_time;
    let timespan = legacy_clamped_timespan(actual, rules.pow_target_timespan);
    scale_target(last.bits, timespan, rules)
}

/// Digishield retarget of `last.bits` against the previous block's time
pub fn calculate_digishield_work_required(
    last: &BlockIndex,
    first_block_time: i64,
    rules: &RuleSet,
) -> CompactTarget {
    if rules.pow_no_retargeting {
        return last.bits;
    }
    let actual = last.block_time() - first_block_time;
    let timespan = digishield_modulated_timespan(actual, rules.pow_target_timespan);
    scale_target(last.bits, timespan, rules)
}

/// Clamp a measured window to `[T/4, 4T]`
pub fn legacy_clamped_timespan(actual: i64, target_timespan: i64) -> i64 {
    actual
        .max(target_timespan / 4)
        .min(target_timespan.saturating_mul(4))
}

/// Dampen a measured spacing toward the target, `(3T + A) / 4`, then clamp
/// to `[T - T/4, T + T/3]`
pub fn digishield_modulated_timespan(actual: i64, target_timespan: i64) -> i64 {
    let modulated = target_timespan
        .saturating_mul(3)
        .saturating_add(actual)
        / 4;
    modulated
        .max(target_timespan - target_timespan / 4)
        .min(target_timespan + target_timespan / 3)
}

/// `bits * timespan / T`, capped at the proof-of-work limit.
///
/// Previous bits that decode negative or overflowing, and products that do
/// not fit 256 bits, both give the limit.
fn scale_target(bits: CompactTarget, timespan: i64, rules: &RuleSet) -> CompactTarget {
    let limit = rules.pow_limit_compact();
    let decoded = bits.decode();
    if decoded.negative || decoded.overflow {
        warn!("previous bits {} do not decode to a target, using the limit", bits);
        return limit;
    }

    let (product, overflowed) = decoded
        .value
        .overflowing_mul(U256::from(timespan.max(0) as u64));
    if overflowed {
        return limit;
    }

    let new_target = product / U256::from(rules.pow_target_timespan.max(1) as u64);
    if new_target > rules.pow_limit {
        return limit;
    }
    CompactTarget::from_target(&new_target)
}

/// Expected number of hashes for a block at `bits`: `2^256 / (target + 1)`.
///
/// Zero for targets that fail to decode.
pub fn block_proof(bits: CompactTarget) -> U256 {
    let target = match bits.to_target() {
        Ok(target) => target,
        Err(_) => return U256::zero(),
    };
    // 2^256 does not fit, but (~t / (t + 1)) + 1 is the same value
    match target.checked_add(U256::one()) {
        Some(divisor) => (!target / divisor) + U256::one(),
        None => U256::one(),
    }
}

/// Seconds of block production at the tip's difficulty that account for the
/// work between `from` and `to`.
///
/// Saturates at `i64::MAX` in magnitude; negative when `from` has more work.
pub fn block_proof_equivalent_time(
    to: &BlockIndex,
    from: &BlockIndex,
    tip: &BlockIndex,
    rules: &RuleSet,
) -> i64 {
    let (delta, sign) = if to.chain_work > from.chain_work {
        (to.chain_work - from.chain_work, 1i64)
    } else {
        (from.chain_work - to.chain_work, -1i64)
    };

    let proof = block_proof(tip.bits);
    if proof.is_zero() {
        return sign * i64::MAX;
    }

    let spacing = U256::from(rules.pow_target_spacing.max(0) as u64);
    let (scaled, overflowed) = delta.overflowing_mul(spacing);
    if overflowed {
        return sign * i64::MAX;
    }

    let seconds = scaled / proof;
    if seconds.bits() > 63 {
        return sign * i64::MAX;
    }
    sign * seconds.low_u64() as i64
}

/// Difficulty as a multiple of the `0x1d00ffff` target
pub fn bits_to_difficulty(bits: CompactTarget) -> f64 {
    let bits = bits.to_consensus();
    let mantissa = bits & 0x00ff_ffff;
    if mantissa == 0 {
        return 0.0;
    }

    let mut shift = (bits >> 24) & 0xff;
    let mut diff = f64::from(0x0000_ffffu32) / f64::from(mantissa);
    while shift < 29 {
        diff *= 256.0;
        shift += 1;
    }
    while shift > 29 {
        diff /= 256.0;
        shift -= 1;
    }
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::target::u256_from_hex;
    use crate::consensus::Deployment;
    use crate::crypto::Hash;

    fn legacy_rules() -> RuleSet {
        RuleSet {
            height_effective: 0,
            subsidy_halving_interval: 150_000,
            majority_enforce_block_upgrade: 1500,
            majority_reject_block_outdated: 1900,
            majority_window: 2000,
            bip34_height: 1000,
            bip34_hash: Hash::zero(),
            bip65_height: 1000,
            bip66_height: 1000,
            pow_limit: u256_from_hex(
                "00000fffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
            )
            .unwrap(),
            pow_target_timespan: 60,
            pow_target_spacing: 60,
            coinbase_maturity: 100,
            rule_change_activation_threshold: 9576,
            miner_confirmation_window: 10080,
            deployments: [Deployment::new(0, 0, 0); 3],
            minimum_chain_work: U256::zero(),
            default_assume_valid: Hash::zero(),
            auxpow_chain_id: 0x00A8,
            digishield_difficulty_calculation: false,
            pow_allow_min_difficulty_blocks: false,
            pow_allow_digishield_min_difficulty_blocks: false,
            pow_no_retargeting: false,
            strict_chain_id: true,
            allow_legacy_blocks: true,
            simplified_rewards: true,
            hash_genesis_block: Hash::zero(),
        }
    }

    fn index(height: Height, time: u32, bits: u32) -> BlockIndex {
        BlockIndex {
            height,
            time,
            bits: CompactTarget(bits),
            chain_work: U256::zero(),
        }
    }

    /// `len` blocks starting at height 0, evenly spaced
    fn uniform_chain(len: u32, start_time: u32, spacing: u32, bits: u32) -> Vec<BlockIndex> {
        (0..len)
            .map(|h| index(h, start_time + h * spacing, bits))
            .collect()
    }

    #[test]
    fn test_legacy_retarget_clamps_fast_window() {
        let rules = legacy_rules();
        let last = index(30479, 1388163922, 0x1c00974f);
        assert_eq!(
            calculate_next_work_required(&last, 1388149872, &rules),
            CompactTarget(0x1c025d3c)
        );
    }

    #[test]
    fn test_legacy_retarget_near_limit() {
        let rules = legacy_rules();
        let last = index(2015, 1233061996, 0x1d00ffff);
        assert_eq!(
            calculate_next_work_required(&last, 1231006505, &rules),
            CompactTarget(0x1d03fffc)
        );
    }

    #[test]
    fn test_legacy_retarget_lower_limit() {
        let rules = legacy_rules();
        let last = index(68543, 1279297671, 0x1c05a3f4);
        assert_eq!(
            calculate_next_work_required(&last, 1279297671 - 3584, &rules),
            CompactTarget(0x1c168fd0)
        );
    }

    #[test]
    fn test_legacy_retarget_capped_at_limit() {
        let rules = legacy_rules();
        let last = index(10, 1_000_000, 0x1e0ffff0);
        let bits = calculate_next_work_required(&last, 0, &rules);
        assert_eq!(bits, rules.pow_limit_compact());
    }

    #[test]
    fn test_no_retargeting_keeps_bits() {
        let mut rules = legacy_rules();
        rules.pow_no_retargeting = true;
        let last = index(5, 500, 0x1c00974f);
        assert_eq!(calculate_next_work_required(&last, 0, &rules), last.bits);
        assert_eq!(calculate_digishield_work_required(&last, 0, &rules), last.bits);
    }

    #[test]
    fn test_legacy_clamp_bounds() {
        assert_eq!(legacy_clamped_timespan(1, 60), 15);
        assert_eq!(legacy_clamped_timespan(60, 60), 60);
        assert_eq!(legacy_clamped_timespan(10_000, 60), 240);
        assert_eq!(legacy_clamped_timespan(-50, 60), 15);
    }

    #[test]
    fn test_digishield_dampening() {
        assert_eq!(digishield_modulated_timespan(60, 60), 60);
        // (180 + 0) / 4 = 45, exactly the lower bound
        assert_eq!(digishield_modulated_timespan(0, 60), 45);
        assert_eq!(digishield_modulated_timespan(-1000, 60), 45);
        // (180 + 100) / 4 = 70, inside the band
        assert_eq!(digishield_modulated_timespan(100, 60), 70);
        assert_eq!(digishield_modulated_timespan(10_000, 60), 80);
        // Never zero for a one-second timespan
        assert_eq!(digishield_modulated_timespan(0, 1), 1);
        assert_eq!(digishield_modulated_timespan(100, 1), 1);
    }

    #[test]
    fn test_digishield_retarget_moves_both_ways() {
        let mut rules = legacy_rules();
        rules.digishield_difficulty_calculation = true;
        let last = index(2000, 10_000, 0x1c00974f);

        let slower = calculate_digishield_work_required(&last, 10_000 - 600, &rules);
        let faster = calculate_digishield_work_required(&last, 10_000 - 1, &rules);
        let steady = calculate_digishield_work_required(&last, 10_000 - 60, &rules);

        let old = last.bits.to_target().unwrap();
        assert!(slower.to_target().unwrap() > old);
        assert!(faster.to_target().unwrap() < old);
        assert_eq!(steady, last.bits);
    }

    #[test]
    fn test_bad_previous_bits_fall_back_to_limit() {
        let rules = legacy_rules();
        let negative = index(10, 600, 0x04923456);
        assert_eq!(
            calculate_next_work_required(&negative, 540, &rules),
            rules.pow_limit_compact()
        );
        let overflowing = index(10, 600, 0xff123456);
        assert_eq!(
            calculate_digishield_work_required(&overflowing, 540, &rules),
            rules.pow_limit_compact()
        );
    }

    #[test]
    fn test_fixed_window_retargets_only_on_boundary() {
        let mut rules = legacy_rules();
        rules.pow_target_timespan = 600;
        let eras = ConsensusEras::new(vec![rules.clone()]).unwrap();

        // Interval 10: height 5 is between retargets
        let chain = uniform_chain(5, 1000, 60, 0x1c00974f);
        let bits = get_next_work_required(&chain, 1300, &eras).unwrap();
        assert_eq!(bits, CompactTarget(0x1c00974f));

        // Height 10 retargets over blocks 0..=9, spaced at the target
        let chain = uniform_chain(10, 1000, 60, 0x1c00974f);
        let bits = get_next_work_required(&chain, 1600, &eras).unwrap();
        // First window after genesis is 9 spacings of 10: 540 of 600
        let expected = calculate_next_work_required(chain.tip().unwrap(), 1000, &rules);
        assert_eq!(bits, expected);
    }

    #[test]
    fn test_fixed_window_min_difficulty() {
        let mut rules = legacy_rules();
        rules.pow_target_timespan = 600;
        rules.pow_allow_min_difficulty_blocks = true;
        let eras = ConsensusEras::new(vec![rules.clone()]).unwrap();
        let limit = rules.pow_limit_compact();

        let mut chain = uniform_chain(4, 1000, 60, 0x1c00974f);
        let last_time = chain.tip().unwrap().block_time();

        // Late block gets the limit
        let late = get_next_work_required(&chain, last_time + 121, &eras).unwrap();
        assert_eq!(late, limit);

        // After a min-difficulty block, walk back to the real difficulty
        let tip = chain.tip().unwrap().next(last_time as u32 + 200, limit);
        chain.push(tip);
        let on_time = get_next_work_required(&chain, last_time + 260, &eras).unwrap();
        assert_eq!(on_time, CompactTarget(0x1c00974f));
    }

    #[test]
    fn test_per_block_min_difficulty_strategy() {
        let mut rules = legacy_rules();
        rules.digishield_difficulty_calculation = true;
        rules.pow_allow_min_difficulty_blocks = true;
        rules.pow_allow_digishield_min_difficulty_blocks = true;
        let eras = ConsensusEras::new(vec![rules.clone()]).unwrap();

        let chain = uniform_chain(3, 1000, 60, 0x1c00974f);
        let last_time = chain.tip().unwrap().block_time();
        assert_eq!(
            get_next_work_required(&chain, last_time + 121, &eras).unwrap(),
            rules.pow_limit_compact()
        );
        assert_eq!(
            get_next_work_required(&chain, last_time + 60, &eras).unwrap(),
            CompactTarget(0x1c00974f)
        );
    }

    #[test]
    fn test_empty_chain_yields_limit() {
        let rules = legacy_rules();
        let eras = ConsensusEras::new(vec![rules.clone()]).unwrap();
        let chain: Vec<BlockIndex> = Vec::new();
        assert_eq!(
            get_next_work_required(&chain, 0, &eras).unwrap(),
            rules.pow_limit_compact()
        );
    }

    #[test]
    fn test_missing_ancestor_reported() {
        let mut rules = legacy_rules();
        rules.pow_target_timespan = 600;
        let eras = ConsensusEras::new(vec![rules]).unwrap();
        // Only the tip at height 19; the window needs height 9
        let chain = vec![index(19, 5000, 0x1c00974f)];
        assert_eq!(
            get_next_work_required(&chain, 5060, &eras),
            Err(DifficultyError::MissingAncestor(9))
        );
    }

    #[test]
    fn test_block_proof_values() {
        assert_eq!(block_proof(CompactTarget(0x207fffff)), U256::from(2u64));
        assert_eq!(block_proof(CompactTarget(0x1d00ffff)), U256::from(0x0001_0001_0001u64));
        assert!(block_proof(CompactTarget(0x04923456)).is_zero());
        assert!(block_proof(CompactTarget(0)).is_zero());
    }

    #[test]
    fn test_equivalent_time_sign_and_saturation() {
        let rules = legacy_rules();
        let bits = CompactTarget(0x207fffff);
        let a = BlockIndex {
            height: 1,
            time: 60,
            bits,
            chain_work: U256::from(4u64),
        };
        let b = BlockIndex {
            height: 5,
            time: 300,
            bits,
            chain_work: U256::from(12u64),
        };
        assert_eq!(block_proof_equivalent_time(&b, &a, &b, &rules), 240);
        assert_eq!(block_proof_equivalent_time(&a, &b, &b, &rules), -240);

        let invalid_tip = index(5, 300, 0);
        assert_eq!(block_proof_equivalent_time(&b, &a, &invalid_tip, &rules), i64::MAX);
    }

    #[test]
    fn test_difficulty_float() {
        assert_eq!(bits_to_difficulty(CompactTarget(0x1d00ffff)), 1.0);
        assert!((bits_to_difficulty(CompactTarget(0x1b0404cb)) - 16307.420938523983).abs() < 1e-6);
        assert!(bits_to_difficulty(CompactTarget(0x1e0fffff)) < 0.001);
        assert_eq!(bits_to_difficulty(CompactTarget(0)), 0.0);
    }
}
