//! Block header validation
//!
//! Pure functions checking a header against the rule set in force at its
//! height: version floors, merge-mining version layout, declared bits and
//! proof of work.

use thiserror::Error;

use super::block::{BlockHeader, ChainView};
use super::difficulty::{get_next_work_required, DifficultyError};
use super::params::{ConsensusEras, Height, RuleSet};
use super::target::{CompactTarget, TargetError};
use crate::crypto::Hash;

/// Validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("bad-version({version:#010x}): rejected nVersion={version} block at height {height}")]
    BadVersion { version: i32, height: Height },
    #[error("legacy block version {version} after auxpow start at height {height}")]
    LegacyBlockNotAllowed { version: i32, height: Height },
    #[error("block does not have our chain ID (got {found}, expected {expected})")]
    WrongChainId { expected: i32, found: i32 },
    #[error("no auxpow on block with auxpow version")]
    MissingAuxPow,
    #[error("auxpow on block with non-auxpow version")]
    UnexpectedAuxPow,
    #[error("invalid difficulty target: {0}")]
    InvalidTarget(#[from] TargetError),
    #[error("proof of work hash {hash} does not meet target {bits}")]
    InsufficientWork { hash: Hash, bits: CompactTarget },
    #[error("incorrect proof of work: expected bits {expected}, found {found}")]
    UnexpectedTarget {
        expected: CompactTarget,
        found: CompactTarget,
    },
    #[error(transparent)]
    Difficulty(#[from] DifficultyError),
}

/// Check that `pow_hash` meets `bits`, and that `bits` is a usable target no
/// easier than the rule set's limit
pub fn check_proof_of_work(
    pow_hash: &Hash,
    bits: CompactTarget,
    rules: &RuleSet,
) -> Result<(), ValidationError> {
    let target = bits.to_target_within(&rules.pow_limit)?;
    if pow_hash.to_u256() > target {
        return Err(ValidationError::InsufficientWork {
            hash: *pow_hash,
            bits,
        });
    }
    Ok(())
}

/// Version floors from BIP66/BIP65, and the legacy cut-off once merge mining
/// is mandatory
pub fn check_block_version(
    header: &BlockHeader,
    height: Height,
    rules: &RuleSet,
) -> Result<(), ValidationError> {
    let base = header.base_version();
    if (base < 3 && rules.bip66_active(height)) || (base < 4 && rules.bip65_active(height)) {
        return Err(ValidationError::BadVersion {
            version: header.version,
            height,
        });
    }

    if header.is_legacy() && !rules.allow_legacy_blocks {
        return Err(ValidationError::LegacyBlockNotAllowed {
            version: header.version,
            height,
        });
    }
    Ok(())
}

/// Proof-of-work check aware of merge mining.
///
/// `parent_pow_hash` is the PoW hash of the parent-chain block when the
/// header carries an AuxPoW proof. Verifying the proof's merkle branch is
/// left to the caller; this checks the version layout and the work.
pub fn check_auxpow_proof_of_work(
    header: &BlockHeader,
    parent_pow_hash: Option<&Hash>,
    rules: &RuleSet,
) -> Result<(), ValidationError> {
    if !header.is_legacy() && rules.strict_chain_id && header.chain_id() != rules.auxpow_chain_id {
        return Err(ValidationError::WrongChainId {
            expected: rules.auxpow_chain_id,
            found: header.chain_id(),
        });
    }

    match (header.is_auxpow(), parent_pow_hash) {
        (true, None) => Err(ValidationError::MissingAuxPow),
        (false, Some(_)) => Err(ValidationError::UnexpectedAuxPow),
        (false, None) => check_proof_of_work(&header.pow_hash(), header.bits, rules),
        (true, Some(parent)) => check_proof_of_work(parent, header.bits, rules),
    }
}

/// Validate a header extending the tip of `chain`
pub fn contextual_check_header<C>(
    header: &BlockHeader,
    parent_pow_hash: Option<&Hash>,
    chain: &C,
    eras: &ConsensusEras,
) -> Result<(), ValidationError>
where
    C: ChainView + ?Sized,
{
    let height = chain.tip().map_or(0, |tip| tip.height.saturating_add(1));
    let rules = eras.resolve(height);

    let expected = get_next_work_required(chain, i64::from(header.time), eras)?;
    if header.bits != expected {
        return Err(ValidationError::UnexpectedTarget {
            expected,
            found: header.bits,
        });
    }

    check_block_version(header, height, rules)?;
    check_auxpow_proof_of_work(header, parent_pow_hash, rules)
}
