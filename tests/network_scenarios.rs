//! End-to-end scenarios against the real network profiles

use trmp_core::constants::COIN;
use trmp_core::consensus::{
    block_proof_equivalent_time, calculate_next_work_required, check_proof_of_work,
    contextual_check_header, BlockHeader, BlockIndex, CompactTarget, DeploymentPos,
    RetargetStrategy, RuleSet, ValidationError,
};
use trmp_core::crypto::Hash;
use trmp_core::node::{
    create_genesis_block, install_profile, mine_genesis, select_network, selected_profile,
    try_selected_profile, GenesisParams, Network, NetworkProfile, ProfileError,
};

fn index(height: u32, time: u32, bits: u32) -> BlockIndex {
    BlockIndex {
        height,
        time,
        bits: CompactTarget(bits),
        chain_work: Default::default(),
    }
}

/// Bump the nonce until the scrypt hash meets the header's bits
fn solve(mut header: BlockHeader, rules: &RuleSet) -> BlockHeader {
    while check_proof_of_work(&header.pow_hash(), header.bits, rules).is_err() {
        header.nonce += 1;
    }
    header
}

#[test]
fn test_main_era_boundaries() {
    let main = NetworkProfile::main().unwrap();

    let base = main.consensus(0);
    assert_eq!(base.height_effective, 0);
    assert_eq!(main.consensus(999).height_effective, 0);
    assert_eq!(main.consensus(1000).height_effective, 1000);
    assert_eq!(main.consensus(59_999).height_effective, 1000);

    let auxpow = main.consensus(60_000);
    assert_eq!(auxpow.height_effective, 60_000);
    assert!(!auxpow.allow_legacy_blocks);
}

#[test]
fn test_legacy_retarget_scenarios() {
    let main = NetworkProfile::main().unwrap();
    let rules = main.consensus(0);

    let last = index(30479, 1388163922, 0x1c00974f);
    assert_eq!(
        calculate_next_work_required(&last, 1388149872, rules),
        CompactTarget(0x1c025d3c)
    );

    let last = index(2015, 1233061996, 0x1d00ffff);
    assert_eq!(
        calculate_next_work_required(&last, 1231006505, rules),
        CompactTarget(0x1d03fffc)
    );
}

#[test]
fn test_equivalent_time_on_constant_chain() {
    let regtest = NetworkProfile::regtest().unwrap();
    let rules = regtest.consensus(0);
    let spacing = rules.pow_target_spacing as u32;

    let mut chain = vec![BlockIndex::genesis(&regtest.genesis().header)];
    for _ in 0..50 {
        let tip = chain.last().unwrap();
        let next = tip.next(tip.time + spacing, CompactTarget(0x207fffff));
        chain.push(next);
    }

    for (p1, p2, p3) in [(40, 3, 50), (3, 40, 10), (25, 25, 0), (50, 0, 49)] {
        let (p1, p2, p3) = (&chain[p1], &chain[p2], &chain[p3]);
        assert_eq!(
            block_proof_equivalent_time(p1, p2, p3, rules),
            p1.block_time() - p2.block_time()
        );
    }
}

#[test]
fn test_regtest_genesis_mining_from_zero() {
    let regtest = NetworkProfile::regtest().unwrap();
    let header = &regtest.genesis().header;
    let mut block = create_genesis_block(&GenesisParams {
        time: header.time,
        nonce: 0,
        bits: CompactTarget(0x207fffff),
        version: 1,
        reward: 50 * COIN,
    });

    mine_genesis(&mut block).unwrap();

    let target = CompactTarget(0x207fffff).to_target().unwrap();
    assert!(block.header.pow_hash().to_u256() <= target);
    // The stored regtest nonce is the first solution at this timestamp
    assert!(block.header.nonce <= header.nonce);
}

#[test]
fn test_every_genesis_meets_its_target() {
    for network in Network::ALL {
        let profile = NetworkProfile::for_network(network).unwrap();
        let header = &profile.genesis().header;
        assert!(check_proof_of_work(&header.pow_hash(), header.bits, profile.consensus(0)).is_ok());
        assert_eq!(profile.checkpoints().get(&0), Some(&header.hash()));
    }
}

#[test]
fn test_testnet_min_difficulty_era() {
    let test = NetworkProfile::testnet().unwrap();
    let limit = test.consensus(1250).pow_limit_compact();
    let bits = 0x1e00ffff;

    // The base era allows min difficulty, so a late block gets the limit
    assert_eq!(
        test.eras().era_at(501).strategy,
        RetargetStrategy::PerBlockMinDifficulty
    );
    let chain = vec![index(499, 1_800_000_000, bits), index(500, 1_800_000_060, bits)];
    let late = test.next_work_required(&chain, 1_800_000_060 + 1000).unwrap();
    assert_eq!(late, limit);
    let on_time = test.next_work_required(&chain, 1_800_000_060 + 60).unwrap();
    assert_eq!(on_time, CompactTarget(bits));

    // Digishield without min difficulty: a late block is not discounted
    assert_eq!(test.eras().era_at(1102).strategy, RetargetStrategy::Digishield);
    let chain = vec![index(1100, 1_800_000_000, bits), index(1101, 1_800_000_060, bits)];
    let late = test.next_work_required(&chain, 1_800_000_060 + 1000).unwrap();
    assert_eq!(late, CompactTarget(bits));

    // From height 1250 any block more than two spacings late gets the limit
    assert_eq!(
        test.eras().era_at(1301).strategy,
        RetargetStrategy::PerBlockMinDifficulty
    );
    let chain = vec![index(1299, 1_800_000_000, bits), index(1300, 1_800_000_060, bits)];
    let late = test.next_work_required(&chain, 1_800_000_060 + 121).unwrap();
    assert_eq!(late, limit);
    let on_time = test.next_work_required(&chain, 1_800_000_060 + 120).unwrap();
    assert_eq!(on_time, CompactTarget(bits));
}

#[test]
fn test_main_digishield_reacts_every_block() {
    let main = NetworkProfile::main().unwrap();
    let bits = 0x1c00974f;
    let old = CompactTarget(bits).to_target().unwrap();

    let fast = vec![index(1500, 1_800_000_000, bits), index(1501, 1_800_000_010, bits)];
    let harder = main.next_work_required(&fast, 1_800_000_070).unwrap();
    assert!(harder.to_target().unwrap() < old);

    let slow = vec![index(1500, 1_800_000_000, bits), index(1501, 1_800_000_300, bits)];
    let easier = main.next_work_required(&slow, 1_800_000_360).unwrap();
    assert!(easier.to_target().unwrap() > old);
}

#[test]
fn test_regtest_header_rules_across_eras() {
    let regtest = NetworkProfile::regtest().unwrap();
    let genesis = regtest.genesis();

    let mut chain = vec![BlockIndex::genesis(&genesis.header)];
    while chain.len() < 20 {
        let tip = chain.last().unwrap();
        let next = tip.next(tip.time + 1, tip.bits);
        chain.push(next);
    }
    let tip_time = chain.last().unwrap().time;

    // Height 20 is the first height where merge mining is mandatory
    let mut legacy = genesis.header.clone();
    legacy.prev_hash = genesis.hash();
    legacy.time = tip_time + 1;
    assert_eq!(
        contextual_check_header(&legacy, None, &chain, regtest.eras()),
        Err(ValidationError::LegacyBlockNotAllowed {
            version: 1,
            height: 20
        })
    );

    let mut merged = legacy.clone();
    merged.set_base_version(4, regtest.consensus(20).auxpow_chain_id);
    merged.set_auxpow(true);
    assert_eq!(
        contextual_check_header(&merged, Some(&Hash::zero()), &chain, regtest.eras()),
        Ok(())
    );
    assert_eq!(
        contextual_check_header(&merged, None, &chain, regtest.eras()),
        Err(ValidationError::MissingAuxPow)
    );

    // One block earlier legacy blocks are still fine
    chain.pop();
    let legacy = solve(legacy, regtest.consensus(19));
    assert_eq!(
        contextual_check_header(&legacy, None, &chain, regtest.eras()),
        Ok(())
    );
}

#[test]
fn test_regtest_deployment_override() {
    let mut regtest = NetworkProfile::regtest().unwrap();
    regtest
        .update_deployment(DeploymentPos::Csv, 1_500_000_000, 1_600_000_000)
        .unwrap();
    let csv = regtest.consensus(100).deployment(DeploymentPos::Csv);
    assert_eq!((csv.start_time, csv.timeout), (1_500_000_000, 1_600_000_000));

    let mut test = NetworkProfile::testnet().unwrap();
    assert_eq!(
        test.update_deployment(DeploymentPos::Csv, 0, 0),
        Err(ProfileError::DeploymentOverrideNotAllowed(Network::Testnet))
    );
}

/// The only test in this binary that touches the process-wide selection
#[test]
fn test_process_wide_selection() {
    assert!(try_selected_profile().is_none());

    assert_eq!(
        select_network("mainnet").unwrap_err(),
        ProfileError::UnknownNetwork("mainnet".to_string())
    );
    assert!(try_selected_profile().is_none());

    let selected = select_network("regtest").unwrap();
    assert_eq!(selected.network(), Network::Regtest);
    assert_eq!(selected_profile().network(), Network::Regtest);

    // Reselecting the same network is harmless
    let again = select_network("regtest").unwrap();
    assert!(std::ptr::eq(selected, again));

    assert_eq!(
        select_network("main").unwrap_err(),
        ProfileError::AlreadySelected {
            selected: Network::Regtest,
            requested: Network::Main
        }
    );
    assert!(matches!(
        install_profile(NetworkProfile::testnet().unwrap()),
        Err(ProfileError::AlreadySelected { .. })
    ));
}
