//! TRMP consensus parameter inspector
//!
//! Selects a network, builds (and verifies) its genesis block, and prints
//! the rule set in force at each era or at a requested height.

use clap::Parser;
use env_logger::Env;
use log::info;

use trmp_core::consensus::bits_to_difficulty;
use trmp_core::constants::{COIN, CURRENCY_UNIT};
use trmp_core::node::{create_genesis_block, mine_genesis, GenesisParams, Network};
use trmp_core::{select_network, Height, NetworkProfile, RuleSet};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Network to select: main, test or regtest
    #[arg(short, long, env = "TRMP_NETWORK", default_value = "main")]
    network: String,

    /// Show only the rule set in force at this height
    #[arg(long)]
    height: Option<Height>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    /// Search for the genesis nonce from zero (test and regtest only)
    #[arg(long)]
    mine_genesis: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    // Fails on an unknown name or a genesis mismatch
    let profile = select_network(&args.network)?;

    if args.mine_genesis {
        return remine_genesis(profile);
    }

    if args.json {
        let height = args.height.unwrap_or(0);
        println!("{}", serde_json::to_string_pretty(&profile.summary(height))?);
        return Ok(());
    }

    print_profile(profile, args.height);
    Ok(())
}

fn remine_genesis(profile: &NetworkProfile) -> Result<(), Box<dyn std::error::Error>> {
    if profile.network() == Network::Main {
        return Err("the main network genesis is fixed and is never mined".into());
    }

    let header = &profile.genesis().header;
    let mut block = create_genesis_block(&GenesisParams {
        time: header.time,
        nonce: 0,
        bits: header.bits,
        version: header.version,
        reward: profile.genesis_info().reward,
    });
    info!("mining {} genesis from nonce 0", profile.network());
    let attempts = mine_genesis(&mut block)?;

    println!("Genesis block found!");
    println!("  nonce:      {}", block.header.nonce);
    println!("  time:       {}", block.header.time);
    println!("  blockhash:  {}", block.hash());
    println!("  powhash:    {}", block.header.pow_hash());
    println!("  merklehash: {}", block.header.merkle_root);
    println!("  attempts:   {}", attempts);
    Ok(())
}

fn print_profile(profile: &NetworkProfile, height: Option<Height>) {
    let genesis = profile.genesis_info();

    println!("TRMP consensus parameters: {}", profile.network());
    println!();
    println!("Genesis Block Information:");
    println!("  Hash:        {}", genesis.hash);
    println!("  Merkle Root: {}", genesis.merkle_root);
    println!("  Time:        {}", genesis.time);
    println!("  Nonce:       {}", genesis.nonce);
    println!("  Bits:        {} (difficulty {:.8})", genesis.bits, bits_to_difficulty(genesis.bits));
    println!("  Reward:      {} {}", genesis.reward / COIN, CURRENCY_UNIT);
    println!();
    println!("Network:");
    println!("  Magic:       {}", hex::encode(profile.message_start()));
    println!("  Port:        {}", profile.default_port());
    println!("  Prune after: {}", profile.prune_after_height());
    for seed in profile.dns_seeds() {
        println!("  Seed:        {} ({})", seed.name, seed.host);
    }
    println!("  Min work:    {:#x}", profile.minimum_chain_work());
    println!("  Assume valid {}", profile.default_assume_valid());
    println!();

    match height {
        Some(height) => {
            let era = profile.eras().era_at(height);
            println!("Rules at height {} ({:?}):", height, era.strategy);
            print_rules(&era.rules);
        }
        None => {
            for era in profile.eras().iter() {
                println!(
                    "Era from height {} ({:?}):",
                    era.rules.height_effective, era.strategy
                );
                print_rules(&era.rules);
                println!();
            }
        }
    }
}

fn print_rules(rules: &RuleSet) {
    println!("  Target timespan / spacing: {}s / {}s", rules.pow_target_timespan, rules.pow_target_spacing);
    println!("  PoW limit:                 {}", rules.pow_limit_compact());
    println!("  Coinbase maturity:         {}", rules.coinbase_maturity);
    println!("  BIP34 / BIP65 / BIP66:     {} / {} / {}", rules.bip34_height, rules.bip65_height, rules.bip66_height);
    println!("  Digishield:                {}", rules.digishield_difficulty_calculation);
    println!("  Min difficulty blocks:     {}", rules.pow_allow_min_difficulty_blocks);
    println!("  Digishield min difficulty: {}", rules.pow_allow_digishield_min_difficulty_blocks);
    println!("  No retargeting:            {}", rules.pow_no_retargeting);
    println!("  AuxPoW chain ID:           {:#06x} (strict: {})", rules.auxpow_chain_id, rules.strict_chain_id);
    println!("  Legacy blocks allowed:     {}", rules.allow_legacy_blocks);
}
