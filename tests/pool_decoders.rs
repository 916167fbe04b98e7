//! Layout decoding tests over synthetic account blobs.
//!
//! Each test writes known values at the documented byte offsets, decodes,
//! and checks the recognized fields read back exactly.

use solana_sdk::pubkey::Pubkey;

use dexrouter::pools::meteora::DlmmPool;
use dexrouter::pools::orca::WhirlpoolPool;
use dexrouter::pools::pump::PumpPool;
use dexrouter::pools::raydium::{AmmPool, ClmmPool, CpmmPool};

fn put_pubkey(data: &mut [u8], offset: usize, key: &Pubkey) {
    data[offset..offset + 32].copy_from_slice(key.as_ref());
}

#[test]
fn test_program_ids() {
    use dexrouter::pools::meteora::constants::METEORA_DLMM_PROGRAM_ID;
    use dexrouter::pools::orca::constants::ORCA_WHIRLPOOL_PROGRAM_ID;
    use dexrouter::pools::pump::constants::PUMP_SWAP_PROGRAM_ID;
    use dexrouter::pools::raydium::constants::{
        RAYDIUM_AMM_PROGRAM_ID, RAYDIUM_CLMM_PROGRAM_ID, RAYDIUM_CPMM_PROGRAM_ID,
    };

    assert_eq!(
        RAYDIUM_AMM_PROGRAM_ID.to_string(),
        "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8"
    );
    assert_eq!(
        RAYDIUM_CLMM_PROGRAM_ID.to_string(),
        "CAMMCzo5YL8w4VFF8KVHrK22GGUsp5VTaW7grrKgrWqK"
    );
    assert_eq!(
        RAYDIUM_CPMM_PROGRAM_ID.to_string(),
        "CPMMoo8L3F4NbTegBCKVNunggL7H1ZpdTHKxQB5qKP1C"
    );
    assert_eq!(
        METEORA_DLMM_PROGRAM_ID.to_string(),
        "LBUZKhRxPF3XUpBCjp4YzTKgLccjZhTSDM9YuVaPwxo"
    );
    assert_eq!(
        PUMP_SWAP_PROGRAM_ID.to_string(),
        "pAMMBay6oceH9fJKBRHGP5D4bD4sWpmSwMn52FMfXEA"
    );
    assert_eq!(
        ORCA_WHIRLPOOL_PROGRAM_ID.to_string(),
        "whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc"
    );
}

#[test]
fn test_clmm_pool_layout() {
    let mut data = vec![0u8; ClmmPool::span()];
    let mint_0 = Pubkey::new_unique();
    let mint_1 = Pubkey::new_unique();
    let vault_0 = Pubkey::new_unique();

    data[8] = 7; // bump
    put_pubkey(&mut data, ClmmPool::offset("token_mint_0"), &mint_0);
    put_pubkey(&mut data, ClmmPool::offset("token_mint_1"), &mint_1);
    put_pubkey(&mut data, 137, &vault_0);
    data[235..237].copy_from_slice(&60u16.to_le_bytes()); // tick_spacing
    data[237..253].copy_from_slice(&123456789u128.to_le_bytes()); // liquidity
    data[253..269].copy_from_slice(&(1u128 << 64).to_le_bytes()); // sqrt_price
    data[269..273].copy_from_slice(&(-5i32).to_le_bytes()); // tick_current

    let pool = ClmmPool::decode(&data).unwrap();
    assert_eq!(pool.bump, 7);
    assert_eq!(pool.token_mint_0, mint_0);
    assert_eq!(pool.token_mint_1, mint_1);
    assert_eq!(pool.token_vault_0, vault_0);
    assert_eq!(pool.tick_spacing, 60);
    assert_eq!(pool.liquidity, 123456789);
    assert_eq!(pool.sqrt_price_x64, 1u128 << 64);
    assert_eq!(pool.tick_current, -5);
}

#[test]
fn test_clmm_filter_offsets() {
    // bump(1) + amm_config(32) + owner(32) after the 8-byte discriminator
    assert_eq!(ClmmPool::offset("token_mint_0"), 8 + 1 + 32 + 32);
    assert_eq!(ClmmPool::offset("token_mint_1"), 8 + 1 + 32 + 32 + 32);
    assert_eq!(ClmmPool::span(), 1544);
}

#[test]
fn test_whirlpool_layout() {
    let mut data = vec![0u8; WhirlpoolPool::span()];
    let mint_a = Pubkey::new_unique();
    let mint_b = Pubkey::new_unique();

    data[41..43].copy_from_slice(&64u16.to_le_bytes()); // tick_spacing
    data[45..47].copy_from_slice(&3000u16.to_le_bytes()); // fee_rate
    data[49..65].copy_from_slice(&42u128.to_le_bytes()); // liquidity
    data[65..81].copy_from_slice(&(1u128 << 64).to_le_bytes()); // sqrt_price
    data[81..85].copy_from_slice(&(-88i32).to_le_bytes()); // tick_current_index
    put_pubkey(&mut data, WhirlpoolPool::offset("token_mint_a"), &mint_a);
    put_pubkey(&mut data, WhirlpoolPool::offset("token_mint_b"), &mint_b);

    let pool = WhirlpoolPool::decode(&data).unwrap();
    assert_eq!(pool.tick_spacing, 64);
    assert_eq!(pool.fee_rate, 3000);
    assert_eq!(pool.liquidity, 42);
    assert_eq!(pool.sqrt_price, 1u128 << 64);
    assert_eq!(pool.tick_current_index, -88);
    assert_eq!(pool.token_mint_a, mint_a);
    assert_eq!(pool.token_mint_b, mint_b);
}

#[test]
fn test_whirlpool_filter_offsets() {
    assert_eq!(WhirlpoolPool::offset("token_mint_a"), 101);
    assert_eq!(WhirlpoolPool::offset("token_mint_b"), 181);
    assert_eq!(WhirlpoolPool::span(), 653);
}

#[test]
fn test_dlmm_pair_layout() {
    let mut data = vec![0u8; DlmmPool::span()];
    let mint_x = Pubkey::new_unique();
    let mint_y = Pubkey::new_unique();
    let oracle = Pubkey::new_unique();

    data[8..10].copy_from_slice(&5000u16.to_le_bytes()); // base_factor
    data[76..80].copy_from_slice(&(-1i32).to_le_bytes()); // active_id
    data[80..82].copy_from_slice(&25u16.to_le_bytes()); // bin_step
    put_pubkey(&mut data, DlmmPool::offset("token_x_mint"), &mint_x);
    put_pubkey(&mut data, DlmmPool::offset("token_y_mint"), &mint_y);
    put_pubkey(&mut data, 552, &oracle);
    // first limb of the bin array bitmap
    data[584..592].copy_from_slice(&0xdeadbeefu64.to_le_bytes());

    let pool = DlmmPool::decode(&data).unwrap();
    assert_eq!(pool.parameters.base_factor, 5000);
    assert_eq!(pool.active_id, -1);
    assert_eq!(pool.bin_step, 25);
    assert_eq!(pool.token_x_mint, mint_x);
    assert_eq!(pool.token_y_mint, mint_y);
    assert_eq!(pool.oracle, oracle);
    assert_eq!(pool.bin_array_bitmap[0], 0xdeadbeef);
}

#[test]
fn test_dlmm_filter_offsets() {
    assert_eq!(DlmmPool::offset("token_x_mint"), 88);
    assert_eq!(DlmmPool::offset("token_y_mint"), 120);
    assert_eq!(DlmmPool::span(), 904);
}

#[test]
fn test_pump_pool_layout() {
    let mut data = vec![0u8; PumpPool::span()];
    let base = Pubkey::new_unique();
    let quote = Pubkey::new_unique();
    let base_account = Pubkey::new_unique();

    data[8] = 3; // pool_bump
    data[9..11].copy_from_slice(&12u16.to_le_bytes()); // index
    put_pubkey(&mut data, PumpPool::offset("base_mint"), &base);
    put_pubkey(&mut data, PumpPool::offset("quote_mint"), &quote);
    put_pubkey(&mut data, 139, &base_account);
    data[203..211].copy_from_slice(&777u64.to_le_bytes()); // lp_supply

    let pool = PumpPool::decode(&data).unwrap();
    assert_eq!(pool.pool_bump, 3);
    assert_eq!(pool.index, 12);
    assert_eq!(pool.base_mint, base);
    assert_eq!(pool.quote_mint, quote);
    assert_eq!(pool.pool_base_token_account, base_account);
    assert_eq!(pool.lp_supply, 777);
}

#[test]
fn test_pump_filter_offsets() {
    assert_eq!(PumpPool::offset("base_mint"), 43);
    assert_eq!(PumpPool::offset("quote_mint"), 75);
}

#[test]
fn test_amm_v4_layout() {
    let mut data = vec![0u8; AmmPool::span()];
    let coin = Pubkey::new_unique();
    let pc = Pubkey::new_unique();
    let market = Pubkey::new_unique();

    data[0..8].copy_from_slice(&6u64.to_le_bytes()); // status
    data[176..184].copy_from_slice(&25u64.to_le_bytes());
    data[184..192].copy_from_slice(&10000u64.to_le_bytes());
    put_pubkey(&mut data, AmmPool::offset("coin_mint"), &coin);
    put_pubkey(&mut data, AmmPool::offset("pc_mint"), &pc);
    put_pubkey(&mut data, 528, &market);

    let pool = AmmPool::decode(&data).unwrap();
    assert_eq!(pool.status, 6);
    assert_eq!(pool.swap_fee_numerator, 25);
    assert_eq!(pool.swap_fee_denominator, 10000);
    assert_eq!(pool.coin_mint, coin);
    assert_eq!(pool.pc_mint, pc);
    assert_eq!(pool.market, market);
}

#[test]
fn test_amm_v4_filter_offsets() {
    assert_eq!(AmmPool::offset("coin_mint"), 400);
    assert_eq!(AmmPool::offset("pc_mint"), 432);
    assert_eq!(AmmPool::span(), 752);
}

#[test]
fn test_cpmm_layout() {
    let mut data = vec![0u8; CpmmPool::span()];
    let mint_0 = Pubkey::new_unique();
    let mint_1 = Pubkey::new_unique();

    put_pubkey(&mut data, CpmmPool::offset("token_0_mint"), &mint_0);
    put_pubkey(&mut data, CpmmPool::offset("token_1_mint"), &mint_1);
    // auth_bump + status after ten pubkeys
    data[8 + 320] = 255;
    data[8 + 321] = 1;

    let pool = CpmmPool::decode(&data).unwrap();
    assert_eq!(pool.token_0_mint, mint_0);
    assert_eq!(pool.token_1_mint, mint_1);
    assert_eq!(pool.auth_bump, 255);
    assert_eq!(pool.status, 1);
}

#[test]
fn test_cpmm_filter_offsets() {
    assert_eq!(CpmmPool::offset("token_0_mint"), 8 + 32 * 5);
    assert_eq!(CpmmPool::offset("token_1_mint"), 8 + 32 * 6);
    assert_eq!(CpmmPool::span(), 637);
}

#[test]
fn test_short_data_is_rejected_everywhere() {
    let short = vec![0u8; 64];
    assert!(ClmmPool::decode(&short).is_err());
    assert!(WhirlpoolPool::decode(&short).is_err());
    assert!(DlmmPool::decode(&short).is_err());
    assert!(PumpPool::decode(&short).is_err());
    assert!(AmmPool::decode(&short).is_err());
    assert!(CpmmPool::decode(&short).is_err());
}

#[test]
fn test_trailing_padding_is_tolerated() {
    let mut data = vec![0u8; PumpPool::span() + 57];
    let base = Pubkey::new_unique();
    put_pubkey(&mut data, PumpPool::offset("base_mint"), &base);
    let pool = PumpPool::decode(&data).unwrap();
    assert_eq!(pool.base_mint, base);
}
