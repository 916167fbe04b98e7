//! Raydium program ids, layout spans and instruction discriminators.

use once_cell::sync::OnceCell;
use solana_sdk::pubkey;
use solana_sdk::pubkey::Pubkey;

pub const RAYDIUM_AMM_PROGRAM_ID: Pubkey = pubkey!("675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8");
pub const RAYDIUM_AMM_AUTHORITY: Pubkey = pubkey!("5Q544fKrFoe6tsEbD7S8EmxGTJYAKtTVhAW5Q5pge4j1");
pub const RAYDIUM_CPMM_PROGRAM_ID: Pubkey = pubkey!("CPMMoo8L3F4NbTegBCKVNunggL7H1ZpdTHKxQB5qKP1C");
pub const RAYDIUM_CLMM_PROGRAM_ID: Pubkey = pubkey!("CAMMCzo5YL8w4VFF8KVHrK22GGUsp5VTaW7grrKgrWqK");
pub const RAYDIUM_CLMM_DEVNET_PROGRAM_ID: Pubkey =
    pubkey!("DRayAUgENGQBKVaX8owNhgzkEDyoHTGVEGHVJT1E9pfH");

static CLMM_PROGRAM_OVERRIDE: OnceCell<Pubkey> = OnceCell::new();

/// Effective CLMM program id. The devnet override must be installed before
/// any adapter is constructed.
pub fn clmm_program_id() -> Pubkey {
    *CLMM_PROGRAM_OVERRIDE.get().unwrap_or(&RAYDIUM_CLMM_PROGRAM_ID)
}

pub fn use_devnet_clmm_program() {
    let _ = CLMM_PROGRAM_OVERRIDE.set(RAYDIUM_CLMM_DEVNET_PROGRAM_ID);
}

// Tick array configuration
pub const TICK_ARRAY_SIZE: i32 = 60;
pub const TICK_ARRAY_BITMAP_SIZE: i32 = 512;
pub const EXTENSION_TICKARRAY_BITMAP_SIZE: usize = 14;

// Price bounds (Q64.64)
pub const MAX_SQRT_PRICE_X64: u128 = 79226673521066979257578248091;

// Layout spans
pub const CLMM_POOL_SPAN: usize = 1544;
pub const CLMM_TICK_ARRAY_SPAN: usize = 10240;
pub const CLMM_EXT_BITMAP_SPAN: usize = 1832;
pub const AMM_V4_SPAN: usize = 752;
pub const CPMM_POOL_SPAN: usize = 637;

// Field offsets used by discovery filters
pub const CLMM_TOKEN_MINT_0_OFFSET: usize = 73;
pub const CLMM_TOKEN_MINT_1_OFFSET: usize = 105;
pub const AMM_V4_COIN_MINT_OFFSET: usize = 400;
pub const AMM_V4_PC_MINT_OFFSET: usize = 432;
pub const CPMM_TOKEN_0_MINT_OFFSET: usize = 168;
pub const CPMM_TOKEN_1_MINT_OFFSET: usize = 200;

// Anchor discriminators
pub const CLMM_POOL_DISCRIMINATOR: [u8; 8] = [247, 237, 227, 245, 215, 195, 222, 70];
pub const CPMM_POOL_DISCRIMINATOR: [u8; 8] = [247, 237, 227, 245, 215, 195, 222, 70];
pub const CLMM_SWAP_V2_DISCRIMINATOR: [u8; 8] = [43, 4, 237, 11, 26, 201, 30, 98];
pub const CPMM_SWAP_BASE_INPUT_DISCRIMINATOR: [u8; 8] = [143, 190, 90, 218, 196, 30, 51, 222];

// Legacy AMM v4 instruction tag
pub const AMM_V4_SWAP_BASE_IN_TAG: u8 = 9;

// PDA seeds
pub const TICK_ARRAY_SEED: &str = "tick_array";
pub const POOL_TICK_ARRAY_BITMAP_SEED: &str = "pool_tick_array_bitmap_extension";
pub const CPMM_AUTH_SEED: &str = "vault_and_lp_mint_auth_seed";

// Classic AMM fee
pub const LIQUIDITY_FEES_NUMERATOR: u64 = 25;
pub const LIQUIDITY_FEES_DENOMINATOR: u64 = 10000;

// CLMM amm-config field offset (trade_fee_rate u32)
pub const CLMM_AMM_CONFIG_TRADE_FEE_OFFSET: usize = 47;
// CPMM amm-config field offset (trade_fee_rate u64)
pub const CPMM_AMM_CONFIG_TRADE_FEE_OFFSET: usize = 12;
