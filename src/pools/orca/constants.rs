//! Orca Whirlpool constants.

use solana_sdk::pubkey;
use solana_sdk::pubkey::Pubkey;

pub const ORCA_WHIRLPOOL_PROGRAM_ID: Pubkey =
    pubkey!("whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc");

/// Whirlpool tick arrays hold 88 ticks instead of the CLMM's 60.
pub const TICK_ARRAY_SIZE: i32 = 88;

/// Whirlpool's upper sqrt-price bound differs slightly from the CLMM one.
pub const MAX_SQRT_PRICE_X64: u128 = 79226673515401279992447579055;

/// Whirlpool account span including the discriminator.
pub const WHIRLPOOL_SPAN: usize = 653;

/// Source-shaped tick-array span (88 ticks of 168 bytes plus padding).
pub const WHIRLPOOL_TICK_ARRAY_SPAN: usize = 8 + 32 + 4 + (TICK_ARRAY_SIZE as usize) * 168 + 1 + 115;

pub const WHIRLPOOL_DISCRIMINATOR: [u8; 8] = [63, 149, 209, 12, 225, 128, 99, 9];

pub const SWAP_V2_DISCRIMINATOR: [u8; 8] = [43, 4, 237, 11, 26, 201, 30, 98];

pub const TICK_ARRAY_SEED: &str = "tick_array";
pub const ORACLE_SEED: &str = "oracle";

pub const TOKEN_MINT_A_OFFSET: usize = 101;
pub const TOKEN_MINT_B_OFFSET: usize = 181;

/// Tick spacings observed to break swap execution; pools carrying them are
/// skipped during discovery.
pub const PROBLEMATIC_TICK_SPACINGS: [u16; 4] = [128, 256, 96, 32896];

/// Upper bound on healthy tick spacing.
pub const MAX_HEALTHY_TICK_SPACING: u16 = 64;

/// Upper bound on healthy fee rate (ppm).
pub const MAX_HEALTHY_FEE_RATE: u16 = 30000;

/// Absolute liquidity-net bound; ticks beyond it mark the pool unusable.
pub const LIQUIDITY_NET_SANITY_BOUND: i64 = 1_000_000_000_000_000_000;
