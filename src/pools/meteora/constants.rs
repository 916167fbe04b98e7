//! Meteora DLMM constants.

use solana_sdk::pubkey;
use solana_sdk::pubkey::Pubkey;

pub const METEORA_DLMM_PROGRAM_ID: Pubkey = pubkey!("LBUZKhRxPF3XUpBCjp4YzTKgLccjZhTSDM9YuVaPwxo");

/// Bins per bin array.
pub const MAX_BIN_PER_ARRAY: i32 = 70;

/// Half-width of the default bin-array bitmap carried by the pair account.
pub const BIN_ARRAY_BITMAP_SIZE: i32 = 512;

/// Extension windows per side.
pub const EXTENSION_BIN_ARRAY_BITMAP_SIZE: usize = 12;

pub const MIN_BIN_ID: i32 = -443636;
pub const MAX_BIN_ID: i32 = 443636;

/// Q64.64 scale shift.
pub const SCALE_OFFSET: u8 = 64;

/// Fee rates are expressed against this precision.
pub const FEE_PRECISION: u128 = 1_000_000_000;

/// Hard cap on the combined base + variable fee rate.
pub const MAX_FEE_RATE: u128 = 100_000_000;

pub const BASIS_POINT_MAX: u64 = 10000;

// Layout spans
pub const LB_PAIR_SPAN: usize = 904;
pub const BIN_ARRAY_SPAN: usize = 8 + 8 + 1 + 7 + 32 + (MAX_BIN_PER_ARRAY as usize) * 144;
pub const BITMAP_EXTENSION_SPAN: usize = 8 + 32 + EXTENSION_BIN_ARRAY_BITMAP_SIZE * 64 * 2;

// Discovery filter offsets
pub const TOKEN_X_MINT_OFFSET: usize = 88;
pub const TOKEN_Y_MINT_OFFSET: usize = 120;

pub const SWAP2_DISCRIMINATOR: [u8; 8] = [65, 75, 63, 76, 235, 91, 91, 136];

// PDA seeds
pub const BIN_ARRAY_SEED: &str = "bin_array";
pub const BIN_ARRAY_BITMAP_SEED: &str = "bitmap";
pub const EVENT_AUTHORITY_SEED: &str = "__event_authority";

/// Pair status byte: zero means enabled.
pub const PAIR_STATUS_ENABLED: u8 = 0;
