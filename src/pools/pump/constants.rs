//! Pump swap constants.

use solana_sdk::pubkey;
use solana_sdk::pubkey::Pubkey;

pub const PUMP_SWAP_PROGRAM_ID: Pubkey = pubkey!("pAMMBay6oceH9fJKBRHGP5D4bD4sWpmSwMn52FMfXEA");
pub const PUMP_GLOBAL_CONFIG: Pubkey = pubkey!("ADyA8hdefvWN2dbGGWFotbzWxrAvLW83WG6QCVXvJKqw");
pub const PUMP_PROTOCOL_FEE_RECIPIENT: Pubkey =
    pubkey!("62qc2CNXwrYqQScmEdiZFFAnJR262PxWEuNQtxfafNgV");
pub const PUMP_PROTOCOL_FEE_RECIPIENT_TOKEN_ACCOUNT: Pubkey =
    pubkey!("94qWNrtmfn42h3ZjUZwWvK1MEo9uVmmrBPd2hpNjYDjb");

pub const POOL_SPAN: usize = 243;

pub const BASE_MINT_OFFSET: usize = 43;
pub const QUOTE_MINT_OFFSET: usize = 75;

pub const BUY_DISCRIMINATOR: [u8; 8] = [102, 6, 61, 18, 1, 218, 235, 234];
pub const SELL_DISCRIMINATOR: [u8; 8] = [51, 230, 133, 164, 1, 127, 131, 173];

/// LP fee (20 bps) plus protocol fee (5 bps).
pub const TOTAL_FEE_BPS: u64 = 25;
pub const FEE_DENOMINATOR: u64 = 10000;

pub const EVENT_AUTHORITY_SEED: &str = "__event_authority";
