//! Chain-wide constants shared by every protocol adapter.

use solana_sdk::pubkey;
use solana_sdk::pubkey::Pubkey;

/// Wrapped SOL mint
pub const WSOL: Pubkey = pubkey!("So11111111111111111111111111111111111111112");

/// SPL token program
pub const TOKEN_PROGRAM_ID: Pubkey = pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");

/// SPL token-2022 program
pub const TOKEN_2022_PROGRAM_ID: Pubkey = pubkey!("TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb");

/// Memo program
pub const MEMO_PROGRAM_ID: Pubkey = pubkey!("MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr");

/// Associated token account program
pub const ATA_PROGRAM_ID: Pubkey = pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// System program
pub const SYSTEM_PROGRAM_ID: Pubkey = pubkey!("11111111111111111111111111111111");

/// SPL token account span
pub const TOKEN_ACCOUNT_SIZE: usize = 165;

/// Offset of the `amount` field inside an SPL token account
pub const TOKEN_ACCOUNT_AMOUNT_OFFSET: usize = 64;
