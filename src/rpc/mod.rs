//! Centralized RPC access.
//!
//! Every adapter shares one [`SolClient`]; all reads and sends go through
//! the retry layer so transient provider failures (rate limits, timeouts,
//! connection resets) are absorbed with bounded exponential backoff.

pub mod client;
pub mod retry;
pub mod token_accounts;

pub use client::SolClient;
pub use retry::{is_account_not_found_error, is_rate_limit_error};
pub use token_accounts::{
    close_wsol_instruction, cover_wsol_instructions, create_ata_instruction,
    find_associated_token_address, get_user_token_balance, select_or_create_spl_token_account,
};
