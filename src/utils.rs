//! Small helpers shared by the demo binary and tests.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Once;

use solana_sdk::pubkey::Pubkey;

use crate::errors::{DexError, DexResult};

static LOAD_ENV_ONCE: Once = Once::new();

/// Load environment variables from a `.env` file if one exists in the
/// working directory or up to three parent directories. Existing variables
/// are never overwritten.
pub fn load_env() {
    LOAD_ENV_ONCE.call_once(|| {
        let Ok(cwd) = std::env::current_dir() else {
            return;
        };

        let mut candidate: Option<PathBuf> = None;
        let mut dir = cwd;
        for _ in 0..3 {
            let path = dir.join(".env");
            if path.is_file() {
                candidate = Some(path);
                break;
            }
            match dir.parent() {
                Some(parent) => dir = parent.to_path_buf(),
                None => break,
            }
        }

        let Some(path) = candidate else {
            return;
        };
        let Ok(content) = std::fs::read_to_string(&path) else {
            return;
        };

        for line in content.lines() {
            let mut line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(rest) = line.strip_prefix("export ") {
                line = rest.trim();
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let mut value = value.trim();
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }
            if std::env::var_os(key).is_none() {
                std::env::set_var(key, value);
            }
        }
    });
}

/// Parse a base58 address, reporting a typed error on malformed input.
pub fn parse_pubkey(address: &str) -> DexResult<Pubkey> {
    Pubkey::from_str(address)
        .map_err(|_| DexError::Swap(crate::errors::SwapError::InvalidInput("address")))
}

/// Read an SPL token account amount from raw account data.
pub fn token_account_amount(data: &[u8]) -> Option<u64> {
    let start = crate::constants::TOKEN_ACCOUNT_AMOUNT_OFFSET;
    let bytes: [u8; 8] = data.get(start..start + 8)?.try_into().ok()?;
    Some(u64::from_le_bytes(bytes))
}
