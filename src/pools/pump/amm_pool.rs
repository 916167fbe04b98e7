//! Pump swap pool: constant-product quoting over the pool token accounts.

use async_trait::async_trait;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

use crate::constants::{ATA_PROGRAM_ID, SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID};
use crate::errors::{DecodeError, DexResult, SwapError};
use crate::logger::{log, LogTag};
use crate::math::mul_div_floor;
use crate::pools::codec::Cursor;
use crate::pools::pump::constants::{
    BASE_MINT_OFFSET, BUY_DISCRIMINATOR, EVENT_AUTHORITY_SEED, FEE_DENOMINATOR, POOL_SPAN,
    PUMP_GLOBAL_CONFIG, PUMP_PROTOCOL_FEE_RECIPIENT, PUMP_PROTOCOL_FEE_RECIPIENT_TOKEN_ACCOUNT,
    PUMP_SWAP_PROGRAM_ID, QUOTE_MINT_OFFSET, SELL_DISCRIMINATOR, TOTAL_FEE_BPS,
};
use crate::pools::{Pool, ProtocolKind};
use crate::rpc::{find_associated_token_address, SolClient};
use crate::utils::token_account_amount;

#[derive(Debug, Clone)]
pub struct PumpPool {
    pub pool_bump: u8,
    pub index: u16,
    pub creator: Pubkey,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub lp_mint: Pubkey,
    pub pool_base_token_account: Pubkey,
    pub pool_quote_token_account: Pubkey,
    pub lp_supply: u64,
    pub coin_creator: Pubkey,

    // Client-side state
    pub pool_id: Pubkey,
    pub base_reserve: u64,
    pub quote_reserve: u64,
}

impl PumpPool {
    pub fn span() -> usize {
        POOL_SPAN
    }

    pub fn offset(field: &str) -> usize {
        match field {
            "base_mint" => BASE_MINT_OFFSET,
            "quote_mint" => QUOTE_MINT_OFFSET,
            _ => 0,
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < Self::span() {
            return Err(DecodeError::TooShort {
                need: Self::span(),
                have: data.len(),
            });
        }
        let mut cursor = Cursor::new(&data[8..]);
        Ok(Self {
            pool_bump: cursor.u8("pool_bump")?,
            index: cursor.u16("index")?,
            creator: cursor.pubkey("creator")?,
            base_mint: cursor.pubkey("base_mint")?,
            quote_mint: cursor.pubkey("quote_mint")?,
            lp_mint: cursor.pubkey("lp_mint")?,
            pool_base_token_account: cursor.pubkey("pool_base_token_account")?,
            pool_quote_token_account: cursor.pubkey("pool_quote_token_account")?,
            lp_supply: cursor.u64("lp_supply")?,
            coin_creator: cursor.pubkey("coin_creator")?,
            pool_id: Pubkey::default(),
            base_reserve: 0,
            quote_reserve: 0,
        })
    }

    fn contains_mint(&self, mint: &Pubkey) -> bool {
        mint == &self.base_mint || mint == &self.quote_mint
    }

    /// Refresh reserves from the pool token-account balances.
    pub async fn refresh_reserves(&mut self, client: &SolClient) -> DexResult<()> {
        let accounts = client
            .get_multiple_accounts(&[self.pool_base_token_account, self.pool_quote_token_account])
            .await?;
        self.base_reserve = accounts
            .first()
            .and_then(|a| a.as_ref())
            .and_then(|a| token_account_amount(&a.data))
            .unwrap_or(0);
        self.quote_reserve = accounts
            .get(1)
            .and_then(|a| a.as_ref())
            .and_then(|a| token_account_amount(&a.data))
            .unwrap_or(0);
        Ok(())
    }

    /// Constant-product output with the aggregate pump fee on the input.
    pub fn compute_amount_out(&self, input_mint: &Pubkey, amount_in: u64) -> DexResult<u64> {
        let (reserve_in, reserve_out) = if input_mint == &self.base_mint {
            (self.base_reserve, self.quote_reserve)
        } else {
            (self.quote_reserve, self.base_reserve)
        };
        if reserve_in == 0 || reserve_out == 0 {
            return Err(SwapError::InsufficientLiquidity.into());
        }

        let amount_in_after_fee = mul_div_floor(
            amount_in as u128,
            (FEE_DENOMINATOR - TOTAL_FEE_BPS) as u128,
            FEE_DENOMINATOR as u128,
        )?;
        let out = mul_div_floor(
            reserve_out as u128,
            amount_in_after_fee,
            reserve_in as u128 + amount_in_after_fee,
        )?;
        u64::try_from(out).map_err(|_| crate::errors::MathError::Overflow.into())
    }

    fn event_authority() -> Pubkey {
        Pubkey::find_program_address(&[EVENT_AUTHORITY_SEED.as_bytes()], &PUMP_SWAP_PROGRAM_ID).0
    }
}

#[async_trait]
impl Pool for PumpPool {
    fn protocol_kind(&self) -> ProtocolKind {
        ProtocolKind::PumpAmm
    }

    fn program_id(&self) -> Pubkey {
        PUMP_SWAP_PROGRAM_ID
    }

    fn id(&self) -> Pubkey {
        self.pool_id
    }

    fn tokens(&self) -> (Pubkey, Pubkey) {
        (self.base_mint, self.quote_mint)
    }

    async fn quote(
        &mut self,
        client: &SolClient,
        input_mint: &Pubkey,
        amount_in: u64,
    ) -> DexResult<u64> {
        if amount_in == 0 {
            return Err(SwapError::InvalidInput("amount_in").into());
        }
        if !self.contains_mint(input_mint) {
            return Err(SwapError::InvalidInput("input_mint").into());
        }
        self.refresh_reserves(client).await?;
        self.compute_amount_out(input_mint, amount_in)
    }

    async fn build_swap_instructions(
        &self,
        client: &SolClient,
        user: &Pubkey,
        input_mint: &Pubkey,
        amount_in: u64,
        min_amount_out: u64,
    ) -> DexResult<Vec<Instruction>> {
        if !self.contains_mint(input_mint) {
            return Err(SwapError::InvalidInput("input_mint").into());
        }
        let selling_base = input_mint == &self.base_mint;

        let user_base_token_account = find_associated_token_address(user, &self.base_mint);
        let user_quote_token_account = find_associated_token_address(user, &self.quote_mint);
        let output_account = if selling_base {
            user_quote_token_account
        } else {
            user_base_token_account
        };
        match client.get_account_optional(&output_account).await {
            Ok(Some(_)) => {}
            _ => log(
                LogTag::Swap,
                "WARN",
                &format!(
                    "output token account {} does not exist, create it before swapping",
                    output_account
                ),
            ),
        }

        // Selling base is `sell(base_in, min_quote_out)`; buying base with
        // quote is `buy(base_out, max_quote_in)`
        let mut data = Vec::with_capacity(8 + 16);
        if selling_base {
            data.extend_from_slice(&SELL_DISCRIMINATOR);
            data.extend_from_slice(&amount_in.to_le_bytes());
            data.extend_from_slice(&min_amount_out.to_le_bytes());
        } else {
            data.extend_from_slice(&BUY_DISCRIMINATOR);
            data.extend_from_slice(&min_amount_out.to_le_bytes());
            data.extend_from_slice(&amount_in.to_le_bytes());
        }

        let accounts = vec![
            AccountMeta::new_readonly(self.pool_id, false),
            AccountMeta::new(*user, true),
            AccountMeta::new_readonly(PUMP_GLOBAL_CONFIG, false),
            AccountMeta::new_readonly(self.base_mint, false),
            AccountMeta::new_readonly(self.quote_mint, false),
            AccountMeta::new(user_base_token_account, false),
            AccountMeta::new(user_quote_token_account, false),
            AccountMeta::new(self.pool_base_token_account, false),
            AccountMeta::new(self.pool_quote_token_account, false),
            AccountMeta::new_readonly(PUMP_PROTOCOL_FEE_RECIPIENT, false),
            AccountMeta::new(PUMP_PROTOCOL_FEE_RECIPIENT_TOKEN_ACCOUNT, false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::new_readonly(ATA_PROGRAM_ID, false),
            AccountMeta::new_readonly(Self::event_authority(), false),
            AccountMeta::new_readonly(PUMP_SWAP_PROGRAM_ID, false),
        ];

        Ok(vec![Instruction {
            program_id: PUMP_SWAP_PROGRAM_ID,
            accounts,
            data,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_product_quote() {
        let data = vec![0u8; PumpPool::span()];
        let mut pool = PumpPool::decode(&data).unwrap();
        pool.base_mint = Pubkey::new_unique();
        pool.quote_mint = Pubkey::new_unique();
        pool.base_reserve = 1_000_000_000;
        pool.quote_reserve = 200_000_000_000;

        let base_mint = pool.base_mint;
        let amount_in = 1_000_000_000u64;
        // after fee: 1e9 * 9975 / 10000 = 997_500_000
        let expected = 200_000_000_000u128 * 997_500_000 / (1_000_000_000 + 997_500_000);
        let out = pool.compute_amount_out(&base_mint, amount_in).unwrap();
        assert_eq!(out as u128, expected);
    }

    #[test]
    fn test_empty_reserves_rejected() {
        let data = vec![0u8; PumpPool::span()];
        let mut pool = PumpPool::decode(&data).unwrap();
        pool.base_mint = Pubkey::new_unique();
        pool.quote_mint = Pubkey::new_unique();
        let mint = pool.base_mint;
        assert!(pool.compute_amount_out(&mint, 1).is_err());
    }
}
