//! Raydium CPMM pool: anchor layout, config-driven fee, swap_base_input.

use async_trait::async_trait;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

use crate::errors::{DecodeError, DexResult, SwapError};
use crate::logger::{log, LogTag};
use crate::math::mul_div_floor;
use crate::pools::codec::Cursor;
use crate::pools::raydium::constants::{
    CPMM_AMM_CONFIG_TRADE_FEE_OFFSET, CPMM_AUTH_SEED, CPMM_POOL_SPAN,
    CPMM_SWAP_BASE_INPUT_DISCRIMINATOR, CPMM_TOKEN_0_MINT_OFFSET, CPMM_TOKEN_1_MINT_OFFSET,
    RAYDIUM_CPMM_PROGRAM_ID,
};
use crate::pools::{Pool, ProtocolKind};
use crate::rpc::{find_associated_token_address, SolClient};
use crate::utils::token_account_amount;

/// CPMM fees are parts-per-million of the input.
const CPMM_FEE_RATE_DENOMINATOR: u64 = 1_000_000;

#[derive(Debug, Clone)]
pub struct CpmmPool {
    pub amm_config: Pubkey,
    pub pool_creator: Pubkey,
    pub token_0_vault: Pubkey,
    pub token_1_vault: Pubkey,
    pub lp_mint: Pubkey,
    pub token_0_mint: Pubkey,
    pub token_1_mint: Pubkey,
    pub token_0_program: Pubkey,
    pub token_1_program: Pubkey,
    pub observation_key: Pubkey,
    pub auth_bump: u8,
    pub status: u8,
    pub lp_mint_decimals: u8,
    pub mint_0_decimals: u8,
    pub mint_1_decimals: u8,
    pub lp_supply: u64,
    pub protocol_fees_token_0: u64,
    pub protocol_fees_token_1: u64,
    pub fund_fees_token_0: u64,
    pub fund_fees_token_1: u64,
    pub open_time: u64,
    pub recent_epoch: u64,

    // Client-side state
    pub pool_id: Pubkey,
    pub trade_fee_rate: u64,
    pub reserve_0: u64,
    pub reserve_1: u64,
}

impl CpmmPool {
    pub fn span() -> usize {
        CPMM_POOL_SPAN
    }

    pub fn offset(field: &str) -> usize {
        match field {
            "token_0_mint" => CPMM_TOKEN_0_MINT_OFFSET,
            "token_1_mint" => CPMM_TOKEN_1_MINT_OFFSET,
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
            amm_config: cursor.pubkey("amm_config")?,
            pool_creator: cursor.pubkey("pool_creator")?,
            token_0_vault: cursor.pubkey("token_0_vault")?,
            token_1_vault: cursor.pubkey("token_1_vault")?,
            lp_mint: cursor.pubkey("lp_mint")?,
            token_0_mint: cursor.pubkey("token_0_mint")?,
            token_1_mint: cursor.pubkey("token_1_mint")?,
            token_0_program: cursor.pubkey("token_0_program")?,
            token_1_program: cursor.pubkey("token_1_program")?,
            observation_key: cursor.pubkey("observation_key")?,
            auth_bump: cursor.u8("auth_bump")?,
            status: cursor.u8("status")?,
            lp_mint_decimals: cursor.u8("lp_mint_decimals")?,
            mint_0_decimals: cursor.u8("mint_0_decimals")?,
            mint_1_decimals: cursor.u8("mint_1_decimals")?,
            lp_supply: cursor.u64("lp_supply")?,
            protocol_fees_token_0: cursor.u64("protocol_fees_token_0")?,
            protocol_fees_token_1: cursor.u64("protocol_fees_token_1")?,
            fund_fees_token_0: cursor.u64("fund_fees_token_0")?,
            fund_fees_token_1: cursor.u64("fund_fees_token_1")?,
            open_time: cursor.u64("open_time")?,
            recent_epoch: cursor.u64("recent_epoch")?,
            pool_id: Pubkey::default(),
            trade_fee_rate: 0,
            reserve_0: 0,
            reserve_1: 0,
        })
    }

    pub fn authority() -> Pubkey {
        Pubkey::find_program_address(&[CPMM_AUTH_SEED.as_bytes()], &RAYDIUM_CPMM_PROGRAM_ID).0
    }

    /// Read `trade_fee_rate` out of a raw AmmConfig account.
    pub fn decode_trade_fee_rate(config_data: &[u8]) -> Result<u64, DecodeError> {
        let end = CPMM_AMM_CONFIG_TRADE_FEE_OFFSET + 8;
        let bytes = config_data
            .get(CPMM_AMM_CONFIG_TRADE_FEE_OFFSET..end)
            .ok_or(DecodeError::Field {
                field: "trade_fee_rate",
                offset: CPMM_AMM_CONFIG_TRADE_FEE_OFFSET,
            })?;
        Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn contains_mint(&self, mint: &Pubkey) -> bool {
        mint == &self.token_0_mint || mint == &self.token_1_mint
    }

    /// Vault balances net of accrued protocol and fund fees.
    pub async fn refresh_reserves(&mut self, client: &SolClient) -> DexResult<()> {
        let accounts = client
            .get_multiple_accounts(&[self.token_0_vault, self.token_1_vault])
            .await?;
        let balance_0 = accounts
            .first()
            .and_then(|a| a.as_ref())
            .and_then(|a| token_account_amount(&a.data))
            .unwrap_or(0);
        let balance_1 = accounts
            .get(1)
            .and_then(|a| a.as_ref())
            .and_then(|a| token_account_amount(&a.data))
            .unwrap_or(0);
        self.reserve_0 = balance_0
            .saturating_sub(self.protocol_fees_token_0)
            .saturating_sub(self.fund_fees_token_0);
        self.reserve_1 = balance_1
            .saturating_sub(self.protocol_fees_token_1)
            .saturating_sub(self.fund_fees_token_1);
        Ok(())
    }

    pub fn compute_amount_out(&self, input_mint: &Pubkey, amount_in: u64) -> DexResult<u64> {
        let (reserve_in, reserve_out) = if input_mint == &self.token_0_mint {
            (self.reserve_0, self.reserve_1)
        } else {
            (self.reserve_1, self.reserve_0)
        };
        if reserve_in == 0 || reserve_out == 0 {
            return Err(SwapError::InsufficientLiquidity.into());
        }

        let amount_in_after_fee = mul_div_floor(
            amount_in as u128,
            (CPMM_FEE_RATE_DENOMINATOR - self.trade_fee_rate) as u128,
            CPMM_FEE_RATE_DENOMINATOR as u128,
        )?;
        let out = mul_div_floor(
            reserve_out as u128,
            amount_in_after_fee,
            reserve_in as u128 + amount_in_after_fee,
        )?;
        u64::try_from(out).map_err(|_| crate::errors::MathError::Overflow.into())
    }
}

#[async_trait]
impl Pool for CpmmPool {
    fn protocol_kind(&self) -> ProtocolKind {
        ProtocolKind::RaydiumCpmm
    }

    fn program_id(&self) -> Pubkey {
        RAYDIUM_CPMM_PROGRAM_ID
    }

    fn id(&self) -> Pubkey {
        self.pool_id
    }

    fn tokens(&self) -> (Pubkey, Pubkey) {
        (self.token_0_mint, self.token_1_mint)
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
        let zero_for_one = input_mint == &self.token_0_mint;
        let (output_mint, input_vault, output_vault, input_program, output_program) =
            if zero_for_one {
                (
                    self.token_1_mint,
                    self.token_0_vault,
                    self.token_1_vault,
                    self.token_0_program,
                    self.token_1_program,
                )
            } else {
                (
                    self.token_0_mint,
                    self.token_1_vault,
                    self.token_0_vault,
                    self.token_1_program,
                    self.token_0_program,
                )
            };

        let input_token_account = find_associated_token_address(user, input_mint);
        let output_token_account = find_associated_token_address(user, &output_mint);
        match client.get_account_optional(&output_token_account).await {
            Ok(Some(_)) => {}
            _ => log(
                LogTag::Swap,
                "WARN",
                &format!(
                    "output token account {} does not exist, create it before swapping",
                    output_token_account
                ),
            ),
        }

        let mut data = Vec::with_capacity(8 + 16);
        data.extend_from_slice(&CPMM_SWAP_BASE_INPUT_DISCRIMINATOR);
        data.extend_from_slice(&amount_in.to_le_bytes());
        data.extend_from_slice(&min_amount_out.to_le_bytes());

        let accounts = vec![
            AccountMeta::new_readonly(*user, true),
            AccountMeta::new_readonly(Self::authority(), false),
            AccountMeta::new_readonly(self.amm_config, false),
            AccountMeta::new(self.pool_id, false),
            AccountMeta::new(input_token_account, false),
            AccountMeta::new(output_token_account, false),
            AccountMeta::new(input_vault, false),
            AccountMeta::new(output_vault, false),
            AccountMeta::new_readonly(input_program, false),
            AccountMeta::new_readonly(output_program, false),
            AccountMeta::new_readonly(*input_mint, false),
            AccountMeta::new_readonly(output_mint, false),
            AccountMeta::new(self.observation_key, false),
        ];

        Ok(vec![Instruction {
            program_id: RAYDIUM_CPMM_PROGRAM_ID,
            accounts,
            data,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_fee_rate_offset() {
        let mut config = vec![0u8; 256];
        config[CPMM_AMM_CONFIG_TRADE_FEE_OFFSET..CPMM_AMM_CONFIG_TRADE_FEE_OFFSET + 8]
            .copy_from_slice(&2500u64.to_le_bytes());
        assert_eq!(CpmmPool::decode_trade_fee_rate(&config).unwrap(), 2500);
    }

    #[test]
    fn test_quote_with_ppm_fee() {
        let data = vec![0u8; CpmmPool::span()];
        let mut pool = CpmmPool::decode(&data).unwrap();
        pool.token_0_mint = Pubkey::new_unique();
        pool.token_1_mint = Pubkey::new_unique();
        pool.trade_fee_rate = 2500; // 0.25% in ppm
        pool.reserve_0 = 1_000_000_000;
        pool.reserve_1 = 200_000_000_000;

        let mint_0 = pool.token_0_mint;
        let out = pool.compute_amount_out(&mint_0, 1_000_000_000).unwrap();
        let after_fee = 1_000_000_000u128 * (1_000_000 - 2500) / 1_000_000;
        let expected = 200_000_000_000u128 * after_fee / (1_000_000_000u128 + after_fee);
        assert_eq!(out as u128, expected);
    }
}
