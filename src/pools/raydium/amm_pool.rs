//! Raydium AMM v4 pool: fixed-offset layout, vault-backed reserves, legacy
//! swap_base_in instruction with the serum market legs.

use async_trait::async_trait;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

use crate::constants::TOKEN_PROGRAM_ID;
use crate::errors::{DecodeError, DexResult, SwapError};
use crate::logger::{log, LogTag};
use crate::math::mul_div_floor;
use crate::pools::codec::Cursor;
use crate::pools::raydium::constants::{
    AMM_V4_COIN_MINT_OFFSET, AMM_V4_PC_MINT_OFFSET, AMM_V4_SPAN, AMM_V4_SWAP_BASE_IN_TAG,
    RAYDIUM_AMM_AUTHORITY, RAYDIUM_AMM_PROGRAM_ID,
};
use crate::pools::{Pool, ProtocolKind};
use crate::rpc::{find_associated_token_address, SolClient};
use crate::utils::token_account_amount;

/// Serum market accounts required by the v4 swap instruction.
#[derive(Debug, Clone, Copy)]
pub struct MarketAccounts {
    pub bids: Pubkey,
    pub asks: Pubkey,
    pub event_queue: Pubkey,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub vault_signer: Pubkey,
}

#[derive(Debug, Clone)]
pub struct AmmPool {
    pub status: u64,
    pub nonce: u64,
    pub coin_decimals: u64,
    pub pc_decimals: u64,
    pub swap_fee_numerator: u64,
    pub swap_fee_denominator: u64,
    pub base_need_take_pnl: u64,
    pub quote_need_take_pnl: u64,
    pub coin_vault: Pubkey,
    pub pc_vault: Pubkey,
    pub coin_mint: Pubkey,
    pub pc_mint: Pubkey,
    pub lp_mint: Pubkey,
    pub open_orders: Pubkey,
    pub market: Pubkey,
    pub market_program: Pubkey,
    pub target_orders: Pubkey,
    pub withdraw_queue: Pubkey,
    pub lp_vault: Pubkey,
    pub amm_owner: Pubkey,

    // Client-side state
    pub pool_id: Pubkey,
    pub base_reserve: u64,
    pub quote_reserve: u64,
}

impl AmmPool {
    pub fn span() -> usize {
        AMM_V4_SPAN
    }

    pub fn offset(field: &str) -> usize {
        match field {
            "coin_mint" => AMM_V4_COIN_MINT_OFFSET,
            "pc_mint" => AMM_V4_PC_MINT_OFFSET,
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
        // No discriminator: the v4 layout starts at offset zero
        let mut cursor = Cursor::new(data);
        let status = cursor.u64("status")?;
        let nonce = cursor.u64("nonce")?;
        cursor.skip("max_order", 8)?;
        cursor.skip("depth", 8)?;
        let coin_decimals = cursor.u64("coin_decimals")?;
        let pc_decimals = cursor.u64("pc_decimals")?;
        cursor.skip("state", 8)?;
        cursor.skip("reset_flag", 8)?;
        cursor.skip("min_size", 8)?;
        cursor.skip("vol_max_cut_ratio", 8)?;
        cursor.skip("amount_wave_ratio", 8)?;
        cursor.skip("base_lot_size", 8)?;
        cursor.skip("quote_lot_size", 8)?;
        cursor.skip("min_price_multiplier", 8)?;
        cursor.skip("max_price_multiplier", 8)?;
        cursor.skip("system_decimal_value", 8)?;
        cursor.skip("min_separate_numerator", 8)?;
        cursor.skip("min_separate_denominator", 8)?;
        cursor.skip("trade_fee_numerator", 8)?;
        cursor.skip("trade_fee_denominator", 8)?;
        cursor.skip("pnl_numerator", 8)?;
        cursor.skip("pnl_denominator", 8)?;
        let swap_fee_numerator = cursor.u64("swap_fee_numerator")?;
        let swap_fee_denominator = cursor.u64("swap_fee_denominator")?;
        let base_need_take_pnl = cursor.u64("base_need_take_pnl")?;
        let quote_need_take_pnl = cursor.u64("quote_need_take_pnl")?;
        cursor.skip("quote_total_pnl", 8)?;
        cursor.skip("base_total_pnl", 8)?;
        cursor.skip("pool_open_time", 8)?;
        cursor.skip("punish_pc_amount", 8)?;
        cursor.skip("punish_coin_amount", 8)?;
        cursor.skip("orderbook_to_init_time", 8)?;
        cursor.skip("swap_base_in_amount", 16)?;
        cursor.skip("swap_quote_out_amount", 16)?;
        cursor.skip("swap_base2_quote_fee", 8)?;
        cursor.skip("swap_quote_in_amount", 16)?;
        cursor.skip("swap_base_out_amount", 16)?;
        cursor.skip("swap_quote2_base_fee", 8)?;
        let coin_vault = cursor.pubkey("coin_vault")?;
        let pc_vault = cursor.pubkey("pc_vault")?;
        let coin_mint = cursor.pubkey("coin_mint")?;
        let pc_mint = cursor.pubkey("pc_mint")?;
        let lp_mint = cursor.pubkey("lp_mint")?;
        let open_orders = cursor.pubkey("open_orders")?;
        let market = cursor.pubkey("market")?;
        let market_program = cursor.pubkey("market_program")?;
        let target_orders = cursor.pubkey("target_orders")?;
        let withdraw_queue = cursor.pubkey("withdraw_queue")?;
        let lp_vault = cursor.pubkey("lp_vault")?;
        let amm_owner = cursor.pubkey("amm_owner")?;

        Ok(Self {
            status,
            nonce,
            coin_decimals,
            pc_decimals,
            swap_fee_numerator,
            swap_fee_denominator,
            base_need_take_pnl,
            quote_need_take_pnl,
            coin_vault,
            pc_vault,
            coin_mint,
            pc_mint,
            lp_mint,
            open_orders,
            market,
            market_program,
            target_orders,
            withdraw_queue,
            lp_vault,
            amm_owner,
            pool_id: Pubkey::default(),
            base_reserve: 0,
            quote_reserve: 0,
        })
    }

    fn contains_mint(&self, mint: &Pubkey) -> bool {
        mint == &self.coin_mint || mint == &self.pc_mint
    }

    /// Refresh reserves from vault balances, net of pending pnl takes.
    pub async fn refresh_reserves(&mut self, client: &SolClient) -> DexResult<()> {
        let accounts = client
            .get_multiple_accounts(&[self.coin_vault, self.pc_vault])
            .await?;
        let coin_balance = accounts
            .first()
            .and_then(|a| a.as_ref())
            .and_then(|a| token_account_amount(&a.data))
            .unwrap_or(0);
        let pc_balance = accounts
            .get(1)
            .and_then(|a| a.as_ref())
            .and_then(|a| token_account_amount(&a.data))
            .unwrap_or(0);
        self.base_reserve = coin_balance.saturating_sub(self.base_need_take_pnl);
        self.quote_reserve = pc_balance.saturating_sub(self.quote_need_take_pnl);
        Ok(())
    }

    /// Classic x*y=k with the pool's fee numerator/denominator.
    pub fn compute_amount_out(&self, input_mint: &Pubkey, amount_in: u64) -> DexResult<u64> {
        let (reserve_in, reserve_out) = if input_mint == &self.coin_mint {
            (self.base_reserve, self.quote_reserve)
        } else {
            (self.quote_reserve, self.base_reserve)
        };
        if reserve_in == 0 || reserve_out == 0 {
            return Err(SwapError::InsufficientLiquidity.into());
        }
        let (numerator, denominator) = if self.swap_fee_denominator == 0 {
            (
                crate::pools::raydium::constants::LIQUIDITY_FEES_NUMERATOR,
                crate::pools::raydium::constants::LIQUIDITY_FEES_DENOMINATOR,
            )
        } else {
            (self.swap_fee_numerator, self.swap_fee_denominator)
        };

        let amount_in_after_fee = mul_div_floor(
            amount_in as u128,
            (denominator - numerator) as u128,
            denominator as u128,
        )?;
        let out = mul_div_floor(
            reserve_out as u128,
            amount_in_after_fee,
            reserve_in as u128 + amount_in_after_fee,
        )?;
        u64::try_from(out).map_err(|_| crate::errors::MathError::Overflow.into())
    }

    /// Serum market side accounts needed by the swap instruction.
    pub async fn fetch_market_accounts(&self, client: &SolClient) -> DexResult<MarketAccounts> {
        let account = client.get_account(&self.market).await?;
        let data = &account.data;
        // Serum layouts carry a 5-byte "serum" prefix
        if data.len() < 388 {
            return Err(DecodeError::TooShort {
                need: 388,
                have: data.len(),
            }
            .into());
        }
        let read_pubkey = |offset: usize| -> Pubkey {
            let bytes: [u8; 32] = data[offset..offset + 32].try_into().unwrap();
            Pubkey::new_from_array(bytes)
        };
        let vault_signer_nonce = u64::from_le_bytes(data[45..53].try_into().unwrap());
        let base_vault = read_pubkey(117);
        let quote_vault = read_pubkey(165);
        let event_queue = read_pubkey(253);
        let bids = read_pubkey(285);
        let asks = read_pubkey(317);

        let vault_signer = Pubkey::create_program_address(
            &[self.market.as_ref(), &vault_signer_nonce.to_le_bytes()],
            &self.market_program,
        )
        .map_err(|_| DecodeError::Field {
            field: "vault_signer_nonce",
            offset: 45,
        })?;

        Ok(MarketAccounts {
            bids,
            asks,
            event_queue,
            base_vault,
            quote_vault,
            vault_signer,
        })
    }
}

#[async_trait]
impl Pool for AmmPool {
    fn protocol_kind(&self) -> ProtocolKind {
        ProtocolKind::RaydiumAmm
    }

    fn program_id(&self) -> Pubkey {
        RAYDIUM_AMM_PROGRAM_ID
    }

    fn id(&self) -> Pubkey {
        self.pool_id
    }

    fn tokens(&self) -> (Pubkey, Pubkey) {
        (self.coin_mint, self.pc_mint)
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
        let output_mint = if input_mint == &self.coin_mint {
            self.pc_mint
        } else {
            self.coin_mint
        };

        let user_source = find_associated_token_address(user, input_mint);
        let user_destination = find_associated_token_address(user, &output_mint);
        match client.get_account_optional(&user_destination).await {
            Ok(Some(_)) => {}
            _ => log(
                LogTag::Swap,
                "WARN",
                &format!(
                    "output token account {} does not exist, create it before swapping",
                    user_destination
                ),
            ),
        }

        let market = self.fetch_market_accounts(client).await?;

        let mut data = Vec::with_capacity(1 + 8 + 8);
        data.push(AMM_V4_SWAP_BASE_IN_TAG);
        data.extend_from_slice(&amount_in.to_le_bytes());
        data.extend_from_slice(&min_amount_out.to_le_bytes());

        let accounts = vec![
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            AccountMeta::new(self.pool_id, false),
            AccountMeta::new_readonly(RAYDIUM_AMM_AUTHORITY, false),
            AccountMeta::new(self.open_orders, false),
            AccountMeta::new(self.coin_vault, false),
            AccountMeta::new(self.pc_vault, false),
            AccountMeta::new_readonly(self.market_program, false),
            AccountMeta::new(self.market, false),
            AccountMeta::new(market.bids, false),
            AccountMeta::new(market.asks, false),
            AccountMeta::new(market.event_queue, false),
            AccountMeta::new(market.base_vault, false),
            AccountMeta::new(market.quote_vault, false),
            AccountMeta::new_readonly(market.vault_signer, false),
            AccountMeta::new(user_source, false),
            AccountMeta::new(user_destination, false),
            AccountMeta::new_readonly(*user, true),
        ];

        Ok(vec![Instruction {
            program_id: RAYDIUM_AMM_PROGRAM_ID,
            accounts,
            data,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_pool() -> AmmPool {
        let mut data = vec![0u8; AmmPool::span()];
        // swap fee 25/10000 at offsets 176/184
        data[176..184].copy_from_slice(&25u64.to_le_bytes());
        data[184..192].copy_from_slice(&10000u64.to_le_bytes());
        let coin_mint = Pubkey::new_unique();
        let pc_mint = Pubkey::new_unique();
        data[AMM_V4_COIN_MINT_OFFSET..AMM_V4_COIN_MINT_OFFSET + 32]
            .copy_from_slice(coin_mint.as_ref());
        data[AMM_V4_PC_MINT_OFFSET..AMM_V4_PC_MINT_OFFSET + 32].copy_from_slice(pc_mint.as_ref());
        AmmPool::decode(&data).unwrap()
    }

    #[test]
    fn test_decode_reads_fee_and_mints_at_fixed_offsets() {
        let pool = synthetic_pool();
        assert_eq!(pool.swap_fee_numerator, 25);
        assert_eq!(pool.swap_fee_denominator, 10000);
        assert_ne!(pool.coin_mint, Pubkey::default());
        assert_ne!(pool.pc_mint, Pubkey::default());
    }

    #[test]
    fn test_expected_constant_product_value() {
        let mut pool = synthetic_pool();
        pool.base_reserve = 1_000_000_000;
        pool.quote_reserve = 200_000_000_000;
        let coin = pool.coin_mint;

        let out = pool.compute_amount_out(&coin, 1_000_000_000).unwrap();
        let expected = 200_000_000_000u128 * 997_500_000 / (1_000_000_000u128 + 997_500_000);
        assert_eq!(out as u128, expected);
    }

    #[test]
    fn test_reserve_orientation_by_mint() {
        let mut pool = synthetic_pool();
        pool.base_reserve = 10_000;
        pool.quote_reserve = 40_000;
        let coin = pool.coin_mint;
        let pc = pool.pc_mint;
        let out_coin_in = pool.compute_amount_out(&coin, 1_000).unwrap();
        let out_pc_in = pool.compute_amount_out(&pc, 1_000).unwrap();
        // Selling the scarcer side yields more output than the reverse
        assert!(out_coin_in > out_pc_in);
    }
}
