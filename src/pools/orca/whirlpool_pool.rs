//! Orca Whirlpool pool: state, health gating, quoting, SwapV2 building.

use std::collections::HashMap;

use async_trait::async_trait;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

use crate::constants::{MEMO_PROGRAM_ID, TOKEN_PROGRAM_ID};
use crate::errors::{DecodeError, DexResult, SwapError};
use crate::logger::{log, LogTag};
use crate::math::clmm::{
    get_sqrt_price_x64_from_tick, get_tick_from_sqrt_price_x64, swap_step_compute, MAX_TICK,
    MIN_SQRT_PRICE_X64, MIN_TICK,
};
use crate::pools::codec::Cursor;
use crate::pools::orca::constants::{
    LIQUIDITY_NET_SANITY_BOUND, MAX_HEALTHY_FEE_RATE, MAX_HEALTHY_TICK_SPACING,
    MAX_SQRT_PRICE_X64, ORCA_WHIRLPOOL_PROGRAM_ID, PROBLEMATIC_TICK_SPACINGS, SWAP_V2_DISCRIMINATOR,
    TOKEN_MINT_A_OFFSET, TOKEN_MINT_B_OFFSET, WHIRLPOOL_SPAN,
};
use crate::pools::orca::tick_array::{
    derive_oracle_pda, derive_swap_tick_array_pdas, WhirlpoolTickArray,
};
use crate::pools::{Pool, ProtocolKind};
use crate::rpc::{find_associated_token_address, SolClient};

const MAX_SWAP_LOOP: usize = 100;

#[derive(Debug, Clone, Copy, Default)]
pub struct WhirlpoolRewardInfo {
    pub mint: Pubkey,
    pub vault: Pubkey,
    pub authority: Pubkey,
    pub emissions_per_second_x64: u128,
    pub growth_global_x64: u128,
}

#[derive(Debug, Clone)]
pub struct WhirlpoolPool {
    pub whirlpools_config: Pubkey,
    pub whirlpool_bump: [u8; 1],
    pub tick_spacing: u16,
    pub fee_tier_index_seed: [u8; 2],
    pub fee_rate: u16,
    pub protocol_fee_rate: u16,
    pub liquidity: u128,
    pub sqrt_price: u128,
    pub tick_current_index: i32,
    pub protocol_fee_owed_a: u64,
    pub protocol_fee_owed_b: u64,
    pub token_mint_a: Pubkey,
    pub token_vault_a: Pubkey,
    pub fee_growth_global_a: u128,
    pub token_mint_b: Pubkey,
    pub token_vault_b: Pubkey,
    pub fee_growth_global_b: u128,
    pub reward_last_updated_timestamp: u64,
    pub reward_infos: [WhirlpoolRewardInfo; 3],

    // Client-side state
    pub pool_id: Pubkey,
    pub tick_array_cache: HashMap<i32, WhirlpoolTickArray>,
}

impl WhirlpoolPool {
    pub fn span() -> usize {
        WHIRLPOOL_SPAN
    }

    pub fn offset(field: &str) -> usize {
        match field {
            "token_mint_a" => TOKEN_MINT_A_OFFSET,
            "token_mint_b" => TOKEN_MINT_B_OFFSET,
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
        let whirlpools_config = cursor.pubkey("whirlpools_config")?;
        let whirlpool_bump = [cursor.u8("whirlpool_bump")?];
        let tick_spacing = cursor.u16("tick_spacing")?;
        let fee_tier_index_seed = {
            let a = cursor.u8("fee_tier_index_seed")?;
            let b = cursor.u8("fee_tier_index_seed")?;
            [a, b]
        };
        let fee_rate = cursor.u16("fee_rate")?;
        let protocol_fee_rate = cursor.u16("protocol_fee_rate")?;
        let liquidity = cursor.u128("liquidity")?;
        let sqrt_price = cursor.u128("sqrt_price")?;
        let tick_current_index = cursor.i32("tick_current_index")?;
        let protocol_fee_owed_a = cursor.u64("protocol_fee_owed_a")?;
        let protocol_fee_owed_b = cursor.u64("protocol_fee_owed_b")?;
        let token_mint_a = cursor.pubkey("token_mint_a")?;
        let token_vault_a = cursor.pubkey("token_vault_a")?;
        let fee_growth_global_a = cursor.u128("fee_growth_global_a")?;
        let token_mint_b = cursor.pubkey("token_mint_b")?;
        let token_vault_b = cursor.pubkey("token_vault_b")?;
        let fee_growth_global_b = cursor.u128("fee_growth_global_b")?;
        let reward_last_updated_timestamp = cursor.u64("reward_last_updated_timestamp")?;
        let mut reward_infos = [WhirlpoolRewardInfo::default(); 3];
        for info in reward_infos.iter_mut() {
            info.mint = cursor.pubkey("reward_mint")?;
            info.vault = cursor.pubkey("reward_vault")?;
            info.authority = cursor.pubkey("reward_authority")?;
            info.emissions_per_second_x64 = cursor.u128("reward_emissions_per_second_x64")?;
            info.growth_global_x64 = cursor.u128("reward_growth_global_x64")?;
        }

        Ok(Self {
            whirlpools_config,
            whirlpool_bump,
            tick_spacing,
            fee_tier_index_seed,
            fee_rate,
            protocol_fee_rate,
            liquidity,
            sqrt_price,
            tick_current_index,
            protocol_fee_owed_a,
            protocol_fee_owed_b,
            token_mint_a,
            token_vault_a,
            fee_growth_global_a,
            token_mint_b,
            token_vault_b,
            fee_growth_global_b,
            reward_last_updated_timestamp,
            reward_infos,
            pool_id: Pubkey::default(),
            tick_array_cache: HashMap::new(),
        })
    }

    /// Basic state validation; failing pools are skipped by the router.
    pub fn validate_pool_state(&self) -> Result<(), SwapError> {
        if self.liquidity == 0 {
            return Err(SwapError::PoolNotQuotable("zero liquidity".to_string()));
        }
        if self.sqrt_price == 0 {
            return Err(SwapError::PoolNotQuotable("zero sqrt price".to_string()));
        }
        if self.tick_spacing == 0 {
            return Err(SwapError::PoolNotQuotable("zero tick spacing".to_string()));
        }
        if self.token_mint_a == Pubkey::default() || self.token_mint_b == Pubkey::default() {
            return Err(SwapError::PoolNotQuotable("zero token mint".to_string()));
        }
        Ok(())
    }

    /// Advisory health gating: trades coverage for reliability.
    pub fn is_healthy(&self) -> Result<(), SwapError> {
        if self.tick_spacing > MAX_HEALTHY_TICK_SPACING {
            return Err(SwapError::PoolNotQuotable(format!(
                "tick spacing too large: {}",
                self.tick_spacing
            )));
        }
        if PROBLEMATIC_TICK_SPACINGS.contains(&self.tick_spacing) {
            return Err(SwapError::PoolNotQuotable(format!(
                "known problematic tick spacing: {}",
                self.tick_spacing
            )));
        }
        if self.fee_rate > MAX_HEALTHY_FEE_RATE {
            return Err(SwapError::PoolNotQuotable(format!(
                "fee rate too high: {}",
                self.fee_rate
            )));
        }
        self.validate_pool_state()?;
        for array in self.tick_array_cache.values() {
            if array
                .ticks
                .iter()
                .any(|t| t.liquidity_net.abs() > LIQUIDITY_NET_SANITY_BOUND)
            {
                return Err(SwapError::PoolNotQuotable(
                    "abnormal tick array liquidity".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn contains_mint(&self, mint: &Pubkey) -> bool {
        mint == &self.token_mint_a || mint == &self.token_mint_b
    }

    /// Fetch the tick arrays both swap directions may touch into the cache.
    async fn update_tick_arrays(&mut self, client: &SolClient) -> DexResult<()> {
        for a_to_b in [true, false] {
            let pdas = match derive_swap_tick_array_pdas(
                &self.pool_id,
                self.tick_current_index,
                self.tick_spacing,
                a_to_b,
            ) {
                Ok(pdas) => pdas,
                Err(_) => continue,
            };
            let addresses: Vec<Pubkey> =
                pdas.iter().copied().filter(|p| *p != Pubkey::default()).collect();
            let accounts = client.get_multiple_accounts(&addresses).await?;
            for account in accounts.into_iter().flatten() {
                match WhirlpoolTickArray::decode(&account.data) {
                    Ok(array) => {
                        self.tick_array_cache.insert(array.start_tick_index, array);
                    }
                    Err(err) => {
                        log(
                            LogTag::Pool,
                            "WARN",
                            &format!("whirlpool {}: bad tick array: {}", self.pool_id, err),
                        );
                    }
                }
            }
        }
        Ok(())
    }

    /// Exact-input multi-step swap simulation over the cached tick arrays.
    ///
    /// Tick arrays are consecutive by construction; running off the cached
    /// sequence is insufficient liquidity.
    pub fn swap_compute(&self, a_to_b: bool, amount_in: u64) -> DexResult<u64> {
        if amount_in == 0 {
            return Err(SwapError::InvalidInput("amount_in").into());
        }

        let price_limit = if a_to_b {
            MIN_SQRT_PRICE_X64 + 1
        } else {
            MAX_SQRT_PRICE_X64 - 1
        };

        let tick_count = WhirlpoolTickArray::tick_count(self.tick_spacing);
        let first_start = WhirlpoolTickArray::start_index(self.tick_current_index, self.tick_spacing);
        let mut current_array = self.tick_array_cache.get(&first_start).ok_or_else(|| {
            SwapError::PoolNotQuotable(format!("tick array {} not cached", first_start))
        })?;
        let mut current_start = first_start;

        let mut tick = self.tick_current_index;
        let mut remaining = amount_in as u128;
        let mut calculated: u128 = 0;
        let mut sqrt_price = self.sqrt_price;
        let mut liquidity = self.liquidity;
        let mut include_start = !a_to_b && current_array.start_tick_index == tick;

        let mut loops = 0usize;
        while remaining > 0 && sqrt_price != price_limit {
            loops += 1;
            if loops > MAX_SWAP_LOOP {
                return Err(SwapError::ComputationDiverged.into());
            }

            let next_tick_state = match current_array.next_initialized_tick(
                tick,
                self.tick_spacing,
                a_to_b,
                include_start,
            ) {
                Some(state) => state,
                None => {
                    let next_start = if a_to_b {
                        current_start - tick_count
                    } else {
                        current_start + tick_count
                    };
                    current_array = self.tick_array_cache.get(&next_start).ok_or(
                        SwapError::InsufficientLiquidity,
                    )?;
                    current_start = next_start;
                    match current_array.first_initialized_tick(a_to_b) {
                        Some(state) => state,
                        // Empty middle array: hop the cursor across it; the
                        // next step's target will span the empty range
                        None => {
                            if a_to_b {
                                tick = next_start + tick_count - 1;
                                include_start = false;
                            } else {
                                tick = next_start;
                                include_start = true;
                            }
                            continue;
                        }
                    }
                }
            };

            let initialized = next_tick_state.is_initialized();
            let liquidity_net = next_tick_state.liquidity_net;
            let tick_next = next_tick_state.tick.clamp(MIN_TICK, MAX_TICK);
            let sqrt_price_next = get_sqrt_price_x64_from_tick(tick_next)?;

            let target = if (a_to_b && sqrt_price_next < price_limit)
                || (!a_to_b && sqrt_price_next > price_limit)
            {
                price_limit
            } else {
                sqrt_price_next
            };

            let sqrt_price_start = sqrt_price;
            let step = swap_step_compute(
                sqrt_price,
                target,
                liquidity,
                remaining,
                self.fee_rate as u32,
                a_to_b,
            )?;
            sqrt_price = step.sqrt_price_next_x64;
            remaining = remaining
                .checked_sub(step.amount_in + step.fee_amount)
                .unwrap_or(0);
            calculated = calculated
                .checked_add(step.amount_out)
                .ok_or(crate::errors::MathError::Overflow)?;

            if sqrt_price == sqrt_price_next {
                if initialized {
                    let signed_net = if a_to_b {
                        -(liquidity_net as i128)
                    } else {
                        liquidity_net as i128
                    };
                    liquidity = if signed_net >= 0 {
                        liquidity
                            .checked_add(signed_net as u128)
                            .ok_or(crate::errors::MathError::Overflow)?
                    } else {
                        liquidity
                            .checked_sub(signed_net.unsigned_abs())
                            .ok_or(SwapError::InsufficientLiquidity)?
                    };
                }
                include_start =
                    tick_next != tick && !a_to_b && current_array.start_tick_index == tick_next;
                tick = if a_to_b { tick_next - 1 } else { tick_next };
            } else if sqrt_price != sqrt_price_start {
                let new_tick = get_tick_from_sqrt_price_x64(sqrt_price)?;
                include_start =
                    new_tick != tick && !a_to_b && current_array.start_tick_index == new_tick;
                tick = new_tick;
            }
        }

        u64::try_from(calculated).map_err(|_| crate::errors::MathError::Overflow.into())
    }
}

#[async_trait]
impl Pool for WhirlpoolPool {
    fn protocol_kind(&self) -> ProtocolKind {
        ProtocolKind::OrcaWhirlpool
    }

    fn program_id(&self) -> Pubkey {
        ORCA_WHIRLPOOL_PROGRAM_ID
    }

    fn id(&self) -> Pubkey {
        self.pool_id
    }

    fn tokens(&self) -> (Pubkey, Pubkey) {
        (self.token_mint_a, self.token_mint_b)
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
        if amount_in as u128 > 1_000_000_000_000_000_000 {
            return Err(SwapError::InvalidInput("amount_in too large").into());
        }
        if !self.contains_mint(input_mint) {
            return Err(SwapError::InvalidInput("input_mint").into());
        }
        self.validate_pool_state().map_err(crate::errors::DexError::Swap)?;

        self.update_tick_arrays(client).await?;
        self.is_healthy().map_err(crate::errors::DexError::Swap)?;

        let a_to_b = input_mint == &self.token_mint_a;
        self.swap_compute(a_to_b, amount_in)
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
        let a_to_b = input_mint == &self.token_mint_a;

        // User token accounts stay in A/B order regardless of direction
        let user_token_account_a = find_associated_token_address(user, &self.token_mint_a);
        let user_token_account_b = find_associated_token_address(user, &self.token_mint_b);
        let output_account = if a_to_b { user_token_account_b } else { user_token_account_a };
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

        // Exact protocol bounds, per the official swap sequencing
        let sqrt_price_limit: u128 = if a_to_b { MIN_SQRT_PRICE_X64 } else { MAX_SQRT_PRICE_X64 };

        let [tick_array_0, tick_array_1, tick_array_2] = derive_swap_tick_array_pdas(
            &self.pool_id,
            self.tick_current_index,
            self.tick_spacing,
            a_to_b,
        )?;
        let oracle = derive_oracle_pda(&self.pool_id);

        let mut data = Vec::with_capacity(8 + 8 + 8 + 16 + 3);
        data.extend_from_slice(&SWAP_V2_DISCRIMINATOR);
        data.extend_from_slice(&amount_in.to_le_bytes());
        data.extend_from_slice(&min_amount_out.to_le_bytes());
        // sqrt_price_limit u128, lo then hi
        data.extend_from_slice(&(sqrt_price_limit as u64).to_le_bytes());
        data.extend_from_slice(&((sqrt_price_limit >> 64) as u64).to_le_bytes());
        data.push(1); // amount_specified_is_input
        data.push(u8::from(a_to_b));
        data.push(0); // remaining_accounts_info: None

        let accounts = vec![
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            AccountMeta::new_readonly(MEMO_PROGRAM_ID, false),
            AccountMeta::new_readonly(*user, true),
            AccountMeta::new(self.pool_id, false),
            AccountMeta::new_readonly(self.token_mint_a, false),
            AccountMeta::new_readonly(self.token_mint_b, false),
            AccountMeta::new(user_token_account_a, false),
            AccountMeta::new(self.token_vault_a, false),
            AccountMeta::new(user_token_account_b, false),
            AccountMeta::new(self.token_vault_b, false),
            AccountMeta::new(tick_array_0, false),
            AccountMeta::new(tick_array_1, false),
            AccountMeta::new(tick_array_2, false),
            AccountMeta::new(oracle, false),
        ];

        Ok(vec![Instruction {
            program_id: ORCA_WHIRLPOOL_PROGRAM_ID,
            accounts,
            data,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pools::orca::tick_array::WhirlpoolTickState;

    fn synthetic_pool(tick_current: i32, liquidity: u128) -> WhirlpoolPool {
        let mut data = vec![0u8; WhirlpoolPool::span()];
        data[..8]
            .copy_from_slice(&crate::pools::orca::constants::WHIRLPOOL_DISCRIMINATOR);
        let mut pool = WhirlpoolPool::decode(&data).unwrap();
        pool.pool_id = Pubkey::new_unique();
        pool.token_mint_a = Pubkey::new_unique();
        pool.token_mint_b = Pubkey::new_unique();
        pool.tick_spacing = 1;
        pool.tick_current_index = tick_current;
        pool.sqrt_price = get_sqrt_price_x64_from_tick(tick_current).unwrap();
        pool.liquidity = liquidity;
        pool.fee_rate = 3000;
        pool
    }

    fn insert_array(pool: &mut WhirlpoolPool, start: i32, initialized: &[(i32, i64)]) {
        let spacing = pool.tick_spacing as i32;
        let mut ticks = Vec::new();
        for i in 0..crate::pools::orca::constants::TICK_ARRAY_SIZE {
            let tick = start + i * spacing;
            let mut state = WhirlpoolTickState {
                tick,
                ..WhirlpoolTickState::default()
            };
            if let Some((_, net)) = initialized.iter().find(|(t, _)| *t == tick) {
                state.liquidity_gross = 1;
                state.liquidity_net = *net;
            }
            ticks.push(state);
        }
        pool.tick_array_cache.insert(
            start,
            WhirlpoolTickArray {
                pool_id: pool.pool_id,
                start_tick_index: start,
                ticks,
                initialized_tick_count: initialized.len() as u8,
            },
        );
    }

    #[test]
    fn test_swap_compute_full_loop() {
        let mut pool = synthetic_pool(0, 1_000_000_000_000_000);
        insert_array(&mut pool, 0, &[(50, 1_000_000)]);
        insert_array(&mut pool, -88, &[(-50, 1_000_000)]);

        let out_down = pool.swap_compute(true, 1_000_000).unwrap();
        assert!(out_down > 0);
        let out_up = pool.swap_compute(false, 1_000_000).unwrap();
        assert!(out_up > 0);
    }

    #[test]
    fn test_health_gating() {
        let mut pool = synthetic_pool(0, 1);
        pool.tick_spacing = 128;
        assert!(pool.is_healthy().is_err());
        pool.tick_spacing = 64;
        assert!(pool.is_healthy().is_ok());
        pool.fee_rate = 30001;
        assert!(pool.is_healthy().is_err());
        pool.fee_rate = 3000;
        pool.liquidity = 0;
        assert!(pool.is_healthy().is_err());
    }

    #[test]
    fn test_missing_next_array_is_insufficient_liquidity() {
        let mut pool = synthetic_pool(0, 1_000_000);
        insert_array(&mut pool, 0, &[]);
        // Huge input runs off the cached arrays going down
        let err = pool.swap_compute(true, u64::MAX).unwrap_err();
        assert!(matches!(
            err,
            crate::errors::DexError::Swap(SwapError::InsufficientLiquidity)
        ));
    }
}
