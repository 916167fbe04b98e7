//! Meteora DLMM pair: state, bin-by-bin quoting, swap2 building.

use std::collections::HashMap;

use async_trait::async_trait;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

use crate::constants::{MEMO_PROGRAM_ID, TOKEN_PROGRAM_ID};
use crate::errors::{DecodeError, DexResult, SwapError};
use crate::logger::{log, LogTag};
use crate::pools::codec::Cursor;
use crate::pools::meteora::bin::Bin;
use crate::pools::meteora::bin_array::BinArray;
use crate::pools::meteora::bitmap_extension::{
    next_bin_array_index_with_liquidity, BinArrayBitmapExtension,
};
use crate::pools::meteora::constants::{
    LB_PAIR_SPAN, MAX_BIN_ID, METEORA_DLMM_PROGRAM_ID, MIN_BIN_ID, PAIR_STATUS_ENABLED,
    SWAP2_DISCRIMINATOR, TOKEN_X_MINT_OFFSET, TOKEN_Y_MINT_OFFSET,
};
use crate::pools::meteora::math::{
    bin_array_lower_upper_bin_id, bin_id_to_bin_array_index, compute_fee, compute_fee_from_amount,
    derive_bin_array_pda, derive_bitmap_extension_pda, derive_event_authority_pda, FeeParameters,
};
use crate::pools::{Pool, ProtocolKind};
use crate::rpc::{find_associated_token_address, SolClient};

/// Hard cap on bins visited per quote.
const MAX_BIN_TRAVERSAL: usize = 512;

/// Bin arrays fetched ahead of the active one for a quote.
const BIN_ARRAY_PREFETCH: usize = 3;

#[derive(Debug, Clone, Copy, Default)]
pub struct StaticParameters {
    pub base_factor: u16,
    pub filter_period: u16,
    pub decay_period: u16,
    pub reduction_factor: u16,
    pub variable_fee_control: u32,
    pub max_volatility_accumulator: u32,
    pub min_bin_id: i32,
    pub max_bin_id: i32,
    pub protocol_share: u16,
    pub base_fee_power_factor: u8,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VariableParameters {
    pub volatility_accumulator: u32,
    pub volatility_reference: u32,
    pub index_reference: i32,
    pub last_update_timestamp: i64,
}

#[derive(Debug, Clone)]
pub struct DlmmPool {
    pub parameters: StaticParameters,
    pub v_parameters: VariableParameters,
    pub bump_seed: u8,
    pub bin_step_seed: [u8; 2],
    pub pair_type: u8,
    pub active_id: i32,
    pub bin_step: u16,
    pub status: u8,
    pub activation_type: u8,
    pub token_x_mint: Pubkey,
    pub token_y_mint: Pubkey,
    pub reserve_x: Pubkey,
    pub reserve_y: Pubkey,
    pub protocol_fee_x: u64,
    pub protocol_fee_y: u64,
    pub oracle: Pubkey,
    pub bin_array_bitmap: [u64; 16],
    pub last_updated_at: i64,

    // Client-side state
    pub pool_id: Pubkey,
    pub bitmap_extension_key: Pubkey,
    pub bitmap_extension: Option<BinArrayBitmapExtension>,
    pub bin_array_cache: HashMap<i64, BinArray>,
}

impl DlmmPool {
    pub fn span() -> usize {
        LB_PAIR_SPAN
    }

    pub fn offset(field: &str) -> usize {
        match field {
            "token_x_mint" => TOKEN_X_MINT_OFFSET,
            "token_y_mint" => TOKEN_Y_MINT_OFFSET,
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

        let parameters = StaticParameters {
            base_factor: cursor.u16("base_factor")?,
            filter_period: cursor.u16("filter_period")?,
            decay_period: cursor.u16("decay_period")?,
            reduction_factor: cursor.u16("reduction_factor")?,
            variable_fee_control: cursor.u32("variable_fee_control")?,
            max_volatility_accumulator: cursor.u32("max_volatility_accumulator")?,
            min_bin_id: cursor.i32("min_bin_id")?,
            max_bin_id: cursor.i32("max_bin_id")?,
            protocol_share: cursor.u16("protocol_share")?,
            base_fee_power_factor: cursor.u8("base_fee_power_factor")?,
        };
        cursor.skip("static_padding", 5)?;

        let v_parameters = VariableParameters {
            volatility_accumulator: cursor.u32("volatility_accumulator")?,
            volatility_reference: cursor.u32("volatility_reference")?,
            index_reference: cursor.i32("index_reference")?,
            last_update_timestamp: {
                cursor.skip("variable_padding", 4)?;
                cursor.i64("last_update_timestamp")?
            },
        };
        cursor.skip("variable_padding_1", 8)?;

        let bump_seed = cursor.u8("bump_seed")?;
        let bin_step_seed = {
            let a = cursor.u8("bin_step_seed")?;
            let b = cursor.u8("bin_step_seed")?;
            [a, b]
        };
        let pair_type = cursor.u8("pair_type")?;
        let active_id = cursor.i32("active_id")?;
        let bin_step = cursor.u16("bin_step")?;
        let status = cursor.u8("status")?;
        cursor.skip("require_base_factor_seed", 1)?;
        cursor.skip("base_factor_seed", 2)?;
        let activation_type = cursor.u8("activation_type")?;
        cursor.skip("creator_pool_on_off_control", 1)?;
        let token_x_mint = cursor.pubkey("token_x_mint")?;
        let token_y_mint = cursor.pubkey("token_y_mint")?;
        let reserve_x = cursor.pubkey("reserve_x")?;
        let reserve_y = cursor.pubkey("reserve_y")?;
        let protocol_fee_x = cursor.u64("protocol_fee_x")?;
        let protocol_fee_y = cursor.u64("protocol_fee_y")?;
        cursor.skip("padding_1", 32)?;
        // Two reward infos, not used for quoting
        cursor.skip("reward_infos", 2 * 144)?;
        let oracle = cursor.pubkey("oracle")?;
        let bin_array_bitmap = cursor.u64_array::<16>("bin_array_bitmap")?;
        let last_updated_at = cursor.i64("last_updated_at")?;

        Ok(Self {
            parameters,
            v_parameters,
            bump_seed,
            bin_step_seed,
            pair_type,
            active_id,
            bin_step,
            status,
            activation_type,
            token_x_mint,
            token_y_mint,
            reserve_x,
            reserve_y,
            protocol_fee_x,
            protocol_fee_y,
            oracle,
            bin_array_bitmap,
            last_updated_at,
            pool_id: Pubkey::default(),
            bitmap_extension_key: Pubkey::default(),
            bitmap_extension: None,
            bin_array_cache: HashMap::new(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.status == PAIR_STATUS_ENABLED
    }

    fn contains_mint(&self, mint: &Pubkey) -> bool {
        mint == &self.token_x_mint || mint == &self.token_y_mint
    }

    fn fee_parameters(&self) -> FeeParameters {
        FeeParameters {
            base_factor: self.parameters.base_factor,
            base_fee_power_factor: self.parameters.base_fee_power_factor,
            variable_fee_control: self.parameters.variable_fee_control,
            volatility_accumulator: self.v_parameters.volatility_accumulator,
            bin_step: self.bin_step,
        }
    }

    /// Bin-array indices a swap may touch, flagged ones only, in order.
    pub fn bin_array_indexes_for_swap(&self, swap_for_y: bool) -> Vec<i64> {
        let mut indexes = Vec::with_capacity(BIN_ARRAY_PREFETCH);
        let mut cursor = bin_id_to_bin_array_index(self.active_id);
        for _ in 0..BIN_ARRAY_PREFETCH {
            match next_bin_array_index_with_liquidity(
                &self.bin_array_bitmap,
                self.bitmap_extension.as_ref(),
                swap_for_y,
                cursor,
            ) {
                Some(found) => {
                    indexes.push(found as i64);
                    cursor = if swap_for_y { found - 1 } else { found + 1 };
                }
                None => break,
            }
        }
        indexes
    }

    /// Fetch the bitmap extension and the bin arrays needed for a quote.
    pub async fn get_bin_arrays_for_swap(
        &mut self,
        client: &SolClient,
        swap_for_y: bool,
    ) -> DexResult<()> {
        let ext_accounts = client.get_multiple_accounts(&[self.bitmap_extension_key]).await?;
        if let Some(Some(account)) = ext_accounts.first() {
            match BinArrayBitmapExtension::decode(&account.data) {
                Ok(ext) => self.bitmap_extension = Some(ext),
                Err(err) => {
                    log(
                        LogTag::Pool,
                        "WARN",
                        &format!("dlmm {}: bad bitmap extension: {}", self.pool_id, err),
                    );
                }
            }
        }

        let indexes = self.bin_array_indexes_for_swap(swap_for_y);
        if indexes.is_empty() {
            return Err(SwapError::InsufficientLiquidity.into());
        }
        let addresses: Vec<Pubkey> = indexes
            .iter()
            .map(|i| derive_bin_array_pda(&self.pool_id, *i))
            .collect();
        let accounts = client.get_multiple_accounts(&addresses).await?;
        for account in accounts.into_iter().flatten() {
            match BinArray::decode(&account.data) {
                Ok(array) => {
                    self.bin_array_cache.insert(array.index, array);
                }
                Err(err) => {
                    log(
                        LogTag::Pool,
                        "WARN",
                        &format!("dlmm {}: bad bin array: {}", self.pool_id, err),
                    );
                }
            }
        }
        Ok(())
    }

    /// Exact-input bin traversal over the cached bin arrays.
    ///
    /// Returns the output amount and the bin-array indices visited.
    pub fn swap_compute(&self, swap_for_y: bool, amount_in: u64) -> DexResult<(u64, Vec<i64>)> {
        if amount_in == 0 {
            return Err(SwapError::InvalidInput("amount_in").into());
        }

        let total_fee_rate = self.fee_parameters().total_fee_rate();
        let mut remaining = amount_in as u128;
        let mut amount_out: u128 = 0;
        let mut active_id = self.active_id;
        let mut visited: Vec<i64> = Vec::new();

        let mut bins_visited = 0usize;
        while remaining > 0 {
            bins_visited += 1;
            if bins_visited > MAX_BIN_TRAVERSAL {
                return Err(SwapError::ComputationDiverged.into());
            }

            // Hop over unflagged bin arrays via the bitmap
            let array_index = bin_id_to_bin_array_index(active_id);
            let target_index = next_bin_array_index_with_liquidity(
                &self.bin_array_bitmap,
                self.bitmap_extension.as_ref(),
                swap_for_y,
                array_index,
            )
            .ok_or(SwapError::InsufficientLiquidity)?;
            if target_index != array_index {
                let (lower, upper) = bin_array_lower_upper_bin_id(target_index);
                active_id = if swap_for_y { upper } else { lower };
            }
            if visited.last() != Some(&(target_index as i64)) {
                visited.push(target_index as i64);
            }

            let array = self.bin_array_cache.get(&(target_index as i64)).ok_or_else(|| {
                SwapError::PoolNotQuotable(format!("bin array {} not cached", target_index))
            })?;
            let bin = array.bin(active_id).ok_or_else(|| {
                SwapError::PoolNotQuotable(format!("bin {} outside array {}", active_id, target_index))
            })?;

            if !bin.is_empty(!swap_for_y) {
                let price = bin.price_or_compute(active_id, self.bin_step)?;
                let max_out = bin.max_amount_out(swap_for_y) as u128;
                let max_in = bin.max_amount_in(price, swap_for_y)?;
                let max_fee = compute_fee(max_in, total_fee_rate)?;

                if remaining >= max_in + max_fee {
                    remaining -= max_in + max_fee;
                    amount_out += max_out;
                } else {
                    let fee = compute_fee_from_amount(remaining, total_fee_rate)?;
                    let after_fee = remaining - fee;
                    let out = Bin::amount_out(after_fee, price, swap_for_y)?;
                    amount_out += out.min(max_out);
                    remaining = 0;
                    break;
                }
            }

            if remaining == 0 {
                break;
            }
            active_id += if swap_for_y { -1 } else { 1 };
            if !(MIN_BIN_ID..=MAX_BIN_ID).contains(&active_id) {
                return Err(SwapError::InsufficientLiquidity.into());
            }
        }

        let amount_out =
            u64::try_from(amount_out).map_err(|_| crate::errors::MathError::Overflow)?;
        Ok((amount_out, visited))
    }
}

#[async_trait]
impl Pool for DlmmPool {
    fn protocol_kind(&self) -> ProtocolKind {
        ProtocolKind::MeteoraDlmm
    }

    fn program_id(&self) -> Pubkey {
        METEORA_DLMM_PROGRAM_ID
    }

    fn id(&self) -> Pubkey {
        self.pool_id
    }

    fn tokens(&self) -> (Pubkey, Pubkey) {
        (self.token_x_mint, self.token_y_mint)
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
        if !self.is_enabled() {
            return Err(SwapError::PoolNotQuotable("pair disabled".to_string()).into());
        }

        let swap_for_y = input_mint == &self.token_x_mint;
        self.get_bin_arrays_for_swap(client, swap_for_y).await?;
        let (amount_out, _) = self.swap_compute(swap_for_y, amount_in)?;
        Ok(amount_out)
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
        let swap_for_y = input_mint == &self.token_x_mint;
        let output_mint = if swap_for_y { self.token_y_mint } else { self.token_x_mint };

        let user_token_in = find_associated_token_address(user, input_mint);
        let user_token_out = find_associated_token_address(user, &output_mint);
        match client.get_account_optional(&user_token_out).await {
            Ok(Some(_)) => {}
            _ => log(
                LogTag::Swap,
                "WARN",
                &format!(
                    "output token account {} does not exist, create it before swapping",
                    user_token_out
                ),
            ),
        }

        // Bin arrays the swap will traverse, from the cached simulation state
        let bin_array_indexes = if self.bin_array_cache.is_empty() {
            self.bin_array_indexes_for_swap(swap_for_y)
        } else {
            let (_, visited) = self.swap_compute(swap_for_y, amount_in)?;
            visited
        };

        let bitmap_extension_meta = if self.bitmap_extension.is_some() {
            AccountMeta::new_readonly(self.bitmap_extension_key, false)
        } else {
            AccountMeta::new_readonly(METEORA_DLMM_PROGRAM_ID, false)
        };

        let mut data = Vec::with_capacity(8 + 8 + 8 + 4);
        data.extend_from_slice(&SWAP2_DISCRIMINATOR);
        data.extend_from_slice(&amount_in.to_le_bytes());
        data.extend_from_slice(&min_amount_out.to_le_bytes());
        // remaining_accounts_info: empty slice vector
        data.extend_from_slice(&0u32.to_le_bytes());

        let mut accounts = vec![
            AccountMeta::new(self.pool_id, false),
            bitmap_extension_meta,
            AccountMeta::new(self.reserve_x, false),
            AccountMeta::new(self.reserve_y, false),
            AccountMeta::new(user_token_in, false),
            AccountMeta::new(user_token_out, false),
            AccountMeta::new_readonly(self.token_x_mint, false),
            AccountMeta::new_readonly(self.token_y_mint, false),
            AccountMeta::new(self.oracle, false),
            AccountMeta::new_readonly(METEORA_DLMM_PROGRAM_ID, false), // host_fee_in: none
            AccountMeta::new_readonly(*user, true),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            AccountMeta::new_readonly(MEMO_PROGRAM_ID, false),
            AccountMeta::new_readonly(derive_event_authority_pda(), false),
            AccountMeta::new_readonly(METEORA_DLMM_PROGRAM_ID, false),
        ];
        for index in bin_array_indexes {
            accounts.push(AccountMeta::new(
                derive_bin_array_pda(&self.pool_id, index),
                false,
            ));
        }

        Ok(vec![Instruction {
            program_id: METEORA_DLMM_PROGRAM_ID,
            accounts,
            data,
        }])
    }
}

impl DlmmPool {
    /// Attach the client-side identifiers after decoding.
    pub fn with_identity(mut self, pool_id: Pubkey) -> Self {
        self.pool_id = pool_id;
        self.bitmap_extension_key = derive_bitmap_extension_pda(&pool_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pools::meteora::constants::MAX_BIN_PER_ARRAY;
    use crate::pools::meteora::math::ONE_Q64;

    fn synthetic_pool(active_id: i32, bin_step: u16) -> DlmmPool {
        let data = vec![0u8; DlmmPool::span()];
        let mut pool = DlmmPool::decode(&data).unwrap();
        pool.pool_id = Pubkey::new_unique();
        pool.token_x_mint = Pubkey::new_unique();
        pool.token_y_mint = Pubkey::new_unique();
        pool.active_id = active_id;
        pool.bin_step = bin_step;
        pool.parameters.base_factor = 10_000;
        pool
    }

    fn insert_array(pool: &mut DlmmPool, index: i32, fill: impl Fn(i32) -> (u64, u64)) {
        let (lower, _) = bin_array_lower_upper_bin_id(index);
        let mut bins = Vec::new();
        for i in 0..MAX_BIN_PER_ARRAY {
            let bin_id = lower + i;
            let (amount_x, amount_y) = fill(bin_id);
            bins.push(Bin {
                amount_x,
                amount_y,
                price: ONE_Q64,
                ..Bin::default()
            });
        }
        let pos = (index + 512) as usize;
        pool.bin_array_bitmap[pos / 64] |= 1 << (pos % 64);
        pool.bin_array_cache.insert(
            index as i64,
            BinArray {
                index: index as i64,
                version: 1,
                lb_pair: pool.pool_id,
                bins,
            },
        );
    }

    #[test]
    fn test_swap_consumes_bins_downward() {
        let mut pool = synthetic_pool(-1, 25);
        // Bins below the active one hold Y
        insert_array(&mut pool, -1, |id| if id <= -1 { (0, 1_000) } else { (0, 0) });

        let (out, visited) = pool.swap_compute(true, 500).unwrap();
        assert!(out > 0);
        assert_eq!(visited, vec![-1]);
    }

    #[test]
    fn test_swap_spans_multiple_bins() {
        let mut pool = synthetic_pool(0, 25);
        // Bins above hold X (swapping Y in, moving up)
        insert_array(&mut pool, 0, |id| if id >= 0 { (100, 0) } else { (0, 0) });

        // At unit price each bin costs ~100 (plus fee) to drain
        let (out, _) = pool.swap_compute(false, 550).unwrap();
        assert!(out >= 400, "expected to span multiple bins, got {}", out);
        assert!(out <= 550);
    }

    #[test]
    fn test_swap_insufficient_liquidity_when_no_flagged_arrays() {
        let pool = synthetic_pool(0, 25);
        let err = pool.swap_compute(true, 1_000).unwrap_err();
        assert!(matches!(
            err,
            crate::errors::DexError::Swap(SwapError::InsufficientLiquidity)
        ));
    }

    #[test]
    fn test_active_bin_array_index_for_negative_active_id() {
        let pool = synthetic_pool(-1, 25);
        assert_eq!(bin_id_to_bin_array_index(pool.active_id), -1);
    }
}
