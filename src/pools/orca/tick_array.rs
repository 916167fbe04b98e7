//! Whirlpool tick arrays and PDA derivations.
//!
//! Whirlpool derives tick-array addresses from the *stringified* start
//! index, not its raw bytes; `-88` seeds as the three ASCII bytes `b"-88"`.

use solana_sdk::pubkey::Pubkey;

use crate::errors::{DecodeError, DexResult, SwapError};
use crate::math::clmm::{tick_array_start_index, MAX_TICK, MIN_TICK};
use crate::math::floor_div;
use crate::pools::codec::Cursor;
use crate::pools::orca::constants::{
    ORACLE_SEED, ORCA_WHIRLPOOL_PROGRAM_ID, TICK_ARRAY_SEED, TICK_ARRAY_SIZE,
    WHIRLPOOL_TICK_ARRAY_SPAN,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WhirlpoolTickState {
    pub tick: i32,
    pub liquidity_net: i64,
    pub liquidity_gross: u128,
    pub fee_growth_outside_a_x64: u128,
    pub fee_growth_outside_b_x64: u128,
    pub reward_growths_outside_x64: [u128; 3],
}

impl WhirlpoolTickState {
    pub fn is_initialized(&self) -> bool {
        self.liquidity_gross > 0
    }
}

#[derive(Debug, Clone)]
pub struct WhirlpoolTickArray {
    pub pool_id: Pubkey,
    pub start_tick_index: i32,
    pub ticks: Vec<WhirlpoolTickState>,
    pub initialized_tick_count: u8,
}

impl WhirlpoolTickArray {
    pub fn span() -> usize {
        WHIRLPOOL_TICK_ARRAY_SPAN
    }

    pub fn tick_count(tick_spacing: u16) -> i32 {
        TICK_ARRAY_SIZE * tick_spacing as i32
    }

    pub fn start_index(tick: i32, tick_spacing: u16) -> i32 {
        tick_array_start_index(tick, tick_spacing, TICK_ARRAY_SIZE)
    }

    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let need = 8 + 32 + 4 + (TICK_ARRAY_SIZE as usize) * 168 + 1;
        if data.len() < need {
            return Err(DecodeError::TooShort {
                need,
                have: data.len(),
            });
        }
        let mut cursor = Cursor::new(&data[8..]);
        let pool_id = cursor.pubkey("pool_id")?;
        let start_tick_index = cursor.i32("start_tick_index")?;
        let mut ticks = Vec::with_capacity(TICK_ARRAY_SIZE as usize);
        for _ in 0..TICK_ARRAY_SIZE {
            let tick = cursor.i32("tick")?;
            let liquidity_net = cursor.i64("liquidity_net")?;
            cursor.skip("liquidity_net_hi", 8)?;
            let liquidity_gross = cursor.u128("liquidity_gross")?;
            let fee_growth_outside_a_x64 = cursor.u128("fee_growth_outside_a")?;
            let fee_growth_outside_b_x64 = cursor.u128("fee_growth_outside_b")?;
            let reward_growths_outside_x64 = [
                cursor.u128("reward_growth_outside_0")?,
                cursor.u128("reward_growth_outside_1")?,
                cursor.u128("reward_growth_outside_2")?,
            ];
            cursor.skip("tick_padding", 52)?;
            ticks.push(WhirlpoolTickState {
                tick,
                liquidity_net,
                liquidity_gross,
                fee_growth_outside_a_x64,
                fee_growth_outside_b_x64,
                reward_growths_outside_x64,
            });
        }
        let initialized_tick_count = cursor.u8("initialized_tick_count")?;
        Ok(Self {
            pool_id,
            start_tick_index,
            ticks,
            initialized_tick_count,
        })
    }

    pub fn first_initialized_tick(&self, a_to_b: bool) -> Option<&WhirlpoolTickState> {
        if a_to_b {
            self.ticks.iter().rev().find(|t| t.is_initialized())
        } else {
            self.ticks.iter().find(|t| t.is_initialized())
        }
    }

    pub fn next_initialized_tick(
        &self,
        current_tick: i32,
        tick_spacing: u16,
        a_to_b: bool,
        include_start: bool,
    ) -> Option<&WhirlpoolTickState> {
        let spacing = tick_spacing as i32;
        let offset = floor_div(current_tick - self.start_tick_index, spacing);
        if a_to_b {
            if offset < 0 {
                return None;
            }
            let from = offset.min(TICK_ARRAY_SIZE - 1) as usize;
            self.ticks[..=from].iter().rev().find(|t| t.is_initialized())
        } else {
            let mut from = offset + if include_start { 0 } else { 1 };
            if from < 0 {
                from = 0;
            }
            if from >= TICK_ARRAY_SIZE {
                return None;
            }
            self.ticks[from as usize..].iter().find(|t| t.is_initialized())
        }
    }
}

/// Tick-array PDA with stringified start index seeds.
pub fn derive_tick_array_pda(whirlpool: &Pubkey, start_tick_index: i32) -> Pubkey {
    let start_str = start_tick_index.to_string();
    Pubkey::find_program_address(
        &[
            TICK_ARRAY_SEED.as_bytes(),
            whirlpool.as_ref(),
            start_str.as_bytes(),
        ],
        &ORCA_WHIRLPOOL_PROGRAM_ID,
    )
    .0
}

/// Oracle PDA: `["oracle", whirlpool]`.
pub fn derive_oracle_pda(whirlpool: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[ORACLE_SEED.as_bytes(), whirlpool.as_ref()],
        &ORCA_WHIRLPOOL_PROGRAM_ID,
    )
    .0
}

/// Start index of the tick array `offset` arrays away from the one holding
/// `tick`, with loose out-of-range protection.
pub fn tick_array_start_index_with_offset(
    tick: i32,
    tick_spacing: u16,
    offset: i32,
) -> DexResult<i32> {
    let ticks_in_array = WhirlpoolTickArray::tick_count(tick_spacing);
    let real_index = floor_div(tick, ticks_in_array);
    let start = (real_index + offset)
        .checked_mul(ticks_in_array)
        .ok_or(SwapError::PriceOutOfRange)?;

    let min_boundary = WhirlpoolTickArray::start_index(MIN_TICK, tick_spacing) - ticks_in_array;
    let max_boundary = MAX_TICK + ticks_in_array;
    if start < min_boundary || start > max_boundary {
        return Err(SwapError::PriceOutOfRange.into());
    }
    Ok(start)
}

/// The three tick arrays a swap in the given direction may touch, in
/// traversal order. `b_to_a` shifts the entry tick by one spacing, matching
/// the on-chain sequencing rules.
pub fn derive_swap_tick_array_pdas(
    whirlpool: &Pubkey,
    tick_current: i32,
    tick_spacing: u16,
    a_to_b: bool,
) -> DexResult<[Pubkey; 3]> {
    let shift = if a_to_b { 0 } else { tick_spacing as i32 };
    let mut pdas = [Pubkey::default(); 3];
    let mut offset = 0i32;
    for (i, pda) in pdas.iter_mut().enumerate() {
        let start = match tick_array_start_index_with_offset(
            tick_current + shift,
            tick_spacing,
            offset,
        ) {
            Ok(start) => start,
            Err(err) => {
                if i == 0 {
                    return Err(err);
                }
                break;
            }
        };
        *pda = derive_tick_array_pda(whirlpool, start);
        offset += if a_to_b { -1 } else { 1 };
    }
    Ok(pdas)
}

/// Start indices matching [`derive_swap_tick_array_pdas`].
pub fn swap_tick_array_start_indexes(
    tick_current: i32,
    tick_spacing: u16,
    a_to_b: bool,
) -> Vec<i32> {
    let shift = if a_to_b { 0 } else { tick_spacing as i32 };
    let mut starts = Vec::with_capacity(3);
    let mut offset = 0i32;
    for _ in 0..3 {
        match tick_array_start_index_with_offset(tick_current + shift, tick_spacing, offset) {
            Ok(start) => starts.push(start),
            Err(_) => break,
        }
        offset += if a_to_b { -1 } else { 1 };
    }
    starts
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_start_index_uses_88_ticks() {
        assert_eq!(WhirlpoolTickArray::start_index(-1, 1), -88);
        assert_eq!(WhirlpoolTickArray::start_index(0, 1), 0);
        assert_eq!(WhirlpoolTickArray::start_index(87, 1), 0);
        assert_eq!(WhirlpoolTickArray::start_index(88, 1), 88);
        assert_eq!(WhirlpoolTickArray::start_index(-89, 1), -176);
    }

    #[test]
    fn test_tick_array_pda_uses_stringified_start() {
        let pool = Pubkey::from_str("7qbRF6YsyGuLUVs6Y1q64bdVrfe4ZcUUz1JRdoVNUJnm").unwrap();
        let manual = Pubkey::find_program_address(
            &[b"tick_array", pool.as_ref(), b"-88"],
            &ORCA_WHIRLPOOL_PROGRAM_ID,
        )
        .0;
        assert_eq!(derive_tick_array_pda(&pool, -88), manual);
        // Raw little-endian bytes would be a different address entirely
        let raw = Pubkey::find_program_address(
            &[b"tick_array", pool.as_ref(), &(-88i32).to_le_bytes()],
            &ORCA_WHIRLPOOL_PROGRAM_ID,
        )
        .0;
        assert_ne!(derive_tick_array_pda(&pool, -88), raw);
    }

    #[test]
    fn test_swap_sequence_direction() {
        let starts = swap_tick_array_start_indexes(0, 1, true);
        assert_eq!(starts, vec![0, -88, -176]);
        let starts = swap_tick_array_start_indexes(0, 1, false);
        assert_eq!(starts, vec![0, 88, 176]);
        // b_to_a shifts the entry array by one spacing
        let starts = swap_tick_array_start_indexes(87, 1, false);
        assert_eq!(starts, vec![88, 176, 264]);
    }
}
