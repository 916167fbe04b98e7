//! CLMM tick-array accounts and intra-array tick search.

use solana_sdk::pubkey::Pubkey;

use crate::errors::DecodeError;
use crate::math::clmm::tick_array_start_index;
use crate::math::floor_div;
use crate::pools::codec::Cursor;
use crate::pools::raydium::constants::{
    CLMM_TICK_ARRAY_SPAN, POOL_TICK_ARRAY_BITMAP_SEED, TICK_ARRAY_SEED, TICK_ARRAY_SIZE,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickState {
    pub tick: i32,
    pub liquidity_net: i64,
    pub liquidity_gross: u128,
    pub fee_growth_outside_0_x64: u128,
    pub fee_growth_outside_1_x64: u128,
    pub reward_growths_outside_x64: [u128; 3],
}

impl TickState {
    pub fn is_initialized(&self) -> bool {
        self.liquidity_gross > 0
    }
}

#[derive(Debug, Clone)]
pub struct TickArrayState {
    pub pool_id: Pubkey,
    pub start_tick_index: i32,
    pub ticks: Vec<TickState>,
    pub initialized_tick_count: u8,
}

impl TickArrayState {
    pub fn span() -> usize {
        CLMM_TICK_ARRAY_SPAN
    }

    /// Ticks covered by one array at the given spacing.
    pub fn tick_count(tick_spacing: u16) -> i32 {
        TICK_ARRAY_SIZE * tick_spacing as i32
    }

    /// Array start index containing `tick`, floored for negatives.
    pub fn start_index(tick: i32, tick_spacing: u16) -> i32 {
        tick_array_start_index(tick, tick_spacing, TICK_ARRAY_SIZE)
    }

    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < Self::span() {
            return Err(DecodeError::TooShort {
                need: Self::span(),
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
            let fee_growth_outside_0_x64 = cursor.u128("fee_growth_outside_0")?;
            let fee_growth_outside_1_x64 = cursor.u128("fee_growth_outside_1")?;
            let reward_growths_outside_x64 = [
                cursor.u128("reward_growth_outside_0")?,
                cursor.u128("reward_growth_outside_1")?,
                cursor.u128("reward_growth_outside_2")?,
            ];
            cursor.skip("tick_padding", 52)?;
            ticks.push(TickState {
                tick,
                liquidity_net,
                liquidity_gross,
                fee_growth_outside_0_x64,
                fee_growth_outside_1_x64,
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

    /// First initialized tick entered when traversing into this array.
    pub fn first_initialized_tick(&self, zero_for_one: bool) -> Option<&TickState> {
        if zero_for_one {
            self.ticks.iter().rev().find(|t| t.is_initialized())
        } else {
            self.ticks.iter().find(|t| t.is_initialized())
        }
    }

    /// Next initialized tick within this array relative to the cursor tick.
    ///
    /// Moving down includes the cursor's own slot; moving up excludes it
    /// unless `include_start` (the cursor was just placed on the array start
    /// without crossing it).
    pub fn next_initialized_tick(
        &self,
        current_tick: i32,
        tick_spacing: u16,
        zero_for_one: bool,
        include_start: bool,
    ) -> Option<&TickState> {
        let spacing = tick_spacing as i32;
        let offset = floor_div(current_tick - self.start_tick_index, spacing);

        if zero_for_one {
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

/// Tick array PDA: `["tick_array", pool, start_index_i32_le]`.
pub fn get_pda_tick_array_address(program: &Pubkey, pool: &Pubkey, start_index: i32) -> Pubkey {
    Pubkey::find_program_address(
        &[
            TICK_ARRAY_SEED.as_bytes(),
            pool.as_ref(),
            &start_index.to_le_bytes(),
        ],
        program,
    )
    .0
}

/// Bitmap-extension PDA: `["pool_tick_array_bitmap_extension", pool]`.
pub fn get_pda_ex_bitmap_address(program: &Pubkey, pool: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[POOL_TICK_ARRAY_BITMAP_SEED.as_bytes(), pool.as_ref()],
        program,
    )
    .0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array_with_ticks(start: i32, spacing: u16, initialized: &[i32]) -> TickArrayState {
        let mut ticks = Vec::new();
        for i in 0..TICK_ARRAY_SIZE {
            let tick = start + i * spacing as i32;
            let mut state = TickState {
                tick,
                ..TickState::default()
            };
            if initialized.contains(&tick) {
                state.liquidity_gross = 1_000;
                state.liquidity_net = 500;
            }
            ticks.push(state);
        }
        TickArrayState {
            pool_id: Pubkey::new_unique(),
            start_tick_index: start,
            ticks,
            initialized_tick_count: initialized.len() as u8,
        }
    }

    #[test]
    fn test_start_index_floors_negative_ticks() {
        assert_eq!(TickArrayState::start_index(-1, 1), -60);
        assert_eq!(TickArrayState::start_index(0, 1), 0);
        assert_eq!(TickArrayState::start_index(-60, 1), -60);
        assert_eq!(TickArrayState::start_index(-61, 1), -120);
        assert_eq!(TickArrayState::start_index(-1, 10), -600);
    }

    #[test]
    fn test_next_initialized_tick_downward() {
        let array = array_with_ticks(0, 1, &[10, 40]);
        let found = array.next_initialized_tick(35, 1, true, false).unwrap();
        assert_eq!(found.tick, 10);
        let found = array.next_initialized_tick(40, 1, true, false).unwrap();
        assert_eq!(found.tick, 40);
        assert!(array.next_initialized_tick(5, 1, true, false).is_none());
    }

    #[test]
    fn test_next_initialized_tick_upward() {
        let array = array_with_ticks(0, 1, &[10, 40]);
        let found = array.next_initialized_tick(10, 1, false, false).unwrap();
        assert_eq!(found.tick, 40);
        let found = array.next_initialized_tick(0, 1, false, true).unwrap();
        assert_eq!(found.tick, 10);
        assert!(array.next_initialized_tick(40, 1, false, false).is_none());
    }

    #[test]
    fn test_first_initialized_tick_direction() {
        let array = array_with_ticks(-60, 1, &[-50, -20]);
        assert_eq!(array.first_initialized_tick(true).unwrap().tick, -20);
        assert_eq!(array.first_initialized_tick(false).unwrap().tick, -50);
    }

    #[test]
    fn test_tick_array_pda_uses_le_bytes() {
        let program = crate::pools::raydium::constants::RAYDIUM_CLMM_PROGRAM_ID;
        let pool = Pubkey::new_unique();
        let a = get_pda_tick_array_address(&program, &pool, -60);
        let expected = Pubkey::find_program_address(
            &[b"tick_array", pool.as_ref(), &(-60i32).to_le_bytes()],
            &program,
        )
        .0;
        assert_eq!(a, expected);
    }
}
