//! DLMM price, index and fee arithmetic.

use solana_sdk::pubkey::Pubkey;

use crate::errors::MathError;
use crate::math::{floor_div, mul_div_ceil};
use crate::pools::meteora::constants::{
    BASIS_POINT_MAX, BIN_ARRAY_BITMAP_SEED, BIN_ARRAY_SEED, EVENT_AUTHORITY_SEED, FEE_PRECISION,
    MAX_BIN_PER_ARRAY, MAX_FEE_RATE, METEORA_DLMM_PROGRAM_ID, SCALE_OFFSET,
};

/// 1.0 in Q64.64.
pub const ONE_Q64: u128 = 1u128 << SCALE_OFFSET;

/// Bin array index holding `bin_id`, floored so `-1` lands in array `-1`.
pub fn bin_id_to_bin_array_index(bin_id: i32) -> i32 {
    floor_div(bin_id, MAX_BIN_PER_ARRAY)
}

/// Lowest and highest bin ids covered by a bin array.
pub fn bin_array_lower_upper_bin_id(index: i32) -> (i32, i32) {
    let lower = index * MAX_BIN_PER_ARRAY;
    (lower, lower + MAX_BIN_PER_ARRAY - 1)
}

/// `base^power` over Q64.64 with overflow checking at each squaring.
pub fn pow(base: u128, power: i32) -> Result<u128, MathError> {
    if power == 0 {
        return Ok(ONE_Q64);
    }
    let negative = power < 0;
    let mut exp = power.unsigned_abs();

    let mut result = ONE_Q64;
    let mut current = base;

    while exp > 0 {
        if exp & 1 == 1 {
            result = crate::math::mul_shr(result, current, SCALE_OFFSET, crate::math::Rounding::Down)?;
            if result == 0 {
                return Err(MathError::Overflow);
            }
        }
        exp >>= 1;
        if exp > 0 {
            current =
                crate::math::mul_shr(current, current, SCALE_OFFSET, crate::math::Rounding::Down)?;
            if current == 0 {
                return Err(MathError::Overflow);
            }
        }
    }

    if negative {
        // base^-n = (1 << 128) / base^n, folded through Q64.64
        result = crate::math::shl_div(ONE_Q64, result, SCALE_OFFSET, crate::math::Rounding::Down)?;
        if result == 0 {
            return Err(MathError::Overflow);
        }
    }

    Ok(result)
}

/// Bin price in Q64.64: `(1 + bin_step/10000)^bin_id`.
pub fn get_price_from_id(bin_id: i32, bin_step: u16) -> Result<u128, MathError> {
    let bps = ((bin_step as u128) << SCALE_OFFSET) / BASIS_POINT_MAX as u128;
    let base = ONE_Q64 + bps;
    pow(base, bin_id)
}

/// Total swap fee rate against [`FEE_PRECISION`]: base fee plus the
/// volatility-driven variable fee, capped at [`MAX_FEE_RATE`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FeeParameters {
    pub base_factor: u16,
    pub base_fee_power_factor: u8,
    pub variable_fee_control: u32,
    pub volatility_accumulator: u32,
    pub bin_step: u16,
}

impl FeeParameters {
    pub fn base_fee(&self) -> u128 {
        self.bin_step as u128
            * self.base_factor as u128
            * 10u128
            * 10u128.pow(self.base_fee_power_factor as u32)
    }

    pub fn variable_fee(&self) -> u128 {
        if self.variable_fee_control == 0 {
            return 0;
        }
        let volatility_times_step = self.volatility_accumulator as u128 * self.bin_step as u128;
        let squared = volatility_times_step * volatility_times_step;
        let v_fee = self.variable_fee_control as u128 * squared;
        (v_fee + 99_999_999_999) / 100_000_000_000
    }

    pub fn total_fee_rate(&self) -> u128 {
        (self.base_fee() + self.variable_fee()).min(MAX_FEE_RATE)
    }
}

/// Fee charged on top of `amount`: `amount * rate / (precision - rate)`,
/// rounded up.
pub fn compute_fee(amount: u128, total_fee_rate: u128) -> Result<u128, MathError> {
    mul_div_ceil(amount, total_fee_rate, FEE_PRECISION - total_fee_rate)
}

/// Fee taken out of `amount`: `amount * rate / precision`, rounded up.
pub fn compute_fee_from_amount(amount: u128, total_fee_rate: u128) -> Result<u128, MathError> {
    mul_div_ceil(amount, total_fee_rate, FEE_PRECISION)
}

/// Bin array PDA: `["bin_array", pair, index_i64_le]`.
pub fn derive_bin_array_pda(lb_pair: &Pubkey, bin_array_index: i64) -> Pubkey {
    Pubkey::find_program_address(
        &[
            BIN_ARRAY_SEED.as_bytes(),
            lb_pair.as_ref(),
            &bin_array_index.to_le_bytes(),
        ],
        &METEORA_DLMM_PROGRAM_ID,
    )
    .0
}

/// Bitmap-extension PDA: `["bitmap", pair]`.
pub fn derive_bitmap_extension_pda(lb_pair: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[BIN_ARRAY_BITMAP_SEED.as_bytes(), lb_pair.as_ref()],
        &METEORA_DLMM_PROGRAM_ID,
    )
    .0
}

/// Event authority PDA: `["__event_authority"]`.
pub fn derive_event_authority_pda() -> Pubkey {
    Pubkey::find_program_address(&[EVENT_AUTHORITY_SEED.as_bytes()], &METEORA_DLMM_PROGRAM_ID).0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bin_id_to_bin_array_index_floors() {
        assert_eq!(bin_id_to_bin_array_index(0), 0);
        assert_eq!(bin_id_to_bin_array_index(69), 0);
        assert_eq!(bin_id_to_bin_array_index(70), 1);
        assert_eq!(bin_id_to_bin_array_index(-1), -1);
        assert_eq!(bin_id_to_bin_array_index(-70), -1);
        assert_eq!(bin_id_to_bin_array_index(-71), -2);
    }

    #[test]
    fn test_bin_array_bounds() {
        assert_eq!(bin_array_lower_upper_bin_id(0), (0, 69));
        assert_eq!(bin_array_lower_upper_bin_id(-1), (-70, -1));
        assert_eq!(bin_array_lower_upper_bin_id(2), (140, 209));
    }

    #[test]
    fn test_price_identity_and_monotonicity() {
        assert_eq!(get_price_from_id(0, 25).unwrap(), ONE_Q64);
        let mut prev = get_price_from_id(-50, 25).unwrap();
        for id in -49..=50 {
            let price = get_price_from_id(id, 25).unwrap();
            assert!(price > prev, "price not increasing at bin {}", id);
            prev = price;
        }
    }

    #[test]
    fn test_negative_and_positive_prices_are_reciprocal() {
        let up = get_price_from_id(10, 25).unwrap();
        let down = get_price_from_id(-10, 25).unwrap();
        // up * down ~ 1.0 in Q64.64, within rounding
        let product = crate::math::mul_shr(up, down, SCALE_OFFSET, crate::math::Rounding::Down)
            .unwrap();
        let diff = ONE_Q64.abs_diff(product);
        assert!(diff < 1 << 20, "reciprocal drift too large: {}", diff);
    }

    #[test]
    fn test_fee_parameters() {
        let params = FeeParameters {
            base_factor: 10_000,
            base_fee_power_factor: 0,
            variable_fee_control: 0,
            volatility_accumulator: 0,
            bin_step: 25,
        };
        // 25 * 10000 * 10 = 2_500_000 -> 0.25% of 1e9
        assert_eq!(params.total_fee_rate(), 2_500_000);
        assert_eq!(compute_fee_from_amount(1_000_000_000, 2_500_000).unwrap(), 2_500_000);
        // Fee on top is slightly larger than fee from amount
        assert!(compute_fee(1_000_000_000, 2_500_000).unwrap() > 2_500_000);
    }
}
