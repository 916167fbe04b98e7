//! Concentrated-liquidity math shared by the CLMM-style simulators.
//!
//! Prices are Q64.64 square roots held in u128. The tick<->price tables and
//! rounding directions reproduce the on-chain fixed-point arithmetic
//! bit-for-bit; do not "simplify" any of it.

use crate::errors::MathError;
use crate::math::big_num::U256;
use crate::math::{floor_div, mul_div_ceil, mul_div_floor, Rounding};

pub const MIN_TICK: i32 = -443636;
pub const MAX_TICK: i32 = 443636;

pub const MIN_SQRT_PRICE_X64: u128 = 4295048016;

pub const FEE_RATE_DENOMINATOR: u64 = 1_000_000;

const BIT_PRECISION: u32 = 16;

fn mul_right_shift_64(value: u128, mul_by: u128) -> u128 {
    ((U256::from(value) * U256::from(mul_by)) >> 64).low_u128()
}

/// sqrt(1.0001^tick) in Q64.64.
pub fn get_sqrt_price_x64_from_tick(tick: i32) -> Result<u128, MathError> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(MathError::Overflow);
    }
    let abs_tick = tick.unsigned_abs();

    let mut ratio: u128 = if abs_tick & 0x1 != 0 {
        0xfffcb933bd6fb800
    } else {
        1u128 << 64
    };
    if abs_tick & 0x2 != 0 {
        ratio = mul_right_shift_64(ratio, 0xfff97272373d4000);
    }
    if abs_tick & 0x4 != 0 {
        ratio = mul_right_shift_64(ratio, 0xfff2e50f5f657000);
    }
    if abs_tick & 0x8 != 0 {
        ratio = mul_right_shift_64(ratio, 0xffe5caca7e10f000);
    }
    if abs_tick & 0x10 != 0 {
        ratio = mul_right_shift_64(ratio, 0xffcb9843d60f7000);
    }
    if abs_tick & 0x20 != 0 {
        ratio = mul_right_shift_64(ratio, 0xff973b41fa98e800);
    }
    if abs_tick & 0x40 != 0 {
        ratio = mul_right_shift_64(ratio, 0xff2ea16466c9b000);
    }
    if abs_tick & 0x80 != 0 {
        ratio = mul_right_shift_64(ratio, 0xfe5dee046a9a3800);
    }
    if abs_tick & 0x100 != 0 {
        ratio = mul_right_shift_64(ratio, 0xfcbe86c7900bb000);
    }
    if abs_tick & 0x200 != 0 {
        ratio = mul_right_shift_64(ratio, 0xf987a7253ac65800);
    }
    if abs_tick & 0x400 != 0 {
        ratio = mul_right_shift_64(ratio, 0xf3392b0822bb6000);
    }
    if abs_tick & 0x800 != 0 {
        ratio = mul_right_shift_64(ratio, 0xe7159475a2caf000);
    }
    if abs_tick & 0x1000 != 0 {
        ratio = mul_right_shift_64(ratio, 0xd097f3bdfd2f2000);
    }
    if abs_tick & 0x2000 != 0 {
        ratio = mul_right_shift_64(ratio, 0xa9f746462d9f8000);
    }
    if abs_tick & 0x4000 != 0 {
        ratio = mul_right_shift_64(ratio, 0x70d869a156f31c00);
    }
    if abs_tick & 0x8000 != 0 {
        ratio = mul_right_shift_64(ratio, 0x31be135f97ed3200);
    }
    if abs_tick & 0x10000 != 0 {
        ratio = mul_right_shift_64(ratio, 0x9aa508b5b85a500);
    }
    if abs_tick & 0x20000 != 0 {
        ratio = mul_right_shift_64(ratio, 0x5d6af8dedc582c);
    }
    if abs_tick & 0x40000 != 0 {
        ratio = mul_right_shift_64(ratio, 0x2216e584f5fa);
    }

    if tick > 0 {
        ratio = u128::MAX / ratio;
    }
    Ok(ratio)
}

/// Inverse of [`get_sqrt_price_x64_from_tick`], accurate to one tick.
pub fn get_tick_from_sqrt_price_x64(sqrt_price_x64: u128) -> Result<i32, MathError> {
    if sqrt_price_x64 < MIN_SQRT_PRICE_X64 {
        return Err(MathError::Overflow);
    }

    // Integer part of log2(price) relative to Q64.64
    let msb: u32 = 127 - sqrt_price_x64.leading_zeros();
    let log2p_integer_x32 = (msb as i128 - 64) << 32;

    // Fractional part by iterated squaring of the normalized mantissa
    let mut bit: i128 = 0x8000_0000_0000_0000i128;
    let mut precision = 0;
    let mut log2p_fraction_x64: i128 = 0;

    let mut r = if msb >= 64 {
        sqrt_price_x64 >> (msb - 63)
    } else {
        sqrt_price_x64 << (63 - msb)
    };

    while bit > 0 && precision < BIT_PRECISION {
        // r stays in [2^63, 2^64), so r * r always fits in 128 bits
        r = r * r;
        let is_r_more_than_two = (r >> 127) as u32;
        r >>= 63 + is_r_more_than_two;
        log2p_fraction_x64 += bit * is_r_more_than_two as i128;
        bit >>= 1;
        precision += 1;
    }
    let log2p_fraction_x32 = log2p_fraction_x64 >> 32;
    let log2p_x32 = log2p_integer_x32 + log2p_fraction_x32;

    // Change of base: log_sqrt(1.0001)(2) in Q32.32
    let logbp_x64 = log2p_x32 * 59543866431248i128;

    let tick_low = ((logbp_x64 - 184467440737095516i128) >> 64) as i32;
    let tick_high = ((logbp_x64 + 15793534762490258745i128) >> 64) as i32;

    if tick_low == tick_high {
        Ok(tick_low)
    } else if get_sqrt_price_x64_from_tick(tick_high)? <= sqrt_price_x64 {
        Ok(tick_high)
    } else {
        Ok(tick_low)
    }
}

/// Start index of the tick array holding `tick` for arrays of `tick_count`
/// ticks at `tick_spacing`. Floored so that negative ticks land in the
/// array below zero.
pub fn tick_array_start_index(tick: i32, tick_spacing: u16, tick_count: i32) -> i32 {
    let ticks_in_array = tick_count * tick_spacing as i32;
    floor_div(tick, ticks_in_array) * ticks_in_array
}

/// Token A amount between two sqrt prices: L * (pb - pa) / (pb * pa), Q64.64.
pub fn get_delta_amount_a(
    sqrt_price_a_x64: u128,
    sqrt_price_b_x64: u128,
    liquidity: u128,
    round_up: bool,
) -> Result<u128, MathError> {
    let (lower, upper) = if sqrt_price_a_x64 <= sqrt_price_b_x64 {
        (sqrt_price_a_x64, sqrt_price_b_x64)
    } else {
        (sqrt_price_b_x64, sqrt_price_a_x64)
    };
    if lower == 0 {
        return Err(MathError::DivisionByZero);
    }

    let numerator1 = U256::from(liquidity) << 64;
    let numerator2 = U256::from(upper - lower);
    let product = numerator1 * numerator2;

    let (div1, rem1) = product.div_mod(U256::from(upper));
    if round_up {
        let first = if rem1.is_zero() { div1 } else { div1 + U256::one() };
        let (div2, rem2) = first.div_mod(U256::from(lower));
        let result = if rem2.is_zero() { div2 } else { div2 + U256::one() };
        result.as_u128_checked().ok_or(MathError::Overflow)
    } else {
        let result = div1 / U256::from(lower);
        result.as_u128_checked().ok_or(MathError::Overflow)
    }
}

/// Token B amount between two sqrt prices: L * (pb - pa) / 2^64.
pub fn get_delta_amount_b(
    sqrt_price_a_x64: u128,
    sqrt_price_b_x64: u128,
    liquidity: u128,
    round_up: bool,
) -> Result<u128, MathError> {
    let (lower, upper) = if sqrt_price_a_x64 <= sqrt_price_b_x64 {
        (sqrt_price_a_x64, sqrt_price_b_x64)
    } else {
        (sqrt_price_b_x64, sqrt_price_a_x64)
    };
    let rounding = if round_up { Rounding::Up } else { Rounding::Down };
    crate::math::mul_shr(liquidity, upper - lower, 64, rounding)
}

fn mul_div_rounding_up_u256(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    let (quot, rem) = (a * b).div_mod(denominator);
    Ok(if rem.is_zero() { quot } else { quot + U256::one() })
}

/// Next sqrt price after adding `amount` of token A (rounds up).
fn get_next_sqrt_price_from_amount_a_rounding_up(
    sqrt_price_x64: u128,
    liquidity: u128,
    amount: u128,
) -> Result<u128, MathError> {
    if amount == 0 {
        return Ok(sqrt_price_x64);
    }
    let numerator1 = U256::from(liquidity) << 64;
    let product = U256::from(amount) * U256::from(sqrt_price_x64);
    let denominator = numerator1 + product;
    if denominator >= numerator1 {
        return mul_div_rounding_up_u256(numerator1, U256::from(sqrt_price_x64), denominator)?
            .as_u128_checked()
            .ok_or(MathError::Overflow);
    }
    // Fallback for a (theoretical) overflowing denominator
    let temp = numerator1 / U256::from(sqrt_price_x64) + U256::from(amount);
    mul_div_rounding_up_u256(numerator1, U256::one(), temp)?
        .as_u128_checked()
        .ok_or(MathError::Overflow)
}

/// Next sqrt price after adding `amount` of token B (rounds down).
fn get_next_sqrt_price_from_amount_b_rounding_down(
    sqrt_price_x64: u128,
    liquidity: u128,
    amount: u128,
) -> Result<u128, MathError> {
    if liquidity == 0 {
        return Err(MathError::DivisionByZero);
    }
    let delta = crate::math::shl_div(amount, liquidity, 64, Rounding::Down)?;
    sqrt_price_x64.checked_add(delta).ok_or(MathError::Overflow)
}

/// Next sqrt price after spending `amount` of the input token.
pub fn get_next_sqrt_price_from_input(
    sqrt_price_x64: u128,
    liquidity: u128,
    amount: u128,
    zero_for_one: bool,
) -> Result<u128, MathError> {
    if sqrt_price_x64 == 0 || liquidity == 0 {
        return Err(MathError::DivisionByZero);
    }
    if zero_for_one {
        get_next_sqrt_price_from_amount_a_rounding_up(sqrt_price_x64, liquidity, amount)
    } else {
        get_next_sqrt_price_from_amount_b_rounding_down(sqrt_price_x64, liquidity, amount)
    }
}

/// One step of the exact-input swap loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapStep {
    pub sqrt_price_next_x64: u128,
    pub amount_in: u128,
    pub amount_out: u128,
    pub fee_amount: u128,
}

/// Compute one swap step toward `sqrt_price_target_x64`, consuming at most
/// `amount_remaining` of the input token (fee included).
pub fn swap_step_compute(
    sqrt_price_current_x64: u128,
    sqrt_price_target_x64: u128,
    liquidity: u128,
    amount_remaining: u128,
    fee_rate: u32,
    zero_for_one: bool,
) -> Result<SwapStep, MathError> {
    let fee_rate = fee_rate as u128;
    let denom = FEE_RATE_DENOMINATOR as u128;

    let amount_remaining_less_fee = mul_div_floor(amount_remaining, denom - fee_rate, denom)?;

    let amount_in_to_target = if zero_for_one {
        get_delta_amount_a(sqrt_price_target_x64, sqrt_price_current_x64, liquidity, true)?
    } else {
        get_delta_amount_b(sqrt_price_current_x64, sqrt_price_target_x64, liquidity, true)?
    };

    let sqrt_price_next_x64 = if amount_remaining_less_fee >= amount_in_to_target {
        sqrt_price_target_x64
    } else {
        get_next_sqrt_price_from_input(
            sqrt_price_current_x64,
            liquidity,
            amount_remaining_less_fee,
            zero_for_one,
        )?
    };
    let reached_target = sqrt_price_next_x64 == sqrt_price_target_x64;

    let amount_in = if reached_target {
        amount_in_to_target
    } else if zero_for_one {
        get_delta_amount_a(sqrt_price_next_x64, sqrt_price_current_x64, liquidity, true)?
    } else {
        get_delta_amount_b(sqrt_price_current_x64, sqrt_price_next_x64, liquidity, true)?
    };

    let amount_out = if zero_for_one {
        get_delta_amount_b(sqrt_price_next_x64, sqrt_price_current_x64, liquidity, false)?
    } else {
        get_delta_amount_a(sqrt_price_current_x64, sqrt_price_next_x64, liquidity, false)?
    };

    let fee_amount = if !reached_target {
        // Partial step: everything left over after the input leg is fee
        amount_remaining - amount_in
    } else {
        mul_div_ceil(amount_in, fee_rate, denom - fee_rate)?
    };

    Ok(SwapStep {
        sqrt_price_next_x64,
        amount_in,
        amount_out,
        fee_amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_zero_is_unit_price() {
        assert_eq!(get_sqrt_price_x64_from_tick(0).unwrap(), 1u128 << 64);
    }

    #[test]
    fn test_price_tick_round_trip() {
        for tick in [
            MIN_TICK,
            -443635,
            -100_000,
            -60,
            -1,
            0,
            1,
            60,
            12_345,
            100_000,
            443_635,
            MAX_TICK,
        ] {
            let price = get_sqrt_price_x64_from_tick(tick).unwrap();
            let back = get_tick_from_sqrt_price_x64(price).unwrap();
            assert_eq!(back, tick, "round trip failed for tick {}", tick);
        }
    }

    #[test]
    fn test_price_monotone_in_tick() {
        let mut prev = get_sqrt_price_x64_from_tick(-1000).unwrap();
        for tick in -999..=1000 {
            let price = get_sqrt_price_x64_from_tick(tick).unwrap();
            assert!(price > prev, "price not increasing at tick {}", tick);
            prev = price;
        }
    }

    #[test]
    fn test_min_sqrt_price_matches_min_tick() {
        assert_eq!(get_sqrt_price_x64_from_tick(MIN_TICK).unwrap(), MIN_SQRT_PRICE_X64);
    }

    #[test]
    fn test_tick_array_start_index_floors() {
        assert_eq!(tick_array_start_index(-1, 1, 60), -60);
        assert_eq!(tick_array_start_index(0, 1, 60), 0);
        assert_eq!(tick_array_start_index(59, 1, 60), 0);
        assert_eq!(tick_array_start_index(60, 1, 60), 60);
        assert_eq!(tick_array_start_index(-60, 1, 60), -60);
        assert_eq!(tick_array_start_index(-61, 1, 60), -120);
        assert_eq!(tick_array_start_index(-1, 1, 88), -88);
        // Spacing participates in the array width
        assert_eq!(tick_array_start_index(-1, 10, 60), -600);
    }

    #[test]
    fn test_swap_step_fee_conservation() {
        let current = 1u128 << 64;
        let target = get_sqrt_price_x64_from_tick(-100).unwrap();
        let liquidity = 1_000_000_000_000u128;
        let amount_remaining = 1_000_000u128;
        let step =
            swap_step_compute(current, target, liquidity, amount_remaining, 500, true).unwrap();
        assert!(step.amount_in + step.fee_amount <= amount_remaining);
        assert!(step.amount_out > 0);
    }

    #[test]
    fn test_swap_step_reaches_target_on_large_input() {
        let current = 1u128 << 64;
        let target = get_sqrt_price_x64_from_tick(-10).unwrap();
        let liquidity = 1_000_000u128;
        let step = swap_step_compute(current, target, liquidity, u64::MAX as u128, 500, true)
            .unwrap();
        assert_eq!(step.sqrt_price_next_x64, target);
    }
}
