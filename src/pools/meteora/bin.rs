//! Single-bin swap math.

use crate::errors::MathError;
use crate::math::{mul_shr, shl_div, Rounding};
use crate::pools::meteora::constants::SCALE_OFFSET;
use crate::pools::meteora::math::get_price_from_id;

/// One liquidity bin. Prices are Q64.64.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bin {
    pub amount_x: u64,
    pub amount_y: u64,
    pub price: u128,
    pub liquidity_supply: u128,
    pub reward_per_token_stored: [u128; 2],
    pub fee_amount_x_per_token_stored: u128,
    pub fee_amount_y_per_token_stored: u128,
    pub amount_x_in: u128,
    pub amount_y_in: u128,
}

impl Bin {
    pub fn is_empty(&self, for_x: bool) -> bool {
        if for_x {
            self.amount_x == 0
        } else {
            self.amount_y == 0
        }
    }

    /// Everything the bin can pay out in the output token.
    pub fn max_amount_out(&self, swap_for_y: bool) -> u64 {
        if swap_for_y {
            self.amount_y
        } else {
            self.amount_x
        }
    }

    /// Input needed to drain the bin, rounded up.
    pub fn max_amount_in(&self, price: u128, swap_for_y: bool) -> Result<u128, MathError> {
        if swap_for_y {
            // amount_y << 64 / price
            shl_div(self.amount_y as u128, price, SCALE_OFFSET, Rounding::Up)
        } else {
            // amount_x * price >> 64
            mul_shr(self.amount_x as u128, price, SCALE_OFFSET, Rounding::Up)
        }
    }

    /// Output for a partial input, rounded down.
    pub fn amount_out(amount_in: u128, price: u128, swap_for_y: bool) -> Result<u128, MathError> {
        if swap_for_y {
            // price * amount_in >> 64
            mul_shr(price, amount_in, SCALE_OFFSET, Rounding::Down)
        } else {
            // amount_in << 64 / price
            shl_div(amount_in, price, SCALE_OFFSET, Rounding::Down)
        }
    }

    /// Bin price, computed from the id when the stored price is zero.
    pub fn price_or_compute(&self, bin_id: i32, bin_step: u16) -> Result<u128, MathError> {
        if self.price == 0 {
            get_price_from_id(bin_id, bin_step)
        } else {
            Ok(self.price)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pools::meteora::math::ONE_Q64;

    #[test]
    fn test_bin_in_out_at_unit_price() {
        let bin = Bin {
            amount_x: 1_000,
            amount_y: 2_000,
            price: ONE_Q64,
            ..Bin::default()
        };
        assert_eq!(bin.max_amount_out(true), 2_000);
        assert_eq!(bin.max_amount_out(false), 1_000);
        assert_eq!(bin.max_amount_in(ONE_Q64, true).unwrap(), 2_000);
        assert_eq!(bin.max_amount_in(ONE_Q64, false).unwrap(), 1_000);
        assert_eq!(Bin::amount_out(500, ONE_Q64, true).unwrap(), 500);
        assert_eq!(Bin::amount_out(500, ONE_Q64, false).unwrap(), 500);
    }

    #[test]
    fn test_rounding_directions() {
        // price = 3.0: selling X for Y at price 3 gives 3 Y per X
        let price = 3 * ONE_Q64;
        let bin = Bin {
            amount_x: 0,
            amount_y: 10,
            price,
            ..Bin::default()
        };
        // Draining 10 Y needs ceil(10/3) = 4 X
        assert_eq!(bin.max_amount_in(price, true).unwrap(), 4);
        // 1 X buys floor(3) = 3 Y
        assert_eq!(Bin::amount_out(1, price, true).unwrap(), 3);
        // Swapping 10 Y for X pays floor(10/3) = 3
        assert_eq!(Bin::amount_out(10, price, false).unwrap(), 3);
    }
}
