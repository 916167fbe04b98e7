//! Wide unsigned integers used by the simulators.
//!
//! Every u128 x u128 product is promoted to [`U256`] before division or
//! shifting; bitmaps stay as raw u64 limb slices (see [`crate::math::bitmap`]).

use uint::construct_uint;

construct_uint! {
    pub struct U256(4);
}

impl U256 {
    pub fn as_u128_checked(&self) -> Option<u128> {
        if self.bits() > 128 {
            None
        } else {
            Some(self.low_u128())
        }
    }
}
