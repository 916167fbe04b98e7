//! Bin-array accounts.

use solana_sdk::pubkey::Pubkey;

use crate::errors::DecodeError;
use crate::pools::codec::Cursor;
use crate::pools::meteora::bin::Bin;
use crate::pools::meteora::constants::{BIN_ARRAY_SPAN, MAX_BIN_PER_ARRAY};
use crate::pools::meteora::math::bin_array_lower_upper_bin_id;

#[derive(Debug, Clone)]
pub struct BinArray {
    pub index: i64,
    pub version: u8,
    pub lb_pair: Pubkey,
    pub bins: Vec<Bin>,
}

impl BinArray {
    pub fn span() -> usize {
        BIN_ARRAY_SPAN
    }

    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < Self::span() {
            return Err(DecodeError::TooShort {
                need: Self::span(),
                have: data.len(),
            });
        }
        let mut cursor = Cursor::new(&data[8..]);
        let index = cursor.i64("index")?;
        let version = cursor.u8("version")?;
        cursor.skip("padding", 7)?;
        let lb_pair = cursor.pubkey("lb_pair")?;
        let mut bins = Vec::with_capacity(MAX_BIN_PER_ARRAY as usize);
        for _ in 0..MAX_BIN_PER_ARRAY {
            bins.push(Bin {
                amount_x: cursor.u64("amount_x")?,
                amount_y: cursor.u64("amount_y")?,
                price: cursor.u128("price")?,
                liquidity_supply: cursor.u128("liquidity_supply")?,
                reward_per_token_stored: [
                    cursor.u128("reward_per_token_stored_0")?,
                    cursor.u128("reward_per_token_stored_1")?,
                ],
                fee_amount_x_per_token_stored: cursor.u128("fee_amount_x_per_token_stored")?,
                fee_amount_y_per_token_stored: cursor.u128("fee_amount_y_per_token_stored")?,
                amount_x_in: cursor.u128("amount_x_in")?,
                amount_y_in: cursor.u128("amount_y_in")?,
            });
        }
        Ok(Self {
            index,
            version,
            lb_pair,
            bins,
        })
    }

    /// The bin holding `bin_id`, when this array covers it.
    pub fn bin(&self, bin_id: i32) -> Option<&Bin> {
        let (lower, upper) = bin_array_lower_upper_bin_id(self.index as i32);
        if bin_id < lower || bin_id > upper {
            return None;
        }
        self.bins.get((bin_id - lower) as usize)
    }

    /// Whether any bin in the array still holds the output-side token.
    pub fn has_liquidity(&self, swap_for_y: bool) -> bool {
        self.bins.iter().any(|b| !b.is_empty(!swap_for_y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bin_lookup_negative_array() {
        let mut bins = vec![Bin::default(); MAX_BIN_PER_ARRAY as usize];
        bins[69].amount_y = 42;
        let array = BinArray {
            index: -1,
            version: 1,
            lb_pair: Pubkey::new_unique(),
            bins,
        };
        // Array -1 covers bins [-70, -1]; bin -1 is the last slot
        assert_eq!(array.bin(-1).unwrap().amount_y, 42);
        assert_eq!(array.bin(-70).unwrap().amount_y, 0);
        assert!(array.bin(0).is_none());
        assert!(array.bin(-71).is_none());
    }

    #[test]
    fn test_decode_round_trip_fields() {
        let mut data = vec![0u8; BinArray::span()];
        // index = -1
        data[8..16].copy_from_slice(&(-1i64).to_le_bytes());
        data[16] = 1; // version
        let pair = Pubkey::new_unique();
        data[24..56].copy_from_slice(pair.as_ref());
        // first bin amount_x
        data[56..64].copy_from_slice(&7u64.to_le_bytes());
        let array = BinArray::decode(&data).unwrap();
        assert_eq!(array.index, -1);
        assert_eq!(array.lb_pair, pair);
        assert_eq!(array.bins[0].amount_x, 7);
    }
}
