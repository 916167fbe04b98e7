//! Bit search over wide bitmaps represented as little-endian u64 limbs.

/// Index of the most significant set bit, or `None` when the bitmap is zero.
pub fn most_significant_bit(limbs: &[u64]) -> Option<usize> {
    for (i, limb) in limbs.iter().enumerate().rev() {
        if *limb != 0 {
            return Some(i * 64 + 63 - limb.leading_zeros() as usize);
        }
    }
    None
}

/// Index of the least significant set bit, or `None` when the bitmap is zero.
pub fn least_significant_bit(limbs: &[u64]) -> Option<usize> {
    for (i, limb) in limbs.iter().enumerate() {
        if *limb != 0 {
            return Some(i * 64 + limb.trailing_zeros() as usize);
        }
    }
    None
}

/// Leading zero count over the full bitmap width.
pub fn leading_zeros(limbs: &[u64]) -> usize {
    match most_significant_bit(limbs) {
        Some(msb) => limbs.len() * 64 - 1 - msb,
        None => limbs.len() * 64,
    }
}

/// Trailing zero count over the full bitmap width.
pub fn trailing_zeros(limbs: &[u64]) -> usize {
    match least_significant_bit(limbs) {
        Some(lsb) => lsb,
        None => limbs.len() * 64,
    }
}

/// Whether bit `index` is set.
pub fn bit(limbs: &[u64], index: usize) -> bool {
    let limb = index / 64;
    if limb >= limbs.len() {
        return false;
    }
    limbs[limb] & (1u64 << (index % 64)) != 0
}

/// Highest set bit at or below `from`, scanning downward.
pub fn previous_set_bit(limbs: &[u64], from: usize) -> Option<usize> {
    if limbs.is_empty() {
        return None;
    }
    let mut limb_idx = from / 64;
    if limb_idx >= limbs.len() {
        limb_idx = limbs.len() - 1;
    }
    let bit_idx = (from % 64) as u32;

    // Mask off bits above `from` in the starting limb
    let mask = if from / 64 < limbs.len() && bit_idx < 63 {
        (1u64 << (bit_idx + 1)) - 1
    } else {
        u64::MAX
    };
    let masked = limbs[limb_idx] & mask;
    if masked != 0 {
        return Some(limb_idx * 64 + 63 - masked.leading_zeros() as usize);
    }
    for i in (0..limb_idx).rev() {
        if limbs[i] != 0 {
            return Some(i * 64 + 63 - limbs[i].leading_zeros() as usize);
        }
    }
    None
}

/// Lowest set bit at or above `from`, scanning upward.
pub fn next_set_bit(limbs: &[u64], from: usize) -> Option<usize> {
    let limb_idx = from / 64;
    if limb_idx >= limbs.len() {
        return None;
    }
    let bit_idx = (from % 64) as u32;

    let masked = limbs[limb_idx] & (u64::MAX << bit_idx);
    if masked != 0 {
        return Some(limb_idx * 64 + masked.trailing_zeros() as usize);
    }
    for (i, limb) in limbs.iter().enumerate().skip(limb_idx + 1) {
        if *limb != 0 {
            return Some(i * 64 + limb.trailing_zeros() as usize);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msb_lsb() {
        let limbs = [0u64, 0b1010, 0, 0];
        assert_eq!(least_significant_bit(&limbs), Some(65));
        assert_eq!(most_significant_bit(&limbs), Some(67));
        assert_eq!(leading_zeros(&limbs), 256 - 1 - 67);
        assert_eq!(trailing_zeros(&limbs), 65);
        assert_eq!(most_significant_bit(&[0u64; 4]), None);
        assert_eq!(trailing_zeros(&[0u64; 4]), 256);
    }

    #[test]
    fn test_directional_search() {
        let limbs = [0b100u64, 1 << 63, 0, 1];
        assert_eq!(next_set_bit(&limbs, 0), Some(2));
        assert_eq!(next_set_bit(&limbs, 3), Some(127));
        assert_eq!(next_set_bit(&limbs, 128), Some(192));
        assert_eq!(next_set_bit(&limbs, 193), None);
        assert_eq!(previous_set_bit(&limbs, 255), Some(192));
        assert_eq!(previous_set_bit(&limbs, 191), Some(127));
        assert_eq!(previous_set_bit(&limbs, 126), Some(2));
        assert_eq!(previous_set_bit(&limbs, 1), None);
        assert!(bit(&limbs, 2));
        assert!(!bit(&limbs, 3));
    }
}
