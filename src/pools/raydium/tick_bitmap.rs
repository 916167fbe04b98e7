//! Tick-array bitmap traversal.
//!
//! The pool account carries a 1024-bit bitmap covering the default range of
//! tick-array start indices; an optional extension account covers 14 more
//! 512-array windows on each side. Searching for the next initialized array
//! walks bitmap segments with leading/trailing-zero arithmetic, never one
//! tick at a time.

use solana_sdk::pubkey::Pubkey;

use crate::errors::DecodeError;
use crate::math::bitmap::{bit, next_set_bit, previous_set_bit};
use crate::math::clmm::{MAX_TICK, MIN_TICK};
use crate::math::floor_div;
use crate::pools::codec::Cursor;
use crate::pools::raydium::constants::{
    CLMM_EXT_BITMAP_SPAN, EXTENSION_TICKARRAY_BITMAP_SIZE, TICK_ARRAY_BITMAP_SIZE, TICK_ARRAY_SIZE,
};

#[derive(Debug, Clone)]
pub struct TickArrayBitmapExtension {
    pub pool_id: Pubkey,
    pub positive_tick_array_bitmap: [[u64; 8]; EXTENSION_TICKARRAY_BITMAP_SIZE],
    pub negative_tick_array_bitmap: [[u64; 8]; EXTENSION_TICKARRAY_BITMAP_SIZE],
}

impl TickArrayBitmapExtension {
    pub fn span() -> usize {
        CLMM_EXT_BITMAP_SPAN
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
        let mut positive = [[0u64; 8]; EXTENSION_TICKARRAY_BITMAP_SIZE];
        for window in positive.iter_mut() {
            *window = cursor.u64_array::<8>("positive_tick_array_bitmap")?;
        }
        let mut negative = [[0u64; 8]; EXTENSION_TICKARRAY_BITMAP_SIZE];
        for window in negative.iter_mut() {
            *window = cursor.u64_array::<8>("negative_tick_array_bitmap")?;
        }
        Ok(Self {
            pool_id,
            positive_tick_array_bitmap: positive,
            negative_tick_array_bitmap: negative,
        })
    }
}

/// One contiguous bitmap segment in global array-index space.
///
/// Array start index `s` maps to global index `g = s / mult` (exact). The
/// default bitmap holds `g in [-512, 512)`; positive extension window `w`
/// holds `g in [512(w+1), 512(w+2))`, negative window `w` holds
/// `g in [-512(w+2), -512(w+1))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Negative(usize),
    Default,
    Positive(usize),
}

const HALF: i32 = TICK_ARRAY_BITMAP_SIZE; // 512

fn segment_of(g: i32) -> Option<Segment> {
    if (-HALF..HALF).contains(&g) {
        return Some(Segment::Default);
    }
    if g >= HALF {
        let w = (g / HALF - 1) as usize;
        if w < EXTENSION_TICKARRAY_BITMAP_SIZE {
            return Some(Segment::Positive(w));
        }
    } else {
        let w = (floor_div(-g - 1, HALF) - 1) as usize;
        if w < EXTENSION_TICKARRAY_BITMAP_SIZE {
            return Some(Segment::Negative(w));
        }
    }
    None
}

fn segment_bounds(segment: Segment) -> (i32, i32) {
    match segment {
        Segment::Default => (-HALF, HALF - 1),
        Segment::Positive(w) => (HALF * (w as i32 + 1), HALF * (w as i32 + 2) - 1),
        Segment::Negative(w) => (-HALF * (w as i32 + 2), -HALF * (w as i32 + 1) - 1),
    }
}

fn segment_bit(segment: Segment, g: i32) -> usize {
    let (min_g, _) = segment_bounds(segment);
    (g - min_g) as usize
}

fn segment_limbs<'a>(
    segment: Segment,
    default_bitmap: &'a [u64; 16],
    ext: Option<&'a TickArrayBitmapExtension>,
) -> Option<&'a [u64]> {
    match segment {
        Segment::Default => Some(default_bitmap.as_slice()),
        Segment::Positive(w) => ext.map(|e| e.positive_tick_array_bitmap[w].as_slice()),
        // Negative windows store bits from the window's most negative start
        Segment::Negative(w) => ext.map(|e| e.negative_tick_array_bitmap[w].as_slice()),
    }
}

fn ticks_in_one_array(tick_spacing: u16) -> i32 {
    TICK_ARRAY_SIZE * tick_spacing as i32
}

fn min_global_index(tick_spacing: u16) -> i32 {
    floor_div(MIN_TICK, ticks_in_one_array(tick_spacing))
}

fn max_global_index(tick_spacing: u16) -> i32 {
    floor_div(MAX_TICK, ticks_in_one_array(tick_spacing))
}

/// Whether the tick array starting at `start_index` is initialized.
pub fn is_tick_array_initialized(
    default_bitmap: &[u64; 16],
    ext: Option<&TickArrayBitmapExtension>,
    start_index: i32,
    tick_spacing: u16,
) -> bool {
    let mult = ticks_in_one_array(tick_spacing);
    let g = floor_div(start_index, mult);
    let Some(segment) = segment_of(g) else {
        return false;
    };
    let Some(limbs) = segment_limbs(segment, default_bitmap, ext) else {
        return false;
    };
    bit(limbs, segment_bit(segment, g))
}

/// Next initialized tick-array start index strictly beyond `current_start`
/// in the swap direction. `None` when no further array exists in range.
pub fn next_initialized_tick_array_start_index(
    default_bitmap: &[u64; 16],
    ext: Option<&TickArrayBitmapExtension>,
    current_start: i32,
    tick_spacing: u16,
    zero_for_one: bool,
) -> Option<i32> {
    let mult = ticks_in_one_array(tick_spacing);
    let mut g = floor_div(current_start, mult);
    let min_g = min_global_index(tick_spacing);
    let max_g = max_global_index(tick_spacing);

    if zero_for_one {
        g -= 1;
        while g >= min_g {
            let segment = segment_of(g)?;
            let limbs = segment_limbs(segment, default_bitmap, ext)?;
            let (seg_min, _) = segment_bounds(segment);
            match previous_set_bit(limbs, segment_bit(segment, g)) {
                Some(found_bit) => {
                    let found_g = seg_min + found_bit as i32;
                    if found_g < min_g {
                        return None;
                    }
                    return Some(found_g * mult);
                }
                None => g = seg_min - 1,
            }
        }
        None
    } else {
        g += 1;
        while g <= max_g {
            let segment = segment_of(g)?;
            let limbs = segment_limbs(segment, default_bitmap, ext)?;
            let (seg_min, seg_max) = segment_bounds(segment);
            match next_set_bit(limbs, segment_bit(segment, g)) {
                Some(found_bit) => {
                    let found_g = seg_min + found_bit as i32;
                    if found_g > max_g {
                        return None;
                    }
                    return Some(found_g * mult);
                }
                None => g = seg_max + 1,
            }
        }
        None
    }
}

/// First tick-array start to load for a swap: the array containing the
/// current tick when initialized, otherwise the next one in direction.
pub fn first_initialized_tick_array_start_index(
    default_bitmap: &[u64; 16],
    ext: Option<&TickArrayBitmapExtension>,
    tick_current: i32,
    tick_spacing: u16,
    zero_for_one: bool,
) -> Option<i32> {
    let start = crate::pools::raydium::tick_array::TickArrayState::start_index(
        tick_current,
        tick_spacing,
    );
    if is_tick_array_initialized(default_bitmap, ext, start, tick_spacing) {
        return Some(start);
    }
    next_initialized_tick_array_start_index(
        default_bitmap,
        ext,
        start,
        tick_spacing,
        zero_for_one,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_default_bit(bitmap: &mut [u64; 16], g: i32) {
        let idx = (g + HALF) as usize;
        bitmap[idx / 64] |= 1 << (idx % 64);
    }

    #[test]
    fn test_default_bitmap_search_both_directions() {
        let mut bitmap = [0u64; 16];
        // arrays at start indices -120 and 180 (spacing 1 -> mult 60)
        set_default_bit(&mut bitmap, -2);
        set_default_bit(&mut bitmap, 3);

        assert_eq!(
            next_initialized_tick_array_start_index(&bitmap, None, 0, 1, true),
            Some(-120)
        );
        assert_eq!(
            next_initialized_tick_array_start_index(&bitmap, None, 0, 1, false),
            Some(180)
        );
        // Strictly beyond the current array
        assert_eq!(
            next_initialized_tick_array_start_index(&bitmap, None, 180, 1, false),
            None
        );
        assert_eq!(
            next_initialized_tick_array_start_index(&bitmap, None, -120, 1, true),
            None
        );
    }

    #[test]
    fn test_is_initialized_checks_exact_bit() {
        let mut bitmap = [0u64; 16];
        set_default_bit(&mut bitmap, 0);
        assert!(is_tick_array_initialized(&bitmap, None, 0, 1));
        assert!(!is_tick_array_initialized(&bitmap, None, 60, 1));
        // -60 maps to g = -1
        assert!(!is_tick_array_initialized(&bitmap, None, -60, 1));
    }

    #[test]
    fn test_extension_consulted_past_default_range() {
        let bitmap = [0u64; 16];
        let mut ext = TickArrayBitmapExtension {
            pool_id: Pubkey::new_unique(),
            positive_tick_array_bitmap: [[0u64; 8]; EXTENSION_TICKARRAY_BITMAP_SIZE],
            negative_tick_array_bitmap: [[0u64; 8]; EXTENSION_TICKARRAY_BITMAP_SIZE],
        };
        // g = 512 is bit 0 of positive window 0 -> start = 512 * 60 = 30720
        ext.positive_tick_array_bitmap[0][0] |= 1;
        assert_eq!(
            next_initialized_tick_array_start_index(&bitmap, Some(&ext), 0, 1, false),
            Some(30720)
        );
        // Without the extension nothing is found
        assert_eq!(
            next_initialized_tick_array_start_index(&bitmap, None, 0, 1, false),
            None
        );

        // g = -513 is the top bit of negative window 0 -> start = -513 * 60
        let mut ext2 = ext.clone();
        ext2.positive_tick_array_bitmap[0][0] = 0;
        ext2.negative_tick_array_bitmap[0][7] |= 1 << 63;
        assert_eq!(
            next_initialized_tick_array_start_index(&bitmap, Some(&ext2), -30720, 1, true),
            Some(-513 * 60)
        );
    }

    #[test]
    fn test_first_initialized_prefers_current_array() {
        let mut bitmap = [0u64; 16];
        set_default_bit(&mut bitmap, 0);
        assert_eq!(
            first_initialized_tick_array_start_index(&bitmap, None, 30, 1, true),
            Some(0)
        );
        assert_eq!(
            first_initialized_tick_array_start_index(&bitmap, None, 90, 1, true),
            Some(0)
        );
        assert_eq!(
            first_initialized_tick_array_start_index(&bitmap, None, 90, 1, false),
            None
        );
    }
}
