//! Bin-array bitmap traversal.
//!
//! The pair account's 1024-bit bitmap covers bin-array indices in
//! `[-512, 511]`. The extension account adds 12 more 512-array windows per
//! side. Negative extension windows store their bits inverted: window `w`
//! bit `b` marks bin-array index `-((w+1)*512 + b) - 1`.

use solana_sdk::pubkey::Pubkey;

use crate::errors::DecodeError;
use crate::math::bitmap::{bit, next_set_bit, previous_set_bit};
use crate::pools::codec::Cursor;
use crate::pools::meteora::constants::{
    BIN_ARRAY_BITMAP_SIZE, BITMAP_EXTENSION_SPAN, EXTENSION_BIN_ARRAY_BITMAP_SIZE,
};

#[derive(Debug, Clone)]
pub struct BinArrayBitmapExtension {
    pub lb_pair: Pubkey,
    pub positive_bin_array_bitmap: [[u64; 8]; EXTENSION_BIN_ARRAY_BITMAP_SIZE],
    pub negative_bin_array_bitmap: [[u64; 8]; EXTENSION_BIN_ARRAY_BITMAP_SIZE],
}

impl BinArrayBitmapExtension {
    pub fn span() -> usize {
        BITMAP_EXTENSION_SPAN
    }

    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < Self::span() {
            return Err(DecodeError::TooShort {
                need: Self::span(),
                have: data.len(),
            });
        }
        let mut cursor = Cursor::new(&data[8..]);
        let lb_pair = cursor.pubkey("lb_pair")?;
        let mut positive = [[0u64; 8]; EXTENSION_BIN_ARRAY_BITMAP_SIZE];
        for window in positive.iter_mut() {
            *window = cursor.u64_array::<8>("positive_bin_array_bitmap")?;
        }
        let mut negative = [[0u64; 8]; EXTENSION_BIN_ARRAY_BITMAP_SIZE];
        for window in negative.iter_mut() {
            *window = cursor.u64_array::<8>("negative_bin_array_bitmap")?;
        }
        Ok(Self {
            lb_pair,
            positive_bin_array_bitmap: positive,
            negative_bin_array_bitmap: negative,
        })
    }

    /// Full index range covered when this extension is present.
    pub fn bitmap_range() -> (i32, i32) {
        (
            -BIN_ARRAY_BITMAP_SIZE * (EXTENSION_BIN_ARRAY_BITMAP_SIZE as i32 + 1),
            BIN_ARRAY_BITMAP_SIZE * (EXTENSION_BIN_ARRAY_BITMAP_SIZE as i32 + 1) - 1,
        )
    }
}

const HALF: i32 = BIN_ARRAY_BITMAP_SIZE;

/// Whether `index` falls outside the default pair-account bitmap.
pub fn is_overflow_default_bin_array_bitmap(index: i32) -> bool {
    !( -HALF..HALF ).contains(&index)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Negative(usize),
    Default,
    Positive(usize),
}

fn segment_of(index: i32) -> Option<Segment> {
    if (-HALF..HALF).contains(&index) {
        return Some(Segment::Default);
    }
    if index >= HALF {
        let w = (index / HALF - 1) as usize;
        if w < EXTENSION_BIN_ARRAY_BITMAP_SIZE {
            return Some(Segment::Positive(w));
        }
    } else {
        let w = ((-(index + 1)) / HALF - 1) as usize;
        if w < EXTENSION_BIN_ARRAY_BITMAP_SIZE {
            return Some(Segment::Negative(w));
        }
    }
    None
}

/// Inclusive index bounds of a segment.
fn segment_bounds(segment: Segment) -> (i32, i32) {
    match segment {
        Segment::Default => (-HALF, HALF - 1),
        Segment::Positive(w) => (HALF * (w as i32 + 1), HALF * (w as i32 + 2) - 1),
        Segment::Negative(w) => (-HALF * (w as i32 + 2), -HALF * (w as i32 + 1) - 1),
    }
}

/// Bit position of `index` inside its segment's bitmap.
fn segment_bit(segment: Segment, index: i32) -> usize {
    match segment {
        Segment::Default => (index + HALF) as usize,
        Segment::Positive(w) => (index - HALF * (w as i32 + 1)) as usize,
        // Inverted: more negative indices live at higher bits
        Segment::Negative(w) => (-(index + 1) - HALF * (w as i32 + 1)) as usize,
    }
}

fn segment_index(segment: Segment, bit_pos: usize) -> i32 {
    match segment {
        Segment::Default => bit_pos as i32 - HALF,
        Segment::Positive(w) => HALF * (w as i32 + 1) + bit_pos as i32,
        Segment::Negative(w) => -(HALF * (w as i32 + 1) + bit_pos as i32) - 1,
    }
}

fn segment_limbs<'a>(
    segment: Segment,
    default_bitmap: &'a [u64; 16],
    ext: Option<&'a BinArrayBitmapExtension>,
) -> Option<&'a [u64]> {
    match segment {
        Segment::Default => Some(default_bitmap.as_slice()),
        Segment::Positive(w) => ext.map(|e| e.positive_bin_array_bitmap[w].as_slice()),
        Segment::Negative(w) => ext.map(|e| e.negative_bin_array_bitmap[w].as_slice()),
    }
}

/// Whether the bin array at `index` is flagged as holding liquidity.
pub fn bin_array_has_liquidity_flag(
    default_bitmap: &[u64; 16],
    ext: Option<&BinArrayBitmapExtension>,
    index: i32,
) -> bool {
    let Some(segment) = segment_of(index) else {
        return false;
    };
    let Some(limbs) = segment_limbs(segment, default_bitmap, ext) else {
        return false;
    };
    bit(limbs, segment_bit(segment, index))
}

/// Next bin-array index flagged with liquidity, starting at `from_index`
/// inclusive, moving down when `swap_for_y`. `None` when the range runs out.
pub fn next_bin_array_index_with_liquidity(
    default_bitmap: &[u64; 16],
    ext: Option<&BinArrayBitmapExtension>,
    swap_for_y: bool,
    from_index: i32,
) -> Option<i32> {
    let mut index = from_index;
    loop {
        let segment = segment_of(index)?;
        let limbs = segment_limbs(segment, default_bitmap, ext)?;
        let (seg_min, seg_max) = segment_bounds(segment);
        let bit_pos = segment_bit(segment, index);

        // Negative extension windows run backwards, so the in-bitmap scan
        // direction flips there
        let scan_down_in_bits = match segment {
            Segment::Negative(_) => !swap_for_y,
            _ => swap_for_y,
        };
        let found = if scan_down_in_bits {
            previous_set_bit(limbs, bit_pos)
        } else {
            next_set_bit(limbs, bit_pos)
        };
        if let Some(found_bit) = found {
            return Some(segment_index(segment, found_bit));
        }

        index = if swap_for_y { seg_min - 1 } else { seg_max + 1 };
    }
}
