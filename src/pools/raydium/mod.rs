pub mod amm_pool;
pub mod clmm_pool;
pub mod constants;
pub mod cpmm_pool;
pub mod tick_array;
pub mod tick_bitmap;

pub use amm_pool::AmmPool;
pub use clmm_pool::ClmmPool;
pub use cpmm_pool::CpmmPool;
pub use tick_array::{TickArrayState, TickState};
pub use tick_bitmap::TickArrayBitmapExtension;
