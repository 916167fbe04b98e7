pub mod bin;
pub mod bin_array;
pub mod bitmap_extension;
pub mod constants;
pub mod dlmm_pool;
pub mod math;

pub use bin::Bin;
pub use bin_array::BinArray;
pub use bitmap_extension::BinArrayBitmapExtension;
pub use dlmm_pool::DlmmPool;
