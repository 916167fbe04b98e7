pub mod constants;
pub mod tick_array;
pub mod whirlpool_pool;

pub use tick_array::{WhirlpoolTickArray, WhirlpoolTickState};
pub use whirlpool_pool::WhirlpoolPool;
