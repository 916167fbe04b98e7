pub mod amm_pool;
pub mod constants;

pub use amm_pool::PumpPool;
