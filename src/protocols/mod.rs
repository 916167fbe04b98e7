//! Per-protocol discovery adapters.
//!
//! Every adapter scans its program with a data-size filter plus two
//! memory-compare filters on the mint fields, queries both pair
//! orientations, and silently drops accounts that fail to decode or fail a
//! health check (with a logged diagnostic).

pub mod meteora_dlmm;
pub mod orca_whirlpool;
pub mod pump_amm;
pub mod raydium_amm;
pub mod raydium_clmm;
pub mod raydium_cpmm;

pub use meteora_dlmm::MeteoraDlmmProtocol;
pub use orca_whirlpool::OrcaWhirlpoolProtocol;
pub use pump_amm::PumpAmmProtocol;
pub use raydium_amm::RaydiumAmmProtocol;
pub use raydium_clmm::RaydiumClmmProtocol;
pub use raydium_cpmm::RaydiumCpmmProtocol;
