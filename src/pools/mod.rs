//! Uniform pool abstraction over the supported AMM protocols.

pub mod codec;
pub mod meteora;
pub mod orca;
pub mod pump;
pub mod raydium;

use async_trait::async_trait;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;

use crate::errors::DexResult;
use crate::rpc::SolClient;

/// Human-readable protocol identifier.
pub type ProtocolName = &'static str;

/// Stable numeric protocol tag; the discriminant order is part of the
/// public surface and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ProtocolKind {
    RaydiumAmm = 0,
    RaydiumClmm = 1,
    RaydiumCpmm = 2,
    MeteoraDlmm = 3,
    PumpAmm = 4,
    OrcaWhirlpool = 5,
}

impl ProtocolKind {
    pub fn name(&self) -> ProtocolName {
        match self {
            ProtocolKind::RaydiumAmm => "raydium_amm",
            ProtocolKind::RaydiumClmm => "raydium_clmm",
            ProtocolKind::RaydiumCpmm => "raydium_cpmm",
            ProtocolKind::MeteoraDlmm => "meteora_dlmm",
            ProtocolKind::PumpAmm => "pump_amm",
            ProtocolKind::OrcaWhirlpool => "orca_whirlpool",
        }
    }
}

impl std::fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ProtocolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "raydium_amm" | "raydiumamm" => Ok(ProtocolKind::RaydiumAmm),
            "raydium_clmm" | "raydiumclmm" => Ok(ProtocolKind::RaydiumClmm),
            "raydium_cpmm" | "raydiumcpmm" => Ok(ProtocolKind::RaydiumCpmm),
            "meteora_dlmm" | "meteoradlmm" => Ok(ProtocolKind::MeteoraDlmm),
            "pump_amm" | "pumpamm" => Ok(ProtocolKind::PumpAmm),
            "orca_whirlpool" | "orcawhirlpool" => Ok(ProtocolKind::OrcaWhirlpool),
            other => Err(format!("unknown protocol: {}", other)),
        }
    }
}

/// A discovered pool snapshot able to quote and to build its swap.
///
/// `quote` may refresh ancillary accounts (tick arrays, bin arrays, bitmap
/// extensions) through the shared client; those refreshes only touch the
/// snapshot's own caches.
#[async_trait]
pub trait Pool: Send + Sync + std::fmt::Debug {
    fn protocol_kind(&self) -> ProtocolKind;

    fn protocol_name(&self) -> ProtocolName {
        self.protocol_kind().name()
    }

    fn program_id(&self) -> Pubkey;

    /// Pool account address, rendered base58 via Display.
    fn id(&self) -> Pubkey;

    /// `(base_mint, quote_mint)` in the pool's own orientation.
    fn tokens(&self) -> (Pubkey, Pubkey);

    /// Expected output for an exact input of `amount_in` of `input_mint`.
    async fn quote(
        &mut self,
        client: &SolClient,
        input_mint: &Pubkey,
        amount_in: u64,
    ) -> DexResult<u64>;

    /// Assemble the on-chain instruction list executing the swap.
    async fn build_swap_instructions(
        &self,
        client: &SolClient,
        user: &Pubkey,
        input_mint: &Pubkey,
        amount_in: u64,
        min_amount_out: u64,
    ) -> DexResult<Vec<Instruction>>;
}

/// Per-protocol discovery surface.
#[async_trait]
pub trait Protocol: Send + Sync {
    fn kind(&self) -> ProtocolKind;

    /// Scan the protocol's program for pools trading `(base, quote)`. Both
    /// orientations are queried; pools that fail decoding or health checks
    /// are dropped with a diagnostic.
    async fn fetch_pools_by_pair(
        &self,
        base_mint: &Pubkey,
        quote_mint: &Pubkey,
    ) -> DexResult<Vec<Box<dyn Pool>>>;

    /// Read and decode a single pool account.
    async fn fetch_pool_by_id(&self, pool_id: &Pubkey) -> DexResult<Box<dyn Pool>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_tags_are_stable() {
        assert_eq!(u8::from(ProtocolKind::RaydiumAmm), 0);
        assert_eq!(u8::from(ProtocolKind::RaydiumClmm), 1);
        assert_eq!(u8::from(ProtocolKind::RaydiumCpmm), 2);
        assert_eq!(u8::from(ProtocolKind::MeteoraDlmm), 3);
        assert_eq!(u8::from(ProtocolKind::PumpAmm), 4);
        assert_eq!(u8::from(ProtocolKind::OrcaWhirlpool), 5);
        assert_eq!(ProtocolKind::try_from(3u8).unwrap(), ProtocolKind::MeteoraDlmm);
    }

    #[test]
    fn test_protocol_names() {
        assert_eq!(ProtocolKind::RaydiumClmm.to_string(), "raydium_clmm");
        assert_eq!(ProtocolKind::OrcaWhirlpool.name(), "orca_whirlpool");
        assert_eq!(
            "meteora_dlmm".parse::<ProtocolKind>().unwrap(),
            ProtocolKind::MeteoraDlmm
        );
        assert!("serum".parse::<ProtocolKind>().is_err());
    }
}
