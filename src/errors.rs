//! Error types for the routing engine.
//!
//! Math and codec errors are fatal to the call that raised them and surface
//! unchanged. Simulator errors make the router skip the pool. Discovery
//! errors empty out a single protocol's result set without failing the call.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("arithmetic overflow")]
    Overflow,

    #[error("division by zero")]
    DivisionByZero,

    #[error("rounding error")]
    Rounding,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("account data too short: need {need} bytes, have {have}")]
    TooShort { need: usize, have: usize },

    #[error("failed to decode field {field} at offset {offset}")]
    Field { field: &'static str, offset: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwapError {
    #[error("insufficient liquidity to fill the requested amount")]
    InsufficientLiquidity,

    #[error("swap computation exceeded maximum iterations")]
    ComputationDiverged,

    #[error("sqrt price moved outside the allowed range")]
    PriceOutOfRange,

    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("pool cannot be quoted: {0}")]
    PoolNotQuotable(String),
}

#[derive(Debug, Clone, Error)]
pub enum RpcError {
    #[error("transient rpc failure: {0}")]
    Transient(String),

    #[error("permanent rpc failure: {0}")]
    Permanent(String),

    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("request cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error("no route found")]
    NoRouteFound,
}

/// Umbrella error for every subsystem.
#[derive(Debug, Error)]
pub enum DexError {
    #[error(transparent)]
    Math(#[from] MathError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Swap(#[from] SwapError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Router(#[from] RouterError),

    #[error("{0}")]
    Other(String),
}

pub type DexResult<T> = std::result::Result<T, DexError>;
