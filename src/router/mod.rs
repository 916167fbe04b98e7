//! Best-route selection across protocol adapters.

use futures::future::join_all;
use solana_sdk::pubkey::Pubkey;

use crate::errors::{DexResult, RouterError};
use crate::logger::{log, LogTag};
use crate::pools::{Pool, Protocol};
use crate::rpc::SolClient;

/// Fans discovery out over every registered protocol, quotes each candidate
/// pool and keeps the argmax. A protocol or pool failing only removes
/// itself from consideration.
pub struct SimpleRouter {
    protocols: Vec<Box<dyn Protocol>>,
    pools: Vec<Box<dyn Pool>>,
}

impl SimpleRouter {
    pub fn new(protocols: Vec<Box<dyn Protocol>>) -> Self {
        Self {
            protocols,
            pools: Vec::new(),
        }
    }

    /// Build a router over an already-discovered pool set.
    pub fn with_pools(pools: Vec<Box<dyn Pool>>) -> Self {
        Self {
            protocols: Vec::new(),
            pools,
        }
    }

    pub fn pools(&self) -> &[Box<dyn Pool>] {
        &self.pools
    }

    /// Discover pools for the pair across every protocol concurrently.
    /// Individual protocol failures are logged and skipped.
    pub async fn query_all_pools(
        &mut self,
        base_mint: &Pubkey,
        quote_mint: &Pubkey,
    ) -> DexResult<&[Box<dyn Pool>]> {
        let scans = self
            .protocols
            .iter()
            .map(|protocol| protocol.fetch_pools_by_pair(base_mint, quote_mint));
        for (protocol, result) in self.protocols.iter().zip(join_all(scans).await) {
            match result {
                Ok(pools) => {
                    log(
                        LogTag::Router,
                        "INFO",
                        &format!("{}: found {} pools", protocol.kind(), pools.len()),
                    );
                    self.pools.extend(pools);
                }
                Err(err) => {
                    log(
                        LogTag::Router,
                        "WARN",
                        &format!("{}: discovery failed: {}", protocol.kind(), err),
                    );
                }
            }
        }
        Ok(&self.pools)
    }

    /// Quote every candidate and return the best pool with its output.
    /// Ties break toward the earliest-discovered pool; quoting failures skip
    /// the pool without failing the call.
    pub async fn get_best_pool(
        &mut self,
        client: &SolClient,
        input_mint: &Pubkey,
        _output_mint: &Pubkey,
        amount_in: u64,
    ) -> DexResult<(&dyn Pool, u64)> {
        let mut best: Option<(usize, u64)> = None;
        for (index, pool) in self.pools.iter_mut().enumerate() {
            let pool_id = pool.id();
            match pool.quote(client, input_mint, amount_in).await {
                Ok(amount_out) => {
                    log(
                        LogTag::Router,
                        "QUOTE",
                        &format!("{} ({}) -> {}", pool_id, pool.protocol_name(), amount_out),
                    );
                    let better = match best {
                        Some((_, best_out)) => amount_out > best_out,
                        None => true,
                    };
                    if better {
                        best = Some((index, amount_out));
                    }
                }
                Err(err) => {
                    log(
                        LogTag::Router,
                        "SKIP",
                        &format!("{} failed to quote: {}", pool_id, err),
                    );
                }
            }
        }

        match best {
            Some((index, amount_out)) => Ok((self.pools[index].as_ref(), amount_out)),
            None => Err(RouterError::NoRouteFound.into()),
        }
    }
}
