use std::sync::Arc;

use async_trait::async_trait;
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_sdk::account::Account;
use solana_sdk::pubkey::Pubkey;

use crate::errors::{DexResult, RpcError, SwapError};
use crate::logger::{log, LogTag};
use crate::pools::orca::constants::{
    LIQUIDITY_NET_SANITY_BOUND, ORCA_WHIRLPOOL_PROGRAM_ID, WHIRLPOOL_DISCRIMINATOR,
};
use crate::pools::orca::tick_array::derive_swap_tick_array_pdas;
use crate::pools::orca::{WhirlpoolPool, WhirlpoolTickArray};
use crate::pools::{Pool, Protocol, ProtocolKind};
use crate::rpc::SolClient;

pub struct OrcaWhirlpoolProtocol {
    client: Arc<SolClient>,
}

impl OrcaWhirlpoolProtocol {
    pub fn new(client: Arc<SolClient>) -> Self {
        Self { client }
    }

    async fn scan_oriented(
        &self,
        base_mint: &Pubkey,
        quote_mint: &Pubkey,
    ) -> DexResult<Vec<(Pubkey, Account)>> {
        let filters = vec![
            RpcFilterType::Memcmp(Memcmp::new_raw_bytes(0, WHIRLPOOL_DISCRIMINATOR.to_vec())),
            RpcFilterType::DataSize(WhirlpoolPool::span() as u64),
            RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
                WhirlpoolPool::offset("token_mint_a"),
                base_mint.to_bytes().to_vec(),
            )),
            RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
                WhirlpoolPool::offset("token_mint_b"),
                quote_mint.to_bytes().to_vec(),
            )),
        ];
        self.client
            .get_program_accounts_with_filters(&ORCA_WHIRLPOOL_PROGRAM_ID, filters)
            .await
    }

    /// Verify the tick arrays a swap needs are present on-chain, in both
    /// directions; missing or corrupted primary arrays disqualify the pool.
    async fn validate_critical_tick_arrays(&self, pool: &WhirlpoolPool) -> DexResult<()> {
        for a_to_b in [true, false] {
            let pdas = derive_swap_tick_array_pdas(
                &pool.pool_id,
                pool.tick_current_index,
                pool.tick_spacing,
                a_to_b,
            )?;
            let addresses: Vec<Pubkey> =
                pdas.iter().copied().filter(|p| *p != Pubkey::default()).collect();
            let accounts = self.client.get_multiple_accounts(&addresses).await?;

            let primary = accounts.first().and_then(|a| a.as_ref()).ok_or_else(|| {
                SwapError::PoolNotQuotable(format!(
                    "primary tick array missing for a_to_b={}",
                    a_to_b
                ))
            })?;

            let missing = accounts.iter().skip(1).filter(|a| a.is_none()).count();
            if missing > 1 {
                return Err(SwapError::PoolNotQuotable(format!(
                    "{} tick arrays missing for a_to_b={}",
                    missing, a_to_b
                ))
                .into());
            }

            let array = WhirlpoolTickArray::decode(&primary.data)?;
            if array
                .ticks
                .iter()
                .any(|t| t.liquidity_net.abs() > LIQUIDITY_NET_SANITY_BOUND)
            {
                return Err(SwapError::PoolNotQuotable(format!(
                    "abnormal liquidity_net in primary tick array for a_to_b={}",
                    a_to_b
                ))
                .into());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Protocol for OrcaWhirlpoolProtocol {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::OrcaWhirlpool
    }

    async fn fetch_pools_by_pair(
        &self,
        base_mint: &Pubkey,
        quote_mint: &Pubkey,
    ) -> DexResult<Vec<Box<dyn Pool>>> {
        let mut accounts = self.scan_oriented(base_mint, quote_mint).await?;
        accounts.extend(self.scan_oriented(quote_mint, base_mint).await?);

        let mut pools: Vec<Box<dyn Pool>> = Vec::new();
        for (address, account) in accounts {
            let mut pool = match WhirlpoolPool::decode(&account.data) {
                Ok(pool) => pool,
                Err(err) => {
                    log(
                        LogTag::Pool,
                        "SKIP",
                        &format!("whirlpool {} failed to decode: {}", address, err),
                    );
                    continue;
                }
            };
            pool.pool_id = address;

            if let Err(err) = pool.is_healthy() {
                log(
                    LogTag::Pool,
                    "SKIP",
                    &format!("whirlpool {} unhealthy: {}", address, err),
                );
                continue;
            }
            if let Err(err) = self.validate_critical_tick_arrays(&pool).await {
                log(
                    LogTag::Pool,
                    "SKIP",
                    &format!("whirlpool {} tick arrays unusable: {}", address, err),
                );
                continue;
            }
            pools.push(Box::new(pool));
        }
        Ok(pools)
    }

    async fn fetch_pool_by_id(&self, pool_id: &Pubkey) -> DexResult<Box<dyn Pool>> {
        let account = self
            .client
            .get_account_optional(pool_id)
            .await?
            .ok_or_else(|| RpcError::AccountNotFound(pool_id.to_string()))?;
        let mut pool = WhirlpoolPool::decode(&account.data)?;
        pool.pool_id = *pool_id;
        Ok(Box::new(pool))
    }
}
