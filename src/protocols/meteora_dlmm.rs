use std::sync::Arc;

use async_trait::async_trait;
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_sdk::account::Account;
use solana_sdk::pubkey::Pubkey;

use crate::errors::{DexResult, RpcError};
use crate::logger::{log, LogTag};
use crate::pools::meteora::constants::METEORA_DLMM_PROGRAM_ID;
use crate::pools::meteora::DlmmPool;
use crate::pools::{Pool, Protocol, ProtocolKind};
use crate::rpc::SolClient;

pub struct MeteoraDlmmProtocol {
    client: Arc<SolClient>,
}

impl MeteoraDlmmProtocol {
    pub fn new(client: Arc<SolClient>) -> Self {
        Self { client }
    }

    async fn scan_oriented(
        &self,
        base_mint: &Pubkey,
        quote_mint: &Pubkey,
    ) -> DexResult<Vec<(Pubkey, Account)>> {
        let filters = vec![
            RpcFilterType::DataSize(DlmmPool::span() as u64),
            RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
                DlmmPool::offset("token_x_mint"),
                base_mint.to_bytes().to_vec(),
            )),
            RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
                DlmmPool::offset("token_y_mint"),
                quote_mint.to_bytes().to_vec(),
            )),
        ];
        self.client
            .get_program_accounts_with_filters(&METEORA_DLMM_PROGRAM_ID, filters)
            .await
    }

    /// Decode a pair and prefetch the bin arrays a swap would touch; pairs
    /// without any reachable liquidity are dropped here.
    async fn build_pool(&self, address: Pubkey, account: &Account) -> DexResult<DlmmPool> {
        let mut pool = DlmmPool::decode(&account.data)?.with_identity(address);
        for swap_for_y in [true, false] {
            if let Err(err) = pool.get_bin_arrays_for_swap(&self.client, swap_for_y).await {
                log(
                    LogTag::Pool,
                    "DEBUG",
                    &format!(
                        "dlmm {}: no bin arrays for swap_for_y={}: {}",
                        address, swap_for_y, err
                    ),
                );
            }
        }
        if pool.bin_array_cache.is_empty() {
            return Err(crate::errors::SwapError::InsufficientLiquidity.into());
        }
        Ok(pool)
    }
}

#[async_trait]
impl Protocol for MeteoraDlmmProtocol {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::MeteoraDlmm
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
            match self.build_pool(address, &account).await {
                Ok(pool) => {
                    if !pool.is_enabled() {
                        log(
                            LogTag::Pool,
                            "SKIP",
                            &format!("dlmm {} pair is disabled", address),
                        );
                        continue;
                    }
                    pools.push(Box::new(pool));
                }
                Err(err) => {
                    log(
                        LogTag::Pool,
                        "SKIP",
                        &format!("dlmm {} unusable: {}", address, err),
                    );
                }
            }
        }
        Ok(pools)
    }

    async fn fetch_pool_by_id(&self, pool_id: &Pubkey) -> DexResult<Box<dyn Pool>> {
        let account = self
            .client
            .get_account_optional(pool_id)
            .await?
            .ok_or_else(|| RpcError::AccountNotFound(pool_id.to_string()))?;
        let pool = self.build_pool(*pool_id, &account).await?;
        Ok(Box::new(pool))
    }
}
