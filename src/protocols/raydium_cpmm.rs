use std::sync::Arc;

use async_trait::async_trait;
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_sdk::account::Account;
use solana_sdk::pubkey::Pubkey;

use crate::errors::{DexResult, RpcError};
use crate::logger::{log, LogTag};
use crate::pools::raydium::constants::{CPMM_POOL_DISCRIMINATOR, RAYDIUM_CPMM_PROGRAM_ID};
use crate::pools::raydium::CpmmPool;
use crate::pools::{Pool, Protocol, ProtocolKind};
use crate::rpc::SolClient;

pub struct RaydiumCpmmProtocol {
    client: Arc<SolClient>,
}

impl RaydiumCpmmProtocol {
    pub fn new(client: Arc<SolClient>) -> Self {
        Self { client }
    }

    async fn scan_oriented(
        &self,
        base_mint: &Pubkey,
        quote_mint: &Pubkey,
    ) -> DexResult<Vec<(Pubkey, Account)>> {
        let filters = vec![
            RpcFilterType::Memcmp(Memcmp::new_raw_bytes(0, CPMM_POOL_DISCRIMINATOR.to_vec())),
            RpcFilterType::DataSize(CpmmPool::span() as u64),
            RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
                CpmmPool::offset("token_0_mint"),
                base_mint.to_bytes().to_vec(),
            )),
            RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
                CpmmPool::offset("token_1_mint"),
                quote_mint.to_bytes().to_vec(),
            )),
        ];
        self.client
            .get_program_accounts_with_filters(&RAYDIUM_CPMM_PROGRAM_ID, filters)
            .await
    }

    async fn build_pool(&self, address: Pubkey, account: &Account) -> DexResult<CpmmPool> {
        let mut pool = CpmmPool::decode(&account.data)?;
        pool.pool_id = address;
        let config = self.client.get_account(&pool.amm_config).await?;
        pool.trade_fee_rate = CpmmPool::decode_trade_fee_rate(&config.data)?;
        Ok(pool)
    }
}

#[async_trait]
impl Protocol for RaydiumCpmmProtocol {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::RaydiumCpmm
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
                Ok(pool) => pools.push(Box::new(pool)),
                Err(err) => {
                    log(
                        LogTag::Pool,
                        "SKIP",
                        &format!("cpmm {} failed to decode: {}", address, err),
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
