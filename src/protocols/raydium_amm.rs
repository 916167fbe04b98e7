use std::sync::Arc;

use async_trait::async_trait;
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_sdk::account::Account;
use solana_sdk::pubkey::Pubkey;

use crate::errors::{DexResult, RpcError};
use crate::logger::{log, LogTag};
use crate::pools::raydium::constants::RAYDIUM_AMM_PROGRAM_ID;
use crate::pools::raydium::AmmPool;
use crate::pools::{Pool, Protocol, ProtocolKind};
use crate::rpc::SolClient;

pub struct RaydiumAmmProtocol {
    client: Arc<SolClient>,
}

impl RaydiumAmmProtocol {
    pub fn new(client: Arc<SolClient>) -> Self {
        Self { client }
    }

    async fn scan_oriented(
        &self,
        base_mint: &Pubkey,
        quote_mint: &Pubkey,
    ) -> DexResult<Vec<(Pubkey, Account)>> {
        let filters = vec![
            RpcFilterType::DataSize(AmmPool::span() as u64),
            RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
                AmmPool::offset("coin_mint"),
                base_mint.to_bytes().to_vec(),
            )),
            RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
                AmmPool::offset("pc_mint"),
                quote_mint.to_bytes().to_vec(),
            )),
        ];
        self.client
            .get_program_accounts_with_filters(&RAYDIUM_AMM_PROGRAM_ID, filters)
            .await
    }
}

#[async_trait]
impl Protocol for RaydiumAmmProtocol {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::RaydiumAmm
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
            match AmmPool::decode(&account.data) {
                Ok(mut pool) => {
                    pool.pool_id = address;
                    pools.push(Box::new(pool));
                }
                Err(err) => {
                    log(
                        LogTag::Pool,
                        "SKIP",
                        &format!("amm v4 {} failed to decode: {}", address, err),
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
        let mut pool = AmmPool::decode(&account.data)?;
        pool.pool_id = *pool_id;
        Ok(Box::new(pool))
    }
}
