use std::sync::Arc;

use async_trait::async_trait;
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_sdk::account::Account;
use solana_sdk::pubkey::Pubkey;

use crate::errors::{DexResult, RpcError};
use crate::logger::{log, LogTag};
use crate::pools::raydium::constants::{
    clmm_program_id, CLMM_AMM_CONFIG_TRADE_FEE_OFFSET, CLMM_POOL_DISCRIMINATOR,
};
use crate::pools::raydium::tick_array::get_pda_ex_bitmap_address;
use crate::pools::raydium::ClmmPool;
use crate::pools::{Pool, Protocol, ProtocolKind};
use crate::rpc::SolClient;

pub struct RaydiumClmmProtocol {
    client: Arc<SolClient>,
}

impl RaydiumClmmProtocol {
    pub fn new(client: Arc<SolClient>) -> Self {
        Self { client }
    }

    async fn scan_oriented(
        &self,
        base_mint: &Pubkey,
        quote_mint: &Pubkey,
    ) -> DexResult<Vec<(Pubkey, Account)>> {
        let filters = vec![
            RpcFilterType::Memcmp(Memcmp::new_raw_bytes(0, CLMM_POOL_DISCRIMINATOR.to_vec())),
            RpcFilterType::DataSize(ClmmPool::span() as u64),
            RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
                ClmmPool::offset("token_mint_0"),
                base_mint.to_bytes().to_vec(),
            )),
            RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
                ClmmPool::offset("token_mint_1"),
                quote_mint.to_bytes().to_vec(),
            )),
        ];
        self.client
            .get_program_accounts_with_filters(&clmm_program_id(), filters)
            .await
    }

    /// Decode one scanned account into a pool, wiring client-side state.
    async fn build_pool(&self, address: Pubkey, account: &Account) -> DexResult<ClmmPool> {
        let mut pool = ClmmPool::decode(&account.data)?;
        pool.pool_id = address;
        pool.ext_bitmap_address = get_pda_ex_bitmap_address(&clmm_program_id(), &address);

        // The trade fee lives in the pool's AmmConfig account
        let config = self.client.get_account(&pool.amm_config).await?;
        let offset = CLMM_AMM_CONFIG_TRADE_FEE_OFFSET;
        let bytes = config
            .data
            .get(offset..offset + 4)
            .ok_or(crate::errors::DecodeError::Field {
                field: "trade_fee_rate",
                offset,
            })?;
        pool.fee_rate = u32::from_le_bytes(bytes.try_into().unwrap());
        Ok(pool)
    }
}

#[async_trait]
impl Protocol for RaydiumClmmProtocol {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::RaydiumClmm
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
                    if !pool.is_swap_enabled() {
                        log(
                            LogTag::Pool,
                            "SKIP",
                            &format!("clmm {} has swapping disabled", address),
                        );
                        continue;
                    }
                    pools.push(Box::new(pool));
                }
                Err(err) => {
                    log(
                        LogTag::Pool,
                        "SKIP",
                        &format!("clmm {} failed to decode: {}", address, err),
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
