//! Thin wrapper around the nonblocking Solana RPC client.

use solana_account_decoder::UiAccountEncoding;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{
    RpcAccountInfoConfig, RpcProgramAccountsConfig, RpcSendTransactionConfig,
};
use solana_client::rpc_filter::RpcFilterType;
use solana_sdk::account::Account;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::Transaction;

use crate::errors::{DexResult, RpcError};
use crate::logger::{log, LogTag};
use crate::rpc::retry::with_backoff;

/// Shared read-only RPC handle. Adapters hold it behind an `Arc`.
pub struct SolClient {
    rpc: RpcClient,
}

impl SolClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            rpc: RpcClient::new(endpoint.to_string()),
        }
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    /// Fetch one account; missing accounts are an error.
    pub async fn get_account(&self, address: &Pubkey) -> DexResult<Account> {
        match self.get_account_optional(address).await? {
            Some(account) => Ok(account),
            None => Err(RpcError::AccountNotFound(address.to_string()).into()),
        }
    }

    /// Fetch one account, `None` when it does not exist.
    pub async fn get_account_optional(&self, address: &Pubkey) -> DexResult<Option<Account>> {
        let value = with_backoff("get_account", || {
            self.rpc.get_account_with_commitment(address, CommitmentConfig::processed())
        })
        .await?;
        Ok(value.value)
    }

    /// Batch account fetch at processed commitment; order is preserved and
    /// missing accounts come back as `None`.
    pub async fn get_multiple_accounts(
        &self,
        addresses: &[Pubkey],
    ) -> DexResult<Vec<Option<Account>>> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }
        let response = with_backoff("get_multiple_accounts", || {
            self.rpc
                .get_multiple_accounts_with_commitment(addresses, CommitmentConfig::processed())
        })
        .await?;
        Ok(response.value)
    }

    /// Program-accounts scan with data-size and memcmp filters.
    pub async fn get_program_accounts_with_filters(
        &self,
        program: &Pubkey,
        filters: Vec<RpcFilterType>,
    ) -> DexResult<Vec<(Pubkey, Account)>> {
        let accounts = with_backoff("get_program_accounts", || {
            let config = RpcProgramAccountsConfig {
                filters: Some(filters.clone()),
                account_config: RpcAccountInfoConfig {
                    encoding: Some(UiAccountEncoding::Base64),
                    commitment: Some(CommitmentConfig::confirmed()),
                    data_slice: None,
                    min_context_slot: None,
                },
                with_context: None,
            };
            self.rpc.get_program_accounts_with_config(program, config)
        })
        .await?;
        Ok(accounts)
    }

    pub async fn get_latest_blockhash(&self) -> DexResult<Hash> {
        with_backoff("get_latest_blockhash", || {
            self.rpc.get_latest_blockhash_with_commitment(CommitmentConfig::finalized())
        })
        .await
        .map(|(hash, _)| hash)
    }

    /// Sign and submit a transaction built from `instructions`.
    ///
    /// With `simulate_only` the transaction goes through `simulateTransaction`
    /// and `None` is returned instead of a signature.
    pub async fn send_transaction(
        &self,
        blockhash: Hash,
        signers: &[&Keypair],
        instructions: &[Instruction],
        simulate_only: bool,
    ) -> DexResult<Option<Signature>> {
        let payer = signers
            .first()
            .ok_or_else(|| RpcError::Permanent("no signers provided".to_string()))?
            .pubkey();
        let transaction =
            Transaction::new_signed_with_payer(instructions, Some(&payer), signers, blockhash);

        if simulate_only {
            let result = with_backoff("simulate_transaction", || {
                self.rpc.simulate_transaction(&transaction)
            })
            .await?;
            if let Some(err) = result.value.err {
                return Err(RpcError::Permanent(format!("simulation failed: {:?}", err)).into());
            }
            log(LogTag::Rpc, "INFO", "transaction simulation succeeded");
            return Ok(None);
        }

        let signature = with_backoff("send_transaction", || {
            self.rpc.send_transaction_with_config(
                &transaction,
                RpcSendTransactionConfig {
                    skip_preflight: false,
                    ..RpcSendTransactionConfig::default()
                },
            )
        })
        .await?;
        Ok(Some(signature))
    }
}
